//! Route definitions for the `/visits` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::visits;
use crate::state::AppState;

/// Routes mounted at `/visits`.
///
/// ```text
/// POST   /{id}/lock     -> lock_scope
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/lock", post(visits::lock_scope))
}
