//! Route definitions for provider self-service.

use axum::routing::post;
use axum::Router;

use crate::handlers::providers;
use crate::state::AppState;

/// Routes mounted at `/providers`.
///
/// ```text
/// POST   /me/online     -> set_online
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/me/online", post(providers::set_online))
}
