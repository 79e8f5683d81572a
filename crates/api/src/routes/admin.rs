//! Route definitions for `/admin`. All endpoints require the admin role.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// POST   /providers                     -> create_provider
/// POST   /providers/{id}/active         -> set_provider_active
/// GET    /jobs/stuck                    -> stuck_jobs
/// GET    /jobs/{id}/audit               -> audit
/// POST   /jobs/{id}/reassign            -> reassign
/// POST   /jobs/{id}/override            -> override_status
/// POST   /jobs/{id}/dispatch            -> dispatch_now
/// POST   /jobs/{id}/take-up             -> take_up_issue
/// POST   /jobs/{id}/resolve-issue       -> resolve_issue
/// POST   /jobs/{id}/resolve-flag        -> resolve_flag
/// POST   /jobs/{id}/capture             -> capture
/// POST   /jobs/{id}/payout              -> payout
/// POST   /jobs/{id}/close               -> close
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/providers", post(admin::create_provider))
        .route("/providers/{id}/active", post(admin::set_provider_active))
        .route("/jobs/stuck", get(admin::stuck_jobs))
        .route("/jobs/{id}/audit", get(admin::audit))
        .route("/jobs/{id}/reassign", post(admin::reassign))
        .route("/jobs/{id}/override", post(admin::override_status))
        .route("/jobs/{id}/dispatch", post(admin::dispatch_now))
        .route("/jobs/{id}/take-up", post(admin::take_up_issue))
        .route("/jobs/{id}/resolve-issue", post(admin::resolve_issue))
        .route("/jobs/{id}/resolve-flag", post(admin::resolve_flag))
        .route("/jobs/{id}/capture", post(admin::capture))
        .route("/jobs/{id}/payout", post(admin::payout))
        .route("/jobs/{id}/close", post(admin::close))
}
