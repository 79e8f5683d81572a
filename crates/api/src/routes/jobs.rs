//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /                              -> create_job
/// GET    /{id}                          -> get_job
/// POST   /{id}/accept                   -> accept_job
/// POST   /{id}/decline                  -> decline_job
/// POST   /{id}/status                   -> change_status
/// POST   /{id}/cancel                   -> cancel_job
/// POST   /{id}/flag                     -> flag_job
/// POST   /{id}/issues                   -> raise_issue
/// POST   /{id}/parts                    -> request_parts
/// POST   /{id}/parts/decision           -> decide_parts
/// POST   /{id}/resume                   -> resume_work
/// POST   /{id}/mismatch                 -> report_mismatch
/// POST   /{id}/mismatch/resolution      -> resolve_mismatch
/// POST   /{id}/reviews                  -> upsert_review
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(jobs::create_job))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/accept", post(jobs::accept_job))
        .route("/{id}/decline", post(jobs::decline_job))
        .route("/{id}/status", post(jobs::change_status))
        .route("/{id}/cancel", post(jobs::cancel_job))
        .route("/{id}/flag", post(jobs::flag_job))
        .route("/{id}/issues", post(jobs::raise_issue))
        .route("/{id}/parts", post(jobs::request_parts))
        .route("/{id}/parts/decision", post(jobs::decide_parts))
        .route("/{id}/resume", post(jobs::resume_work))
        .route("/{id}/mismatch", post(jobs::report_mismatch))
        .route("/{id}/mismatch/resolution", post(jobs::resolve_mismatch))
        .route("/{id}/reviews", post(jobs::upsert_review))
}
