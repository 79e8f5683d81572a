pub mod admin;
pub mod health;
pub mod jobs;
pub mod providers;
pub mod visits;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                                    create (customer)
/// /jobs/{id}                               job + visits (parties, admin)
/// /jobs/{id}/accept                        accept offer (provider)
/// /jobs/{id}/decline                       decline offer (provider)
/// /jobs/{id}/status                        execution progressions
/// /jobs/{id}/cancel                        cancel or withdraw
/// /jobs/{id}/flag                          flag for review
/// /jobs/{id}/issues                        raise a dispute
/// /jobs/{id}/parts                         request parts (provider)
/// /jobs/{id}/parts/decision                approve/reject parts
/// /jobs/{id}/resume                        resume after parts
/// /jobs/{id}/mismatch                      report scope mismatch (provider)
/// /jobs/{id}/mismatch/resolution           UPGRADE | REBOOK
/// /jobs/{id}/reviews                       review upsert
///
/// /visits/{id}/lock                        scope lock (customer)
///
/// /providers/me/online                     availability (provider)
///
/// /admin/providers                         register provider
/// /admin/providers/{id}/active             activate / suspend
/// /admin/jobs/stuck                        stuck-state report
/// /admin/jobs/{id}/audit                   full audit trail
/// /admin/jobs/{id}/reassign                attach a provider
/// /admin/jobs/{id}/override                forced legal transition
/// /admin/jobs/{id}/dispatch                dispatch now
/// /admin/jobs/{id}/take-up                 take up an issue
/// /admin/jobs/{id}/resolve-issue           resolve a dispute
/// /admin/jobs/{id}/resolve-flag            resolve a flag
/// /admin/jobs/{id}/capture                 capture payment
/// /admin/jobs/{id}/payout                  pay the provider
/// /admin/jobs/{id}/close                   close after reviews
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/visits", visits::router())
        .nest("/providers", providers::router())
        .nest("/admin", admin::router())
}
