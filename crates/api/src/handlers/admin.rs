//! Admin-only handlers. Every endpoint requires [`RequireAdmin`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use tradeflow_core::types::DbId;
use tradeflow_db::models::provider::CreateProvider;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::workflows::admin::{self, OverrideStatus, Reassign};
use crate::workflows::flags::{self, ResolveFlag};
use crate::workflows::issues::{self, IssueNote, ResolveIssue};
use crate::workflows::providers::{self, SetActive};
use crate::workflows::settlement;

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/providers
pub async fn create_provider(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreateProvider>,
) -> AppResult<impl IntoResponse> {
    let provider = providers::create_provider(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: provider })))
}

/// POST /api/v1/admin/providers/{id}/active
pub async fn set_provider_active(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(provider_id): Path<DbId>,
    Json(input): Json<SetActive>,
) -> AppResult<impl IntoResponse> {
    let provider = providers::set_active(&state.pool, provider_id, input.is_active).await?;
    Ok(Json(DataResponse { data: provider }))
}

// ---------------------------------------------------------------------------
// Dispatch controls
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/jobs/{id}/reassign
pub async fn reassign(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<Reassign>,
) -> AppResult<impl IntoResponse> {
    let job = admin::reassign(&state.pool, &user.actor(), job_id, &input).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/admin/jobs/{id}/override
pub async fn override_status(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<OverrideStatus>,
) -> AppResult<impl IntoResponse> {
    let job = admin::override_status(&state.pool, &user.actor(), job_id, &input).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/admin/jobs/{id}/dispatch
pub async fn dispatch_now(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let result = admin::dispatch_now(
        &state.pool,
        &state.config.dispatch,
        &user.actor(),
        job_id,
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse { data: result }))
}

// ---------------------------------------------------------------------------
// Disputes and flags
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/jobs/{id}/take-up
pub async fn take_up_issue(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    input: Option<Json<IssueNote>>,
) -> AppResult<impl IntoResponse> {
    let input = input.map(|Json(body)| body).unwrap_or_default();
    let job = issues::take_up_issue(&state.pool, &user.actor(), job_id, &input).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/admin/jobs/{id}/resolve-issue
pub async fn resolve_issue(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<ResolveIssue>,
) -> AppResult<impl IntoResponse> {
    let job =
        issues::resolve_issue(&state.pool, &user.actor(), job_id, &input, Utc::now()).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/admin/jobs/{id}/resolve-flag
pub async fn resolve_flag(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<ResolveFlag>,
) -> AppResult<impl IntoResponse> {
    let job = flags::resolve_flag(&state.pool, &user.actor(), job_id, &input).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/jobs/{id}/capture
pub async fn capture(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = settlement::capture(&state.pool, &user.actor(), job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/admin/jobs/{id}/payout
pub async fn payout(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = settlement::payout(&state.pool, &user.actor(), job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/admin/jobs/{id}/close
pub async fn close(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = settlement::close(&state.pool, &user.actor(), job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/jobs/{id}/audit
///
/// Full trail: transitions, visits, scope summaries, ledger, reviews and
/// evidence with signed read URLs.
pub async fn audit(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let trail = admin::audit(&state.pool, &state.config.evidence, job_id, Utc::now()).await?;
    Ok(Json(DataResponse { data: trail }))
}

/// GET /api/v1/admin/jobs/stuck
pub async fn stuck_jobs(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let report = admin::stuck_jobs(&state.pool, Utc::now()).await?;
    Ok(Json(DataResponse { data: report }))
}
