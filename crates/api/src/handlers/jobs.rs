//! Handlers for the `/jobs` resource.
//!
//! Role restrictions that depend on the job (its customer, its assigned
//! provider) are enforced by the workflow guards; the extractors here only
//! pin the caller's role where an endpoint belongs to one role outright.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use tradeflow_core::types::DbId;
use tradeflow_db::models::job::CreateJob;
use tradeflow_db::models::review::UpsertReview;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireCustomer, RequireProvider};
use crate::response::DataResponse;
use crate::state::AppState;
use crate::workflows::cancellation::{self, CancelJob};
use crate::workflows::execution::{self, ChangeStatus};
use crate::workflows::flags::{self, FlagJob};
use crate::workflows::issues::{self, RaiseIssue};
use crate::workflows::mismatch::{self, ReportMismatch, ResolveMismatch};
use crate::workflows::parts::{self, DecideParts, RequestParts};
use crate::workflows::{booking, offers, settlement};

// ---------------------------------------------------------------------------
// Create / read
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create and quote a job from catalogue item ids. Returns 201 with the
/// PRICED job and its DRAFT visits.
pub async fn create_job(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Json(input): Json<CreateJob>,
) -> AppResult<impl IntoResponse> {
    let quote = booking::create_job(&state.pool, &user.actor(), &input, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: quote })))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let detail = crate::workflows::get_job(&state.pool, &auth.actor(), job_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/accept
///
/// Returns 409 if another provider won the job first.
pub async fn accept_job(
    RequireProvider(user): RequireProvider,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = offers::accept_job(
        &state.pool,
        &state.config.dispatch,
        &user.actor(),
        job_id,
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/decline
///
/// Returns 204; the offer moves to the next eligible provider at once.
pub async fn decline_job(
    RequireProvider(user): RequireProvider,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<StatusCode> {
    offers::decline_job(
        &state.pool,
        &state.config.dispatch,
        &user.actor(),
        job_id,
        Utc::now(),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/status
pub async fn change_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<ChangeStatus>,
) -> AppResult<impl IntoResponse> {
    let job =
        execution::change_status(&state.pool, &auth.actor(), job_id, &input, Utc::now()).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/cancel
///
/// The body is optional.
pub async fn cancel_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    input: Option<Json<CancelJob>>,
) -> AppResult<impl IntoResponse> {
    let input = input.map(|Json(body)| body).unwrap_or_default();
    let job = cancellation::cancel_job(&state.pool, &auth.actor(), job_id, &input).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Interruptions
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/flag
pub async fn flag_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<FlagJob>,
) -> AppResult<impl IntoResponse> {
    let job = flags::flag_job(&state.pool, &auth.actor(), job_id, &input).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/issues
pub async fn raise_issue(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    input: Option<Json<RaiseIssue>>,
) -> AppResult<impl IntoResponse> {
    let input = input.map(|Json(body)| body).unwrap_or_default();
    let job = issues::raise_issue(&state.pool, &auth.actor(), job_id, &input, Utc::now()).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/parts
pub async fn request_parts(
    RequireProvider(user): RequireProvider,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<RequestParts>,
) -> AppResult<impl IntoResponse> {
    let job = parts::request_parts(&state.pool, &user.actor(), job_id, &input, Utc::now()).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/parts/decision
pub async fn decide_parts(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<DecideParts>,
) -> AppResult<impl IntoResponse> {
    let job = parts::decide_parts(&state.pool, &auth.actor(), job_id, &input, Utc::now()).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/resume
pub async fn resume_work(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = parts::resume_work(&state.pool, &auth.actor(), job_id, Utc::now()).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/mismatch
pub async fn report_mismatch(
    RequireProvider(user): RequireProvider,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<ReportMismatch>,
) -> AppResult<impl IntoResponse> {
    let job =
        mismatch::report_mismatch(&state.pool, &user.actor(), job_id, &input, Utc::now()).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/mismatch/resolution
pub async fn resolve_mismatch(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<ResolveMismatch>,
) -> AppResult<impl IntoResponse> {
    let outcome =
        mismatch::resolve_mismatch(&state.pool, &auth.actor(), job_id, &input, Utc::now()).await?;
    Ok(Json(DataResponse { data: outcome }))
}

// ---------------------------------------------------------------------------
// Reviews
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/reviews
///
/// Upsert: a second review by the same role replaces the first.
pub async fn upsert_review(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<UpsertReview>,
) -> AppResult<impl IntoResponse> {
    let review = settlement::upsert_review(&state.pool, &auth.actor(), job_id, &input).await?;
    Ok(Json(DataResponse { data: review }))
}
