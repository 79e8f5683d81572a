//! Flags: any party can pull a job into administrator review.

use serde::Deserialize;
use sqlx::PgPool;
use tradeflow_core::error::CoreError;
use tradeflow_core::evidence::PhotoType;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::policy::{authorize_flag, authorize_flag_resolution, FlagReason, FlagResolution};
use tradeflow_core::roles::{Actor, ROLE_ADMIN};
use tradeflow_core::settlement::cancellation_outcome;
use tradeflow_core::types::DbId;
use tradeflow_db::models::evidence::PhotoRef;
use tradeflow_db::models::job::Job;
use tradeflow_db::repositories::{JobRepo, TransactionRepo};

use super::cancellation::settle_cancellation;
use super::{lock_job, record_photos};
use crate::engine::state_machine::{apply_status_change, TransitionMeta};
use crate::error::AppResult;

/// Request body for `POST /api/v1/jobs/{id}/flag`.
#[derive(Debug, Clone, Deserialize)]
pub struct FlagJob {
    pub reason: String,
    pub note: Option<String>,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
}

/// Flag a job for review. Moves it to FLAGGED_REVIEW.
pub async fn flag_job(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &FlagJob,
) -> AppResult<Job> {
    let reason: FlagReason = input.reason.parse().map_err(CoreError::Validation)?;

    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    authorize_flag(actor, &job.parties(), status)?;

    JobRepo::set_flag(&mut *tx, job_id, reason.as_str(), input.note.as_deref(), actor.id).await?;
    record_photos(&mut *tx, job_id, None, PhotoType::Flag, &input.photos, actor).await?;
    let job = apply_status_change(
        &mut *tx,
        job_id,
        JobStatus::FlaggedReview,
        TransitionMeta::by(actor).with_reason(Some(reason.as_str())),
    )
    .await?;
    tx.commit().await?;

    tracing::warn!(job_id, reason = %reason, by = %actor.role, "Job flagged for review");
    Ok(job)
}

/// Request body for `POST /api/v1/admin/jobs/{id}/resolve-flag`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveFlag {
    pub resolution: String,
    pub note: Option<String>,
}

/// Resolve a flagged job.
///
/// Every resolution detaches the provider and clears the flag metadata:
/// RETURN_TO_DISPATCH sends the job back to WAITING_FOR_DISPATCH,
/// FORCE_RESCHEDULE to RESCHEDULE_REQUIRED, CANCEL_FREE cancels without a
/// fee.
pub async fn resolve_flag(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &ResolveFlag,
) -> AppResult<Job> {
    let resolution: FlagResolution = input.resolution.parse().map_err(CoreError::Validation)?;

    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    authorize_flag_resolution(actor, status, resolution)?;

    JobRepo::clear_flag(&mut *tx, job_id).await?;
    match resolution {
        FlagResolution::CancelFree => {
            let outcome = cancellation_outcome(job.provider_id.is_some(), job.fixed_price_pence, true);
            settle_cancellation(&mut *tx, &job, outcome.fee_pence).await?;
            JobRepo::set_cancellation(&mut *tx, job_id, ROLE_ADMIN, input.note.as_deref()).await?;
        }
        FlagResolution::ReturnToDispatch | FlagResolution::ForceReschedule => {
            JobRepo::set_provider(&mut *tx, job_id, None).await?;
            TransactionRepo::void_pending_charges(&mut *tx, job_id).await?;
        }
    }

    let job = apply_status_change(
        &mut *tx,
        job_id,
        resolution.target(),
        TransitionMeta::by(actor).with_reason(input.note.as_deref().or(Some(resolution.as_str()))),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(job_id, resolution = %resolution, "Flag resolved");
    Ok(job)
}
