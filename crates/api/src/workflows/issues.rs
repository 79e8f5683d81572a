//! Disputes: raising, administrator take-up and resolution.

use serde::Deserialize;
use sqlx::PgPool;
use tradeflow_core::error::CoreError;
use tradeflow_core::evidence::PhotoType;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::policy::{
    authorize_issue, authorize_issue_resolution, authorize_issue_take_up, IssueResolution,
};
use tradeflow_core::roles::{Actor, ROLE_ADMIN};
use tradeflow_core::settlement::cancellation_outcome;
use tradeflow_core::types::{DbId, Timestamp};
use tradeflow_core::visit::VisitStatus;
use tradeflow_db::models::evidence::PhotoRef;
use tradeflow_db::models::job::Job;
use tradeflow_db::repositories::{JobRepo, VisitRepo};

use super::cancellation::settle_cancellation;
use super::{lock_job, record_photos};
use crate::engine::state_machine::{apply_status_change, TransitionMeta};
use crate::error::AppResult;

/// Request body for `POST /api/v1/jobs/{id}/issues`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RaiseIssue {
    pub note: Option<String>,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
}

/// Raise a dispute.
///
/// A customer issue (from COMPLETED) freezes the payout. A provider issue
/// (from ARRIVING or IN_PROGRESS) freezes the work timer.
pub async fn raise_issue(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &RaiseIssue,
    now: Timestamp,
) -> AppResult<Job> {
    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    let effects = authorize_issue(actor, &job.parties(), status)?;

    JobRepo::set_issue(
        &mut *tx,
        job_id,
        effects.raised_by,
        input.note.as_deref(),
        effects.freeze_payout,
        effects.freeze_timer,
    )
    .await?;

    let timer = job.timer();
    if effects.freeze_timer && timer.started_at.is_some() {
        let paused = timer.pause(now)?;
        JobRepo::update_timer(&mut *tx, job_id, &paused, job.timer_paused_for_parts).await?;
    }
    record_photos(&mut *tx, job_id, None, PhotoType::Flag, &input.photos, actor).await?;

    let job = apply_status_change(
        &mut *tx,
        job_id,
        effects.target,
        TransitionMeta::by(actor).with_reason(input.note.as_deref()),
    )
    .await?;
    tx.commit().await?;

    tracing::warn!(
        job_id,
        raised_by = effects.raised_by,
        payout_frozen = effects.freeze_payout,
        timer_frozen = effects.freeze_timer,
        "Issue raised",
    );
    Ok(job)
}

/// Request body for the admin take-up and resolve endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueNote {
    pub note: Option<String>,
}

/// An administrator takes up an open issue: ISSUE_* -> RESOLUTION_PENDING.
pub async fn take_up_issue(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &IssueNote,
) -> AppResult<Job> {
    let mut tx = pool.begin().await?;
    let (_, status) = lock_job(&mut *tx, job_id).await?;
    authorize_issue_take_up(actor, status)?;

    let job = apply_status_change(
        &mut *tx,
        job_id,
        JobStatus::ResolutionPending,
        TransitionMeta::by(actor).with_reason(input.note.as_deref()),
    )
    .await?;
    tx.commit().await?;
    Ok(job)
}

/// Request body for `POST /api/v1/admin/jobs/{id}/resolve-issue`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveIssue {
    pub resolution: String,
    pub note: Option<String>,
}

/// Resolve a job under RESOLUTION_PENDING.
///
/// - RESUME_WORK: freezes lifted, timer resumes, back to IN_PROGRESS.
/// - RELEASE: freezes lifted, job COMPLETED (elapsed time recorded if it
///   was not already).
/// - CANCEL_FREE / CANCEL_CHARGED: cancelled, the latter with the fee.
pub async fn resolve_issue(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &ResolveIssue,
    now: Timestamp,
) -> AppResult<Job> {
    let resolution: IssueResolution = input.resolution.parse().map_err(CoreError::Validation)?;

    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    authorize_issue_resolution(actor, status, resolution)?;

    match resolution {
        IssueResolution::ResumeWork => {
            JobRepo::clear_issue_freezes(&mut *tx, job_id).await?;
            let timer = job.timer().start(now).resume(now);
            JobRepo::update_timer(&mut *tx, job_id, &timer, false).await?;
            VisitRepo::set_status_for_job(&mut *tx, job_id, VisitStatus::InProgress).await?;
        }
        IssueResolution::Release => {
            JobRepo::clear_issue_freezes(&mut *tx, job_id).await?;
            if job.elapsed_secs.is_none() {
                JobRepo::set_elapsed(&mut *tx, job_id, job.timer().elapsed_secs(now)).await?;
            }
            VisitRepo::set_status_for_job(&mut *tx, job_id, VisitStatus::Completed).await?;
        }
        IssueResolution::CancelFree | IssueResolution::CancelCharged => {
            let waive = resolution == IssueResolution::CancelFree;
            let outcome = cancellation_outcome(true, job.fixed_price_pence, waive);
            settle_cancellation(&mut *tx, &job, outcome.fee_pence).await?;
            JobRepo::set_cancellation(&mut *tx, job_id, ROLE_ADMIN, input.note.as_deref()).await?;
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

    tracing::info!(job_id, resolution = %resolution, "Issue resolved");
    Ok(job)
}
