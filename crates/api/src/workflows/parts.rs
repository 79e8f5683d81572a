//! Parts requests raised mid-job.
//!
//! A request pauses the work timer and moves the job to PARTS_REQUIRED.
//! Approval restarts the timer but leaves the job waiting until the
//! provider resumes; rejection escalates to an administrator.

use serde::Deserialize;
use sqlx::PgPool;
use tradeflow_core::error::CoreError;
use tradeflow_core::evidence::PhotoType;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::policy::{
    authorize_parts_decision, authorize_parts_request, authorize_parts_resume, PartsDecision,
};
use tradeflow_core::roles::Actor;
use tradeflow_core::types::{DbId, Pence, Timestamp};
use tradeflow_core::visit::{PartsStatus, VisitStatus};
use tradeflow_db::models::evidence::PhotoRef;
use tradeflow_db::models::job::Job;
use tradeflow_db::repositories::{JobRepo, VisitRepo};

use super::{active_visit, lock_job, record_photos, reload};
use crate::engine::state_machine::{apply_status_change, TransitionMeta};
use crate::error::AppResult;

/// Request body for `POST /api/v1/jobs/{id}/parts`.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestParts {
    pub note: String,
    pub cost_pence: Option<Pence>,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
}

/// Open a parts request on the visit in progress.
pub async fn request_parts(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &RequestParts,
    now: Timestamp,
) -> AppResult<Job> {
    let note = input.note.trim();
    if note.is_empty() {
        return Err(CoreError::Validation("A parts note is required".into()).into());
    }
    if input.cost_pence.is_some_and(|c| c < 0) {
        return Err(CoreError::Validation("cost_pence cannot be negative".into()).into());
    }

    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    let visit = active_visit(&mut *tx, job_id).await?;
    authorize_parts_request(actor, &job.parties(), status, visit.parts_status()?)?;

    let timer = job.timer().pause(now)?;
    JobRepo::update_timer(&mut *tx, job_id, &timer, true).await?;
    VisitRepo::request_parts(&mut *tx, visit.id, note, input.cost_pence).await?;
    record_photos(
        &mut *tx,
        job_id,
        Some(visit.id),
        PhotoType::Parts,
        &input.photos,
        actor,
    )
    .await?;

    let job = apply_status_change(
        &mut *tx,
        job_id,
        JobStatus::PartsRequired,
        TransitionMeta::by(actor).with_reason(Some(note)),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(job_id, visit_id = visit.id, cost_pence = ?input.cost_pence, "Parts requested");
    Ok(job)
}

/// Request body for `POST /api/v1/jobs/{id}/parts/decision`.
#[derive(Debug, Clone, Deserialize)]
pub struct DecideParts {
    pub decision: String,
    pub note: Option<String>,
}

/// Approve or reject the pending parts request.
///
/// APPROVE resumes the timer; the job stays PARTS_REQUIRED until the
/// provider calls resume. REJECT parks the visit as ISSUE_PENDING and moves
/// the job to ISSUE_REPORTED with the timer still paused.
pub async fn decide_parts(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &DecideParts,
    now: Timestamp,
) -> AppResult<Job> {
    let decision: PartsDecision = input.decision.parse().map_err(CoreError::Validation)?;

    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    let visit = active_visit(&mut *tx, job_id).await?;
    authorize_parts_decision(actor, &job.parties(), status, visit.parts_status()?)?;

    match decision {
        PartsDecision::Approve => {
            VisitRepo::set_parts_status(&mut *tx, visit.id, PartsStatus::Approved).await?;
            let timer = job.timer().resume(now);
            JobRepo::update_timer(&mut *tx, job_id, &timer, false).await?;
            tx.commit().await?;
            tracing::info!(job_id, visit_id = visit.id, "Parts approved");
            reload(pool, job_id).await
        }
        PartsDecision::Reject => {
            VisitRepo::set_parts_status(&mut *tx, visit.id, PartsStatus::Rejected).await?;
            VisitRepo::set_status(&mut *tx, visit.id, VisitStatus::IssuePending).await?;
            let job = apply_status_change(
                &mut *tx,
                job_id,
                JobStatus::IssueReported,
                TransitionMeta::by(actor)
                    .with_reason(input.note.as_deref().or(Some("parts rejected"))),
            )
            .await?;
            tx.commit().await?;
            tracing::warn!(job_id, visit_id = visit.id, "Parts rejected");
            Ok(job)
        }
    }
}

/// Resume work once parts are approved: PARTS_REQUIRED -> IN_PROGRESS.
pub async fn resume_work(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    now: Timestamp,
) -> AppResult<Job> {
    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    let visit = active_visit(&mut *tx, job_id).await?;
    authorize_parts_resume(actor, &job.parties(), status, visit.parts_status()?)?;

    if job.timer_paused_for_parts || job.timer().is_paused() {
        let timer = job.timer().resume(now);
        JobRepo::update_timer(&mut *tx, job_id, &timer, false).await?;
    }

    let job = apply_status_change(
        &mut *tx,
        job_id,
        JobStatus::InProgress,
        TransitionMeta::by(actor).with_reason(Some("parts arrived")),
    )
    .await?;
    tx.commit().await?;
    Ok(job)
}
