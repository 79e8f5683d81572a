//! Role-gated workflow operations.
//!
//! Each operation opens one transaction, locks the job row, runs exactly
//! one guard from `tradeflow_core::policy`, writes its side effects and
//! moves the job through [`crate::engine::state_machine`]. An early `?`
//! drops the transaction, so a failed guard or write leaves nothing behind.
//!
//! Operations take the caller as an [`Actor`] and `now` as an argument so
//! they can be driven directly from tests.

pub mod admin;
pub mod booking;
pub mod cancellation;
pub mod execution;
pub mod flags;
pub mod issues;
pub mod mismatch;
pub mod offers;
pub mod parts;
pub mod providers;
pub mod settlement;

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tradeflow_core::error::CoreError;
use tradeflow_core::evidence::{validate_storage_key, PhotoType, MAX_PHOTOS_PER_REQUEST};
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::policy::authorize_view;
use tradeflow_core::roles::Actor;
use tradeflow_core::types::DbId;
use tradeflow_db::models::evidence::{EvidencePhoto, PhotoRef};
use tradeflow_db::models::job::Job;
use tradeflow_db::models::visit::Visit;
use tradeflow_db::repositories::{EvidenceRepo, JobRepo, VisitRepo};

use crate::error::AppResult;

pub(crate) fn job_not_found(job_id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "Job",
        id: job_id,
    }
}

/// Lock a job row for the rest of the transaction and decode its status.
pub(crate) async fn lock_job(
    conn: &mut PgConnection,
    job_id: DbId,
) -> AppResult<(Job, JobStatus)> {
    let job = JobRepo::find_for_update(conn, job_id)
        .await?
        .ok_or_else(|| job_not_found(job_id))?;
    let status = job.status()?;
    Ok((job, status))
}

/// The visit currently being worked on a job.
pub(crate) async fn active_visit(conn: &mut PgConnection, job_id: DbId) -> AppResult<Visit> {
    VisitRepo::find_active_for_job(conn, job_id)
        .await?
        .ok_or_else(|| CoreError::Validation("Job has no visit in progress".into()).into())
}

/// Validate and record evidence photo references for a job.
pub(crate) async fn record_photos(
    conn: &mut PgConnection,
    job_id: DbId,
    visit_id: Option<DbId>,
    photo_type: PhotoType,
    photos: &[PhotoRef],
    actor: &Actor,
) -> AppResult<Vec<EvidencePhoto>> {
    if photos.is_empty() {
        return Ok(Vec::new());
    }
    if photos.len() > MAX_PHOTOS_PER_REQUEST {
        return Err(CoreError::Validation(format!(
            "At most {MAX_PHOTOS_PER_REQUEST} photos may be attached at once"
        ))
        .into());
    }
    for photo in photos {
        validate_storage_key(job_id, &photo.storage_key)?;
    }

    let keys: Vec<String> = photos.iter().map(|p| p.storage_key.clone()).collect();
    let recorded = EvidenceRepo::record(conn, job_id, visit_id, photo_type, &keys, actor).await?;
    tracing::debug!(
        job_id,
        photo_type = %photo_type,
        recorded = recorded.len(),
        "Evidence recorded",
    );
    Ok(recorded)
}

/// A job with its visits.
#[derive(Debug, Serialize)]
pub struct JobDetail {
    pub job: Job,
    pub visits: Vec<Visit>,
}

/// Load a job and its visits for a party to it (or an admin).
pub async fn get_job(pool: &PgPool, actor: &Actor, job_id: DbId) -> AppResult<JobDetail> {
    let job = JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or_else(|| job_not_found(job_id))?;
    authorize_view(actor, &job.parties())?;

    let mut conn = pool.acquire().await?;
    let visits = VisitRepo::list_for_job(&mut conn, job_id).await?;
    Ok(JobDetail { job, visits })
}

/// Re-read a job after a committed workflow.
pub(crate) async fn reload(pool: &PgPool, job_id: DbId) -> AppResult<Job> {
    Ok(JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or_else(|| job_not_found(job_id))?)
}
