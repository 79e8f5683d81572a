//! Job status executor.
//!
//! Every status change goes through [`apply_status_change`] (or the
//! conditional [`claim_for_provider`] on accept). Both write the new status
//! and exactly one `job_state_changes` row on the caller's connection, so
//! passing `&mut *tx` makes the pair atomic with whatever else the workflow
//! writes. A failed validation returns before anything is written.

use sqlx::PgConnection;
use tradeflow_core::error::CoreError;
use tradeflow_core::job_status::state_machine::validate_transition;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::roles::Actor;
use tradeflow_core::types::DbId;
use tradeflow_db::models::job::Job;
use tradeflow_db::models::job_state_change::NewJobStateChange;
use tradeflow_db::repositories::{JobRepo, JobStateChangeRepo};

use crate::error::AppResult;

/// Role recorded on audit rows written by background sweeps.
pub const SYSTEM_ROLE: &str = "system";

/// Who asked for a transition and why.
#[derive(Debug, Clone, Copy)]
pub struct TransitionMeta<'a> {
    /// `None` for the dispatch tracker.
    pub actor: Option<&'a Actor>,
    pub reason: Option<&'a str>,
}

impl<'a> TransitionMeta<'a> {
    pub fn by(actor: &'a Actor) -> Self {
        Self {
            actor: Some(actor),
            reason: None,
        }
    }

    pub fn system(reason: &'a str) -> Self {
        Self {
            actor: None,
            reason: Some(reason),
        }
    }

    pub fn with_reason(self, reason: Option<&'a str>) -> Self {
        Self { reason, ..self }
    }

    fn actor_id(&self) -> Option<DbId> {
        self.actor.map(|a| a.id)
    }

    fn actor_role(&self) -> &'a str {
        self.actor.map_or(SYSTEM_ROLE, |a| a.role.as_str())
    }
}

fn job_not_found(job_id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "Job",
        id: job_id,
    }
}

/// Move a job to `to`.
///
/// Re-reads the job under a row lock, validates `from -> to` against the
/// transition table, writes the status and `status_updated_at`, and
/// appends one audit row. Fails with `InvalidTransition` when `to` is not a
/// successor of the freshly read status and `NotFound` when the job is gone.
pub async fn apply_status_change(
    conn: &mut PgConnection,
    job_id: DbId,
    to: JobStatus,
    meta: TransitionMeta<'_>,
) -> AppResult<Job> {
    let current = JobRepo::find_for_update(conn, job_id)
        .await?
        .ok_or_else(|| job_not_found(job_id))?;
    let from = current.status()?;

    validate_transition(from, to)?;

    let updated = JobRepo::set_status(conn, job_id, to).await?;
    JobStateChangeRepo::insert(
        conn,
        &NewJobStateChange {
            job_id,
            from_status_id: Some(from.id()),
            to_status_id: to.id(),
            reason: meta.reason,
            actor_id: meta.actor_id(),
            actor_role: meta.actor_role(),
        },
    )
    .await?;

    tracing::info!(
        job_id,
        from = %from,
        to = %to,
        actor_role = meta.actor_role(),
        "Job status changed",
    );

    Ok(updated)
}

/// Record the creation of a job: an audit row with no `from` status.
pub async fn record_creation(
    conn: &mut PgConnection,
    job: &Job,
    meta: TransitionMeta<'_>,
) -> AppResult<()> {
    JobStateChangeRepo::insert(
        conn,
        &NewJobStateChange {
            job_id: job.id,
            from_status_id: None,
            to_status_id: job.status_id,
            reason: meta.reason,
            actor_id: meta.actor_id(),
            actor_role: meta.actor_role(),
        },
    )
    .await?;
    Ok(())
}

/// Attach `provider_id` to a job that is taking offers, moving it to
/// ASSIGNED.
///
/// The write is conditioned on the job still being ASSIGNING with no
/// provider, so of several concurrent callers exactly one gets `true`. The
/// audit row is only written for the winner.
pub async fn claim_for_provider(
    conn: &mut PgConnection,
    job_id: DbId,
    provider_id: DbId,
    meta: TransitionMeta<'_>,
) -> AppResult<bool> {
    if !JobRepo::claim(conn, job_id, provider_id).await? {
        tracing::debug!(job_id, provider_id, "Claim lost: job already taken or withdrawn");
        return Ok(false);
    }

    JobStateChangeRepo::insert(
        conn,
        &NewJobStateChange {
            job_id,
            from_status_id: Some(JobStatus::DISPATCH_ACCEPTING.id()),
            to_status_id: JobStatus::Assigned.id(),
            reason: meta.reason,
            actor_id: meta.actor_id(),
            actor_role: meta.actor_role(),
        },
    )
    .await?;

    tracing::info!(job_id, provider_id, "Job claimed by provider");
    Ok(true)
}
