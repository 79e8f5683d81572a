//! Generic change-status: the execution spine.
//!
//! Covers ASSIGNED -> PREAUTHORISED (customer) and PREAUTHORISED ->
//! ARRIVING -> ON_SITE -> IN_PROGRESS -> COMPLETED (assigned provider).
//! Targets owned by another operation are refused by the guard.

use serde::Deserialize;
use sqlx::PgPool;
use tradeflow_core::error::CoreError;
use tradeflow_core::evidence::PhotoType;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::policy::authorize_status_change;
use tradeflow_core::roles::Actor;
use tradeflow_core::settlement::{TransactionKind, TransactionStatus};
use tradeflow_core::types::{DbId, Timestamp};
use tradeflow_core::visit::VisitStatus;
use tradeflow_db::models::evidence::PhotoRef;
use tradeflow_db::models::job::Job;
use tradeflow_db::repositories::{JobRepo, TransactionRepo, VisitRepo};

use super::{lock_job, record_photos};
use crate::engine::state_machine::{apply_status_change, TransitionMeta};
use crate::error::AppResult;

/// Request body for `POST /api/v1/jobs/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatus {
    pub status: String,
    pub reason: Option<String>,
    /// Before photos on arrival/start, after photos on completion.
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
}

/// Move a job along the execution spine.
///
/// Side effects by target:
/// - PREAUTHORISED: a PENDING charge for the fixed price.
/// - IN_PROGRESS: the work timer starts; visits enter IN_PROGRESS.
/// - COMPLETED: elapsed active seconds are stored; visits complete.
pub async fn change_status(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &ChangeStatus,
    now: Timestamp,
) -> AppResult<Job> {
    let to: JobStatus = input.status.parse().map_err(CoreError::Validation)?;

    let mut tx = pool.begin().await?;
    let (job, from) = lock_job(&mut *tx, job_id).await?;
    authorize_status_change(actor, &job.parties(), from, to)?;

    match to {
        JobStatus::Preauthorised => {
            TransactionRepo::insert(
                &mut *tx,
                job_id,
                TransactionKind::Charge,
                TransactionStatus::Pending,
                job.fixed_price_pence,
                None,
            )
            .await?;
        }
        JobStatus::InProgress => {
            let timer = job.timer().start(now).resume(now);
            JobRepo::update_timer(&mut *tx, job_id, &timer, false).await?;
            VisitRepo::set_status_for_job(&mut *tx, job_id, VisitStatus::InProgress).await?;
        }
        JobStatus::Completed => {
            JobRepo::set_elapsed(&mut *tx, job_id, job.timer().elapsed_secs(now)).await?;
            VisitRepo::set_status_for_job(&mut *tx, job_id, VisitStatus::Completed).await?;
        }
        _ => {}
    }

    let photo_type = if to == JobStatus::Completed {
        PhotoType::After
    } else {
        PhotoType::Before
    };
    record_photos(&mut *tx, job_id, None, photo_type, &input.photos, actor).await?;

    let job = apply_status_change(
        &mut *tx,
        job_id,
        to,
        TransitionMeta::by(actor).with_reason(input.reason.as_deref()),
    )
    .await?;
    tx.commit().await?;

    Ok(job)
}
