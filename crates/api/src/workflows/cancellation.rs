//! Cancellation and provider withdrawal.

use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::policy::{authorize_cancel, CancelKind};
use tradeflow_core::roles::Actor;
use tradeflow_core::settlement::{cancellation_outcome, TransactionKind, TransactionStatus};
use tradeflow_core::types::{DbId, Pence};
use tradeflow_db::models::job::Job;
use tradeflow_db::repositories::{JobRepo, TransactionRepo};

use super::lock_job;
use crate::engine::state_machine::{apply_status_change, TransitionMeta};
use crate::error::AppResult;

/// Request body for `POST /api/v1/jobs/{id}/cancel`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelJob {
    pub reason: Option<String>,
    /// Admin only: cancel free even with a provider attached.
    #[serde(default)]
    pub waive_fee: bool,
}

/// Cancel a job, or withdraw the assigned provider from it.
///
/// - Customer: free while no provider is attached, otherwise charged
///   `min(£15, price)`.
/// - Assigned provider (ASSIGNED or PREAUTHORISED): the provider is
///   detached and the job returns to WAITING_FOR_DISPATCH.
/// - Admin: from any non-terminal status, may waive the fee.
pub async fn cancel_job(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &CancelJob,
) -> AppResult<Job> {
    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    let kind = authorize_cancel(actor, &job.parties(), status)?;
    let meta = TransitionMeta::by(actor).with_reason(input.reason.as_deref());

    let updated = match kind {
        CancelKind::ProviderWithdrawal => {
            JobRepo::set_provider(&mut *tx, job_id, None).await?;
            TransactionRepo::void_pending_charges(&mut *tx, job_id).await?;
            let updated =
                apply_status_change(&mut *tx, job_id, JobStatus::WaitingForDispatch, meta).await?;
            tracing::info!(job_id, provider_id = actor.id, "Provider withdrew from job");
            updated
        }
        CancelKind::Customer | CancelKind::Admin => {
            let waive = kind == CancelKind::Admin && input.waive_fee;
            let outcome =
                cancellation_outcome(job.provider_id.is_some(), job.fixed_price_pence, waive);
            settle_cancellation(&mut *tx, &job, outcome.fee_pence).await?;
            JobRepo::set_cancellation(&mut *tx, job_id, &actor.role, input.reason.as_deref())
                .await?;
            let updated = apply_status_change(&mut *tx, job_id, outcome.status, meta).await?;
            tracing::info!(
                job_id,
                by = %actor.role,
                status = %outcome.status,
                fee_pence = outcome.fee_pence.unwrap_or(0),
                "Job cancelled",
            );
            updated
        }
    };
    tx.commit().await?;

    Ok(updated)
}

/// Void any pending charge and record the cancellation fee, if any.
pub(crate) async fn settle_cancellation(
    conn: &mut PgConnection,
    job: &Job,
    fee_pence: Option<Pence>,
) -> AppResult<()> {
    TransactionRepo::void_pending_charges(conn, job.id).await?;
    if let Some(fee) = fee_pence {
        TransactionRepo::insert(
            conn,
            job.id,
            TransactionKind::Fee,
            TransactionStatus::Completed,
            fee,
            job.provider_id,
        )
        .await?;
    }
    Ok(())
}
