//! Capture, payout, reviews and close.

use sqlx::PgPool;
use tradeflow_core::error::CoreError;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::policy::{authorize_capture, authorize_close, authorize_payout, authorize_review};
use tradeflow_core::roles::{Actor, ROLE_ADMIN, ROLE_CUSTOMER};
use tradeflow_core::settlement::{split_payout, TransactionKind, TransactionStatus};
use tradeflow_core::types::DbId;
use tradeflow_db::models::job::Job;
use tradeflow_db::models::review::{Review, UpsertReview};
use tradeflow_db::repositories::{JobRepo, ReviewRepo, TransactionRepo};
use validator::Validate;

use super::{job_not_found, lock_job};
use crate::engine::state_machine::{apply_status_change, TransitionMeta};
use crate::error::AppResult;

/// Capture the customer's payment: COMPLETED -> CAPTURED.
///
/// Completes the pending charge, or records a completed one when the job
/// never passed through pre-authorisation.
pub async fn capture(pool: &PgPool, actor: &Actor, job_id: DbId) -> AppResult<Job> {
    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    authorize_capture(actor, status)?;

    if !TransactionRepo::complete_pending_charge(&mut *tx, job_id).await? {
        TransactionRepo::insert(
            &mut *tx,
            job_id,
            TransactionKind::Charge,
            TransactionStatus::Completed,
            job.fixed_price_pence,
            None,
        )
        .await?;
    }
    let job = apply_status_change(
        &mut *tx,
        job_id,
        JobStatus::Captured,
        TransitionMeta::by(actor).with_reason(Some("payment captured")),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(job_id, amount_pence = job.fixed_price_pence, "Payment captured");
    Ok(job)
}

/// Pay the provider: CAPTURED -> PAID_OUT.
///
/// Writes a PAYOUT for the price less the platform fee and a FEE row for
/// the remainder. Refused while a customer issue has frozen the payout.
pub async fn payout(pool: &PgPool, actor: &Actor, job_id: DbId) -> AppResult<Job> {
    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    authorize_payout(actor, status, job.payout_frozen)?;
    let provider_id = job
        .provider_id
        .ok_or_else(|| CoreError::Validation("Job has no provider to pay".into()))?;

    let (payout_pence, fee_pence) = split_payout(job.fixed_price_pence);
    TransactionRepo::insert(
        &mut *tx,
        job_id,
        TransactionKind::Payout,
        TransactionStatus::Completed,
        payout_pence,
        Some(provider_id),
    )
    .await?;
    TransactionRepo::insert(
        &mut *tx,
        job_id,
        TransactionKind::Fee,
        TransactionStatus::Completed,
        fee_pence,
        None,
    )
    .await?;
    let job = apply_status_change(
        &mut *tx,
        job_id,
        JobStatus::PaidOut,
        TransitionMeta::by(actor).with_reason(Some("provider paid")),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(job_id, provider_id, payout_pence, fee_pence, "Provider paid out");
    Ok(job)
}

/// Close a paid-out job once both the customer and an admin have reviewed.
pub async fn close(pool: &PgPool, actor: &Actor, job_id: DbId) -> AppResult<Job> {
    let mut tx = pool.begin().await?;
    let (_, status) = lock_job(&mut *tx, job_id).await?;
    let roles = ReviewRepo::author_roles(&mut *tx, job_id).await?;
    authorize_close(
        actor,
        status,
        roles.iter().any(|r| r == ROLE_CUSTOMER),
        roles.iter().any(|r| r == ROLE_ADMIN),
    )?;

    let job = apply_status_change(&mut *tx, job_id, JobStatus::Closed, TransitionMeta::by(actor))
        .await?;
    tx.commit().await?;
    Ok(job)
}

/// Insert or replace the caller's review of a job.
pub async fn upsert_review(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &UpsertReview,
) -> AppResult<Review> {
    input.validate()?;
    let job = JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or_else(|| job_not_found(job_id))?;
    let role = authorize_review(actor, &job.parties(), job.status()?)?;

    let review = ReviewRepo::upsert(
        pool,
        job_id,
        role,
        actor.id,
        input.rating,
        input.comment.as_deref(),
    )
    .await?;
    tracing::debug!(job_id, author_role = role, rating = input.rating, "Review saved");
    Ok(review)
}
