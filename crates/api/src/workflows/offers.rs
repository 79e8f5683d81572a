//! Provider responses to an offer.

use sqlx::PgPool;
use tradeflow_core::dispatch::offer_is_live;
use tradeflow_core::error::CoreError;
use tradeflow_core::policy::{authorize_accept, authorize_decline};
use tradeflow_core::roles::Actor;
use tradeflow_core::types::{DbId, Timestamp};
use tradeflow_db::models::job::Job;
use tradeflow_db::repositories::{JobRepo, ProviderRepo};

use super::{job_not_found, reload};
use crate::config::DispatchConfig;
use crate::engine::dispatcher::{advance_after_decline, find_eligible_providers};
use crate::engine::state_machine::{claim_for_provider, TransitionMeta};
use crate::error::AppResult;

/// Accept a job that is taking offers.
///
/// The job row is read without a lock; the conditional claim decides
/// between concurrent callers. Losers get `Conflict`, never a retryable
/// error.
pub async fn accept_job(
    pool: &PgPool,
    config: &DispatchConfig,
    actor: &Actor,
    job_id: DbId,
    now: Timestamp,
) -> AppResult<Job> {
    let job = JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or_else(|| job_not_found(job_id))?;
    let provider = ProviderRepo::find_by_id(pool, actor.id)
        .await?
        .ok_or_else(|| CoreError::Forbidden("Caller is not a registered provider".into()))?;

    let offer_live = job
        .offer()
        .is_some_and(|o| offer_is_live(o.offered_at, now, config.offer_timeout()));
    let parties = job.parties();
    authorize_accept(actor, job.status()?, &parties, provider.is_active, offer_live)?;

    // Without a live offer of their own, the caller must be someone the
    // dispatcher could have offered the job to right now.
    if !(offer_live && parties.is_offeree(actor))
        && !find_eligible_providers(pool, &job).await?.contains(&actor.id)
    {
        return Err(CoreError::Forbidden(
            "Provider is not eligible for this job".into(),
        )
        .into());
    }

    let mut tx = pool.begin().await?;
    let claimed = claim_for_provider(
        &mut *tx,
        job_id,
        actor.id,
        TransitionMeta::by(actor).with_reason(Some("offer accepted")),
    )
    .await?;
    if !claimed {
        return Err(CoreError::Conflict("Job has already been taken".into()).into());
    }
    tx.commit().await?;

    reload(pool, job_id).await
}

/// Decline the offer the caller holds and move it on immediately.
///
/// The advance is conditioned on the caller still holding the offer, so a
/// tracker sweep that moved it in the meantime is not followed by a second
/// move. Returns the provider now holding the offer, if any.
pub async fn decline_job(
    pool: &PgPool,
    config: &DispatchConfig,
    actor: &Actor,
    job_id: DbId,
    now: Timestamp,
) -> AppResult<Option<DbId>> {
    let job = JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or_else(|| job_not_found(job_id))?;
    authorize_decline(actor, job.status()?, &job.parties())?;

    tracing::info!(job_id, provider_id = actor.id, "Offer declined");
    advance_after_decline(pool, job_id, actor.id, now, config).await
}
