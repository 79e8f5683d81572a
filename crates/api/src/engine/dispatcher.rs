//! Dispatch/offer engine.
//!
//! A job in ASSIGNING holds at most one exclusive offer at a time, recorded
//! as `(offered_to_id, offered_at)` on the job row. [`dispatch_job`] is a
//! single idempotent step: keep a live offer, otherwise move the offer to
//! the next eligible provider after the current one. The eligible list is
//! recomputed on every step, so providers going offline mid-cycle simply
//! drop out of the rotation.

use std::collections::BTreeSet;

use sqlx::PgPool;
use tradeflow_core::dispatch::{
    eligible_providers, needs_advance, plan_dispatch_step, DispatchRequirements, DispatchStep,
    ProviderCandidate,
};
use tradeflow_core::error::CoreError;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::types::{DbId, Timestamp};
use tradeflow_core::visit::VisitStatus;
use tradeflow_db::models::job::Job;
use tradeflow_db::repositories::{JobRepo, ProviderRepo, VisitRepo};

use crate::config::DispatchConfig;
use crate::error::AppResult;

/// What a job needs from a provider: capability tags of its live visits
/// and the job category.
pub async fn requirements_for(pool: &PgPool, job: &Job) -> AppResult<DispatchRequirements> {
    let mut conn = pool.acquire().await?;
    let visits = VisitRepo::list_for_job(&mut conn, job.id).await?;

    let mut capabilities = BTreeSet::new();
    for visit in &visits {
        if visit.status()? != VisitStatus::Cancelled {
            capabilities.insert(visit.capability_tag.clone());
        }
    }

    Ok(DispatchRequirements {
        capabilities,
        category: job.category.clone(),
    })
}

/// Ordered ids of providers eligible for `job`. Empty is a normal result.
pub async fn find_eligible_providers(pool: &PgPool, job: &Job) -> AppResult<Vec<DbId>> {
    let requirements = requirements_for(pool, job).await?;
    let candidates = ProviderRepo::list_available(pool)
        .await?
        .into_iter()
        .map(ProviderCandidate::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(eligible_providers(&candidates, &requirements))
}

/// Advance the offer on one job by at most one position.
///
/// Returns the provider holding the offer afterwards, or `None` when nobody
/// is eligible (the stale pointer is cleared) or the job is no longer taking
/// offers.
///
/// The offer write is conditioned on the job still being ASSIGNING and on
/// the pointer still naming the offeree this step started from, so a
/// cancellation, an acceptance or a concurrent step that lands between the
/// read and the write is never overwritten.
pub async fn dispatch_job(
    pool: &PgPool,
    job_id: DbId,
    now: Timestamp,
    config: &DispatchConfig,
) -> AppResult<Option<DbId>> {
    step(pool, job_id, now, config, None).await
}

/// Move the offer on from `provider_id`, who declined it, without waiting
/// for the window to lapse.
///
/// Nothing moves if the offer already left `provider_id`: the step that
/// moved it was the one advance this offer gets.
pub async fn advance_after_decline(
    pool: &PgPool,
    job_id: DbId,
    provider_id: DbId,
    now: Timestamp,
    config: &DispatchConfig,
) -> AppResult<Option<DbId>> {
    step(pool, job_id, now, config, Some(provider_id)).await
}

async fn step(
    pool: &PgPool,
    job_id: DbId,
    now: Timestamp,
    config: &DispatchConfig,
    declined_by: Option<DbId>,
) -> AppResult<Option<DbId>> {
    let job = JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        })?;

    if job.status()? != JobStatus::DISPATCH_ACCEPTING {
        tracing::debug!(job_id, status = %job.status()?, "Job is not taking offers");
        return Ok(None);
    }

    let timeout = config.offer_timeout();
    let current = job.offer();
    let previous = current.map(|o| o.offered_to);

    if let Some(decliner) = declined_by {
        if previous != Some(decliner) {
            tracing::debug!(job_id, decliner, ?previous, "Offer already moved past the decliner");
            return Ok(previous);
        }
    } else if !needs_advance(current, now, timeout) {
        return Ok(previous);
    }

    let eligible = find_eligible_providers(pool, &job).await?;

    match plan_dispatch_step(current, &eligible, now, timeout, declined_by.is_some()) {
        DispatchStep::Keep(provider_id) => Ok(Some(provider_id)),
        DispatchStep::Offer(provider_id) => {
            if JobRepo::write_offer(pool, job_id, previous, provider_id, now).await? {
                tracing::info!(
                    job_id,
                    provider_id,
                    ?previous,
                    eligible = eligible.len(),
                    "Offer sent",
                );
                Ok(Some(provider_id))
            } else {
                tracing::debug!(job_id, "Offer changed before this step could write it");
                let reread = JobRepo::find_by_id(pool, job_id).await?;
                Ok(reread
                    .filter(|j| j.status_id == JobStatus::DISPATCH_ACCEPTING.id())
                    .and_then(|j| j.offered_to_id))
            }
        }
        DispatchStep::Clear => {
            if JobRepo::clear_offer(pool, job_id).await? {
                tracing::info!(job_id, "No eligible providers; offer cleared");
            } else {
                tracing::debug!(job_id, "No eligible providers");
            }
            Ok(None)
        }
    }
}
