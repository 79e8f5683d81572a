//! Quoting and scope lock.
//!
//! `create_job` turns catalogue item ids into DRAFT visits and a PRICED
//! job. `lock_scope` finalizes one visit exactly once; the lock that
//! leaves no DRAFT visit behind moves the job on to dispatch.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tradeflow_core::dispatch::should_activate;
use tradeflow_core::error::CoreError;
use tradeflow_core::evidence::PhotoType;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::policy::authorize_scope_lock;
use tradeflow_core::pricing::{build_visits, compute_scope_lock, ScopeAnswers, ScopeLockInput};
use tradeflow_core::roles::Actor;
use tradeflow_core::types::{DbId, Pence, Timestamp};
use tradeflow_core::visit::VisitStatus;
use tradeflow_db::models::evidence::PhotoRef;
use tradeflow_db::models::job::{CreateJob, Job, NewJob};
use tradeflow_db::models::scope_summary::{NewScopeSummary, ScopeSummary};
use tradeflow_db::models::visit::Visit;
use tradeflow_db::repositories::{CatalogueRepo, JobRepo, ScopeSummaryRepo, VisitRepo};
use validator::Validate;

use super::{lock_job, record_photos, reload};
use crate::config::DispatchConfig;
use crate::engine::dispatcher::dispatch_job;
use crate::engine::state_machine::{apply_status_change, record_creation, TransitionMeta};
use crate::error::AppResult;

// ---------------------------------------------------------------------------
// Create job
// ---------------------------------------------------------------------------

/// A freshly priced job and its draft visits.
#[derive(Debug, Serialize)]
pub struct JobQuote {
    pub job: Job,
    pub visits: Vec<Visit>,
}

/// Create a job from parsed catalogue items and quote it.
///
/// Inserts the job REQUESTED, persists one DRAFT visit per capability
/// group, writes the total and moves the job to PRICED, all in one
/// transaction. Non-ASAP requests need a `scheduled_at` in the future.
pub async fn create_job(
    pool: &PgPool,
    actor: &Actor,
    input: &CreateJob,
    now: Timestamp,
) -> AppResult<JobQuote> {
    input.validate()?;
    let scheduled_at = if input.is_asap {
        None
    } else {
        match input.scheduled_at {
            Some(at) if at > now => Some(at),
            Some(_) => {
                return Err(CoreError::Validation("scheduled_at must be in the future".into()).into())
            }
            None => {
                return Err(CoreError::Validation(
                    "scheduled_at is required unless is_asap is set".into(),
                )
                .into())
            }
        }
    };

    let mut tx = pool.begin().await?;

    let items = CatalogueRepo::find_items(&mut *tx, &input.item_ids).await?;
    let ladder_codes: Vec<String> = items
        .iter()
        .map(|i| i.ladder_code.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let ladders = CatalogueRepo::ladders(&mut *tx, &ladder_codes).await?;
    let drafts = build_visits(&items, &ladders)?;

    let job = JobRepo::insert(
        &mut *tx,
        &NewJob {
            customer_id: actor.id,
            category: drafts[0].category.clone(),
            description: input.description.trim().to_string(),
            location: input.location.trim().to_string(),
            is_asap: input.is_asap,
            scheduled_at,
        },
    )
    .await?;
    record_creation(&mut *tx, &job, TransitionMeta::by(actor)).await?;

    let mut visits = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.iter().enumerate() {
        visits.push(VisitRepo::insert_draft(&mut *tx, job.id, index as i32, draft).await?);
    }
    let total = JobRepo::recompute_total(&mut *tx, job.id).await?;

    let job = apply_status_change(
        &mut *tx,
        job.id,
        JobStatus::Priced,
        TransitionMeta::by(actor).with_reason(Some("quoted")),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        job_id = job.id,
        customer_id = actor.id,
        visits = visits.len(),
        total_pence = total,
        "Job created and priced",
    );

    Ok(JobQuote { job, visits })
}

// ---------------------------------------------------------------------------
// Lock scope
// ---------------------------------------------------------------------------

/// Request body for `POST /api/v1/visits/{id}/lock`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LockScope {
    #[serde(default)]
    pub answers: ScopeAnswers,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
}

/// Result of a scope lock.
#[derive(Debug, Serialize)]
pub struct ScopeLockResult {
    pub visit: Visit,
    pub summary: ScopeSummary,
    /// Sum of the job's live visit prices after this lock.
    pub fixed_price_pence: Pence,
    /// Whether this lock left no DRAFT visit on the job.
    pub job_locked: bool,
    pub job: Job,
    /// Provider offered the job by the dispatch step this lock triggered.
    pub offered_to: Option<DbId>,
}

/// Lock one visit's scope: answers, photos, tier and price.
///
/// Fails with `Conflict` if the visit is no longer DRAFT. The lock that
/// leaves no DRAFT visit on the job moves it to ASSIGNING (ASAP, or
/// scheduled within the activation lead) and runs one dispatch step, or
/// to BOOKED to wait for its window.
pub async fn lock_scope(
    pool: &PgPool,
    config: &DispatchConfig,
    actor: &Actor,
    visit_id: DbId,
    input: &LockScope,
    now: Timestamp,
) -> AppResult<ScopeLockResult> {
    let visit = VisitRepo::find_by_id(pool, visit_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Visit",
            id: visit_id,
        })?;

    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, visit.job_id).await?;
    authorize_scope_lock(actor, &job.parties(), status)?;

    let visit = VisitRepo::find_for_update(&mut *tx, visit_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Visit",
            id: visit_id,
        })?;
    if visit.status()? != VisitStatus::Draft {
        return Err(CoreError::Conflict("Visit scope is already locked".into()).into());
    }

    let items = CatalogueRepo::find_items(&mut *tx, &visit.item_ids()).await?;
    let ladder = CatalogueRepo::ladder_tiers(&mut *tx, &visit.ladder_code).await?;
    let outcome = compute_scope_lock(&ScopeLockInput {
        category: &visit.category,
        base_minutes: visit.base_minutes,
        items: &items,
        ladder: &ladder,
        answers: &input.answers,
    })?;

    let locked = VisitRepo::lock(
        &mut *tx,
        visit_id,
        outcome.effective_minutes,
        &outcome.tier_code,
        outcome.price_pence,
    )
    .await?
    .ok_or_else(|| CoreError::Conflict("Visit scope is already locked".into()))?;

    let answers = serde_json::to_value(&input.answers)
        .map_err(|e| CoreError::Internal(format!("Failed to encode answers: {e}")))?;
    let summary = ScopeSummaryRepo::insert(
        &mut *tx,
        &NewScopeSummary {
            visit_id,
            job_id: job.id,
            answers,
            contract_text: outcome.contract_text.clone(),
            tier_code: outcome.tier_code.clone(),
            effective_minutes: outcome.effective_minutes,
            price_pence: outcome.price_pence,
            forced_top_tier: outcome.forced_top_tier,
        },
    )
    .await?;
    record_photos(
        &mut *tx,
        job.id,
        Some(visit_id),
        PhotoType::Scope,
        &input.photos,
        actor,
    )
    .await?;

    let fixed_price_pence = JobRepo::recompute_total(&mut *tx, job.id).await?;
    let job_locked = VisitRepo::count_drafts(&mut *tx, job.id).await? == 0;

    let mut activated = false;
    if job_locked {
        let meta = TransitionMeta::by(actor).with_reason(Some("all visits locked"));
        if status == JobStatus::RebookRequired {
            apply_status_change(&mut *tx, job.id, JobStatus::Priced, meta).await?;
        }
        activated = should_activate(job.is_asap, job.scheduled_at, now, config.activation_lead());
        let next = if activated {
            JobStatus::DISPATCH_ACCEPTING
        } else {
            JobStatus::Booked
        };
        apply_status_change(&mut *tx, job.id, next, meta).await?;
    }
    tx.commit().await?;

    tracing::info!(
        job_id = job.id,
        visit_id,
        tier = %outcome.tier_code,
        effective_minutes = outcome.effective_minutes,
        price_pence = outcome.price_pence,
        forced_top_tier = outcome.forced_top_tier,
        job_locked,
        "Visit scope locked",
    );

    let offered_to = if activated {
        match dispatch_job(pool, job.id, now, config).await {
            Ok(offered) => offered,
            Err(e) => {
                // The tracker picks the job up on its next sweep.
                tracing::warn!(job_id = job.id, error = %e, "Initial dispatch step failed");
                None
            }
        }
    } else {
        None
    };

    Ok(ScopeLockResult {
        visit: locked,
        summary,
        fixed_price_pence,
        job_locked,
        job: reload(pool, job.id).await?,
        offered_to,
    })
}
