//! Scope mismatch: the provider finds more work on site than was locked.
//!
//! The customer (or an admin) either accepts a re-priced upgrade or sends
//! the visit back for a fresh quote.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tradeflow_core::error::CoreError;
use tradeflow_core::evidence::PhotoType;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::policy::{
    authorize_mismatch_report, authorize_mismatch_resolution, MismatchResolution,
};
use tradeflow_core::pricing::{calculate_tier_and_price, upgrade_for_mismatch, TierPrice, VisitDraft};
use tradeflow_core::roles::Actor;
use tradeflow_core::timer::JobTimer;
use tradeflow_core::types::{DbId, Timestamp};
use tradeflow_core::visit::VisitStatus;
use tradeflow_db::models::evidence::PhotoRef;
use tradeflow_db::models::job::Job;
use tradeflow_db::models::visit::Visit;
use tradeflow_db::repositories::{CatalogueRepo, JobRepo, TransactionRepo, VisitRepo};

use super::{active_visit, lock_job, record_photos};
use crate::engine::state_machine::{apply_status_change, TransitionMeta};
use crate::error::AppResult;

/// Largest single mismatch report accepted, in minutes.
const MAX_ADDITIONAL_MINUTES: i32 = 8 * 60;

/// Request body for `POST /api/v1/jobs/{id}/mismatch`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportMismatch {
    pub note: String,
    pub additional_minutes: i32,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
}

/// Report a scope mismatch on the active visit.
///
/// From ON_SITE the job enters SCOPE_MISMATCH. From IN_PROGRESS it enters
/// MISMATCH_PENDING and the work timer pauses.
pub async fn report_mismatch(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &ReportMismatch,
    now: Timestamp,
) -> AppResult<Job> {
    let note = input.note.trim();
    if note.is_empty() {
        return Err(CoreError::Validation("A mismatch note is required".into()).into());
    }
    if !(1..=MAX_ADDITIONAL_MINUTES).contains(&input.additional_minutes) {
        return Err(CoreError::Validation(format!(
            "additional_minutes must be between 1 and {MAX_ADDITIONAL_MINUTES}"
        ))
        .into());
    }

    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    let target = authorize_mismatch_report(actor, &job.parties(), status)?;
    let visit = active_visit(&mut *tx, job_id).await?;

    if target == JobStatus::MismatchPending {
        let timer = job.timer().pause(now)?;
        JobRepo::update_timer(&mut *tx, job_id, &timer, job.timer_paused_for_parts).await?;
    }
    VisitRepo::record_mismatch(&mut *tx, visit.id, note, input.additional_minutes).await?;
    record_photos(
        &mut *tx,
        job_id,
        Some(visit.id),
        PhotoType::Mismatch,
        &input.photos,
        actor,
    )
    .await?;

    let job = apply_status_change(
        &mut *tx,
        job_id,
        target,
        TransitionMeta::by(actor).with_reason(Some(note)),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        job_id,
        visit_id = visit.id,
        additional_minutes = input.additional_minutes,
        status = %target,
        "Scope mismatch reported",
    );
    Ok(job)
}

/// Request body for `POST /api/v1/jobs/{id}/mismatch/resolution`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveMismatch {
    pub resolution: String,
    pub note: Option<String>,
}

/// Outcome of a mismatch resolution.
#[derive(Debug, Serialize)]
pub struct MismatchOutcome {
    pub job: Job,
    /// The upgraded visit (UPGRADE) or its replacement draft (REBOOK).
    pub visit: Visit,
}

/// Resolve a reported mismatch.
///
/// UPGRADE re-prices the visit on its ladder at the current minutes plus
/// the reported extra, never below the locked price, updates the pending
/// charge and resumes work. REBOOK cancels the visit, queues a replacement
/// DRAFT covering the extra time, detaches the provider and leaves the job
/// REBOOK_REQUIRED for the customer to lock again.
pub async fn resolve_mismatch(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &ResolveMismatch,
    now: Timestamp,
) -> AppResult<MismatchOutcome> {
    let resolution: MismatchResolution =
        input.resolution.parse().map_err(CoreError::Validation)?;

    let mut tx = pool.begin().await?;
    let (job, status) = lock_job(&mut *tx, job_id).await?;
    authorize_mismatch_resolution(actor, &job.parties(), status, resolution)?;

    let visit = active_visit(&mut *tx, job_id).await?;
    let extra = visit
        .mismatch_extra_minutes
        .ok_or_else(|| CoreError::Validation("Active visit has no reported mismatch".into()))?;
    let ladder = CatalogueRepo::ladder_tiers(&mut *tx, &visit.ladder_code).await?;
    let meta =
        TransitionMeta::by(actor).with_reason(input.note.as_deref().or(Some(resolution.as_str())));

    let (job, visit) = match resolution {
        MismatchResolution::Upgrade => {
            let current = TierPrice {
                tier_code: visit.tier_code.clone(),
                price_pence: visit.price_pence,
            };
            let (minutes, priced) =
                upgrade_for_mismatch(visit.current_minutes(), &current, extra, &ladder)?;
            let upgraded = VisitRepo::apply_upgrade(
                &mut *tx,
                visit.id,
                minutes,
                &priced.tier_code,
                priced.price_pence,
            )
            .await?;
            let total = JobRepo::recompute_total(&mut *tx, job_id).await?;
            TransactionRepo::reprice_pending_charge(&mut *tx, job_id, total).await?;

            let timer = job.timer().start(now).resume(now);
            JobRepo::update_timer(&mut *tx, job_id, &timer, false).await?;
            VisitRepo::set_status_for_job(&mut *tx, job_id, VisitStatus::InProgress).await?;

            let job = apply_status_change(&mut *tx, job_id, JobStatus::InProgress, meta).await?;
            tracing::info!(
                job_id,
                visit_id = upgraded.id,
                from_tier = %current.tier_code,
                to_tier = %priced.tier_code,
                fixed_price_pence = total,
                "Mismatch upgrade accepted",
            );
            (job, upgraded)
        }
        MismatchResolution::Rebook => {
            let minutes = visit.current_minutes() + extra;
            let priced = calculate_tier_and_price(minutes, &ladder)?;
            let draft = VisitDraft {
                capability_tag: visit.capability_tag.clone(),
                category: visit.category.clone(),
                ladder_code: visit.ladder_code.clone(),
                primary_item_id: visit.primary_item_id,
                addon_item_ids: visit.addon_item_ids.clone(),
                base_minutes: minutes,
                tier_code: priced.tier_code,
                price_pence: priced.price_pence,
            };

            VisitRepo::set_status_for_job(&mut *tx, job_id, VisitStatus::Scheduled).await?;
            VisitRepo::set_status(&mut *tx, visit.id, VisitStatus::Cancelled).await?;
            let index = VisitRepo::next_sequence_index(&mut *tx, job_id).await?;
            let replacement = VisitRepo::insert_draft(&mut *tx, job_id, index, &draft).await?;

            JobRepo::set_provider(&mut *tx, job_id, None).await?;
            JobRepo::update_timer(&mut *tx, job_id, &JobTimer::default(), false).await?;
            TransactionRepo::void_pending_charges(&mut *tx, job_id).await?;
            let total = JobRepo::recompute_total(&mut *tx, job_id).await?;

            let job = apply_status_change(&mut *tx, job_id, JobStatus::RebookRequired, meta).await?;
            tracing::info!(
                job_id,
                cancelled_visit_id = visit.id,
                replacement_visit_id = replacement.id,
                fixed_price_pence = total,
                "Mismatch rebook requested",
            );
            (job, replacement)
        }
    };
    tx.commit().await?;

    Ok(MismatchOutcome { job, visit })
}
