//! Administrator controls: direct assignment, overrides, dispatch-now, the
//! stuck-job report and the full audit trail.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tradeflow_core::error::CoreError;
use tradeflow_core::evidence::signed_read_url;
use tradeflow_core::job_status::{is_stuck, stuck_threshold, JobStatus};
use tradeflow_core::policy::{authorize_dispatch_now, authorize_override, authorize_reassign};
use tradeflow_core::roles::Actor;
use tradeflow_core::types::{DbId, Timestamp};
use tradeflow_db::models::evidence::EvidencePhoto;
use tradeflow_db::models::job::Job;
use tradeflow_db::models::job_state_change::JobStateChange;
use tradeflow_db::models::review::Review;
use tradeflow_db::models::scope_summary::ScopeSummary;
use tradeflow_db::models::status;
use tradeflow_db::models::transaction::Transaction;
use tradeflow_db::models::visit::Visit;
use tradeflow_db::repositories::{
    EvidenceRepo, JobRepo, JobStateChangeRepo, ProviderRepo, ReviewRepo, ScopeSummaryRepo,
    TransactionRepo, VisitRepo,
};

use super::{job_not_found, lock_job, reload};
use crate::config::{DispatchConfig, EvidenceConfig};
use crate::engine::dispatcher::dispatch_job;
use crate::engine::state_machine::{apply_status_change, TransitionMeta};
use crate::error::AppResult;

// ---------------------------------------------------------------------------
// Reassign
// ---------------------------------------------------------------------------

/// Request body for `POST /api/v1/admin/jobs/{id}/reassign`.
#[derive(Debug, Clone, Deserialize)]
pub struct Reassign {
    pub provider_id: DbId,
    pub reason: Option<String>,
}

/// Attach a provider directly, bypassing the offer cursor.
pub async fn reassign(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &Reassign,
) -> AppResult<Job> {
    let mut tx = pool.begin().await?;
    let (_, status) = lock_job(&mut *tx, job_id).await?;
    let provider = ProviderRepo::find_in(&mut *tx, input.provider_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Provider",
            id: input.provider_id,
        })?;
    authorize_reassign(actor, status, provider.is_active)?;

    JobRepo::set_provider(&mut *tx, job_id, Some(provider.id)).await?;
    let job = apply_status_change(
        &mut *tx,
        job_id,
        JobStatus::Assigned,
        TransitionMeta::by(actor).with_reason(input.reason.as_deref().or(Some("reassigned"))),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(job_id, provider_id = provider.id, "Job reassigned by admin");
    Ok(job)
}

// ---------------------------------------------------------------------------
// Override
// ---------------------------------------------------------------------------

/// Request body for `POST /api/v1/admin/jobs/{id}/override`.
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideStatus {
    pub status: String,
    pub reason: String,
}

/// Force any structurally legal transition. No side effects beyond the
/// status and its audit row.
pub async fn override_status(
    pool: &PgPool,
    actor: &Actor,
    job_id: DbId,
    input: &OverrideStatus,
) -> AppResult<Job> {
    let to: JobStatus = input.status.parse().map_err(CoreError::Validation)?;
    let reason = input.reason.trim();

    let mut tx = pool.begin().await?;
    let (_, from) = lock_job(&mut *tx, job_id).await?;
    authorize_override(actor, from, to, Some(reason))?;

    let job = apply_status_change(
        &mut *tx,
        job_id,
        to,
        TransitionMeta::by(actor).with_reason(Some(reason)),
    )
    .await?;
    tx.commit().await?;

    tracing::warn!(job_id, from = %from, to = %to, reason, "Status overridden by admin");
    Ok(job)
}

// ---------------------------------------------------------------------------
// Dispatch now
// ---------------------------------------------------------------------------

/// Result of dispatch-now.
#[derive(Debug, Serialize)]
pub struct DispatchNow {
    pub job: Job,
    pub offered_to: Option<DbId>,
}

/// Promote a fully locked job to ASSIGNING and run one dispatch step.
pub async fn dispatch_now(
    pool: &PgPool,
    config: &DispatchConfig,
    actor: &Actor,
    job_id: DbId,
    now: Timestamp,
) -> AppResult<DispatchNow> {
    let mut tx = pool.begin().await?;
    let (_, status) = lock_job(&mut *tx, job_id).await?;
    let drafts = VisitRepo::count_drafts(&mut *tx, job_id).await?;
    authorize_dispatch_now(actor, status, drafts)?;

    if status != JobStatus::DISPATCH_ACCEPTING {
        apply_status_change(
            &mut *tx,
            job_id,
            JobStatus::DISPATCH_ACCEPTING,
            TransitionMeta::by(actor).with_reason(Some("dispatch now")),
        )
        .await?;
    }
    tx.commit().await?;

    let offered_to = dispatch_job(pool, job_id, now, config).await?;
    Ok(DispatchNow {
        job: reload(pool, job_id).await?,
        offered_to,
    })
}

// ---------------------------------------------------------------------------
// Stuck jobs
// ---------------------------------------------------------------------------

/// One entry in the stuck-job report.
#[derive(Debug, Serialize)]
pub struct StuckJob {
    pub job_id: DbId,
    pub status: JobStatus,
    pub status_updated_at: Timestamp,
    pub age_minutes: i64,
    pub threshold_minutes: i64,
}

/// Jobs sitting in a monitored status longer than its threshold, oldest
/// first. BOOKED jobs whose window is still in the future are expected to
/// wait and are left out.
pub async fn stuck_jobs(pool: &PgPool, now: Timestamp) -> AppResult<Vec<StuckJob>> {
    let monitored: Vec<JobStatus> = JobStatus::ALL
        .into_iter()
        .filter(|s| stuck_threshold(*s).is_some())
        .collect();

    let mut report = Vec::new();
    for job in JobRepo::list_by_status(pool, &monitored).await? {
        let status = job.status()?;
        if status == JobStatus::Booked && job.scheduled_at.is_some_and(|at| at > now) {
            continue;
        }
        if !is_stuck(status, job.status_updated_at, now) {
            continue;
        }
        let threshold = stuck_threshold(status).map_or(0, |t| t.num_minutes());
        report.push(StuckJob {
            job_id: job.id,
            status,
            status_updated_at: job.status_updated_at,
            age_minutes: (now - job.status_updated_at).num_minutes(),
            threshold_minutes: threshold,
        });
    }
    report.sort_by_key(|s| s.status_updated_at);
    Ok(report)
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

/// One decoded status transition.
#[derive(Debug, Serialize)]
pub struct AuditEntry {
    pub id: DbId,
    pub from_status: Option<JobStatus>,
    pub to_status: JobStatus,
    pub reason: Option<String>,
    pub actor_id: Option<DbId>,
    pub actor_role: String,
    pub created_at: Timestamp,
}

impl TryFrom<JobStateChange> for AuditEntry {
    type Error = CoreError;

    fn try_from(row: JobStateChange) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: row.id,
            from_status: row.from_status_id.map(status::decode).transpose()?,
            to_status: status::decode(row.to_status_id)?,
            reason: row.reason,
            actor_id: row.actor_id,
            actor_role: row.actor_role,
            created_at: row.created_at,
        })
    }
}

/// An evidence photo with a time-limited read URL.
#[derive(Debug, Serialize)]
pub struct SignedEvidence {
    #[serde(flatten)]
    pub photo: EvidencePhoto,
    pub url: String,
    pub url_expires_at: Timestamp,
}

/// Everything recorded against a job.
#[derive(Debug, Serialize)]
pub struct JobAudit {
    pub job: Job,
    pub visits: Vec<Visit>,
    pub state_changes: Vec<AuditEntry>,
    pub scope_summaries: Vec<ScopeSummary>,
    pub transactions: Vec<Transaction>,
    pub reviews: Vec<Review>,
    pub evidence: Vec<SignedEvidence>,
}

/// Load the full audit trail of a job. Evidence URLs expire after the
/// configured TTL.
pub async fn audit(
    pool: &PgPool,
    evidence_config: &EvidenceConfig,
    job_id: DbId,
    now: Timestamp,
) -> AppResult<JobAudit> {
    let job = JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or_else(|| job_not_found(job_id))?;

    let mut conn = pool.acquire().await?;
    let visits = VisitRepo::list_for_job(&mut conn, job_id).await?;
    let scope_summaries = ScopeSummaryRepo::list_for_job(&mut conn, job_id).await?;
    drop(conn);

    let state_changes = JobStateChangeRepo::list_for_job(pool, job_id)
        .await?
        .into_iter()
        .map(AuditEntry::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let transactions = TransactionRepo::list_for_job(pool, job_id).await?;
    let reviews = ReviewRepo::list_for_job(pool, job_id).await?;

    let url_expires_at = now + evidence_config.url_ttl();
    let evidence = EvidenceRepo::list_for_job(pool, job_id)
        .await?
        .into_iter()
        .map(|photo| SignedEvidence {
            url: signed_read_url(
                &evidence_config.base_url,
                &evidence_config.signing_secret,
                &photo.storage_key,
                url_expires_at,
            ),
            url_expires_at,
            photo,
        })
        .collect();

    Ok(JobAudit {
        job,
        visits,
        state_changes,
        scope_summaries,
        transactions,
        reviews,
        evidence,
    })
}
