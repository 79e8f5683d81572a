//! Dispatch tracker sweeps.
//!
//! Two idempotent sweeps run on a fixed interval shorter than the offer
//! window:
//!
//! - [`ensure_dispatch_progress`] advances expired offers and starts the
//!   offer sequence on ASSIGNING jobs that have none.
//! - [`activate_booked_jobs`] promotes BOOKED / WAITING_FOR_DISPATCH jobs
//!   whose visits are all locked into ASSIGNING once their dispatch window
//!   opens.
//!
//! Both are safe to call repeatedly; with nothing due they write nothing.

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tradeflow_core::dispatch::{needs_advance, should_activate};
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::types::{DbId, Timestamp};
use tradeflow_db::repositories::JobRepo;

use crate::config::DispatchConfig;
use crate::engine::dispatcher::dispatch_job;
use crate::engine::state_machine::{apply_status_change, TransitionMeta};
use crate::error::AppResult;

/// Statuses [`activate_booked_jobs`] promotes from.
const ACTIVATABLE: [JobStatus; 2] = [JobStatus::Booked, JobStatus::WaitingForDispatch];

/// Run both sweeps until `cancel` is triggered.
pub async fn run(pool: PgPool, config: DispatchConfig, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = config.sweep_interval_secs,
        offer_timeout_secs = config.offer_timeout_secs,
        "Dispatch tracker started",
    );

    let mut interval = tokio::time::interval(config.sweep_interval());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Dispatch tracker stopping");
                break;
            }
            _ = interval.tick() => {
                let now = chrono::Utc::now();
                match activate_booked_jobs(&pool, &config, now).await {
                    Ok(0) => {}
                    Ok(activated) => tracing::info!(activated, "Dispatch tracker: jobs activated"),
                    Err(e) => tracing::error!(error = %e, "Dispatch tracker: activation sweep failed"),
                }
                match ensure_dispatch_progress(&pool, &config, now).await {
                    Ok(0) => tracing::trace!("Dispatch tracker: no offers due"),
                    Ok(advanced) => tracing::debug!(advanced, "Dispatch tracker: offers advanced"),
                    Err(e) => tracing::error!(error = %e, "Dispatch tracker: progress sweep failed"),
                }
            }
        }
    }
}

/// Advance every ASSIGNING job whose offer has expired or was never made.
///
/// Returns the number of jobs a dispatch step ran for. A failure on one job
/// is logged and does not stop the sweep.
pub async fn ensure_dispatch_progress(
    pool: &PgPool,
    config: &DispatchConfig,
    now: Timestamp,
) -> AppResult<usize> {
    let jobs = JobRepo::list_by_status(pool, &[JobStatus::DISPATCH_ACCEPTING]).await?;
    let timeout = config.offer_timeout();

    let mut stepped = 0;
    for job in jobs {
        if !needs_advance(job.offer(), now, timeout) {
            continue;
        }
        match dispatch_job(pool, job.id, now, config).await {
            Ok(_) => stepped += 1,
            Err(e) => tracing::warn!(job_id = job.id, error = %e, "Dispatch step failed"),
        }
    }
    Ok(stepped)
}

/// Promote fully locked BOOKED / WAITING_FOR_DISPATCH jobs whose window is
/// open, then run one dispatch step on each.
///
/// ASAP jobs are promoted immediately; scheduled jobs once `now` is within
/// the activation lead of `scheduled_at`. Returns the number promoted.
pub async fn activate_booked_jobs(
    pool: &PgPool,
    config: &DispatchConfig,
    now: Timestamp,
) -> AppResult<usize> {
    let candidates = JobRepo::list_activation_candidates(pool).await?;
    let lead = config.activation_lead();

    let mut activated = 0;
    for job in candidates {
        if !should_activate(job.is_asap, job.scheduled_at, now, lead) {
            continue;
        }
        match activate(pool, job.id).await {
            Ok(true) => {
                activated += 1;
                if let Err(e) = dispatch_job(pool, job.id, now, config).await {
                    tracing::warn!(job_id = job.id, error = %e, "Initial dispatch step failed");
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(job_id = job.id, error = %e, "Job activation failed"),
        }
    }
    Ok(activated)
}

/// Move one job into ASSIGNING if it is still waiting. Returns `false` when
/// another request moved it first.
async fn activate(pool: &PgPool, job_id: DbId) -> AppResult<bool> {
    let mut tx = pool.begin().await?;

    let Some(job) = JobRepo::find_for_update(&mut *tx, job_id).await? else {
        return Ok(false);
    };
    if !ACTIVATABLE.contains(&job.status()?) {
        return Ok(false);
    }

    apply_status_change(
        &mut *tx,
        job_id,
        JobStatus::DISPATCH_ACCEPTING,
        TransitionMeta::system("dispatch window opened"),
    )
    .await?;
    tx.commit().await?;
    Ok(true)
}
