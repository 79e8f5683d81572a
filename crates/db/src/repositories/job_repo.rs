//! Repository for the `jobs` table.
//!
//! Status is only written through [`JobRepo::set_status`] (called by the
//! state machine executor) and the conditional [`JobRepo::claim`]; every
//! other method touches status-linked columns only.

use sqlx::{PgConnection, PgPool};
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::timer::JobTimer;
use tradeflow_core::types::{DbId, Pence, Timestamp};

use crate::models::job::{Job, NewJob};
use crate::models::status;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, status_id, customer_id, provider_id, category, description, location, \
    fixed_price_pence, is_asap, scheduled_at, offered_to_id, offered_at, \
    timer_started_at, timer_paused_at, timer_paused_total_secs, timer_paused_for_parts, \
    elapsed_secs, issue_raised_by, issue_note, payout_frozen, timer_frozen_for_issue, \
    flag_reason, flag_note, flagged_by, flagged_at, \
    cancelled_by_role, cancellation_reason, cancelled_at, \
    status_updated_at, created_at, updated_at";

/// Provides persistence for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new REQUESTED job.
    pub async fn insert(conn: &mut PgConnection, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs \
                 (status_id, customer_id, category, description, location, is_asap, scheduled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Requested.id())
            .bind(input.customer_id)
            .bind(&input.category)
            .bind(&input.description)
            .bind(&input.location)
            .bind(input.is_asap)
            .bind(input.scheduled_at)
            .fetch_one(conn)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Read a job and lock its row for the rest of the transaction.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Write a new status and stamp `status_updated_at`.
    ///
    /// Legality is the caller's concern; use the state machine executor.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: DbId,
        to: JobStatus,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET status_id = $2, status_updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(to.id())
            .fetch_one(conn)
            .await
    }

    /// Atomically attach `provider_id` to an open job.
    ///
    /// Succeeds only while the job is still taking offers and has no
    /// provider. Returns `false` when another caller got there first.
    pub async fn claim(
        conn: &mut PgConnection,
        id: DbId,
        provider_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET provider_id = $2, status_id = $3, status_updated_at = NOW(), \
                 offered_to_id = NULL, offered_at = NULL \
             WHERE id = $1 AND status_id = $4 AND provider_id IS NULL",
        )
        .bind(id)
        .bind(provider_id)
        .bind(JobStatus::Assigned.id())
        .bind(JobStatus::DISPATCH_ACCEPTING.id())
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Move the exclusive offer from `previous` to `provider_id`.
    ///
    /// Written only while the job is still taking offers and the pointer
    /// still names `previous`, so two steps planned from the same read
    /// advance it once. Returns `false` if either condition failed.
    pub async fn write_offer(
        pool: &PgPool,
        id: DbId,
        previous: Option<DbId>,
        provider_id: DbId,
        offered_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET offered_to_id = $2, offered_at = $3 \
             WHERE id = $1 AND status_id = $4 AND offered_to_id IS NOT DISTINCT FROM $5",
        )
        .bind(id)
        .bind(provider_id)
        .bind(offered_at)
        .bind(JobStatus::DISPATCH_ACCEPTING.id())
        .bind(previous)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Clear the offer pointer, only while the job is still taking offers.
    pub async fn clear_offer(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET offered_to_id = NULL, offered_at = NULL \
             WHERE id = $1 AND status_id = $2 AND offered_to_id IS NOT NULL",
        )
        .bind(id)
        .bind(JobStatus::DISPATCH_ACCEPTING.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Replace the assigned provider and drop any offer pointer.
    pub async fn set_provider(
        conn: &mut PgConnection,
        id: DbId,
        provider_id: Option<DbId>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs SET provider_id = $2, offered_to_id = NULL, offered_at = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(provider_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Overwrite the job's fixed price with the sum of its live visits.
    pub async fn recompute_total(conn: &mut PgConnection, id: DbId) -> Result<Pence, sqlx::Error> {
        let row: (Pence,) = sqlx::query_as(
            "UPDATE jobs SET fixed_price_pence = ( \
                 SELECT COALESCE(SUM(price_pence), 0)::BIGINT FROM visits \
                 WHERE job_id = $1 AND status <> 'CANCELLED' \
             ) \
             WHERE id = $1 \
             RETURNING fixed_price_pence",
        )
        .bind(id)
        .fetch_one(conn)
        .await?;
        Ok(row.0)
    }

    /// Persist the work timer columns.
    pub async fn update_timer(
        conn: &mut PgConnection,
        id: DbId,
        timer: &JobTimer,
        paused_for_parts: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET timer_started_at = $2, timer_paused_at = $3, \
                 timer_paused_total_secs = $4, timer_paused_for_parts = $5 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(timer.started_at)
        .bind(timer.paused_at)
        .bind(timer.paused_total_secs)
        .bind(paused_for_parts)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Record active work seconds on completion.
    pub async fn set_elapsed(
        conn: &mut PgConnection,
        id: DbId,
        elapsed_secs: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET elapsed_secs = $2 WHERE id = $1")
            .bind(id)
            .bind(elapsed_secs)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Record who raised a dispute and set its freezes.
    pub async fn set_issue(
        conn: &mut PgConnection,
        id: DbId,
        raised_by: &str,
        note: Option<&str>,
        payout_frozen: bool,
        timer_frozen: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET issue_raised_by = $2, issue_note = $3, \
                 payout_frozen = payout_frozen OR $4, \
                 timer_frozen_for_issue = timer_frozen_for_issue OR $5 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(raised_by)
        .bind(note)
        .bind(payout_frozen)
        .bind(timer_frozen)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Lift dispute freezes after an administrator resolution.
    pub async fn clear_issue_freezes(conn: &mut PgConnection, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs SET payout_frozen = false, timer_frozen_for_issue = false WHERE id = $1",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Record flag metadata.
    pub async fn set_flag(
        conn: &mut PgConnection,
        id: DbId,
        reason: &str,
        note: Option<&str>,
        flagged_by: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET flag_reason = $2, flag_note = $3, flagged_by = $4, flagged_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(reason)
        .bind(note)
        .bind(flagged_by)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Clear flag metadata when a flag is resolved.
    pub async fn clear_flag(conn: &mut PgConnection, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET flag_reason = NULL, flag_note = NULL, flagged_by = NULL, flagged_at = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Record who cancelled and why.
    pub async fn set_cancellation(
        conn: &mut PgConnection,
        id: DbId,
        role: &str,
        reason: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET cancelled_by_role = $2, cancellation_reason = $3, cancelled_at = NOW(), \
                 offered_to_id = NULL, offered_at = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(role)
        .bind(reason)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// All jobs currently in one of `statuses`, oldest status change first.
    pub async fn list_by_status(
        pool: &PgPool,
        statuses: &[JobStatus],
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id = ANY($1) \
             ORDER BY status_updated_at ASC, id ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(status::ids(statuses))
            .fetch_all(pool)
            .await
    }

    /// Booked or waiting jobs whose visits are all locked.
    ///
    /// Jobs with no live visit are excluded.
    pub async fn list_activation_candidates(pool: &PgPool) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs j \
             WHERE j.status_id = ANY($1) \
               AND EXISTS ( \
                   SELECT 1 FROM visits v WHERE v.job_id = j.id AND v.status <> 'CANCELLED' \
               ) \
               AND NOT EXISTS ( \
                   SELECT 1 FROM visits v WHERE v.job_id = j.id AND v.status = 'DRAFT' \
               ) \
             ORDER BY j.id ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(status::ids(&[JobStatus::Booked, JobStatus::WaitingForDispatch]))
            .fetch_all(pool)
            .await
    }
}
