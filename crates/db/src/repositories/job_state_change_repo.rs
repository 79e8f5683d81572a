//! Repository for the append-only `job_state_changes` audit trail.

use sqlx::{PgConnection, PgPool};
use tradeflow_core::types::DbId;

use crate::models::job_state_change::{JobStateChange, NewJobStateChange};

/// Column list for `job_state_changes` queries.
const COLUMNS: &str = "\
    id, job_id, from_status_id, to_status_id, reason, actor_id, actor_role, created_at";

/// Provides append and read for audit rows.
pub struct JobStateChangeRepo;

impl JobStateChangeRepo {
    pub async fn insert(
        conn: &mut PgConnection,
        input: &NewJobStateChange<'_>,
    ) -> Result<JobStateChange, sqlx::Error> {
        let query = format!(
            "INSERT INTO job_state_changes \
                 (job_id, from_status_id, to_status_id, reason, actor_id, actor_role) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobStateChange>(&query)
            .bind(input.job_id)
            .bind(input.from_status_id)
            .bind(input.to_status_id)
            .bind(input.reason)
            .bind(input.actor_id)
            .bind(input.actor_role)
            .fetch_one(conn)
            .await
    }

    /// Full trail for a job, oldest first.
    pub async fn list_for_job(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Vec<JobStateChange>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM job_state_changes WHERE job_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, JobStateChange>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_job(pool: &PgPool, job_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM job_state_changes WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}
