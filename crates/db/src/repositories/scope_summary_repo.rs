//! Repository for the write-once `scope_summaries` table.

use sqlx::{PgConnection, PgPool};
use tradeflow_core::types::DbId;

use crate::models::scope_summary::{NewScopeSummary, ScopeSummary};

/// Column list for `scope_summaries` queries.
const COLUMNS: &str = "\
    id, visit_id, job_id, answers, contract_text, tier_code, \
    effective_minutes, price_pence, forced_top_tier, created_at";

/// Provides insert and lookup for scope summaries. There is no update.
pub struct ScopeSummaryRepo;

impl ScopeSummaryRepo {
    /// Insert the summary for a visit. A second insert for the same visit
    /// fails on `uq_scope_summaries_visit`.
    pub async fn insert(
        conn: &mut PgConnection,
        input: &NewScopeSummary,
    ) -> Result<ScopeSummary, sqlx::Error> {
        let query = format!(
            "INSERT INTO scope_summaries \
                 (visit_id, job_id, answers, contract_text, tier_code, \
                  effective_minutes, price_pence, forced_top_tier) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScopeSummary>(&query)
            .bind(input.visit_id)
            .bind(input.job_id)
            .bind(&input.answers)
            .bind(&input.contract_text)
            .bind(&input.tier_code)
            .bind(input.effective_minutes)
            .bind(input.price_pence)
            .bind(input.forced_top_tier)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_visit(
        pool: &PgPool,
        visit_id: DbId,
    ) -> Result<Option<ScopeSummary>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scope_summaries WHERE visit_id = $1");
        sqlx::query_as::<_, ScopeSummary>(&query)
            .bind(visit_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_job(
        conn: &mut PgConnection,
        job_id: DbId,
    ) -> Result<Vec<ScopeSummary>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scope_summaries WHERE job_id = $1 ORDER BY visit_id ASC"
        );
        sqlx::query_as::<_, ScopeSummary>(&query)
            .bind(job_id)
            .fetch_all(conn)
            .await
    }
}
