//! Repository for the `visits` table.

use sqlx::{PgConnection, PgPool};
use tradeflow_core::pricing::VisitDraft;
use tradeflow_core::types::{DbId, Pence};
use tradeflow_core::visit::{PartsStatus, VisitStatus};

use crate::models::visit::Visit;

/// Column list for `visits` queries.
const COLUMNS: &str = "\
    id, job_id, sequence_index, capability_tag, category, ladder_code, \
    primary_item_id, addon_item_ids, base_minutes, effective_minutes, \
    tier_code, price_pence, status, parts_status, parts_note, parts_cost_pence, \
    mismatch_note, mismatch_extra_minutes, locked_at, created_at, updated_at";

/// Provides persistence for visits.
pub struct VisitRepo;

impl VisitRepo {
    /// Insert a DRAFT visit built by the pricing engine.
    pub async fn insert_draft(
        conn: &mut PgConnection,
        job_id: DbId,
        sequence_index: i32,
        draft: &VisitDraft,
    ) -> Result<Visit, sqlx::Error> {
        let query = format!(
            "INSERT INTO visits \
                 (job_id, sequence_index, capability_tag, category, ladder_code, \
                  primary_item_id, addon_item_ids, base_minutes, tier_code, price_pence, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Visit>(&query)
            .bind(job_id)
            .bind(sequence_index)
            .bind(&draft.capability_tag)
            .bind(&draft.category)
            .bind(&draft.ladder_code)
            .bind(draft.primary_item_id)
            .bind(&draft.addon_item_ids)
            .bind(draft.base_minutes)
            .bind(&draft.tier_code)
            .bind(draft.price_pence)
            .bind(VisitStatus::Draft.as_str())
            .fetch_one(conn)
            .await
    }

    /// Find a visit by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Visit>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM visits WHERE id = $1");
        sqlx::query_as::<_, Visit>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Read a visit and lock its row for the rest of the transaction.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Visit>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM visits WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Visit>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// All visits of a job in sequence order.
    pub async fn list_for_job(
        conn: &mut PgConnection,
        job_id: DbId,
    ) -> Result<Vec<Visit>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM visits WHERE job_id = $1 ORDER BY sequence_index ASC"
        );
        sqlx::query_as::<_, Visit>(&query)
            .bind(job_id)
            .fetch_all(conn)
            .await
    }

    /// The visit currently being worked: the first live, locked visit.
    pub async fn find_active_for_job(
        conn: &mut PgConnection,
        job_id: DbId,
    ) -> Result<Option<Visit>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM visits \
             WHERE job_id = $1 AND status NOT IN ('DRAFT', 'CANCELLED', 'COMPLETED') \
             ORDER BY sequence_index ASC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Visit>(&query)
            .bind(job_id)
            .fetch_optional(conn)
            .await
    }

    /// Lock a DRAFT visit: write its final tier, price and minutes and move
    /// it to SCHEDULED.
    ///
    /// Conditional on the visit still being DRAFT; returns `None` when it
    /// was locked concurrently.
    pub async fn lock(
        conn: &mut PgConnection,
        id: DbId,
        effective_minutes: i32,
        tier_code: &str,
        price_pence: Pence,
    ) -> Result<Option<Visit>, sqlx::Error> {
        let query = format!(
            "UPDATE visits \
             SET effective_minutes = $2, tier_code = $3, price_pence = $4, \
                 status = $5, locked_at = NOW() \
             WHERE id = $1 AND status = $6 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Visit>(&query)
            .bind(id)
            .bind(effective_minutes)
            .bind(tier_code)
            .bind(price_pence)
            .bind(VisitStatus::Scheduled.as_str())
            .bind(VisitStatus::Draft.as_str())
            .fetch_optional(conn)
            .await
    }

    /// Sequence index for a visit appended to `job_id`.
    pub async fn next_sequence_index(
        conn: &mut PgConnection,
        job_id: DbId,
    ) -> Result<i32, sqlx::Error> {
        let row: (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(sequence_index), -1) + 1 FROM visits WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_one(conn)
        .await?;
        Ok(row.0)
    }

    /// Number of DRAFT visits left on a job.
    pub async fn count_drafts(conn: &mut PgConnection, job_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM visits WHERE job_id = $1 AND status = $2")
                .bind(job_id)
                .bind(VisitStatus::Draft.as_str())
                .fetch_one(conn)
                .await?;
        Ok(row.0)
    }

    pub async fn set_status(
        conn: &mut PgConnection,
        id: DbId,
        status: VisitStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE visits SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Move every live, locked visit of a job to `status`.
    pub async fn set_status_for_job(
        conn: &mut PgConnection,
        job_id: DbId,
        status: VisitStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE visits SET status = $2 \
             WHERE job_id = $1 AND status NOT IN ('DRAFT', 'CANCELLED')",
        )
        .bind(job_id)
        .bind(status.as_str())
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Open a parts request on a visit.
    pub async fn request_parts(
        conn: &mut PgConnection,
        id: DbId,
        note: &str,
        cost_pence: Option<Pence>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE visits SET parts_status = $2, parts_note = $3, parts_cost_pence = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(PartsStatus::Pending.as_str())
        .bind(note)
        .bind(cost_pence)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn set_parts_status(
        conn: &mut PgConnection,
        id: DbId,
        parts_status: PartsStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE visits SET parts_status = $2 WHERE id = $1")
            .bind(id)
            .bind(parts_status.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Record a provider-reported scope mismatch.
    pub async fn record_mismatch(
        conn: &mut PgConnection,
        id: DbId,
        note: &str,
        extra_minutes: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE visits SET mismatch_note = $2, mismatch_extra_minutes = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(note)
        .bind(extra_minutes)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Re-price a locked visit after an accepted mismatch upgrade.
    ///
    /// The scope summary is not touched; it stays the original contract.
    pub async fn apply_upgrade(
        conn: &mut PgConnection,
        id: DbId,
        effective_minutes: i32,
        tier_code: &str,
        price_pence: Pence,
    ) -> Result<Visit, sqlx::Error> {
        let query = format!(
            "UPDATE visits \
             SET effective_minutes = $2, tier_code = $3, price_pence = $4, \
                 mismatch_extra_minutes = NULL \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Visit>(&query)
            .bind(id)
            .bind(effective_minutes)
            .bind(tier_code)
            .bind(price_pence)
            .fetch_one(conn)
            .await
    }
}
