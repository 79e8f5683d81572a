//! Repository for the simulated payment ledger.

use sqlx::{PgConnection, PgPool};
use tradeflow_core::settlement::{TransactionKind, TransactionStatus};
use tradeflow_core::types::{DbId, Pence};

use crate::models::transaction::Transaction;

/// Column list for `transactions` queries.
const COLUMNS: &str = "\
    id, job_id, kind, status, amount_pence, provider_id, reference, completed_at, created_at";

/// Provides ledger writes and reads.
pub struct TransactionRepo;

impl TransactionRepo {
    /// Append a ledger entry with a fresh reference.
    pub async fn insert(
        conn: &mut PgConnection,
        job_id: DbId,
        kind: TransactionKind,
        status: TransactionStatus,
        amount_pence: Pence,
        provider_id: Option<DbId>,
    ) -> Result<Transaction, sqlx::Error> {
        let query = format!(
            "INSERT INTO transactions \
                 (job_id, kind, status, amount_pence, provider_id, reference, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, \
                     CASE WHEN $3 = 'COMPLETED' THEN NOW() END) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(job_id)
            .bind(kind.as_str())
            .bind(status.as_str())
            .bind(amount_pence)
            .bind(provider_id)
            .bind(uuid::Uuid::now_v7())
            .fetch_one(conn)
            .await
    }

    /// Complete the pending charge of a job. Returns `false` if there was
    /// none.
    pub async fn complete_pending_charge(
        conn: &mut PgConnection,
        job_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE transactions SET status = $2, completed_at = NOW() \
             WHERE job_id = $1 AND kind = $3 AND status = $4",
        )
        .bind(job_id)
        .bind(TransactionStatus::Completed.as_str())
        .bind(TransactionKind::Charge.as_str())
        .bind(TransactionStatus::Pending.as_str())
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move the pending charge of a job to a new amount after a re-price.
    pub async fn reprice_pending_charge(
        conn: &mut PgConnection,
        job_id: DbId,
        amount_pence: Pence,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE transactions SET amount_pence = $2 \
             WHERE job_id = $1 AND kind = $3 AND status = $4",
        )
        .bind(job_id)
        .bind(amount_pence)
        .bind(TransactionKind::Charge.as_str())
        .bind(TransactionStatus::Pending.as_str())
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop any still-pending charge, used when a job is cancelled.
    pub async fn void_pending_charges(
        conn: &mut PgConnection,
        job_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM transactions WHERE job_id = $1 AND kind = $2 AND status = $3",
        )
        .bind(job_id)
        .bind(TransactionKind::Charge.as_str())
        .bind(TransactionStatus::Pending.as_str())
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_for_job(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM transactions WHERE job_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
