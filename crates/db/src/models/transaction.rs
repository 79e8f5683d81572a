//! Simulated payment ledger rows.

use serde::Serialize;
use sqlx::FromRow;
use tradeflow_core::types::{DbId, Pence, Timestamp};

/// A row from the `transactions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    pub id: DbId,
    pub job_id: DbId,
    pub kind: String,
    pub status: String,
    pub amount_pence: Pence,
    pub provider_id: Option<DbId>,
    pub reference: uuid::Uuid,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}
