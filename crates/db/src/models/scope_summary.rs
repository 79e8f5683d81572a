//! Write-once scope summaries.

use serde::Serialize;
use sqlx::FromRow;
use tradeflow_core::types::{DbId, Pence, Timestamp};

/// A row from the `scope_summaries` table. Never updated after insert.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScopeSummary {
    pub id: DbId,
    pub visit_id: DbId,
    pub job_id: DbId,
    pub answers: serde_json::Value,
    pub contract_text: String,
    pub tier_code: String,
    pub effective_minutes: i32,
    pub price_pence: Pence,
    pub forced_top_tier: bool,
    pub created_at: Timestamp,
}

/// Insert payload for a scope summary.
#[derive(Debug, Clone)]
pub struct NewScopeSummary {
    pub visit_id: DbId,
    pub job_id: DbId,
    pub answers: serde_json::Value,
    pub contract_text: String,
    pub tier_code: String,
    pub effective_minutes: i32,
    pub price_pence: Pence,
    pub forced_top_tier: bool,
}
