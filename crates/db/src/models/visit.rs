//! Visit rows.

use serde::Serialize;
use sqlx::FromRow;
use tradeflow_core::error::CoreError;
use tradeflow_core::types::{DbId, Pence, Timestamp};
use tradeflow_core::visit::{PartsStatus, VisitStatus};

/// A row from the `visits` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Visit {
    pub id: DbId,
    pub job_id: DbId,
    pub sequence_index: i32,
    pub capability_tag: String,
    pub category: String,
    pub ladder_code: String,
    pub primary_item_id: DbId,
    pub addon_item_ids: Vec<DbId>,
    pub base_minutes: i32,
    pub effective_minutes: Option<i32>,
    pub tier_code: String,
    pub price_pence: Pence,
    pub status: String,
    pub parts_status: Option<String>,
    pub parts_note: Option<String>,
    pub parts_cost_pence: Option<Pence>,
    pub mismatch_note: Option<String>,
    pub mismatch_extra_minutes: Option<i32>,
    pub locked_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Visit {
    pub fn status(&self) -> Result<VisitStatus, CoreError> {
        self.status.parse().map_err(CoreError::Internal)
    }

    pub fn parts_status(&self) -> Result<Option<PartsStatus>, CoreError> {
        self.parts_status
            .as_deref()
            .map(|s| s.parse().map_err(CoreError::Internal))
            .transpose()
    }

    /// Primary item first, then add-ons.
    pub fn item_ids(&self) -> Vec<DbId> {
        std::iter::once(self.primary_item_id)
            .chain(self.addon_item_ids.iter().copied())
            .collect()
    }

    /// Minutes the locked price covers; base minutes before the lock.
    pub fn current_minutes(&self) -> i32 {
        self.effective_minutes.unwrap_or(self.base_minutes)
    }
}
