//! Catalogue rows: job items and pricing tiers.

use serde::Serialize;
use sqlx::FromRow;
use tradeflow_core::catalogue::{CatalogueItem, PricingTier};
use tradeflow_core::error::CoreError;
use tradeflow_core::types::{DbId, Pence};

/// A row from the `job_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobItemRow {
    pub id: DbId,
    pub display_name: String,
    pub category: String,
    pub capability_tag: String,
    pub base_minutes: i32,
    pub ladder_code: String,
    pub uncertainty_prone: bool,
    pub uncertainty_policy: String,
    pub risk_buffer_minutes: i32,
}

impl TryFrom<JobItemRow> for CatalogueItem {
    type Error = CoreError;

    fn try_from(row: JobItemRow) -> Result<Self, Self::Error> {
        Ok(CatalogueItem {
            id: row.id,
            uncertainty_policy: row.uncertainty_policy.parse().map_err(CoreError::Internal)?,
            display_name: row.display_name,
            category: row.category,
            capability_tag: row.capability_tag,
            base_minutes: row.base_minutes,
            ladder_code: row.ladder_code,
            uncertainty_prone: row.uncertainty_prone,
            risk_buffer_minutes: row.risk_buffer_minutes,
        })
    }
}

/// A row from the `pricing_tiers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PricingTierRow {
    pub ladder_code: String,
    pub code: String,
    pub max_minutes: Option<i32>,
    pub price_pence: Pence,
}

impl From<PricingTierRow> for PricingTier {
    fn from(row: PricingTierRow) -> Self {
        PricingTier {
            code: row.code,
            max_minutes: row.max_minutes,
            price_pence: row.price_pence,
        }
    }
}
