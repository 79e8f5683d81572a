//! Provider roster rows and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;
use tradeflow_core::dispatch::{ProviderCandidate, ProviderType};
use tradeflow_core::error::CoreError;
use tradeflow_core::types::{DbId, Timestamp};

/// A row from the `providers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Provider {
    pub id: DbId,
    pub display_name: String,
    pub provider_type: String,
    pub capabilities: Vec<String>,
    pub categories: Vec<String>,
    pub is_active: bool,
    pub is_online: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<Provider> for ProviderCandidate {
    type Error = CoreError;

    fn try_from(row: Provider) -> Result<Self, Self::Error> {
        let provider_type = ProviderType::parse(&row.provider_type).ok_or_else(|| {
            CoreError::Internal(format!("Unknown provider type '{}'", row.provider_type))
        })?;
        Ok(ProviderCandidate {
            id: row.id,
            provider_type,
            capabilities: row.capabilities,
            categories: row.categories,
            is_active: row.is_active,
            is_online: row.is_online,
        })
    }
}

/// Request body for `POST /api/v1/admin/providers`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProvider {
    #[validate(length(min = 1, max = 200))]
    pub display_name: String,
    pub provider_type: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
