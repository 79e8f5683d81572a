//! Evidence photo references.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tradeflow_core::types::{DbId, Timestamp};

/// A row from the `evidence_photos` table. Never updated after insert.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EvidencePhoto {
    pub id: DbId,
    pub job_id: DbId,
    pub visit_id: Option<DbId>,
    pub photo_type: String,
    pub storage_key: String,
    pub uploaded_by: DbId,
    pub uploaded_by_role: String,
    pub created_at: Timestamp,
}

/// A photo reference supplied with a workflow request.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoRef {
    pub storage_key: String,
}
