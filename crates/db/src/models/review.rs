//! Job reviews, one per author role.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;
use tradeflow_core::types::{DbId, Timestamp};

/// A row from the `reviews` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Review {
    pub id: DbId,
    pub job_id: DbId,
    pub author_role: String,
    pub author_id: DbId,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Request body for `POST /api/v1/jobs/{id}/reviews`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertReview {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}
