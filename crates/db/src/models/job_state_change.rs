//! Append-only status audit rows.

use serde::Serialize;
use sqlx::FromRow;
use tradeflow_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `job_state_changes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobStateChange {
    pub id: DbId,
    pub job_id: DbId,
    /// `None` only for the row recording job creation.
    pub from_status_id: Option<StatusId>,
    pub to_status_id: StatusId,
    pub reason: Option<String>,
    pub actor_id: Option<DbId>,
    pub actor_role: String,
    pub created_at: Timestamp,
}

/// Insert payload for an audit row.
#[derive(Debug, Clone)]
pub struct NewJobStateChange<'a> {
    pub job_id: DbId,
    pub from_status_id: Option<StatusId>,
    pub to_status_id: StatusId,
    pub reason: Option<&'a str>,
    pub actor_id: Option<DbId>,
    pub actor_role: &'a str,
}
