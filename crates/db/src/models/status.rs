//! Job status ids as stored in the `job_statuses` lookup table.
//!
//! The enum itself lives in `tradeflow_core` so the transition table and
//! the persisted ids cannot drift apart; this module re-exports it and adds
//! the helpers repositories need.

pub use tradeflow_core::job_status::{JobStatus, StatusId};
use tradeflow_core::error::CoreError;

/// Decode a persisted status id.
pub fn decode(id: StatusId) -> Result<JobStatus, CoreError> {
    JobStatus::from_id(id).ok_or_else(|| CoreError::Internal(format!("Unknown job status id {id}")))
}

/// Status ids for binding to `status_id = ANY($n)`.
pub fn ids(statuses: &[JobStatus]) -> Vec<StatusId> {
    statuses.iter().map(|s| s.id()).collect()
}
