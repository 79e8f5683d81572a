//! Job (aggregate root) rows and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;
use tradeflow_core::dispatch::OfferPointer;
use tradeflow_core::error::CoreError;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::policy::JobParties;
use tradeflow_core::timer::JobTimer;
use tradeflow_core::types::{DbId, Pence, Timestamp};

use super::status::{self, StatusId};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub status_id: StatusId,
    pub customer_id: DbId,
    pub provider_id: Option<DbId>,
    pub category: String,
    pub description: String,
    pub location: String,
    pub fixed_price_pence: Pence,
    pub is_asap: bool,
    pub scheduled_at: Option<Timestamp>,
    pub offered_to_id: Option<DbId>,
    pub offered_at: Option<Timestamp>,
    pub timer_started_at: Option<Timestamp>,
    pub timer_paused_at: Option<Timestamp>,
    pub timer_paused_total_secs: i32,
    pub timer_paused_for_parts: bool,
    pub elapsed_secs: Option<i32>,
    pub issue_raised_by: Option<String>,
    pub issue_note: Option<String>,
    pub payout_frozen: bool,
    pub timer_frozen_for_issue: bool,
    pub flag_reason: Option<String>,
    pub flag_note: Option<String>,
    pub flagged_by: Option<DbId>,
    pub flagged_at: Option<Timestamp>,
    pub cancelled_by_role: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<Timestamp>,
    pub status_updated_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    pub fn status(&self) -> Result<JobStatus, CoreError> {
        status::decode(self.status_id)
    }

    pub fn parties(&self) -> JobParties {
        JobParties {
            customer_id: self.customer_id,
            provider_id: self.provider_id,
            offered_to_id: self.offered_to_id,
        }
    }

    pub fn timer(&self) -> JobTimer {
        JobTimer {
            started_at: self.timer_started_at,
            paused_at: self.timer_paused_at,
            paused_total_secs: self.timer_paused_total_secs,
        }
    }

    pub fn offer(&self) -> Option<OfferPointer> {
        match (self.offered_to_id, self.offered_at) {
            (Some(offered_to), Some(offered_at)) => Some(OfferPointer {
                offered_to,
                offered_at,
            }),
            _ => None,
        }
    }
}

/// Insert payload for a new job. The job starts REQUESTED.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub customer_id: DbId,
    pub category: String,
    pub description: String,
    pub location: String,
    pub is_asap: bool,
    pub scheduled_at: Option<Timestamp>,
}

/// Request body for `POST /api/v1/jobs`.
///
/// `item_ids` is the output of the free-text parser; this service never
/// parses the description itself.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateJob {
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    #[validate(length(min = 1, max = 500))]
    pub location: String,
    #[validate(length(min = 1, max = 50))]
    pub item_ids: Vec<DbId>,
    #[serde(default = "default_asap")]
    pub is_asap: bool,
    pub scheduled_at: Option<Timestamp>,
}

fn default_asap() -> bool {
    true
}
