//! On-site work timer with freeze/resume semantics.
//!
//! The timer starts the first time a job enters IN_PROGRESS. Parts
//! requests, in-progress mismatches and provider issues pause it; resuming
//! folds the paused span into `paused_total_secs` so elapsed time only
//! counts active work.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Timer columns of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JobTimer {
    pub started_at: Option<Timestamp>,
    pub paused_at: Option<Timestamp>,
    pub paused_total_secs: i32,
}

impl JobTimer {
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.paused_at.is_none()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Start the timer if it has never run. Restarting is a no-op.
    pub fn start(self, now: Timestamp) -> JobTimer {
        match self.started_at {
            Some(_) => self,
            None => JobTimer {
                started_at: Some(now),
                ..self
            },
        }
    }

    /// Pause a running timer. Pausing an already-paused timer keeps the
    /// original pause instant.
    pub fn pause(self, now: Timestamp) -> Result<JobTimer, CoreError> {
        if self.started_at.is_none() {
            return Err(CoreError::Validation(
                "Work timer has not started".to_string(),
            ));
        }
        if self.paused_at.is_some() {
            return Ok(self);
        }
        Ok(JobTimer {
            paused_at: Some(now),
            ..self
        })
    }

    /// Resume a paused timer, folding the paused span into the total.
    /// Resuming a running timer is a no-op.
    pub fn resume(self, now: Timestamp) -> JobTimer {
        match self.paused_at {
            Some(paused_at) => {
                let span = (now - paused_at).num_seconds().max(0) as i32;
                JobTimer {
                    paused_at: None,
                    paused_total_secs: self.paused_total_secs + span,
                    ..self
                }
            }
            None => self,
        }
    }

    /// Seconds of active work at `now`. An open pause counts as paused.
    pub fn elapsed_secs(&self, now: Timestamp) -> i32 {
        let Some(started_at) = self.started_at else {
            return 0;
        };
        let end = self.paused_at.unwrap_or(now);
        let wall = (end - started_at).num_seconds().max(0) as i32;
        (wall - self.paused_total_secs).max(0)
    }
}
