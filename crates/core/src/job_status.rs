//! Job status lifecycle: the status enum and the transition table.
//!
//! This module lives in `core` (zero internal deps) so the executor in the
//! API layer, the repositories and the policy guards all share one table.
//! Structural legality lives here; who may request a transition lives in
//! [`crate::policy`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Status ID type matching SMALLINT in the `job_statuses` lookup table.
pub type StatusId = i16;

/// Job status. Discriminants match the `job_statuses` seed data (1-based).
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Requested = 1,
    Priced = 2,
    Booked = 3,
    WaitingForDispatch = 4,
    Assigning = 5,
    Assigned = 6,
    Preauthorised = 7,
    Arriving = 8,
    OnSite = 9,
    InProgress = 10,
    ScopeMismatch = 11,
    MismatchPending = 12,
    RebookRequired = 13,
    PartsRequired = 14,
    Completed = 15,
    IssueReported = 16,
    IssueRaisedByCustomer = 17,
    IssueRaisedByProvider = 18,
    ResolutionPending = 19,
    Captured = 20,
    PaidOut = 21,
    Closed = 22,
    CancelledFree = 23,
    CancelledCharged = 24,
    RescheduleRequired = 25,
    FlaggedReview = 26,
}

impl JobStatus {
    /// Every status, in discriminant order.
    pub const ALL: [JobStatus; 26] = [
        JobStatus::Requested,
        JobStatus::Priced,
        JobStatus::Booked,
        JobStatus::WaitingForDispatch,
        JobStatus::Assigning,
        JobStatus::Assigned,
        JobStatus::Preauthorised,
        JobStatus::Arriving,
        JobStatus::OnSite,
        JobStatus::InProgress,
        JobStatus::ScopeMismatch,
        JobStatus::MismatchPending,
        JobStatus::RebookRequired,
        JobStatus::PartsRequired,
        JobStatus::Completed,
        JobStatus::IssueReported,
        JobStatus::IssueRaisedByCustomer,
        JobStatus::IssueRaisedByProvider,
        JobStatus::ResolutionPending,
        JobStatus::Captured,
        JobStatus::PaidOut,
        JobStatus::Closed,
        JobStatus::CancelledFree,
        JobStatus::CancelledCharged,
        JobStatus::RescheduleRequired,
        JobStatus::FlaggedReview,
    ];

    /// Statuses from which the job can never move again.
    pub const TERMINAL: [JobStatus; 3] = [
        JobStatus::Closed,
        JobStatus::CancelledFree,
        JobStatus::CancelledCharged,
    ];

    /// The status in which a job accepts provider offers and acceptance.
    pub const DISPATCH_ACCEPTING: JobStatus = JobStatus::Assigning;

    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Look up a status by its database ID.
    pub fn from_id(id: StatusId) -> Option<JobStatus> {
        Self::ALL.iter().copied().find(|s| s.id() == id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Requested => "REQUESTED",
            JobStatus::Priced => "PRICED",
            JobStatus::Booked => "BOOKED",
            JobStatus::WaitingForDispatch => "WAITING_FOR_DISPATCH",
            JobStatus::Assigning => "ASSIGNING",
            JobStatus::Assigned => "ASSIGNED",
            JobStatus::Preauthorised => "PREAUTHORISED",
            JobStatus::Arriving => "ARRIVING",
            JobStatus::OnSite => "ON_SITE",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::ScopeMismatch => "SCOPE_MISMATCH",
            JobStatus::MismatchPending => "MISMATCH_PENDING",
            JobStatus::RebookRequired => "REBOOK_REQUIRED",
            JobStatus::PartsRequired => "PARTS_REQUIRED",
            JobStatus::Completed => "COMPLETED",
            JobStatus::IssueReported => "ISSUE_REPORTED",
            JobStatus::IssueRaisedByCustomer => "ISSUE_RAISED_BY_CUSTOMER",
            JobStatus::IssueRaisedByProvider => "ISSUE_RAISED_BY_PROVIDER",
            JobStatus::ResolutionPending => "RESOLUTION_PENDING",
            JobStatus::Captured => "CAPTURED",
            JobStatus::PaidOut => "PAID_OUT",
            JobStatus::Closed => "CLOSED",
            JobStatus::CancelledFree => "CANCELLED_FREE",
            JobStatus::CancelledCharged => "CANCELLED_CHARGED",
            JobStatus::RescheduleRequired => "RESCHEDULE_REQUIRED",
            JobStatus::FlaggedReview => "FLAGGED_REVIEW",
        }
    }

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    pub fn is_cancellation(self) -> bool {
        matches!(self, JobStatus::CancelledFree | JobStatus::CancelledCharged)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown job status '{s}'"))
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub mod state_machine {
    use super::JobStatus;
    use super::JobStatus::*;
    use crate::error::CoreError;

    /// Forward successors per status, excluding the cancellation escape
    /// hatches, which [`successors`] adds for every non-terminal status.
    pub fn forward_successors(from: JobStatus) -> &'static [JobStatus] {
        match from {
            Requested => &[Priced],
            Priced => &[Booked, WaitingForDispatch, Assigning],
            Booked => &[WaitingForDispatch, Assigning, RescheduleRequired, FlaggedReview],
            WaitingForDispatch => &[
                Assigning,
                Assigned,
                Booked,
                RescheduleRequired,
                FlaggedReview,
            ],
            Assigning => &[Assigned, WaitingForDispatch, RescheduleRequired, FlaggedReview],
            Assigned => &[Preauthorised, WaitingForDispatch, FlaggedReview],
            Preauthorised => &[Arriving, WaitingForDispatch, FlaggedReview],
            Arriving => &[OnSite, IssueRaisedByProvider, FlaggedReview],
            OnSite => &[InProgress, ScopeMismatch, FlaggedReview],
            InProgress => &[
                Completed,
                PartsRequired,
                MismatchPending,
                IssueRaisedByProvider,
                FlaggedReview,
            ],
            ScopeMismatch => &[InProgress, RebookRequired],
            MismatchPending => &[InProgress, RebookRequired],
            RebookRequired => &[Priced],
            PartsRequired => &[InProgress, IssueReported],
            Completed => &[Captured, IssueRaisedByCustomer],
            IssueReported => &[ResolutionPending],
            IssueRaisedByCustomer => &[ResolutionPending],
            IssueRaisedByProvider => &[ResolutionPending],
            ResolutionPending => &[InProgress, Completed],
            Captured => &[PaidOut],
            PaidOut => &[Closed],
            RescheduleRequired => &[Booked, WaitingForDispatch],
            FlaggedReview => &[WaitingForDispatch, RescheduleRequired],
            Closed | CancelledFree | CancelledCharged => &[],
        }
    }

    /// Every legal successor of `from`, including both cancellation
    /// statuses for any non-terminal `from`.
    pub fn successors(from: JobStatus) -> Vec<JobStatus> {
        let mut out = forward_successors(from).to_vec();
        if !from.is_terminal() {
            out.extend([CancelledFree, CancelledCharged]);
        }
        out
    }

    /// Check whether a transition from `from` to `to` is structurally legal.
    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        if to.is_cancellation() {
            return !from.is_terminal();
        }
        forward_successors(from).contains(&to)
    }

    /// Validate a transition, returning [`CoreError::InvalidTransition`] for
    /// illegal moves.
    pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition { from, to })
        }
    }
}

// ---------------------------------------------------------------------------
// Stuck-state detection (advisory)
// ---------------------------------------------------------------------------

/// Age after which a job sitting in `status` warrants operational attention.
///
/// Returns `None` for statuses that are not monitored. Advisory only:
/// nothing transitions automatically on a stuck job.
pub fn stuck_threshold(status: JobStatus) -> Option<chrono::Duration> {
    let minutes = match status {
        JobStatus::Requested => 30,
        JobStatus::Priced => 24 * 60,
        JobStatus::Booked => 45,
        JobStatus::WaitingForDispatch => 30,
        JobStatus::Assigning => 15,
        JobStatus::Assigned => 60,
        JobStatus::Preauthorised => 60,
        JobStatus::Arriving => 90,
        JobStatus::OnSite => 60,
        JobStatus::InProgress => 180,
        JobStatus::PartsRequired => 24 * 60,
        JobStatus::Completed => 120,
        JobStatus::Captured => 24 * 60,
        JobStatus::ResolutionPending => 48 * 60,
        JobStatus::FlaggedReview => 4 * 60,
        _ => return None,
    };
    Some(chrono::Duration::minutes(minutes))
}

/// Whether a job that entered `status` at `status_updated_at` is stuck at `now`.
///
/// `Booked` jobs waiting for a future dispatch window are expected to sit
/// for a long time, so the caller decides whether to include them.
pub fn is_stuck(status: JobStatus, status_updated_at: Timestamp, now: Timestamp) -> bool {
    match stuck_threshold(status) {
        Some(threshold) => now - status_updated_at >= threshold,
        None => false,
    }
}
