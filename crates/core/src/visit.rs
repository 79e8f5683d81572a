//! Visit and parts-request status values.
//!
//! Stored as TEXT columns guarded by CHECK constraints; these enums are the
//! only place the literals are spelled out.

text_enum! {
    /// Lifecycle of a single visit.
    VisitStatus {
        /// Quoted, scope not yet locked. The only mutable state.
        Draft => "DRAFT",
        /// Scope locked; price and tier are the customer's contract.
        Scheduled => "SCHEDULED",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        /// Parts were rejected; waiting on an administrator.
        IssuePending => "ISSUE_PENDING",
        /// Scope mismatch resolved by rebooking; superseded by a new visit.
        Cancelled => "CANCELLED",
    }
}

text_enum! {
    /// Parts request state on a visit.
    PartsStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
}

impl VisitStatus {
    /// Whether the scope lock has happened. Everything but `Draft`.
    pub fn is_locked(self) -> bool {
        self != VisitStatus::Draft
    }

    /// Visits that still count toward the job total and its dispatch scope.
    pub fn is_live(self) -> bool {
        self != VisitStatus::Cancelled
    }
}
