//! Role and precondition guards for workflow operations.
//!
//! The transition table in [`crate::job_status::state_machine`] answers "is
//! this move structurally legal?". The functions here answer "may this
//! caller make it now?". Every workflow operation calls exactly one guard
//! before touching the state machine, so the rules for a given target status
//! live in one place.
//!
//! Error mapping:
//! - wrong role or wrong counterparty -> [`CoreError::Forbidden`]
//! - status does not allow the operation -> [`CoreError::InvalidTransition`]
//! - other unmet preconditions -> [`CoreError::Validation`]

use crate::error::CoreError;
use crate::job_status::state_machine::validate_transition;
use crate::job_status::JobStatus;
use crate::roles::Actor;
use crate::types::DbId;
use crate::visit::PartsStatus;

// ---------------------------------------------------------------------------
// Parties
// ---------------------------------------------------------------------------

/// Who a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobParties {
    pub customer_id: DbId,
    pub provider_id: Option<DbId>,
    /// Provider currently holding the offer, if any.
    pub offered_to_id: Option<DbId>,
}

impl JobParties {
    pub fn is_customer(&self, actor: &Actor) -> bool {
        actor.is_customer() && actor.id == self.customer_id
    }

    pub fn is_assigned_provider(&self, actor: &Actor) -> bool {
        actor.is_provider() && self.provider_id == Some(actor.id)
    }

    pub fn is_offeree(&self, actor: &Actor) -> bool {
        actor.is_provider() && self.offered_to_id == Some(actor.id)
    }
}

/// Customers see their own jobs, providers the jobs assigned or offered to
/// them, admins everything.
pub fn authorize_view(actor: &Actor, parties: &JobParties) -> Result<(), CoreError> {
    if actor.is_admin()
        || parties.is_customer(actor)
        || parties.is_assigned_provider(actor)
        || parties.is_offeree(actor)
    {
        Ok(())
    } else {
        Err(CoreError::Forbidden("Cannot view another user's job".into()))
    }
}

fn require_status(
    current: JobStatus,
    allowed: &[JobStatus],
    target: JobStatus,
) -> Result<(), CoreError> {
    if allowed.contains(&current) {
        validate_transition(current, target)
    } else {
        Err(CoreError::InvalidTransition {
            from: current,
            to: target,
        })
    }
}

// ---------------------------------------------------------------------------
// Generic change-status
// ---------------------------------------------------------------------------

/// Name of the dedicated operation owning `to`, when the generic
/// change-status endpoint must not be used for it.
pub fn dedicated_operation(to: JobStatus) -> Option<&'static str> {
    use JobStatus::*;
    match to {
        Priced | Booked | RebookRequired => Some("lock-scope"),
        WaitingForDispatch | Assigning | RescheduleRequired => Some("admin dispatch"),
        Assigned => Some("accept-job"),
        ScopeMismatch | MismatchPending => Some("report-mismatch"),
        PartsRequired => Some("request-parts"),
        IssueReported => Some("decide-parts"),
        IssueRaisedByCustomer | IssueRaisedByProvider => Some("raise-issue"),
        ResolutionPending => Some("take-up-issue"),
        FlaggedReview => Some("flag"),
        Captured => Some("capture"),
        PaidOut => Some("payout"),
        Closed => Some("close"),
        CancelledFree | CancelledCharged => Some("cancel"),
        Requested | Preauthorised | Arriving | OnSite | InProgress | Completed => None,
    }
}

/// Name of the dedicated operation owning every exit from `from`.
///
/// Interrupted jobs resume only once their interruption is settled: parts
/// approved, a mismatch resolved by the customer or an admin, an issue or
/// flag resolved by an admin.
pub fn dedicated_exit(from: JobStatus) -> Option<&'static str> {
    use JobStatus::*;
    match from {
        PartsRequired => Some("resume-work"),
        ScopeMismatch | MismatchPending => Some("mismatch-resolution"),
        ResolutionPending => Some("resolve-issue"),
        FlaggedReview => Some("resolve-flag"),
        _ => None,
    }
}

/// Guard for the generic change-status operation.
///
/// Covers only the execution progressions: the customer pre-authorises
/// payment on an assigned job; the assigned provider drives arrival, work
/// start and completion; admins may drive either. Everything else belongs
/// to a dedicated operation.
pub fn authorize_status_change(
    actor: &Actor,
    parties: &JobParties,
    from: JobStatus,
    to: JobStatus,
) -> Result<(), CoreError> {
    if let Some(op) = dedicated_operation(to) {
        return Err(CoreError::Validation(format!(
            "Status {to} is set through the {op} operation"
        )));
    }
    if let Some(op) = dedicated_exit(from) {
        return Err(CoreError::Validation(format!(
            "Jobs in {from} are moved on through the {op} operation"
        )));
    }
    validate_transition(from, to)?;

    if actor.is_admin() {
        return Ok(());
    }
    let permitted = match to {
        JobStatus::Preauthorised => parties.is_customer(actor),
        JobStatus::Arriving | JobStatus::OnSite | JobStatus::InProgress | JobStatus::Completed => {
            parties.is_assigned_provider(actor)
        }
        _ => false,
    };
    if permitted {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "Role '{}' may not move this job to {to}",
            actor.role
        )))
    }
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

/// Guard for accept-job.
///
/// The provider must be active and the job must be taking offers. While
/// another provider holds a live offer, acceptance is refused as a
/// conflict; the atomic claim decides races between eligible callers.
pub fn authorize_accept(
    actor: &Actor,
    status: JobStatus,
    parties: &JobParties,
    provider_active: bool,
    offer_live: bool,
) -> Result<(), CoreError> {
    if !actor.is_provider() {
        return Err(CoreError::Forbidden("Only providers may accept jobs".into()));
    }
    if !provider_active {
        return Err(CoreError::Forbidden("Provider account is not active".into()));
    }
    if parties.provider_id.is_some() {
        return Err(CoreError::Conflict("Job has already been taken".into()));
    }
    if status != JobStatus::DISPATCH_ACCEPTING {
        return Err(CoreError::InvalidTransition {
            from: status,
            to: JobStatus::Assigned,
        });
    }
    if offer_live && !parties.is_offeree(actor) {
        return Err(CoreError::Conflict(
            "Job is currently offered to another provider".into(),
        ));
    }
    Ok(())
}

/// Guard for decline-job: only the current offeree may decline.
pub fn authorize_decline(
    actor: &Actor,
    status: JobStatus,
    parties: &JobParties,
) -> Result<(), CoreError> {
    if !parties.is_offeree(actor) {
        return Err(CoreError::Forbidden(
            "Only the provider holding the offer may decline it".into(),
        ));
    }
    if status != JobStatus::DISPATCH_ACCEPTING {
        return Err(CoreError::Conflict("Job is no longer taking offers".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Statuses in which the customer may cancel on their own.
pub const CUSTOMER_CANCELLABLE: &[JobStatus] = &[
    JobStatus::Requested,
    JobStatus::Priced,
    JobStatus::Booked,
    JobStatus::WaitingForDispatch,
    JobStatus::Assigning,
    JobStatus::Assigned,
    JobStatus::Preauthorised,
    JobStatus::Arriving,
    JobStatus::RebookRequired,
    JobStatus::RescheduleRequired,
];

/// Statuses from which the assigned provider may withdraw.
pub const PROVIDER_WITHDRAWABLE: &[JobStatus] = &[JobStatus::Assigned, JobStatus::Preauthorised];

/// What a cancel request from this caller means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelKind {
    /// The customer cancels the job.
    Customer,
    /// The assigned provider withdraws; the job returns to dispatch.
    ProviderWithdrawal,
    /// An administrator cancels, optionally waiving the fee.
    Admin,
}

/// Guard for cancel-job.
pub fn authorize_cancel(
    actor: &Actor,
    parties: &JobParties,
    status: JobStatus,
) -> Result<CancelKind, CoreError> {
    if status.is_terminal() {
        return Err(CoreError::InvalidTransition {
            from: status,
            to: JobStatus::CancelledFree,
        });
    }
    if actor.is_admin() {
        return Ok(CancelKind::Admin);
    }
    if parties.is_customer(actor) {
        require_status(status, CUSTOMER_CANCELLABLE, JobStatus::CancelledFree)?;
        return Ok(CancelKind::Customer);
    }
    if parties.is_assigned_provider(actor) {
        require_status(status, PROVIDER_WITHDRAWABLE, JobStatus::WaitingForDispatch)?;
        return Ok(CancelKind::ProviderWithdrawal);
    }
    Err(CoreError::Forbidden("Cannot cancel another user's job".into()))
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

text_enum! {
    /// Why a job was flagged for administrator review.
    FlagReason {
        Safety => "safety",
        WrongCapability => "wrong_capability",
        ScopeTooLarge => "scope_too_large",
        PhotoMismatch => "photo_mismatch",
    }
}

/// Statuses from which a job may be flagged.
pub const FLAGGABLE: &[JobStatus] = &[
    JobStatus::Booked,
    JobStatus::WaitingForDispatch,
    JobStatus::Assigning,
    JobStatus::Assigned,
    JobStatus::Preauthorised,
    JobStatus::Arriving,
    JobStatus::OnSite,
    JobStatus::InProgress,
];

/// Guard for flag: the job's customer or assigned provider.
pub fn authorize_flag(
    actor: &Actor,
    parties: &JobParties,
    status: JobStatus,
) -> Result<(), CoreError> {
    if !(parties.is_customer(actor) || parties.is_assigned_provider(actor) || actor.is_admin()) {
        return Err(CoreError::Forbidden(
            "Only the job's customer or assigned provider may flag it".into(),
        ));
    }
    require_status(status, FLAGGABLE, JobStatus::FlaggedReview)
}

text_enum! {
    /// Administrator decision on a flagged job.
    FlagResolution {
        ReturnToDispatch => "RETURN_TO_DISPATCH",
        ForceReschedule => "FORCE_RESCHEDULE",
        CancelFree => "CANCEL_FREE",
    }
}

impl FlagResolution {
    pub fn target(self) -> JobStatus {
        match self {
            FlagResolution::ReturnToDispatch => JobStatus::WaitingForDispatch,
            FlagResolution::ForceReschedule => JobStatus::RescheduleRequired,
            FlagResolution::CancelFree => JobStatus::CancelledFree,
        }
    }
}

/// Guard for resolve-flag: admins only, job must be under review.
pub fn authorize_flag_resolution(
    actor: &Actor,
    status: JobStatus,
    resolution: FlagResolution,
) -> Result<(), CoreError> {
    if !actor.is_admin() {
        return Err(CoreError::Forbidden("Admin role required".into()));
    }
    require_status(status, &[JobStatus::FlaggedReview], resolution.target())
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// Who raised a dispute. Stored in `jobs.issue_raised_by`.
pub const ISSUE_BY_CUSTOMER: &str = "customer";
pub const ISSUE_BY_PROVIDER: &str = "provider";

/// Effects of raising an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueEffects {
    pub target: JobStatus,
    pub raised_by: &'static str,
    pub freeze_payout: bool,
    pub freeze_timer: bool,
}

/// Guard for raise-issue.
///
/// Only the job's customer may raise a customer issue, and only from
/// COMPLETED; it freezes the payout. Only the assigned provider may raise a
/// provider issue, from ARRIVING or IN_PROGRESS; it freezes the timer.
pub fn authorize_issue(
    actor: &Actor,
    parties: &JobParties,
    status: JobStatus,
) -> Result<IssueEffects, CoreError> {
    if parties.is_customer(actor) {
        require_status(
            status,
            &[JobStatus::Completed],
            JobStatus::IssueRaisedByCustomer,
        )?;
        return Ok(IssueEffects {
            target: JobStatus::IssueRaisedByCustomer,
            raised_by: ISSUE_BY_CUSTOMER,
            freeze_payout: true,
            freeze_timer: false,
        });
    }
    if parties.is_assigned_provider(actor) {
        require_status(
            status,
            &[JobStatus::Arriving, JobStatus::InProgress],
            JobStatus::IssueRaisedByProvider,
        )?;
        return Ok(IssueEffects {
            target: JobStatus::IssueRaisedByProvider,
            raised_by: ISSUE_BY_PROVIDER,
            freeze_payout: false,
            freeze_timer: true,
        });
    }
    Err(CoreError::Forbidden(
        "Only the job's customer or assigned provider may raise an issue".into(),
    ))
}

/// Statuses an administrator takes up into RESOLUTION_PENDING.
pub const ISSUE_STATUSES: &[JobStatus] = &[
    JobStatus::IssueReported,
    JobStatus::IssueRaisedByCustomer,
    JobStatus::IssueRaisedByProvider,
];

/// Guard for take-up-issue.
pub fn authorize_issue_take_up(actor: &Actor, status: JobStatus) -> Result<(), CoreError> {
    if !actor.is_admin() {
        return Err(CoreError::Forbidden("Admin role required".into()));
    }
    require_status(status, ISSUE_STATUSES, JobStatus::ResolutionPending)
}

text_enum! {
    /// Administrator decision on a disputed job.
    IssueResolution {
        /// Work continues; freezes are lifted and the timer resumes.
        ResumeWork => "RESUME_WORK",
        /// Work is accepted as complete; freezes are lifted.
        Release => "RELEASE",
        /// Job is cancelled without charge.
        CancelFree => "CANCEL_FREE",
        /// Job is cancelled with the cancellation fee.
        CancelCharged => "CANCEL_CHARGED",
    }
}

impl IssueResolution {
    pub fn target(self) -> JobStatus {
        match self {
            IssueResolution::ResumeWork => JobStatus::InProgress,
            IssueResolution::Release => JobStatus::Completed,
            IssueResolution::CancelFree => JobStatus::CancelledFree,
            IssueResolution::CancelCharged => JobStatus::CancelledCharged,
        }
    }
}

/// Guard for resolve-issue: admins only, job must be under resolution.
pub fn authorize_issue_resolution(
    actor: &Actor,
    status: JobStatus,
    resolution: IssueResolution,
) -> Result<(), CoreError> {
    if !actor.is_admin() {
        return Err(CoreError::Forbidden("Admin role required".into()));
    }
    require_status(status, &[JobStatus::ResolutionPending], resolution.target())
}

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

/// Guard for request-parts: assigned provider, job in progress, no open
/// parts request on the visit.
pub fn authorize_parts_request(
    actor: &Actor,
    parties: &JobParties,
    status: JobStatus,
    parts_status: Option<PartsStatus>,
) -> Result<(), CoreError> {
    if !parties.is_assigned_provider(actor) {
        return Err(CoreError::Forbidden(
            "Only the assigned provider may request parts".into(),
        ));
    }
    require_status(status, &[JobStatus::InProgress], JobStatus::PartsRequired)?;
    if parts_status == Some(PartsStatus::Pending) {
        return Err(CoreError::Conflict(
            "A parts request is already pending on this visit".into(),
        ));
    }
    Ok(())
}

text_enum! {
    /// Customer decision on a parts request.
    PartsDecision {
        Approve => "APPROVE",
        Reject => "REJECT",
    }
}

/// Guard for decide-parts: the job's customer, job waiting on parts, a
/// pending request on the visit.
pub fn authorize_parts_decision(
    actor: &Actor,
    parties: &JobParties,
    status: JobStatus,
    parts_status: Option<PartsStatus>,
) -> Result<(), CoreError> {
    if !(parties.is_customer(actor) || actor.is_admin()) {
        return Err(CoreError::Forbidden(
            "Only the job's customer may decide on parts".into(),
        ));
    }
    if status != JobStatus::PartsRequired {
        return Err(CoreError::Validation(format!(
            "Job is {status}, not waiting on parts"
        )));
    }
    if parts_status != Some(PartsStatus::Pending) {
        return Err(CoreError::Validation(
            "Visit has no pending parts request".into(),
        ));
    }
    Ok(())
}

/// Guard for resume-work after parts: assigned provider, job waiting on
/// parts, parts approved.
pub fn authorize_parts_resume(
    actor: &Actor,
    parties: &JobParties,
    status: JobStatus,
    parts_status: Option<PartsStatus>,
) -> Result<(), CoreError> {
    if !(parties.is_assigned_provider(actor) || actor.is_admin()) {
        return Err(CoreError::Forbidden(
            "Only the assigned provider may resume work".into(),
        ));
    }
    require_status(status, &[JobStatus::PartsRequired], JobStatus::InProgress)?;
    if parts_status != Some(PartsStatus::Approved) {
        return Err(CoreError::Validation(
            "Work can only resume once parts are approved".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scope mismatch
// ---------------------------------------------------------------------------

/// Guard for report-mismatch. Returns the status the job moves to: from
/// ON_SITE the job enters SCOPE_MISMATCH; from IN_PROGRESS it enters
/// MISMATCH_PENDING and the timer pauses.
pub fn authorize_mismatch_report(
    actor: &Actor,
    parties: &JobParties,
    status: JobStatus,
) -> Result<JobStatus, CoreError> {
    if !parties.is_assigned_provider(actor) {
        return Err(CoreError::Forbidden(
            "Only the assigned provider may report a scope mismatch".into(),
        ));
    }
    let target = match status {
        JobStatus::OnSite => JobStatus::ScopeMismatch,
        JobStatus::InProgress => JobStatus::MismatchPending,
        other => {
            return Err(CoreError::InvalidTransition {
                from: other,
                to: JobStatus::ScopeMismatch,
            })
        }
    };
    validate_transition(status, target)?;
    Ok(target)
}

text_enum! {
    /// Customer or admin choice on a scope mismatch.
    MismatchResolution {
        Upgrade => "UPGRADE",
        Rebook => "REBOOK",
    }
}

impl MismatchResolution {
    pub fn target(self) -> JobStatus {
        match self {
            MismatchResolution::Upgrade => JobStatus::InProgress,
            MismatchResolution::Rebook => JobStatus::RebookRequired,
        }
    }
}

/// Guard for mismatch-resolution: the job's customer or an admin.
pub fn authorize_mismatch_resolution(
    actor: &Actor,
    parties: &JobParties,
    status: JobStatus,
    resolution: MismatchResolution,
) -> Result<(), CoreError> {
    if !(parties.is_customer(actor) || actor.is_admin()) {
        return Err(CoreError::Forbidden(
            "Only the job's customer or an admin may resolve a mismatch".into(),
        ));
    }
    require_status(
        status,
        &[JobStatus::ScopeMismatch, JobStatus::MismatchPending],
        resolution.target(),
    )
}

// ---------------------------------------------------------------------------
// Scope lock, reviews, settlement
// ---------------------------------------------------------------------------

/// Guard for lock-scope: the job's customer, job still being priced or
/// waiting on a rebooked visit.
pub fn authorize_scope_lock(
    actor: &Actor,
    parties: &JobParties,
    status: JobStatus,
) -> Result<(), CoreError> {
    if !parties.is_customer(actor) {
        return Err(CoreError::Forbidden(
            "Only the job's customer may lock a visit's scope".into(),
        ));
    }
    if !matches!(status, JobStatus::Priced | JobStatus::RebookRequired) {
        return Err(CoreError::Validation(format!(
            "Job is {status}; scope can only be locked while priced"
        )));
    }
    Ok(())
}

/// Statuses after which a customer may leave a review.
pub const REVIEWABLE: &[JobStatus] = &[
    JobStatus::Completed,
    JobStatus::IssueRaisedByCustomer,
    JobStatus::ResolutionPending,
    JobStatus::Captured,
    JobStatus::PaidOut,
];

/// Guard for review upsert. Returns the author role recorded.
pub fn authorize_review(
    actor: &Actor,
    parties: &JobParties,
    status: JobStatus,
) -> Result<&'static str, CoreError> {
    if actor.is_admin() {
        if status.is_cancellation() {
            return Err(CoreError::Validation("Cancelled jobs are not reviewed".into()));
        }
        return Ok(crate::roles::ROLE_ADMIN);
    }
    if parties.is_customer(actor) {
        if !REVIEWABLE.contains(&status) {
            return Err(CoreError::Validation(format!(
                "Job is {status}; reviews open once work is completed"
            )));
        }
        return Ok(crate::roles::ROLE_CUSTOMER);
    }
    Err(CoreError::Forbidden(
        "Only the job's customer or an admin may review it".into(),
    ))
}

/// Guard for payout: admins only, payout must not be frozen.
pub fn authorize_payout(actor: &Actor, status: JobStatus, payout_frozen: bool) -> Result<(), CoreError> {
    if !actor.is_admin() {
        return Err(CoreError::Forbidden("Admin role required".into()));
    }
    if payout_frozen {
        return Err(CoreError::Conflict(
            "Payout is frozen by an open customer issue".into(),
        ));
    }
    require_status(status, &[JobStatus::Captured], JobStatus::PaidOut)
}

/// Guard for close: admins only, both reviews present.
pub fn authorize_close(
    actor: &Actor,
    status: JobStatus,
    has_customer_review: bool,
    has_admin_review: bool,
) -> Result<(), CoreError> {
    if !actor.is_admin() {
        return Err(CoreError::Forbidden("Admin role required".into()));
    }
    require_status(status, &[JobStatus::PaidOut], JobStatus::Closed)?;
    if !has_customer_review || !has_admin_review {
        return Err(CoreError::Validation(
            "Closing requires both a customer review and an admin review".into(),
        ));
    }
    Ok(())
}

/// Guard for capture: admins only, job COMPLETED.
///
/// A customer issue moves the job out of COMPLETED, so an open dispute
/// blocks capture structurally.
pub fn authorize_capture(actor: &Actor, status: JobStatus) -> Result<(), CoreError> {
    if !actor.is_admin() {
        return Err(CoreError::Forbidden("Admin role required".into()));
    }
    require_status(status, &[JobStatus::Completed], JobStatus::Captured)
}

// ---------------------------------------------------------------------------
// Admin dispatch controls
// ---------------------------------------------------------------------------

/// Statuses from which an administrator may attach a provider directly.
pub const REASSIGNABLE: &[JobStatus] = &[JobStatus::Assigning, JobStatus::WaitingForDispatch];

/// Guard for reassign.
pub fn authorize_reassign(
    actor: &Actor,
    status: JobStatus,
    provider_active: bool,
) -> Result<(), CoreError> {
    if !actor.is_admin() {
        return Err(CoreError::Forbidden("Admin role required".into()));
    }
    require_status(status, REASSIGNABLE, JobStatus::Assigned)?;
    if !provider_active {
        return Err(CoreError::Validation("Provider is not active".into()));
    }
    Ok(())
}

/// Guard for override: any structurally legal move, with a reason.
pub fn authorize_override(
    actor: &Actor,
    from: JobStatus,
    to: JobStatus,
    reason: Option<&str>,
) -> Result<(), CoreError> {
    if !actor.is_admin() {
        return Err(CoreError::Forbidden("Admin role required".into()));
    }
    if reason.map_or(true, |r| r.trim().is_empty()) {
        return Err(CoreError::Validation("An override requires a reason".into()));
    }
    validate_transition(from, to)
}

/// Statuses from which dispatch-now may promote a job to ASSIGNING. A job
/// already ASSIGNING just gets another dispatch step.
pub const DISPATCHABLE: &[JobStatus] = &[
    JobStatus::Priced,
    JobStatus::Booked,
    JobStatus::WaitingForDispatch,
    JobStatus::Assigning,
];

/// Guard for dispatch-now: admins only, every visit scope-locked.
pub fn authorize_dispatch_now(
    actor: &Actor,
    status: JobStatus,
    draft_visits: i64,
) -> Result<(), CoreError> {
    if !actor.is_admin() {
        return Err(CoreError::Forbidden("Admin role required".into()));
    }
    if !DISPATCHABLE.contains(&status) {
        return Err(CoreError::InvalidTransition {
            from: status,
            to: JobStatus::Assigning,
        });
    }
    if draft_visits > 0 {
        return Err(CoreError::Validation(
            "Every visit must be scope-locked before dispatch".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{ROLE_ADMIN, ROLE_CUSTOMER, ROLE_PROVIDER};
    use assert_matches::assert_matches;

    const CUSTOMER: DbId = 10;
    const PROVIDER: DbId = 20;

    fn parties() -> JobParties {
        JobParties {
            customer_id: CUSTOMER,
            provider_id: Some(PROVIDER),
            offered_to_id: None,
        }
    }

    fn customer() -> Actor {
        Actor::new(CUSTOMER, ROLE_CUSTOMER)
    }

    fn provider() -> Actor {
        Actor::new(PROVIDER, ROLE_PROVIDER)
    }

    fn stranger_provider() -> Actor {
        Actor::new(99, ROLE_PROVIDER)
    }

    fn admin() -> Actor {
        Actor::new(1, ROLE_ADMIN)
    }

    // -----------------------------------------------------------------------
    // View
    // -----------------------------------------------------------------------

    #[test]
    fn parties_and_admin_may_view() {
        assert!(authorize_view(&customer(), &parties()).is_ok());
        assert!(authorize_view(&provider(), &parties()).is_ok());
        assert!(authorize_view(&admin(), &parties()).is_ok());
        assert_matches!(
            authorize_view(&stranger_provider(), &parties()),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn customer_id_is_not_a_provider_id() {
        let same_number = Actor::new(PROVIDER, ROLE_CUSTOMER);
        assert!(!parties().is_assigned_provider(&same_number));
    }

    // -----------------------------------------------------------------------
    // change-status
    // -----------------------------------------------------------------------

    #[test]
    fn provider_drives_execution() {
        let p = parties();
        for (from, to) in [
            (JobStatus::Preauthorised, JobStatus::Arriving),
            (JobStatus::Arriving, JobStatus::OnSite),
            (JobStatus::OnSite, JobStatus::InProgress),
            (JobStatus::InProgress, JobStatus::Completed),
        ] {
            assert!(authorize_status_change(&provider(), &p, from, to).is_ok());
            assert_matches!(
                authorize_status_change(&customer(), &p, from, to),
                Err(CoreError::Forbidden(_))
            );
        }
    }

    #[test]
    fn customer_preauthorises() {
        assert!(authorize_status_change(
            &customer(),
            &parties(),
            JobStatus::Assigned,
            JobStatus::Preauthorised
        )
        .is_ok());
        assert_matches!(
            authorize_status_change(
                &provider(),
                &parties(),
                JobStatus::Assigned,
                JobStatus::Preauthorised
            ),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn dedicated_targets_are_refused() {
        assert_matches!(
            authorize_status_change(
                &admin(),
                &parties(),
                JobStatus::InProgress,
                JobStatus::PartsRequired
            ),
            Err(CoreError::Validation(msg)) if msg.contains("request-parts")
        );
        assert_matches!(
            authorize_status_change(
                &admin(),
                &parties(),
                JobStatus::Completed,
                JobStatus::CancelledFree
            ),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn interrupted_jobs_cannot_resume_generically() {
        for (from, op) in [
            (JobStatus::PartsRequired, "resume-work"),
            (JobStatus::ScopeMismatch, "mismatch-resolution"),
            (JobStatus::MismatchPending, "mismatch-resolution"),
            (JobStatus::ResolutionPending, "resolve-issue"),
        ] {
            for actor in [provider(), admin()] {
                assert_matches!(
                    authorize_status_change(&actor, &parties(), from, JobStatus::InProgress),
                    Err(CoreError::Validation(msg)) if msg.contains(op)
                );
            }
        }
        assert!(authorize_status_change(
            &provider(),
            &parties(),
            JobStatus::OnSite,
            JobStatus::InProgress
        )
        .is_ok());
    }

    #[test]
    fn illegal_move_beats_role_check() {
        assert_matches!(
            authorize_status_change(
                &provider(),
                &parties(),
                JobStatus::Assigned,
                JobStatus::InProgress
            ),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn other_provider_cannot_progress() {
        assert_matches!(
            authorize_status_change(
                &stranger_provider(),
                &parties(),
                JobStatus::Arriving,
                JobStatus::OnSite
            ),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn every_status_is_owned_or_generic() {
        let generic: Vec<_> = JobStatus::ALL
            .into_iter()
            .filter(|s| dedicated_operation(*s).is_none())
            .collect();
        assert!(generic.contains(&JobStatus::Completed));
        assert!(!generic.contains(&JobStatus::Closed));
    }

    // -----------------------------------------------------------------------
    // Accept / decline
    // -----------------------------------------------------------------------

    fn open_job(offered_to: Option<DbId>) -> JobParties {
        JobParties {
            customer_id: CUSTOMER,
            provider_id: None,
            offered_to_id: offered_to,
        }
    }

    #[test]
    fn offeree_may_accept() {
        assert!(authorize_accept(
            &provider(),
            JobStatus::Assigning,
            &open_job(Some(PROVIDER)),
            true,
            true
        )
        .is_ok());
    }

    #[test]
    fn live_offer_to_someone_else_is_conflict() {
        assert_matches!(
            authorize_accept(&provider(), JobStatus::Assigning, &open_job(Some(77)), true, true),
            Err(CoreError::Conflict(_))
        );
        assert!(
            authorize_accept(&provider(), JobStatus::Assigning, &open_job(Some(77)), true, false)
                .is_ok()
        );
    }

    #[test]
    fn taken_job_is_conflict() {
        assert_matches!(
            authorize_accept(&provider(), JobStatus::Assigned, &parties(), true, false),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn customer_cannot_accept_and_inactive_provider_cannot_either() {
        assert_matches!(
            authorize_accept(&customer(), JobStatus::Assigning, &open_job(None), true, false),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            authorize_accept(&provider(), JobStatus::Assigning, &open_job(None), false, false),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn accept_outside_dispatch_is_invalid_transition() {
        assert_matches!(
            authorize_accept(&provider(), JobStatus::Booked, &open_job(None), true, false),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn only_offeree_declines() {
        assert!(authorize_decline(&provider(), JobStatus::Assigning, &open_job(Some(PROVIDER))).is_ok());
        assert_matches!(
            authorize_decline(&provider(), JobStatus::Assigning, &open_job(Some(77))),
            Err(CoreError::Forbidden(_))
        );
    }

    // -----------------------------------------------------------------------
    // Cancel
    // -----------------------------------------------------------------------

    #[test]
    fn cancel_kinds_by_role() {
        assert_eq!(
            authorize_cancel(&customer(), &parties(), JobStatus::Booked).unwrap(),
            CancelKind::Customer
        );
        assert_eq!(
            authorize_cancel(&provider(), &parties(), JobStatus::Assigned).unwrap(),
            CancelKind::ProviderWithdrawal
        );
        assert_eq!(
            authorize_cancel(&admin(), &parties(), JobStatus::InProgress).unwrap(),
            CancelKind::Admin
        );
    }

    #[test]
    fn customer_cannot_cancel_mid_work() {
        assert_matches!(
            authorize_cancel(&customer(), &parties(), JobStatus::InProgress),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn terminal_job_cannot_be_cancelled() {
        assert_matches!(
            authorize_cancel(&admin(), &parties(), JobStatus::Closed),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    // -----------------------------------------------------------------------
    // Issues
    // -----------------------------------------------------------------------

    #[test]
    fn customer_issue_only_from_completed_and_freezes_payout() {
        let effects = authorize_issue(&customer(), &parties(), JobStatus::Completed).unwrap();
        assert_eq!(effects.target, JobStatus::IssueRaisedByCustomer);
        assert!(effects.freeze_payout);
        assert!(!effects.freeze_timer);
        assert_matches!(
            authorize_issue(&customer(), &parties(), JobStatus::InProgress),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn provider_issue_from_arriving_or_in_progress_freezes_timer() {
        for status in [JobStatus::Arriving, JobStatus::InProgress] {
            let effects = authorize_issue(&provider(), &parties(), status).unwrap();
            assert_eq!(effects.target, JobStatus::IssueRaisedByProvider);
            assert!(effects.freeze_timer);
            assert!(!effects.freeze_payout);
        }
        assert_matches!(
            authorize_issue(&provider(), &parties(), JobStatus::Completed),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn unassigned_provider_cannot_raise_issue() {
        assert_matches!(
            authorize_issue(&stranger_provider(), &parties(), JobStatus::InProgress),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn resolution_is_admin_only() {
        assert_matches!(
            authorize_issue_resolution(
                &customer(),
                JobStatus::ResolutionPending,
                IssueResolution::Release
            ),
            Err(CoreError::Forbidden(_))
        );
        assert!(authorize_issue_resolution(
            &admin(),
            JobStatus::ResolutionPending,
            IssueResolution::ResumeWork
        )
        .is_ok());
        assert!(authorize_issue_take_up(&admin(), JobStatus::IssueRaisedByCustomer).is_ok());
        assert_matches!(
            authorize_issue_take_up(&admin(), JobStatus::Completed),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    // -----------------------------------------------------------------------
    // Parts
    // -----------------------------------------------------------------------

    #[test]
    fn parts_request_needs_in_progress_and_no_pending_request() {
        assert!(authorize_parts_request(&provider(), &parties(), JobStatus::InProgress, None).is_ok());
        assert_matches!(
            authorize_parts_request(
                &provider(),
                &parties(),
                JobStatus::InProgress,
                Some(PartsStatus::Pending)
            ),
            Err(CoreError::Conflict(_))
        );
        assert_matches!(
            authorize_parts_request(&provider(), &parties(), JobStatus::OnSite, None),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn parts_decision_by_customer_on_pending_request() {
        assert!(authorize_parts_decision(
            &customer(),
            &parties(),
            JobStatus::PartsRequired,
            Some(PartsStatus::Pending)
        )
        .is_ok());
        assert_matches!(
            authorize_parts_decision(
                &provider(),
                &parties(),
                JobStatus::PartsRequired,
                Some(PartsStatus::Pending)
            ),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            authorize_parts_decision(
                &customer(),
                &parties(),
                JobStatus::PartsRequired,
                Some(PartsStatus::Approved)
            ),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn resume_requires_approved_parts() {
        assert!(authorize_parts_resume(
            &provider(),
            &parties(),
            JobStatus::PartsRequired,
            Some(PartsStatus::Approved)
        )
        .is_ok());
        assert_matches!(
            authorize_parts_resume(
                &provider(),
                &parties(),
                JobStatus::PartsRequired,
                Some(PartsStatus::Pending)
            ),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            authorize_parts_resume(
                &provider(),
                &parties(),
                JobStatus::InProgress,
                Some(PartsStatus::Approved)
            ),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    // -----------------------------------------------------------------------
    // Mismatch, flag
    // -----------------------------------------------------------------------

    #[test]
    fn mismatch_target_depends_on_work_started() {
        assert_eq!(
            authorize_mismatch_report(&provider(), &parties(), JobStatus::OnSite).unwrap(),
            JobStatus::ScopeMismatch
        );
        assert_eq!(
            authorize_mismatch_report(&provider(), &parties(), JobStatus::InProgress).unwrap(),
            JobStatus::MismatchPending
        );
        assert_matches!(
            authorize_mismatch_report(&provider(), &parties(), JobStatus::Arriving),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn mismatch_resolution_by_customer_or_admin() {
        for actor in [customer(), admin()] {
            assert!(authorize_mismatch_resolution(
                &actor,
                &parties(),
                JobStatus::MismatchPending,
                MismatchResolution::Upgrade
            )
            .is_ok());
        }
        assert_matches!(
            authorize_mismatch_resolution(
                &provider(),
                &parties(),
                JobStatus::ScopeMismatch,
                MismatchResolution::Rebook
            ),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn flag_from_active_statuses_only() {
        assert!(authorize_flag(&customer(), &parties(), JobStatus::Assigned).is_ok());
        assert_matches!(
            authorize_flag(&customer(), &parties(), JobStatus::Completed),
            Err(CoreError::InvalidTransition { .. })
        );
        assert_matches!(
            authorize_flag(&stranger_provider(), &parties(), JobStatus::Assigned),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn flag_resolution_targets() {
        assert_eq!(
            FlagResolution::ReturnToDispatch.target(),
            JobStatus::WaitingForDispatch
        );
        assert!(authorize_flag_resolution(
            &admin(),
            JobStatus::FlaggedReview,
            FlagResolution::CancelFree
        )
        .is_ok());
        assert_matches!(
            authorize_flag_resolution(
                &customer(),
                JobStatus::FlaggedReview,
                FlagResolution::CancelFree
            ),
            Err(CoreError::Forbidden(_))
        );
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    #[test]
    fn close_requires_both_reviews() {
        assert_matches!(
            authorize_close(&admin(), JobStatus::PaidOut, true, false),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            authorize_close(&admin(), JobStatus::PaidOut, false, true),
            Err(CoreError::Validation(_))
        );
        assert!(authorize_close(&admin(), JobStatus::PaidOut, true, true).is_ok());
    }

    #[test]
    fn frozen_payout_is_refused() {
        assert_matches!(
            authorize_payout(&admin(), JobStatus::Captured, true),
            Err(CoreError::Conflict(_))
        );
        assert!(authorize_payout(&admin(), JobStatus::Captured, false).is_ok());
    }

    #[test]
    fn customer_reviews_after_completion() {
        assert_eq!(
            authorize_review(&customer(), &parties(), JobStatus::PaidOut).unwrap(),
            ROLE_CUSTOMER
        );
        assert_matches!(
            authorize_review(&customer(), &parties(), JobStatus::InProgress),
            Err(CoreError::Validation(_))
        );
        assert_eq!(
            authorize_review(&admin(), &parties(), JobStatus::InProgress).unwrap(),
            ROLE_ADMIN
        );
    }

    #[test]
    fn scope_lock_only_by_customer_while_priced() {
        assert!(authorize_scope_lock(&customer(), &parties(), JobStatus::Priced).is_ok());
        assert!(authorize_scope_lock(&customer(), &parties(), JobStatus::RebookRequired).is_ok());
        assert_matches!(
            authorize_scope_lock(&admin(), &parties(), JobStatus::Priced),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            authorize_scope_lock(&customer(), &parties(), JobStatus::Booked),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn capture_only_from_completed() {
        assert!(authorize_capture(&admin(), JobStatus::Completed).is_ok());
        assert_matches!(
            authorize_capture(&admin(), JobStatus::IssueRaisedByCustomer),
            Err(CoreError::InvalidTransition { .. })
        );
        assert_matches!(
            authorize_capture(&customer(), JobStatus::Completed),
            Err(CoreError::Forbidden(_))
        );
    }

    // -----------------------------------------------------------------------
    // Admin dispatch controls
    // -----------------------------------------------------------------------

    #[test]
    fn reassign_needs_active_provider_and_dispatch_status() {
        assert!(authorize_reassign(&admin(), JobStatus::Assigning, true).is_ok());
        assert!(authorize_reassign(&admin(), JobStatus::WaitingForDispatch, true).is_ok());
        assert_matches!(
            authorize_reassign(&admin(), JobStatus::Assigning, false),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            authorize_reassign(&admin(), JobStatus::InProgress, true),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn override_requires_reason_and_legal_move() {
        assert_matches!(
            authorize_override(&admin(), JobStatus::Booked, JobStatus::Assigning, Some("  ")),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            authorize_override(&admin(), JobStatus::Booked, JobStatus::Completed, Some("ops")),
            Err(CoreError::InvalidTransition { .. })
        );
        assert!(
            authorize_override(&admin(), JobStatus::Booked, JobStatus::Assigning, Some("ops")).is_ok()
        );
        assert_matches!(
            authorize_override(&provider(), JobStatus::Booked, JobStatus::Assigning, Some("ops")),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn dispatch_now_refuses_unlocked_visits() {
        assert!(authorize_dispatch_now(&admin(), JobStatus::Booked, 0).is_ok());
        assert_matches!(
            authorize_dispatch_now(&admin(), JobStatus::Priced, 1),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            authorize_dispatch_now(&admin(), JobStatus::Completed, 0),
            Err(CoreError::InvalidTransition { .. })
        );
    }
}
