//! Simulated payment settlement: ledger kinds, platform fee and
//! cancellation charging.
//!
//! No gateway is involved; the ledger rows are the whole payment record.

use crate::job_status::JobStatus;
use crate::money::percent_of;
use crate::types::Pence;

/// Platform commission withheld from each payout.
pub const PLATFORM_FEE_PERCENT: i64 = 15;

/// Flat fee charged when a customer cancels after a provider is assigned.
pub const CANCELLATION_FEE_PENCE: Pence = 1_500;

text_enum! {
    /// Ledger entry kind.
    TransactionKind {
        Charge => "CHARGE",
        Payout => "PAYOUT",
        Fee => "FEE",
    }
}

text_enum! {
    /// Ledger entry state.
    TransactionStatus {
        Pending => "PENDING",
        Completed => "COMPLETED",
    }
}

/// Split a captured price into `(provider payout, platform fee)`.
pub fn split_payout(price: Pence) -> (Pence, Pence) {
    let fee = percent_of(price, PLATFORM_FEE_PERCENT);
    (price - fee, fee)
}

/// Outcome of cancelling a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationOutcome {
    pub status: JobStatus,
    /// Fee to record, if the cancellation is charged.
    pub fee_pence: Option<Pence>,
}

/// Decide whether a cancellation is free or charged.
///
/// Free while no provider is attached (or when an administrator waives it),
/// otherwise charged `min(CANCELLATION_FEE_PENCE, price)`. A zero fee is
/// always free.
pub fn cancellation_outcome(
    provider_assigned: bool,
    price: Pence,
    waive_fee: bool,
) -> CancellationOutcome {
    let fee = CANCELLATION_FEE_PENCE.min(price.max(0));
    if !provider_assigned || waive_fee || fee == 0 {
        CancellationOutcome {
            status: JobStatus::CancelledFree,
            fee_pence: None,
        }
    } else {
        CancellationOutcome {
            status: JobStatus::CancelledCharged,
            fee_pence: Some(fee),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payout_withholds_platform_fee() {
        assert_eq!(split_payout(15_000), (12_750, 2_250));
        let (payout, fee) = split_payout(6_900);
        assert_eq!(payout + fee, 6_900);
    }

    #[test]
    fn cancellation_is_free_before_assignment() {
        let outcome = cancellation_outcome(false, 9_900, false);
        assert_eq!(outcome.status, JobStatus::CancelledFree);
        assert_eq!(outcome.fee_pence, None);
    }

    #[test]
    fn cancellation_after_assignment_is_charged() {
        let outcome = cancellation_outcome(true, 9_900, false);
        assert_eq!(outcome.status, JobStatus::CancelledCharged);
        assert_eq!(outcome.fee_pence, Some(CANCELLATION_FEE_PENCE));
    }

    #[test]
    fn fee_is_capped_at_price() {
        assert_eq!(cancellation_outcome(true, 1_000, false).fee_pence, Some(1_000));
    }

    #[test]
    fn waived_or_zero_price_is_free() {
        assert_eq!(
            cancellation_outcome(true, 9_900, true).status,
            JobStatus::CancelledFree
        );
        assert_eq!(cancellation_outcome(true, 0, false).status, JobStatus::CancelledFree);
    }
}
