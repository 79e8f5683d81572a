//! Provider eligibility and the sequential offer cursor.
//!
//! Pure functions used by the dispatch engine and the dispatch tracker. The
//! "next provider" is always derived from a freshly computed eligible list,
//! never stored as an absolute position, so providers that drop out between
//! sweeps are skipped without bookkeeping.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalogue::is_specialist_exclusive;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How long one provider holds an exclusive offer.
pub const DEFAULT_OFFER_TIMEOUT_SECS: i64 = 10;

/// How far ahead of `scheduled_at` a booked job enters dispatch.
pub const DEFAULT_ACTIVATION_LEAD_MINS: i64 = 120;

/// Provider type literals stored in `providers.provider_type`.
pub const PROVIDER_GENERALIST: &str = "generalist";
pub const PROVIDER_SPECIALIST: &str = "specialist";

/// Provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Generalist,
    Specialist,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::Generalist => PROVIDER_GENERALIST,
            ProviderType::Specialist => PROVIDER_SPECIALIST,
        }
    }

    pub fn parse(s: &str) -> Option<ProviderType> {
        match s {
            PROVIDER_GENERALIST => Some(ProviderType::Generalist),
            PROVIDER_SPECIALIST => Some(ProviderType::Specialist),
            _ => None,
        }
    }
}

/// The slice of a provider the eligibility filter needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCandidate {
    pub id: DbId,
    pub provider_type: ProviderType,
    pub capabilities: Vec<String>,
    pub categories: Vec<String>,
    pub is_active: bool,
    pub is_online: bool,
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// What a job needs from a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequirements {
    /// Union of capability tags across the job's live visits.
    pub capabilities: BTreeSet<String>,
    pub category: String,
}

fn qualifies(provider: &ProviderCandidate, req: &DispatchRequirements) -> bool {
    if req.capabilities.is_empty() {
        // Lenient fallback: no specific capability to match.
        return true;
    }
    let holds_all = req
        .capabilities
        .iter()
        .all(|cap| provider.capabilities.iter().any(|c| c == cap));
    holds_all || provider.categories.iter().any(|c| *c == req.category)
}

/// Ordered provider ids eligible for a job.
///
/// Only active, online providers are considered. Generalists are tried
/// first unless the category is specialist-exclusive; specialists are used
/// only when no generalist qualifies. Within a group, ids ascend. An empty
/// result is a normal outcome.
pub fn eligible_providers(
    pool: &[ProviderCandidate],
    req: &DispatchRequirements,
) -> Vec<DbId> {
    let pick = |kind: ProviderType| -> Vec<DbId> {
        let mut ids: Vec<DbId> = pool
            .iter()
            .filter(|p| p.is_active && p.is_online && p.provider_type == kind)
            .filter(|p| qualifies(p, req))
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        ids
    };

    if !is_specialist_exclusive(&req.category) {
        let generalists = pick(ProviderType::Generalist);
        if !generalists.is_empty() {
            return generalists;
        }
    }
    pick(ProviderType::Specialist)
}

// ---------------------------------------------------------------------------
// Offer cursor
// ---------------------------------------------------------------------------

/// Whether an offer made at `offered_at` is still exclusive at `now`.
pub fn offer_is_live(offered_at: Timestamp, now: Timestamp, timeout: chrono::Duration) -> bool {
    now - offered_at < timeout
}

/// The candidate after `current` in `eligible`, wrapping to the start.
///
/// Starts from the first candidate when there is no current offeree or the
/// current offeree is no longer eligible.
pub fn next_offeree(eligible: &[DbId], current: Option<DbId>) -> Option<DbId> {
    if eligible.is_empty() {
        return None;
    }
    let next_index = current
        .and_then(|id| eligible.iter().position(|e| *e == id))
        .map_or(0, |pos| (pos + 1) % eligible.len());
    Some(eligible[next_index])
}

/// What one dispatch step should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStep {
    /// A live offer exists; leave it alone.
    Keep(DbId),
    /// Write a fresh offer to this provider.
    Offer(DbId),
    /// Nobody is eligible; clear any stale offer pointer.
    Clear,
}

/// Current offer pointer on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferPointer {
    pub offered_to: DbId,
    pub offered_at: Timestamp,
}

/// Whether the dispatch step needs the eligible list at all.
pub fn needs_advance(
    current: Option<OfferPointer>,
    now: Timestamp,
    timeout: chrono::Duration,
) -> bool {
    !matches!(current, Some(o) if offer_is_live(o.offered_at, now, timeout))
}

/// Decide a single dispatch step.
///
/// `eligible` is only consulted when the current offer has expired or
/// there is none; `force_advance` skips the live-offer check (a decline).
pub fn plan_dispatch_step(
    current: Option<OfferPointer>,
    eligible: &[DbId],
    now: Timestamp,
    timeout: chrono::Duration,
    force_advance: bool,
) -> DispatchStep {
    if let Some(offer) = current {
        if !force_advance && offer_is_live(offer.offered_at, now, timeout) {
            return DispatchStep::Keep(offer.offered_to);
        }
    }
    match next_offeree(eligible, current.map(|o| o.offered_to)) {
        Some(id) => DispatchStep::Offer(id),
        None => DispatchStep::Clear,
    }
}

// ---------------------------------------------------------------------------
// Activation window
// ---------------------------------------------------------------------------

/// Whether a booked job should enter active dispatch at `now`.
///
/// ASAP jobs activate immediately. Scheduled jobs activate once `now` is
/// within `lead` of `scheduled_at`. A non-ASAP job with no schedule never
/// activates on its own.
pub fn should_activate(
    is_asap: bool,
    scheduled_at: Option<Timestamp>,
    now: Timestamp,
    lead: chrono::Duration,
) -> bool {
    if is_asap {
        return true;
    }
    match scheduled_at {
        Some(at) => now >= at - lead,
        None => false,
    }
}
