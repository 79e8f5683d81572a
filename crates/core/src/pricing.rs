//! Visit pricing and scope-lock computation.
//!
//! Turns a list of catalogue items into capability-homogeneous visit drafts,
//! prices each draft on its ladder, and computes the one-time scope lock
//! (uncertainty handling, cleaning room banding, contract text).
//!
//! Everything here is deterministic: the same items, ladder and answers
//! always produce the same tier and price.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::catalogue::{CatalogueItem, PricingTier, UncertaintyPolicy, CATEGORY_CLEANING};
use crate::error::CoreError;
use crate::money::format_pence;
use crate::types::{DbId, Pence};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Answers (trimmed, case-folded) that signal the customer is unsure.
pub const UNCERTAIN_ANSWERS: &[&str] = &[
    "not sure",
    "not_sure",
    "unsure",
    "don't know",
    "dont know",
    "unknown",
    "?",
];

/// Answer keys read for cleaning room banding.
pub const ANSWER_BEDROOMS: &str = "bedrooms";
pub const ANSWER_BATHROOMS: &str = "bathrooms";

/// Cleaning bands: (max rooms inclusive, tier code). Above the last band the
/// top tier code applies.
const CLEANING_BANDS: &[(u32, &str)] = &[(2, "H1"), (4, "H2")];
const CLEANING_TOP_BAND: &str = "H3";

/// Maximum number of answers accepted on one scope lock.
const MAX_ANSWERS: usize = 50;

/// Maximum length of a single answer key or value.
const MAX_ANSWER_LEN: usize = 500;

/// Scope answers, ordered by question key for deterministic contract text.
pub type ScopeAnswers = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Tier lookup
// ---------------------------------------------------------------------------

/// Tier and price selected on a ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierPrice {
    pub tier_code: String,
    pub price_pence: Pence,
}

impl From<&PricingTier> for TierPrice {
    fn from(tier: &PricingTier) -> Self {
        Self {
            tier_code: tier.code.clone(),
            price_pence: tier.price_pence,
        }
    }
}

/// Select the first tier whose `max_minutes >= minutes` on an ascending
/// ladder, or the highest tier when none fits.
pub fn calculate_tier_and_price(
    minutes: i32,
    ladder: &[PricingTier],
) -> Result<TierPrice, CoreError> {
    let tier = ladder
        .iter()
        .find(|t| t.fits(minutes))
        .or_else(|| ladder.last())
        .ok_or_else(|| CoreError::Internal("Pricing ladder has no tiers".to_string()))?;
    Ok(TierPrice::from(tier))
}

/// The highest tier on a ladder.
pub fn top_tier(ladder: &[PricingTier]) -> Result<&PricingTier, CoreError> {
    ladder
        .last()
        .ok_or_else(|| CoreError::Internal("Pricing ladder has no tiers".to_string()))
}

fn tier_by_code<'a>(ladder: &'a [PricingTier], code: &str) -> Result<&'a PricingTier, CoreError> {
    ladder
        .iter()
        .find(|t| t.code == code)
        .ok_or_else(|| CoreError::Internal(format!("Pricing ladder has no tier '{code}'")))
}

// ---------------------------------------------------------------------------
// Visit building
// ---------------------------------------------------------------------------

/// A priced, not-yet-locked visit covering one capability group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitDraft {
    pub capability_tag: String,
    pub category: String,
    pub ladder_code: String,
    pub primary_item_id: DbId,
    pub addon_item_ids: Vec<DbId>,
    pub base_minutes: i32,
    pub tier_code: String,
    pub price_pence: Pence,
}

/// Group `items` by capability tag and price each group on its ladder.
///
/// Groups keep the order in which their capability first appears; the first
/// item in a group is its primary item, the rest are add-ons. A group is
/// priced on its primary item's ladder.
pub fn build_visits(
    items: &[CatalogueItem],
    ladders: &HashMap<String, Vec<PricingTier>>,
) -> Result<Vec<VisitDraft>, CoreError> {
    if items.is_empty() {
        return Err(CoreError::Validation(
            "At least one job item is required".to_string(),
        ));
    }

    let mut groups: Vec<Vec<&CatalogueItem>> = Vec::new();
    for item in items {
        match groups
            .iter_mut()
            .find(|g| g[0].capability_tag == item.capability_tag)
        {
            Some(group) => group.push(item),
            None => groups.push(vec![item]),
        }
    }

    groups
        .into_iter()
        .map(|group| {
            let primary = group[0];
            let ladder = ladders.get(&primary.ladder_code).ok_or_else(|| {
                CoreError::Internal(format!("Unknown pricing ladder '{}'", primary.ladder_code))
            })?;
            let base_minutes: i32 = group.iter().map(|i| i.base_minutes).sum();
            let priced = calculate_tier_and_price(base_minutes, ladder)?;
            Ok(VisitDraft {
                capability_tag: primary.capability_tag.clone(),
                category: primary.category.clone(),
                ladder_code: primary.ladder_code.clone(),
                primary_item_id: primary.id,
                addon_item_ids: group[1..].iter().map(|i| i.id).collect(),
                base_minutes,
                tier_code: priced.tier_code,
                price_pence: priced.price_pence,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Uncertainty
// ---------------------------------------------------------------------------

/// Whether a single answer signals uncertainty.
pub fn answer_signals_uncertainty(answer: &str) -> bool {
    let normalised = answer.trim().to_lowercase();
    UNCERTAIN_ANSWERS.contains(&normalised.as_str())
}

/// Whether any answer signals uncertainty.
pub fn answers_signal_uncertainty(answers: &ScopeAnswers) -> bool {
    answers.values().any(|a| answer_signals_uncertainty(a))
}

/// Result of resolving uncertainty across all items of a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncertaintyOutcome {
    /// Nothing triggered, or every triggered item ignores uncertainty.
    Unchanged,
    /// Add the summed risk buffers of every triggered BUFFER item.
    Buffer { extra_minutes: i32 },
    /// At least one triggered item forces the top tier; wins over buffers.
    ForceTopTier,
}

/// Resolve the uncertainty policy for a visit.
///
/// Only uncertainty-prone items take part, and only when `uncertain` is set.
/// The strongest policy among them decides the outcome: `FORCE_H3` beats
/// `BUFFER` beats `IGNORE`.
pub fn resolve_uncertainty(items: &[&CatalogueItem], uncertain: bool) -> UncertaintyOutcome {
    if !uncertain {
        return UncertaintyOutcome::Unchanged;
    }
    let triggered: Vec<&CatalogueItem> = items
        .iter()
        .copied()
        .filter(|i| i.uncertainty_prone)
        .collect();

    let strongest = triggered
        .iter()
        .map(|i| i.uncertainty_policy)
        .max_by_key(|p| p.priority())
        .unwrap_or(UncertaintyPolicy::Ignore);

    match strongest {
        UncertaintyPolicy::ForceH3 => UncertaintyOutcome::ForceTopTier,
        UncertaintyPolicy::Buffer => UncertaintyOutcome::Buffer {
            extra_minutes: triggered
                .iter()
                .filter(|i| i.uncertainty_policy == UncertaintyPolicy::Buffer)
                .map(|i| i.risk_buffer_minutes.max(0))
                .sum(),
        },
        UncertaintyPolicy::Ignore => UncertaintyOutcome::Unchanged,
    }
}

// ---------------------------------------------------------------------------
// Cleaning room banding
// ---------------------------------------------------------------------------

fn room_count(answers: &ScopeAnswers, key: &str) -> Result<u32, CoreError> {
    let raw = answers
        .get(key)
        .ok_or_else(|| CoreError::Validation(format!("Cleaning visits require a '{key}' answer")))?;
    raw.trim().parse::<u32>().map_err(|_| {
        CoreError::Validation(format!(
            "Answer '{key}' must be a whole number of rooms, got '{raw}'"
        ))
    })
}

/// Tier code for a cleaning visit with `rooms` bedrooms plus bathrooms.
pub fn cleaning_band(rooms: u32) -> &'static str {
    CLEANING_BANDS
        .iter()
        .find(|(max, _)| rooms <= *max)
        .map(|(_, code)| *code)
        .unwrap_or(CLEANING_TOP_BAND)
}

// ---------------------------------------------------------------------------
// Scope lock
// ---------------------------------------------------------------------------

/// Validate the shape of scope answers before any pricing happens.
pub fn validate_answers(answers: &ScopeAnswers) -> Result<(), CoreError> {
    if answers.len() > MAX_ANSWERS {
        return Err(CoreError::Validation(format!(
            "At most {MAX_ANSWERS} answers may be supplied"
        )));
    }
    for (key, value) in answers {
        if key.trim().is_empty() {
            return Err(CoreError::Validation(
                "Answer keys must not be empty".to_string(),
            ));
        }
        if key.len() > MAX_ANSWER_LEN || value.len() > MAX_ANSWER_LEN {
            return Err(CoreError::Validation(format!(
                "Answers must not exceed {MAX_ANSWER_LEN} characters"
            )));
        }
    }
    Ok(())
}

/// Inputs to a scope lock for one visit.
#[derive(Debug)]
pub struct ScopeLockInput<'a> {
    pub category: &'a str,
    pub base_minutes: i32,
    /// Primary item first, then add-ons.
    pub items: &'a [CatalogueItem],
    /// The visit's ladder, ascending by `max_minutes`.
    pub ladder: &'a [PricingTier],
    pub answers: &'a ScopeAnswers,
}

/// Final tier, price and contract text for a locked visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeLockOutcome {
    pub effective_minutes: i32,
    pub extra_minutes: i32,
    pub tier_code: String,
    pub price_pence: Pence,
    pub forced_top_tier: bool,
    pub contract_text: String,
}

/// Compute the scope lock for a visit.
pub fn compute_scope_lock(input: &ScopeLockInput<'_>) -> Result<ScopeLockOutcome, CoreError> {
    validate_answers(input.answers)?;

    let (effective_minutes, extra_minutes, priced, forced_top_tier) =
        if input.category == CATEGORY_CLEANING {
            let rooms = room_count(input.answers, ANSWER_BEDROOMS)?
                + room_count(input.answers, ANSWER_BATHROOMS)?;
            let tier = tier_by_code(input.ladder, cleaning_band(rooms))?;
            let minutes = tier.max_minutes.unwrap_or(input.base_minutes);
            (minutes, 0, TierPrice::from(tier), false)
        } else {
            let item_refs: Vec<&CatalogueItem> = input.items.iter().collect();
            let uncertain = answers_signal_uncertainty(input.answers);
            match resolve_uncertainty(&item_refs, uncertain) {
                UncertaintyOutcome::ForceTopTier => {
                    let top = top_tier(input.ladder)?;
                    let minutes = top
                        .max_minutes
                        .map_or(input.base_minutes, |max| max.max(input.base_minutes));
                    (minutes, minutes - input.base_minutes, TierPrice::from(top), true)
                }
                UncertaintyOutcome::Buffer { extra_minutes } => {
                    let minutes = input.base_minutes + extra_minutes;
                    let priced = calculate_tier_and_price(minutes, input.ladder)?;
                    (minutes, extra_minutes, priced, false)
                }
                UncertaintyOutcome::Unchanged => {
                    let priced = calculate_tier_and_price(input.base_minutes, input.ladder)?;
                    (input.base_minutes, 0, priced, false)
                }
            }
        };

    let contract_text = contract_text(
        input.items,
        &priced.tier_code,
        effective_minutes,
        priced.price_pence,
        input.answers,
    );

    Ok(ScopeLockOutcome {
        effective_minutes,
        extra_minutes,
        tier_code: priced.tier_code,
        price_pence: priced.price_pence,
        forced_top_tier,
        contract_text,
    })
}

/// Deterministic customer-facing contract text for a locked visit.
pub fn contract_text(
    items: &[CatalogueItem],
    tier_code: &str,
    effective_minutes: i32,
    price_pence: Pence,
    answers: &ScopeAnswers,
) -> String {
    let names: Vec<&str> = items.iter().map(|i| i.display_name.as_str()).collect();
    let mut text = format!(
        "Scope: {}. Tier {tier_code} covering up to {effective_minutes} minutes at {}.",
        names.join(", "),
        format_pence(price_pence),
    );
    if !answers.is_empty() {
        let pairs: Vec<String> = answers.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        text.push_str(&format!(" Answers: {}.", pairs.join("; ")));
    }
    text
}

// ---------------------------------------------------------------------------
// Scope mismatch upgrade
// ---------------------------------------------------------------------------

/// Re-price a locked visit after the provider reports more work on site.
///
/// Recomputes on the ladder at `current_minutes + additional_minutes`. The
/// price never drops below the locked price: a visit already forced to the
/// top tier keeps it.
pub fn upgrade_for_mismatch(
    current_minutes: i32,
    current: &TierPrice,
    additional_minutes: i32,
    ladder: &[PricingTier],
) -> Result<(i32, TierPrice), CoreError> {
    if additional_minutes <= 0 {
        return Err(CoreError::Validation(
            "additional_minutes must be positive".to_string(),
        ));
    }
    let minutes = current_minutes + additional_minutes;
    let recomputed = calculate_tier_and_price(minutes, ladder)?;
    if recomputed.price_pence >= current.price_pence {
        Ok((minutes, recomputed))
    } else {
        Ok((minutes, current.clone()))
    }
}
