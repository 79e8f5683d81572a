//! Catalogue value types: job items, pricing ladders and uncertainty policy.
//!
//! The catalogue itself is read-only reference data owned elsewhere; these
//! are the shapes the pricing and dispatch logic consume.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Pence};

/// Category whose jobs only specialists may take and whose visits are
/// banded by room count instead of duration.
pub const CATEGORY_CLEANING: &str = "cleaning";

/// Categories that bypass generalist providers entirely.
pub const SPECIALIST_EXCLUSIVE_CATEGORIES: &[&str] = &[CATEGORY_CLEANING];

/// Whether `category` may only be served by specialists.
pub fn is_specialist_exclusive(category: &str) -> bool {
    SPECIALIST_EXCLUSIVE_CATEGORIES.contains(&category)
}

/// How an uncertainty-prone item reacts to an "I'm not sure" answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UncertaintyPolicy {
    Ignore,
    Buffer,
    #[serde(rename = "FORCE_H3")]
    ForceH3,
}

impl UncertaintyPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            UncertaintyPolicy::Ignore => "IGNORE",
            UncertaintyPolicy::Buffer => "BUFFER",
            UncertaintyPolicy::ForceH3 => "FORCE_H3",
        }
    }

    /// Resolution priority: higher wins when several items are triggered.
    pub fn priority(self) -> u8 {
        match self {
            UncertaintyPolicy::Ignore => 0,
            UncertaintyPolicy::Buffer => 1,
            UncertaintyPolicy::ForceH3 => 2,
        }
    }
}

impl fmt::Display for UncertaintyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UncertaintyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IGNORE" => Ok(UncertaintyPolicy::Ignore),
            "BUFFER" => Ok(UncertaintyPolicy::Buffer),
            "FORCE_H3" => Ok(UncertaintyPolicy::ForceH3),
            other => Err(format!("Unknown uncertainty policy '{other}'")),
        }
    }
}

/// A priceable unit of work in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueItem {
    pub id: DbId,
    pub display_name: String,
    pub category: String,
    pub capability_tag: String,
    pub base_minutes: i32,
    pub ladder_code: String,
    pub uncertainty_prone: bool,
    pub uncertainty_policy: UncertaintyPolicy,
    pub risk_buffer_minutes: i32,
}

/// One bracket on a pricing ladder. `max_minutes = None` is the unbounded
/// top tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTier {
    pub code: String,
    pub max_minutes: Option<i32>,
    pub price_pence: Pence,
}

impl PricingTier {
    pub fn new(code: &str, max_minutes: Option<i32>, price_pence: Pence) -> Self {
        Self {
            code: code.to_string(),
            max_minutes,
            price_pence,
        }
    }

    pub fn fits(&self, minutes: i32) -> bool {
        self.max_minutes.map_or(true, |max| max >= minutes)
    }
}

/// Sort tiers ascending by `max_minutes`, with the unbounded tier last.
pub fn sort_ladder(tiers: &mut [PricingTier]) {
    tiers.sort_by_key(|t| (t.max_minutes.is_none(), t.max_minutes.unwrap_or(i32::MAX)));
}
