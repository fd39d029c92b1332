//! Tracked item state and the per-condition price vector
//!
//! A product is offered in five condition tiers (new plus four used grades).
//! Prices are kept in a fixed-size vector indexed by [`ConditionTier`] so a
//! tier can never be addressed by a bare, possibly out-of-range integer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Number of condition tiers tracked per item
pub const TIER_COUNT: usize = 5;

/// Offer condition, ordered best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConditionTier {
    New,
    LikeNew,
    VeryGood,
    Good,
    Acceptable,
}

impl ConditionTier {
    pub const ALL: [ConditionTier; TIER_COUNT] = [
        ConditionTier::New,
        ConditionTier::LikeNew,
        ConditionTier::VeryGood,
        ConditionTier::Good,
        ConditionTier::Acceptable,
    ];

    /// Worst tier; the default cap for a search
    pub const WORST: ConditionTier = ConditionTier::Acceptable;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn is_used(self) -> bool {
        self != ConditionTier::New
    }

    /// Tiers from `New` up to and including `max`
    pub fn up_to(max: ConditionTier) -> impl Iterator<Item = ConditionTier> {
        Self::ALL.into_iter().take(max.index() + 1)
    }
}

impl fmt::Display for ConditionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConditionTier::New => "new",
            ConditionTier::LikeNew => "used - like new",
            ConditionTier::VeryGood => "used - very good",
            ConditionTier::Good => "used - good",
            ConditionTier::Acceptable => "used - acceptable",
        };
        f.write_str(name)
    }
}

/// Minimum total price (item + delivery) per tier. `0.0` means the tier was
/// not observed, never that the offer is free.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceVector([f64; TIER_COUNT]);

impl PriceVector {
    pub fn new(prices: [f64; TIER_COUNT]) -> Self {
        Self(prices)
    }

    /// True when no tier carries a price
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|p| *p <= 0.0)
    }

    /// Record `price` for `tier` if it beats the current minimum
    pub fn offer(&mut self, tier: ConditionTier, price: f64) {
        if price <= 0.0 {
            return;
        }
        let slot = &mut self.0[tier.index()];
        if *slot == 0.0 || price < *slot {
            *slot = price;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConditionTier, f64)> + '_ {
        ConditionTier::ALL.into_iter().map(|tier| (tier, self.0[tier.index()]))
    }

    pub fn as_array(&self) -> &[f64; TIER_COUNT] {
        &self.0
    }
}

impl Index<ConditionTier> for PriceVector {
    type Output = f64;

    fn index(&self, tier: ConditionTier) -> &f64 {
        &self.0[tier.index()]
    }
}

impl IndexMut<ConditionTier> for PriceVector {
    fn index_mut(&mut self, tier: ConditionTier) -> &mut f64 {
        &mut self.0[tier.index()]
    }
}

impl fmt::Display for PriceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| format!("{p:.2}")).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Facts extracted from one successful polling pass
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSnapshot {
    pub title: String,
    pub link: String,
    pub prices: PriceVector,
}

/// Persisted state of a tracked product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub domain: String,
    pub link: String,
    pub title: String,
    /// All-time minimum observed for the `New` tier; `0.0` until first seen
    pub min_price: f64,
    pub prices: PriceVector,
}

impl Item {
    pub fn new(id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            link: String::new(),
            title: String::new(),
            min_price: 0.0,
            prices: PriceVector::default(),
        }
    }

    /// `<code>.<domain>`, the identity used in dedup fingerprints
    pub fn qualified_id(&self) -> String {
        format!("{}.{}", self.id, self.domain)
    }
}
