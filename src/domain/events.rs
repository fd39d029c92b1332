//! Notification events emitted by the polling loop

use crate::domain::item::{ConditionTier, Item};
use crate::domain::search_key::Destination;

/// A price event for one destination, before dedup and delivery
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub destination: Destination,
    /// Item state after the snapshot was merged
    pub item: Item,
    pub tier: ConditionTier,
    pub price: f64,
    /// Previous minimum for `New`, current new-condition minimum otherwise
    pub reference: f64,
}

impl NotificationEvent {
    pub fn is_price_drop(&self) -> bool {
        self.tier == ConditionTier::New
    }
}
