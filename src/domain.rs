//! Domain module - core types and policies
//!
//! Item state, search keys, the marketplace table, the price decision
//! policy and the collaborator interfaces. Nothing here performs I/O.

pub mod events;
pub mod item;
pub mod marketplace;
pub mod price_policy;
pub mod repositories;
pub mod search_key;
pub mod services;

pub use events::NotificationEvent;
pub use item::{ConditionTier, Item, PriceVector, ProductSnapshot, TIER_COUNT};
pub use marketplace::{LocationMethod, Marketplace, validate_marketplaces};
pub use price_policy::{PriceDecision, TierAlert, evaluate};
pub use repositories::{CONFIG_BUCKET, KeyValueStore, SEARCH_BUCKET, StoreError};
pub use search_key::{Destination, ProductRef, SearchKey, SearchKeyError};
pub use services::{LinkButton, NotificationSink, NotifyError, OutboundMessage};
