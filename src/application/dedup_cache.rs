//! Short-lived notification fingerprints
//!
//! The same (destination, item, tier, price) event is announced at most
//! once per TTL window. Entries expire by age only.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::item::ConditionTier;
use crate::domain::search_key::Destination;

pub struct DedupCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// `dest/item/tier/cents`; price rounded to the minor currency unit
    pub fn fingerprint(destination: &Destination, item_id: &str, tier: ConditionTier, price: f64) -> String {
        let cents = (price * 100.0).round() as i64;
        format!("{}/{}/{}/{}", destination, item_id, tier.index(), cents)
    }

    /// True the first time a fingerprint is seen within the TTL window;
    /// the fingerprint is recorded on a true result.
    pub async fn should_notify(&self, destination: &Destination, item_id: &str, tier: ConditionTier, price: f64) -> bool {
        let key = Self::fingerprint(destination, item_id, tier, price);
        let now = Instant::now();

        let mut entries = self.entries.lock().await;
        entries.retain(|_, recorded| now.duration_since(*recorded) < self.ttl);
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, now);
        true
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
