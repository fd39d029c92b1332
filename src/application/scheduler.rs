//! Polling loop over every active search
//!
//! Keys are processed one at a time in sorted order; the transport's
//! pacing is the only throttle. Per-key failures are reported and never
//! stop the loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::dedup_cache::DedupCache;
use crate::application::messages::render_event;
use crate::application::search_registry::{SearchRegistry, decode_item};
use crate::domain::events::NotificationEvent;
use crate::domain::item::Item;
use crate::domain::price_policy::evaluate;
use crate::domain::repositories::SEARCH_BUCKET;
use crate::domain::search_key::{Destination, SearchKey};
use crate::domain::services::{NotificationSink, OutboundMessage};
use crate::infrastructure::extraction_engine::PriceSource;
use crate::infrastructure::fetch_error::FetchError;

pub struct SearchScheduler {
    registry: Arc<SearchRegistry>,
    source: Arc<dyn PriceSource>,
    sink: Arc<dyn NotificationSink>,
    dedup: Arc<DedupCache>,
    /// Receives operational failures
    admin: Option<Destination>,
    poll_interval: Duration,
    last_cycle: RwLock<Option<Duration>>,
}

impl SearchScheduler {
    pub fn new(
        registry: Arc<SearchRegistry>,
        source: Arc<dyn PriceSource>,
        sink: Arc<dyn NotificationSink>,
        dedup: Arc<DedupCache>,
        admin: Option<Destination>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry,
            source,
            sink,
            dedup,
            admin,
            poll_interval,
            last_cycle: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<SearchRegistry> {
        &self.registry
    }

    /// Duration of the last completed cycle
    pub async fn last_cycle(&self) -> Option<Duration> {
        *self.last_cycle.read().await
    }

    /// Poll until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        info!("🚀 Search scheduler started (interval {:?})", self.poll_interval);
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let started = Instant::now();
            let processed = self.run_cycle(&cancel).await;
            let elapsed = started.elapsed();
            *self.last_cycle.write().await = Some(elapsed);
            debug!("Cycle finished: {} searches in {:?}", processed, elapsed);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        info!("🛑 Search scheduler stopped");
    }

    /// One pass over the current snapshot; returns how many keys were processed
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> usize {
        let mut processed = 0;
        for key in self.registry.snapshot().await {
            if cancel.is_cancelled() {
                break;
            }
            // may have been stopped while earlier keys were processed
            if !self.registry.contains(&key).await {
                continue;
            }
            self.process_key(&key, cancel).await;
            processed += 1;
        }
        processed
    }

    /// Extract, decide, notify and persist one search. Returns the number
    /// of notifications delivered.
    pub async fn process_key(&self, key: &SearchKey, cancel: &CancellationToken) -> usize {
        let rendered = key.render();
        debug!("Searching {}", rendered);

        let Some(stored) = self.load_item(&rendered).await else {
            return 0;
        };

        let snapshot = match self.source.lookup(&key.product, cancel).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return 0,
            Err(FetchError::Cancelled) => return 0,
            Err(e) => {
                self.report(format!("{rendered}: {e}")).await;
                return 0;
            }
        };

        let decision = evaluate(&key.product, stored.as_ref(), &snapshot, key.max_tier);
        let mut delivered = 0;
        for alert in &decision.alerts {
            let event = NotificationEvent {
                destination: key.destination.clone(),
                item: decision.item.clone(),
                tier: alert.tier,
                price: alert.price,
                reference: alert.reference,
            };
            if !self
                .dedup
                .should_notify(&event.destination, &event.item.qualified_id(), event.tier, event.price)
                .await
            {
                debug!("Duplicate notification suppressed for {} ({})", rendered, event.tier);
                continue;
            }
            info!(key = %rendered, tier = %event.tier, price = event.price, "💰 Price alert");
            match self.sink.send(&event.destination, &render_event(&event)).await {
                Ok(()) => delivered += 1,
                Err(e) => self.report(format!("couldn't notify {}: {}", rendered, e)).await,
            }
        }

        self.store_item(key, &rendered, decision.item).await;
        delivered
    }

    /// Stored item for a key. `Some(None)` means nothing usable is stored
    /// yet; `None` means the store failed and the key is skipped.
    async fn load_item(&self, rendered: &str) -> Option<Option<Item>> {
        let store = self.registry.store();
        match store.get(SEARCH_BUCKET, rendered).await {
            Ok(Some(value)) => match decode_item(rendered, &value) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Discarding item state: {}", e);
                    Some(None)
                }
            },
            Ok(None) => {
                if let Err(e) = store.put(SEARCH_BUCKET, rendered, "null").await {
                    self.report(format!("couldn't store {rendered}: {e}")).await;
                    return None;
                }
                Some(None)
            }
            Err(e) => {
                self.report(format!("couldn't load {rendered}: {e}")).await;
                None
            }
        }
    }

    async fn store_item(&self, key: &SearchKey, rendered: &str, item: Item) {
        let value = match serde_json::to_string(&item) {
            Ok(value) => value,
            Err(e) => {
                self.report(format!("couldn't encode {rendered}: {e}")).await;
                return;
            }
        };
        if !self.registry.update(key, item).await {
            debug!("{} was stopped during the cycle, not persisting", rendered);
            return;
        }

        let store = self.registry.store();
        if let Err(e) = store.put(SEARCH_BUCKET, rendered, &value).await {
            self.report(format!("couldn't store {rendered}: {e}")).await;
            return;
        }
        // a stop that raced the write must not leave the key behind
        if !self.registry.contains(key).await {
            if let Err(e) = store.delete(SEARCH_BUCKET, rendered).await {
                warn!("Failed to delete stopped search {}: {}", rendered, e);
            }
        }
    }

    /// Log an operational failure and forward it to the admin chat
    pub async fn report(&self, text: String) {
        error!("{}", text);
        if let Some(admin) = &self.admin {
            if let Err(e) = self.sink.send(admin, &OutboundMessage::text(text)).await {
                warn!("Couldn't report to admin: {}", e);
            }
        }
    }
}
