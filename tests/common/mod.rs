//! In-memory collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use pricewatch_lib::application::{DedupCache, SearchRegistry, SearchScheduler};
use pricewatch_lib::domain::{
    Destination, Item, NotificationSink, NotifyError, OutboundMessage, PriceVector, ProductRef,
    ProductSnapshot, SearchKey,
};
use pricewatch_lib::infrastructure::{FetchResult, MemoryKeyValueStore, PriceSource};

pub const ADMIN: i64 = 999;

/// Price source answering from a scripted queue; an empty queue is a soft miss
#[derive(Default)]
pub struct ScriptedPrices {
    replies: Mutex<VecDeque<FetchResult<Option<ProductSnapshot>>>>,
    /// Stopped while its lookup is in flight
    stop_during_lookup: Mutex<Option<(Arc<SearchRegistry>, SearchKey)>>,
    pub lookups: Mutex<Vec<ProductRef>>,
}

impl ScriptedPrices {
    pub async fn push(&self, reply: FetchResult<Option<ProductSnapshot>>) {
        self.replies.lock().await.push_back(reply);
    }

    pub async fn stop_during_lookup(&self, registry: Arc<SearchRegistry>, key: SearchKey) {
        *self.stop_during_lookup.lock().await = Some((registry, key));
    }
}

#[async_trait]
impl PriceSource for ScriptedPrices {
    async fn lookup(&self, product: &ProductRef, _cancel: &CancellationToken) -> FetchResult<Option<ProductSnapshot>> {
        self.lookups.lock().await.push(product.clone());
        if let Some((registry, key)) = self.stop_during_lookup.lock().await.take() {
            registry.remove(&key).await.unwrap();
        }
        self.replies.lock().await.pop_front().unwrap_or(Ok(None))
    }
}

/// Sink that records every delivered message
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<(Destination, OutboundMessage)>>,
}

impl RecordingSink {
    pub async fn sent_to(&self, destination: &Destination) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(d, _)| d == destination)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, destination: &Destination, message: &OutboundMessage) -> Result<(), NotifyError> {
        self.sent.lock().await.push((destination.clone(), message.clone()));
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryKeyValueStore>,
    pub registry: Arc<SearchRegistry>,
    pub source: Arc<ScriptedPrices>,
    pub sink: Arc<RecordingSink>,
    pub scheduler: Arc<SearchScheduler>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryKeyValueStore::new());
        let registry = Arc::new(SearchRegistry::new(store.clone()));
        let source = Arc::new(ScriptedPrices::default());
        let sink = Arc::new(RecordingSink::default());
        let scheduler = Arc::new(SearchScheduler::new(
            registry.clone(),
            source.clone(),
            sink.clone(),
            Arc::new(DedupCache::new(Duration::from_secs(6 * 60 * 60))),
            Some(Destination::DirectChat(ADMIN)),
            Duration::from_secs(5),
        ));
        Self {
            store,
            registry,
            source,
            sink,
            scheduler,
        }
    }
}

pub fn key(raw: &str) -> SearchKey {
    raw.parse().unwrap()
}

pub fn snapshot(prices: [f64; 5]) -> ProductSnapshot {
    ProductSnapshot {
        title: "Widget".into(),
        link: "https://www.amazon.es/dp/B07XJ8C8F5".into(),
        prices: PriceVector::new(prices),
    }
}

pub fn stored_item(min_price: f64, prices: [f64; 5]) -> Item {
    let mut item = Item::new("B07XJ8C8F5", "es");
    item.title = "Widget".into();
    item.link = "https://www.amazon.es/dp/B07XJ8C8F5".into();
    item.min_price = min_price;
    item.prices = PriceVector::new(prices);
    item
}
