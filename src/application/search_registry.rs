//! Active search set, shared by the polling loop and the command handler
//!
//! Keys are canonical search-key strings, so iteration order is the
//! lexicographic polling order. Removals are mirrored to the store.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::item::Item;
use crate::domain::repositories::{KeyValueStore, SEARCH_BUCKET, StoreError};
use crate::domain::search_key::{Destination, SearchKey};

/// One tracked search and its last known item state
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSearch {
    pub key: SearchKey,
    pub item: Option<Item>,
}

pub struct SearchRegistry {
    entries: RwLock<BTreeMap<String, TrackedSearch>>,
    store: Arc<dyn KeyValueStore>,
}

impl SearchRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Register a search; returns false if it was already active. A store
    /// failure leaves the search inactive.
    pub async fn add(&self, key: SearchKey) -> Result<bool, StoreError> {
        let rendered = key.render();
        {
            let mut entries = self.entries.write().await;
            if entries.contains_key(&rendered) {
                return Ok(false);
            }
            entries.insert(rendered.clone(), TrackedSearch { key, item: None });
        }
        if let Err(e) = self.persist_placeholder(&rendered).await {
            self.entries.write().await.remove(&rendered);
            return Err(e);
        }
        info!("➕ Tracking {}", rendered);
        Ok(true)
    }

    async fn persist_placeholder(&self, rendered: &str) -> Result<(), StoreError> {
        if self.store.get(SEARCH_BUCKET, rendered).await?.is_none() {
            self.store.put(SEARCH_BUCKET, rendered, "null").await?;
        }
        Ok(())
    }

    /// Stop one search; returns false if it was not active. A store failure
    /// keeps the search active.
    pub async fn remove(&self, key: &SearchKey) -> Result<bool, StoreError> {
        let rendered = key.render();
        let Some(entry) = self.entries.write().await.remove(&rendered) else {
            return Ok(false);
        };
        if let Err(e) = self.store.delete(SEARCH_BUCKET, &rendered).await {
            self.entries.write().await.entry(rendered).or_insert(entry);
            return Err(e);
        }
        info!("➖ Stopped {}", rendered);
        Ok(true)
    }

    /// Stop every search, deleting each persisted key. Store failures are
    /// logged and do not keep a key active.
    pub async fn remove_all(&self) -> Vec<String> {
        let removed: Vec<String> = std::mem::take(&mut *self.entries.write().await)
            .into_keys()
            .collect();
        for key in &removed {
            if let Err(e) = self.store.delete(SEARCH_BUCKET, key).await {
                warn!("Failed to delete persisted search {}: {}", key, e);
            }
        }
        info!("🛑 Stopped all {} searches", removed.len());
        removed
    }

    /// Active keys in polling order
    pub async fn snapshot(&self) -> Vec<SearchKey> {
        self.entries.read().await.values().map(|t| t.key.clone()).collect()
    }

    pub async fn contains(&self, key: &SearchKey) -> bool {
        self.entries.read().await.contains_key(&key.render())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Record fresh item state; ignored (returns false) if the key was
    /// stopped in the meantime.
    pub async fn update(&self, key: &SearchKey, item: Item) -> bool {
        match self.entries.write().await.get_mut(&key.render()) {
            Some(entry) => {
                entry.item = Some(item);
                true
            }
            None => false,
        }
    }

    pub async fn entries(&self) -> Vec<TrackedSearch> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn entries_for(&self, destination: &Destination) -> Vec<TrackedSearch> {
        self.entries
            .read()
            .await
            .values()
            .filter(|t| &t.key.destination == destination)
            .cloned()
            .collect()
    }

    /// Reload persisted searches. Unparseable keys are logged and left in
    /// the store untouched; keys stored in a non-canonical spelling are
    /// moved to their canonical key.
    pub async fn load_persisted(&self) -> Result<usize, StoreError> {
        let keys = self.store.keys(SEARCH_BUCKET).await?;
        let mut loaded = 0;
        for raw in keys {
            let key = match raw.parse::<SearchKey>() {
                Ok(key) => key,
                Err(e) => {
                    warn!("Skipping persisted search {:?}: {}", raw, e);
                    continue;
                }
            };
            let rendered = key.render();
            let value = if rendered == raw {
                self.store.get(SEARCH_BUCKET, &raw).await?
            } else {
                self.canonicalize(&raw, &rendered).await?
            };
            let item = value.and_then(|value| match decode_item(&rendered, &value) {
                Ok(item) => item,
                Err(e) => {
                    warn!("Ignoring item state: {}", e);
                    None
                }
            });
            let previous = self
                .entries
                .write()
                .await
                .insert(rendered, TrackedSearch { key, item });
            if previous.is_none() {
                loaded += 1;
            }
        }
        info!("📂 Loaded {} persisted searches", loaded);
        Ok(loaded)
    }

    /// Move the value stored under `raw` to `canonical` and drop `raw`. An
    /// existing canonical value wins.
    async fn canonicalize(&self, raw: &str, canonical: &str) -> Result<Option<String>, StoreError> {
        let existing = self.store.get(SEARCH_BUCKET, canonical).await?;
        let value = match existing {
            Some(value) => Some(value),
            None => {
                let value = self.store.get(SEARCH_BUCKET, raw).await?;
                if let Some(value) = &value {
                    self.store.put(SEARCH_BUCKET, canonical, value).await?;
                }
                value
            }
        };
        self.store.delete(SEARCH_BUCKET, raw).await?;
        info!("Persisted search {:?} renamed to {}", raw, canonical);
        Ok(value)
    }
}

/// Decode a stored item value; `null` means nothing stored yet
pub fn decode_item(key: &str, value: &str) -> Result<Option<Item>, StoreError> {
    serde_json::from_str::<Option<Item>>(value).map_err(|e| StoreError::Malformed {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
