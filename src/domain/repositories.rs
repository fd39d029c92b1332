//! Persistence collaborator interface
//!
//! Tracked searches and per-user settings live in a bucketed key-value
//! store. Values are opaque strings (JSON in practice).

use async_trait::async_trait;
use thiserror::Error;

/// Bucket holding tracked searches, keyed by canonical search key
pub const SEARCH_BUCKET: &str = "db";

/// Bucket holding per-user default destinations, keyed by user id
pub const CONFIG_BUCKET: &str = "config";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored value for {key} is malformed: {reason}")]
    Malformed { key: String, reason: String },
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<String>, StoreError>;
    async fn put(&self, bucket: &str, key: &str, value: &str) -> Result<(), StoreError>;
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
    async fn keys(&self, bucket: &str) -> Result<Vec<String>, StoreError>;
}
