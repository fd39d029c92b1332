//! Application layer: the polling loop and the state it shares with the
//! command handler.

pub mod dedup_cache;
pub mod messages;
pub mod scheduler;
pub mod search_registry;

pub use dedup_cache::DedupCache;
pub use scheduler::SearchScheduler;
pub use search_registry::{SearchRegistry, TrackedSearch};
