//! Infrastructure layer: configuration, logging, HTTP session handling,
//! HTML parsing, extraction, persistence and outbound notifications.

pub mod captcha_solver;
pub mod config;
pub mod document_fetcher;
pub mod extraction_engine;
pub mod fetch_error;
pub mod kv_store;
pub mod logging;
pub mod parsing;
pub mod session_transport;
pub mod telegram_sink;

pub use captcha_solver::{CaptchaSolver, HttpCaptchaSolver};
pub use config::{AppConfig, ConfigManager};
pub use document_fetcher::{DocumentFetcher, DocumentSource, FetchedDocument, FetcherConfig};
pub use extraction_engine::{EngineConfig, ExtractionEngine, PriceSource};
pub use fetch_error::{FetchError, FetchResult};
pub use kv_store::{MemoryKeyValueStore, SqliteKeyValueStore};
pub use logging::{get_log_directory, init_logging_with_config};
pub use session_transport::{SessionTransport, TransportConfig};
pub use telegram_sink::{LogNotificationSink, TelegramNotificationSink};
