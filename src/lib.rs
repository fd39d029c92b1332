//! pricewatch - marketplace price tracker
//!
//! Polls product offer pages on the supported marketplaces and notifies
//! subscribers when the new price drops below its tracked minimum or a
//! used offer undercuts the new price.

// Module declarations
pub mod application;
pub mod commands;
pub mod domain;
pub mod infrastructure;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::{DedupCache, SearchRegistry, SearchScheduler};
use crate::commands::CommandHandler;
use crate::domain::search_key::Destination;
use crate::domain::services::NotificationSink;
use crate::domain::validate_marketplaces;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::logging::log_system_info;
use crate::infrastructure::{
    ConfigManager, DocumentFetcher, EngineConfig, ExtractionEngine, FetcherConfig, HttpCaptchaSolver,
    LogNotificationSink, SessionTransport, SqliteKeyValueStore, TelegramNotificationSink, TransportConfig,
    init_logging_with_config,
};

/// Chat id used for console commands when no admin is configured
const CONSOLE_USER: i64 = 0;

/// Load configuration, wire every component and run until Ctrl-C
pub async fn run() -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load_config().await?;
    config.validate()?;

    init_logging_with_config(&config.logging)?;
    log_system_info();
    info!("Configuration loaded from {:?}", config_manager.config_path());

    validate_marketplaces().context("marketplace table is invalid")?;

    let scheduler = Arc::new(build_scheduler(&config).await?);
    let console_user = config.telegram.admin_chat_id.unwrap_or(CONSOLE_USER);
    let mut users = config.command_users();
    users.push(console_user);
    let handler = CommandHandler::new(scheduler.clone(), users);

    let cancel = CancellationToken::new();
    let polling = {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Couldn't listen for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });

    read_console_commands(&handler, console_user, &cancel).await;
    cancel.cancelled().await;
    if let Err(e) = polling.await {
        error!("Scheduler task failed: {}", e);
    }
    info!("👋 pricewatch stopped");
    Ok(())
}

async fn build_scheduler(config: &AppConfig) -> Result<SearchScheduler> {
    let store = Arc::new(SqliteKeyValueStore::connect(&config.storage.database_url).await?);

    let transport = Arc::new(SessionTransport::new(TransportConfig::from_app_config(config))?);
    let solver = Arc::new(HttpCaptchaSolver::new(config.session.captcha_service_url.clone())?);
    {
        // result is logged by the self-test itself
        let solver = solver.clone();
        tokio::spawn(async move { solver.self_test().await });
    }
    let fetcher = Arc::new(DocumentFetcher::new(transport, solver, FetcherConfig::from_app_config(config)));
    let engine = Arc::new(ExtractionEngine::new(fetcher, EngineConfig::from_app_config(config)));

    let sink: Arc<dyn NotificationSink> = match &config.telegram.bot_token {
        Some(token) if !token.trim().is_empty() => {
            Arc::new(TelegramNotificationSink::new(&config.telegram.api_base_url, token)?)
        }
        _ => {
            warn!("No bot token configured, notifications are only logged");
            Arc::new(LogNotificationSink)
        }
    };

    let registry = Arc::new(SearchRegistry::new(store));
    registry.load_persisted().await?;

    Ok(SearchScheduler::new(
        registry,
        engine,
        sink,
        Arc::new(DedupCache::new(config.tracker.dedup_ttl())),
        config.telegram.admin_chat_id.map(Destination::DirectChat),
        config.tracker.poll_interval(),
    ))
}

/// Serve commands typed on standard input until EOF or cancellation
async fn read_console_commands(handler: &CommandHandler, user_id: i64, cancel: &CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                for reply in handler.handle(user_id, &line).await {
                    println!("{reply}");
                }
            }
            Ok(None) => {
                info!("Console input closed");
                return;
            }
            Err(e) => {
                warn!("Couldn't read console input: {}", e);
                return;
            }
        }
    }
}
