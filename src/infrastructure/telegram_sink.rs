//! Notification sinks
//!
//! Telegram Bot API delivery for the running service, and a log-only sink
//! used when no bot token is configured.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::search_key::Destination;
use crate::domain::services::{NotificationSink, NotifyError, OutboundMessage};

/// Pause after every send to stay under the Bot API flood limits
const SEND_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotificationSink {
    client: Client,
    endpoint: String,
}

impl TelegramNotificationSink {
    pub fn new(api_base_url: &str, bot_token: &str) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::Delivery {
                destination: "telegram".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base_url.trim_end_matches('/'), bot_token),
        })
    }

    async fn deliver(&self, destination: &Destination, message: &OutboundMessage) -> Result<(), NotifyError> {
        let failed = |reason: String| NotifyError::Delivery {
            destination: destination.to_string(),
            reason,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&send_message_payload(destination, message))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("status {status}: {e}")))?;
        if !body.ok {
            return Err(failed(body.description.unwrap_or_else(|| format!("status {status}"))));
        }
        debug!("Message delivered to {}", destination);
        Ok(())
    }
}

/// `sendMessage` request body
pub fn send_message_payload(destination: &Destination, message: &OutboundMessage) -> Value {
    let chat_id = match destination {
        Destination::Channel(handle) => json!(handle),
        Destination::DirectChat(id) => json!(id),
    };
    let mut payload = json!({
        "chat_id": chat_id,
        "text": message.text,
        "disable_web_page_preview": true,
    });
    if !message.buttons.is_empty() {
        let row: Vec<Value> = message
            .buttons
            .iter()
            .map(|b| json!({ "text": b.label, "url": b.url }))
            .collect();
        payload["reply_markup"] = json!({ "inline_keyboard": [row] });
    }
    payload
}

#[async_trait]
impl NotificationSink for TelegramNotificationSink {
    async fn send(&self, destination: &Destination, message: &OutboundMessage) -> Result<(), NotifyError> {
        let result = self.deliver(destination, message).await;
        tokio::time::sleep(SEND_PAUSE).await;
        result
    }
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send(&self, destination: &Destination, message: &OutboundMessage) -> Result<(), NotifyError> {
        info!(destination = %destination, "📨 {}", message.text);
        Ok(())
    }
}
