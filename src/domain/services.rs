//! Outbound notification interface

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::search_key::Destination;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery to {destination} failed: {reason}")]
    Delivery { destination: String, reason: String },
}

/// Inline action button attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub buttons: Vec<LinkButton>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_button(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.buttons.push(LinkButton {
            label: label.into(),
            url: url.into(),
        });
        self
    }
}

/// Delivers messages to chats and channels. Failures are reported to the
/// caller, which logs them; nothing is retried.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, destination: &Destination, message: &OutboundMessage) -> Result<(), NotifyError>;
}
