//! Chat command handling
//!
//! Front-end agnostic: a user id and the raw message text come in, reply
//! lines go out. Only allow-listed users are served.
//!
//! | input                   | effect                                   |
//! |-------------------------|------------------------------------------|
//! | pasted product link     | track it for the caller's default chat   |
//! | `/search <args>`        | track one search                         |
//! | `/batch <line>…`        | track one search per line                |
//! | `/stop <args>`, `/stop *` | stop one search, or all of them        |
//! | `/status`, `/status *`  | list the caller's searches, or all       |
//! | `/export`               | every active key as a `/batch` command   |
//! | `/chat [destination]`   | read or set the caller's default chat    |

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::messages::status_line;
use crate::application::scheduler::SearchScheduler;
use crate::domain::repositories::CONFIG_BUCKET;
use crate::domain::search_key::{Destination, ProductRef, SearchKey};

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Search(String),
    Batch(String),
    Stop(String),
    Status(String),
    Export,
    Unknown(String),
}

impl Command {
    /// Parse `/name[@bot] args…`; `None` for plain text
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (name, args) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };
        let name = name.split('@').next().unwrap_or(name).to_lowercase();
        let args = args.to_string();
        Some(match name.as_str() {
            "chat" => Command::Chat(args),
            "search" => Command::Search(args),
            "batch" => Command::Batch(args),
            "stop" => Command::Stop(args),
            "status" => Command::Status(args),
            "export" => Command::Export,
            _ => Command::Unknown(name),
        })
    }
}

pub struct CommandHandler {
    scheduler: Arc<SearchScheduler>,
    allowed_users: HashSet<i64>,
}

impl CommandHandler {
    pub fn new(scheduler: Arc<SearchScheduler>, allowed_users: impl IntoIterator<Item = i64>) -> Self {
        Self {
            scheduler,
            allowed_users: allowed_users.into_iter().collect(),
        }
    }

    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.contains(&user_id)
    }

    /// Handle one inbound message and return the reply lines
    pub async fn handle(&self, user_id: i64, text: &str) -> Vec<String> {
        if !self.is_allowed(user_id) {
            debug!("Ignoring message from unknown user {}", user_id);
            return Vec::new();
        }

        let Some(command) = Command::parse(text) else {
            return match ProductRef::from_link(text) {
                Some(product) => vec![self.register(user_id, &product.to_string()).await],
                None => Vec::new(),
            };
        };

        match command {
            Command::Chat(args) => vec![self.chat(user_id, &args).await],
            Command::Search(args) if args.is_empty() => vec!["search arguments not provided".to_string()],
            Command::Search(args) => vec![self.register(user_id, &args).await],
            Command::Batch(args) => {
                let mut replies = Vec::new();
                for line in args.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    replies.push(self.register(user_id, line).await);
                }
                if replies.is_empty() {
                    replies.push("batch arguments not provided".to_string());
                }
                replies
            }
            Command::Stop(args) => vec![self.stop(user_id, &args).await],
            Command::Status(args) => self.status(user_id, args == "*").await,
            Command::Export => vec![self.export().await],
            Command::Unknown(name) => vec![format!("unknown command /{name}")],
        }
    }

    /// Default destination for a user: the stored `/chat` value, or the
    /// user's own chat.
    pub async fn default_destination(&self, user_id: i64) -> Destination {
        let store = self.scheduler.registry().store();
        match store.get(CONFIG_BUCKET, &user_id.to_string()).await {
            Ok(Some(value)) => Destination::parse(&value).unwrap_or(Destination::DirectChat(user_id)),
            Ok(None) => Destination::DirectChat(user_id),
            Err(e) => {
                warn!("Couldn't read chat config for {}: {}", user_id, e);
                Destination::DirectChat(user_id)
            }
        }
    }

    async fn register(&self, user_id: i64, args: &str) -> String {
        let destination = self.default_destination(user_id).await;
        let key = match SearchKey::parse_args(args, Some(&destination)) {
            Ok(key) => key,
            Err(e) => return e.to_string(),
        };
        let rendered = key.render();
        match self.scheduler.registry().add(key).await {
            Ok(true) => {
                info!("User {} registered {}", user_id, rendered);
                format!("searching {rendered}")
            }
            Ok(false) => format!("already searching {rendered}"),
            Err(e) => format!("couldn't register {rendered}: {e}"),
        }
    }

    async fn stop(&self, user_id: i64, args: &str) -> String {
        if args.is_empty() {
            return "stop arguments not provided".to_string();
        }
        let registry = self.scheduler.registry();
        if args == "*" {
            let removed = registry.remove_all().await;
            info!("User {} stopped all {} searches", user_id, removed.len());
            return format!("stopped all ({})", removed.len());
        }

        let destination = self.default_destination(user_id).await;
        let key = match SearchKey::parse_args(args, Some(&destination)) {
            Ok(key) => key,
            Err(e) => return e.to_string(),
        };
        match registry.remove(&key).await {
            Ok(true) => format!("stopped {}", key.render()),
            Ok(false) => format!("not searching {}", key.render()),
            Err(e) => format!("couldn't stop {}: {}", key.render(), e),
        }
    }

    async fn status(&self, user_id: i64, all: bool) -> Vec<String> {
        let registry = self.scheduler.registry();
        let entries = if all {
            registry.entries().await
        } else {
            registry.entries_for(&self.default_destination(user_id).await).await
        };

        let mut replies = vec!["status info:".to_string()];
        replies.extend(entries.iter().map(|entry| status_line(entry, !all)));
        if let Some(elapsed) = self.scheduler.last_cycle().await {
            replies.push(format!("elapsed: {:.1}s", elapsed.as_secs_f64()));
        }
        replies
    }

    async fn export(&self) -> String {
        let keys: Vec<String> = self
            .scheduler
            .registry()
            .snapshot()
            .await
            .iter()
            .map(SearchKey::render)
            .collect();
        if keys.is_empty() {
            return "no active searches".to_string();
        }
        format!("/batch {}", keys.join("\n"))
    }

    async fn chat(&self, user_id: i64, args: &str) -> String {
        if args.is_empty() {
            let current = self.default_destination(user_id).await;
            return format!("current chat for searches: {current}");
        }
        let Some(destination) = Destination::parse(args) else {
            return format!("invalid chat: {args}");
        };
        let store = self.scheduler.registry().store();
        match store.put(CONFIG_BUCKET, &user_id.to_string(), &destination.to_string()).await {
            Ok(()) => format!("chat for searches updated: {destination}"),
            Err(e) => format!("couldn't update chat: {e}"),
        }
    }
}
