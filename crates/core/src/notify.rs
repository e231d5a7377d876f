//! Best-effort alert delivery.

use async_trait::async_trait;
use keeper_api::TelegramClient;
use tracing::{info, warn};

/// Delivers alert text. Failures are logged, never returned.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str, chat: Option<&str>, reply_to: Option<i64>);
}

/// Posts alerts to a Telegram chat.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: TelegramClient,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str, chat: Option<&str>, reply_to: Option<i64>) {
        if let Err(e) = self.client.send_message(text, chat, reply_to).await {
            warn!(error = %e, chat = ?chat, text, "Failed to send telegram message");
        }
    }
}

/// Writes alerts to the log when no chat is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str, _chat: Option<&str>, _reply_to: Option<i64>) {
        info!(alert = text, "Alert (telegram not configured)");
    }
}
