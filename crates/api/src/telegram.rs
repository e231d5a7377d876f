//! Telegram Bot API client.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends Markdown messages through a bot.
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
    default_chat_id: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("default_chat_id", &self.default_chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(bot_token: impl Into<String>, default_chat_id: impl Into<String>) -> Self {
        Self::with_base_url(TELEGRAM_API, bot_token, default_chat_id)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
        default_chat_id: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            bot_token: bot_token.into(),
            default_chat_id: default_chat_id.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    /// `sendMessage` in Markdown with link previews disabled.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn send_message(
        &self,
        text: &str,
        chat_id: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<()> {
        let body = SendMessage {
            chat_id: chat_id.unwrap_or(&self.default_chat_id),
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
            reply_to_message_id: reply_to,
        };

        let response: ApiResponse = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            bail!(
                "telegram sendMessage failed: {}",
                response.description.unwrap_or_default()
            );
        }

        debug!("Telegram message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let client = TelegramClient::new("123:abc", "-100");
        assert_eq!(
            client.method_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_send_message_body() {
        let body = SendMessage {
            chat_id: "-100",
            text: "**Position #1**",
            parse_mode: "Markdown",
            disable_web_page_preview: true,
            reply_to_message_id: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["parse_mode"], "Markdown");
        assert_eq!(json["disable_web_page_preview"], true);
        assert!(json.get("reply_to_message_id").is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let client = TelegramClient::new("secret-token", "-100");
        assert!(!format!("{client:?}").contains("secret-token"));
    }
}
