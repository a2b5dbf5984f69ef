//! Telegram adapter (teloxide).
//!
//! This crate implements the `rentbot-core` MessagingPort over the Telegram
//! Bot API and runs the long-polling dispatcher.

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode, ApiError, RequestError};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use rentbot_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::warn!(retry_after_ms = d.as_millis() as u64, "telegram flood control");
                    sleep(d).await;
                }
                Err(other) => return Err(map_err(other)),
            }
        }
    }
}

/// Map teloxide errors into core errors, keeping the operator-relevant categories apart.
pub fn map_err(e: RequestError) -> Error {
    match e {
        RequestError::Api(ApiError::NotFound) => {
            Error::Unauthorized("Telegram rejected the bot token (HTTP 401)".to_string())
        }
        RequestError::Network(e) => Error::Network(format!(
            "cannot reach api.telegram.org (check network or HTTPS_PROXY): {e}"
        )),
        other => Error::External(format!("telegram error: {other}")),
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_html: true,
            supports_chat_actions: true,
            max_message_len: 4096,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn reply_html(&self, to: MessageRef, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(to.chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true)
                    .reply_to_message_id(Self::tg_msg_id(to.message_id))
                    .allow_sending_without_reply(true)
            })
            .await?;

        Ok(MessageRef {
            chat_id: to.chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let tg_action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
        };
        self.with_retry(|| self.bot.send_chat_action(Self::tg_chat(chat_id), tg_action))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_token_maps_to_unauthorized() {
        let e = map_err(RequestError::Api(ApiError::NotFound));
        assert!(matches!(e, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn unreachable_api_is_a_network_error() {
        let refused = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .unwrap_err();
        let e = map_err(RequestError::Network(refused));
        assert!(matches!(e, Error::Network(ref s) if s.contains("HTTPS_PROXY")));
    }

    #[test]
    fn other_api_errors_are_external() {
        let e = map_err(RequestError::Api(ApiError::BotBlocked));
        assert!(matches!(e, Error::External(ref s) if s.starts_with("telegram error")));
    }
}
