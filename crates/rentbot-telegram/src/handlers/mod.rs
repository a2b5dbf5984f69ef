//! Telegram update handlers.
//!
//! Updates are translated into core [`IncomingMessage`]s and handed to the
//! [`BotService`]. Failures are logged here; they never reach the dispatcher.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use rentbot_core::{
    domain::{ChatId, ChatKind, MessageId, UserId},
    messaging::types::IncomingMessage,
    service::BotService,
};

pub async fn handle_message(msg: Message, service: Arc<BotService>) -> ResponseResult<()> {
    let Some(incoming) = incoming_from_message(&msg) else {
        return Ok(());
    };

    let user_id = incoming.user_id.0;
    let chat_id = incoming.chat_id.0;
    if let Err(e) = service.handle_message(incoming).await {
        tracing::error!(user_id, chat_id, error = %e, "failed to handle message");
    }
    Ok(())
}

/// `None` for non-text messages, messages without a sender, and other bots.
pub fn incoming_from_message(msg: &Message) -> Option<IncomingMessage> {
    let text = msg.text()?;
    let user = msg.from()?;
    if user.is_bot {
        return None;
    }

    Some(IncomingMessage {
        chat_id: ChatId(msg.chat.id.0),
        chat_kind: chat_kind(&msg.chat),
        chat_title: msg.chat.title().map(str::to_string),
        message_id: MessageId(msg.id.0),
        user_id: UserId(user.id.0 as i64),
        username: user.username.clone(),
        display_name: user.full_name(),
        text: text.to_string(),
    })
}

fn chat_kind(chat: &teloxide::types::Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else if chat.is_group() {
        ChatKind::Group
    } else {
        ChatKind::Channel
    }
}
