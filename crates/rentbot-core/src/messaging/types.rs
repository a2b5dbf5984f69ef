use crate::domain::{ChatId, ChatKind, MessageId, MessageRef, UserId};

/// Messenger-agnostic incoming text message.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    /// Group title; `None` in private chats.
    pub chat_title: Option<String>,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub username: Option<String>,
    /// First (and last) name, used to mention users without a username.
    pub display_name: String,
    pub text: String,
}

impl IncomingMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}

/// Outgoing "chat action" (typing indicator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
}

/// Capabilities of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_html: bool,
    pub supports_chat_actions: bool,
    pub max_message_len: usize,
}
