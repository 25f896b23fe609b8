//! Messaging platform I/O: outbound messages, inbound updates, and channel
//! sources.

pub mod source;
pub mod telegram;

pub use source::{ChannelPost, ChannelReader, WebPreviewReader};
pub use telegram::{TELEGRAM_MAX_MESSAGE_LENGTH, TelegramChannel};

use async_trait::async_trait;

use crate::error::ChannelError;

/// Platform message identifier, unique within a chat.
pub type MessageId = i64;

/// Text markup mode for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Html,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::Html => "HTML",
        }
    }
}

/// Inline keyboard button carrying callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: String,
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    /// One row of buttons under the message.
    pub buttons: Vec<InlineButton>,
}

impl OutgoingMessage {
    /// Plain text message.
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            parse_mode: None,
            buttons: Vec::new(),
        }
    }

    /// HTML message.
    pub fn html(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            ..Self::text(chat_id, text)
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<InlineButton>) -> Self {
        self.buttons = buttons;
        self
    }
}

/// Outbound side of the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a message and return its platform id.
    async fn send(&self, message: OutgoingMessage) -> Result<MessageId, ChannelError>;

    /// Replace the text of an already sent message (drops its keyboard).
    async fn edit_text(
        &self,
        chat_id: &str,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), ChannelError>;

    /// Acknowledge a button press, optionally with a toast text.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), ChannelError>;
}

/// Who sent an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub user_id: Option<i64>,
    pub username: Option<String>,
}

impl Sender {
    /// Identities to check against an allowlist: username and numeric id.
    pub fn identities(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(2);
        if let Some(ref name) = self.username {
            ids.push(name.clone());
        }
        if let Some(id) = self.user_id {
            ids.push(id.to_string());
        }
        ids
    }
}

/// An inbound event the bot reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotUpdate {
    /// `/name` command in a chat.
    Command {
        name: String,
        chat_id: String,
        sender: Sender,
    },
    /// Inline button press on one of the bot's messages.
    Callback {
        id: String,
        data: String,
        chat_id: String,
        message_id: MessageId,
        sender: Sender,
    },
}

/// Check if any identity matches the allowed users list (`*` allows all).
pub fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}
