//! Telegram channel: long-polls the Bot API for updates and sends messages.
//!
//! Native Bot API client over `reqwest` and raw JSON. Only the handful of
//! methods the digest bot needs: `getUpdates`, `sendMessage`,
//! `editMessageText`, `answerCallbackQuery` and `getMe`.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{BotUpdate, MessageId, Messenger, OutgoingMessage, Sender};
use crate::error::ChannelError;

/// Long-poll timeout passed to `getUpdates`, in seconds.
const LONG_POLL_TIMEOUT_SECS: u64 = 30;

/// Telegram rejects message text longer than this many characters.
pub const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Pause after a failed poll before polling again.
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(5);

/// Stream of inbound updates.
pub type UpdateStream = Pin<Box<dyn Stream<Item = BotUpdate> + Send>>;

/// Telegram channel: connects to the Bot API via long-polling.
#[derive(Clone)]
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, api_base: impl Into<String>) -> Self {
        Self {
            bot_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// Call a Bot API method and return its `result`.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let send_failed = |reason: String| ChannelError::SendFailed {
            name: "telegram".into(),
            reason: format!("{method}: {reason}"),
        };

        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| send_failed(strip_token(&e.to_string(), &self.bot_token)))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| send_failed(format!("status {status}, unreadable body: {e}")))?;

        if data.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            return Err(send_failed(format!("status {status}: {description}")));
        }

        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Verify the token with `getMe`. Returns the bot's username.
    pub async fn health_check(&self) -> Result<String, ChannelError> {
        let me = self
            .call("getMe", &json!({}))
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        Ok(me
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Start long polling. Updates the bot does not handle are skipped.
    pub fn start(&self) -> UpdateStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let channel = self.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": LONG_POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let results = match channel.call("getUpdates", &body).await {
                    Ok(Value::Array(results)) => results,
                    Ok(other) => {
                        tracing::warn!(result = %other, "Telegram getUpdates returned a non-array");
                        tokio::time::sleep(POLL_ERROR_PAUSE).await;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_ERROR_PAUSE).await;
                        continue;
                    }
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(parsed) = parse_update(&update) else {
                        continue;
                    };

                    if tx.send(parsed).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|update| (update, rx))
        });

        Box::pin(stream)
    }
}

#[async_trait]
impl Messenger for TelegramChannel {
    async fn send(&self, message: OutgoingMessage) -> Result<MessageId, ChannelError> {
        let result = self.call("sendMessage", &send_message_body(&message)).await?;
        result
            .get("message_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                ChannelError::InvalidMessage("sendMessage result has no message_id".into())
            })
    }

    async fn edit_text(
        &self,
        chat_id: &str,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), ChannelError> {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        self.call("editMessageText", &body).await.map(|_| ())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = Value::String(text.to_string());
        }
        self.call("answerCallbackQuery", &body).await.map(|_| ())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// JSON body for `sendMessage`.
fn send_message_body(message: &OutgoingMessage) -> Value {
    let mut body = json!({
        "chat_id": message.chat_id,
        "text": message.text,
    });

    if let Some(mode) = message.parse_mode {
        body["parse_mode"] = Value::String(mode.as_str().to_string());
    }

    if !message.buttons.is_empty() {
        let row: Vec<Value> = message
            .buttons
            .iter()
            .map(|b| json!({ "text": b.label, "callback_data": b.callback_data }))
            .collect();
        body["reply_markup"] = json!({ "inline_keyboard": [row] });
    }

    body
}

/// Convert a raw update into a `BotUpdate`. `None` for anything the bot
/// does not handle (plain text, edits, channel posts, ...).
pub fn parse_update(update: &Value) -> Option<BotUpdate> {
    if let Some(query) = update.get("callback_query") {
        let message = query.get("message")?;
        return Some(BotUpdate::Callback {
            id: query.get("id")?.as_str()?.to_string(),
            data: query
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            chat_id: message.get("chat")?.get("id")?.as_i64()?.to_string(),
            message_id: message.get("message_id")?.as_i64()?,
            sender: parse_sender(query.get("from")),
        });
    }

    let message = update.get("message")?;
    let text = message.get("text")?.as_str()?;
    let name = parse_command(text)?;

    Some(BotUpdate::Command {
        name,
        chat_id: message.get("chat")?.get("id")?.as_i64()?.to_string(),
        sender: parse_sender(message.get("from")),
    })
}

fn parse_sender(from: Option<&Value>) -> Sender {
    Sender {
        user_id: from.and_then(|f| f.get("id")).and_then(Value::as_i64),
        username: from
            .and_then(|f| f.get("username"))
            .and_then(Value::as_str)
            .map(String::from),
    }
}

/// `/preview@my_bot extra` → `preview`.
fn parse_command(text: &str) -> Option<String> {
    let first = text.split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    let command = command.split('@').next().unwrap_or_default();
    if command.is_empty() {
        None
    } else {
        Some(command.to_lowercase())
    }
}

/// Transport errors include the request URL, and with it the token.
fn strip_token(message: &str, token: &SecretString) -> String {
    let token = token.expose_secret();
    if token.is_empty() {
        message.to_string()
    } else {
        message.replace(token, "<token>")
    }
}

// ── Tests ───────────────────────────────────────────────────────────
