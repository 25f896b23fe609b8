//! In-process doubles shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::channels::{ChannelPost, ChannelReader, MessageId, Messenger, OutgoingMessage};
use crate::error::ChannelError;
use crate::llm::Summarizer;

/// Records every outbound call. Ids are handed out from 100 upwards.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(MessageId, OutgoingMessage)>>,
    pub edits: Mutex<Vec<(String, MessageId, String)>>,
    pub answers: Mutex<Vec<(String, Option<String>)>>,
    failing_chats: Mutex<Vec<String>>,
    next_id: AtomicI64,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every send to `chat_id` fail.
    pub fn fail_sends_to(&self, chat_id: &str) {
        self.failing_chats.lock().unwrap().push(chat_id.to_string());
    }

    pub fn sent_to(&self, chat_id: &str) -> Vec<OutgoingMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m.chat_id == chat_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, message: OutgoingMessage) -> Result<MessageId, ChannelError> {
        if self.failing_chats.lock().unwrap().contains(&message.chat_id) {
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "sendMessage: status 400 Bad Request: chat not found".into(),
            });
        }
        let id = 100 + self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push((id, message));
        Ok(id)
    }

    async fn edit_text(
        &self,
        chat_id: &str,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), ChannelError> {
        self.edits
            .lock()
            .unwrap()
            .push((chat_id.to_string(), message_id, text.to_string()));
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), ChannelError> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(String::from)));
        Ok(())
    }
}

/// Returns a canned reply. Optionally waits on `hold` before replying.
pub struct StubSummarizer {
    reply: Option<String>,
    pub calls: AtomicUsize,
    pub inputs: Mutex<Vec<Vec<String>>>,
    /// Notified each time `summarize` is entered.
    pub entered: Notify,
    hold: Option<Arc<Notify>>,
}

impl StubSummarizer {
    pub fn replying(reply: Option<&str>) -> Self {
        Self {
            reply: reply.map(String::from),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
            entered: Notify::new(),
            hold: None,
        }
    }

    pub fn holding(mut self, hold: Arc<Notify>) -> Self {
        self.hold = Some(hold);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, posts: &[String]) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(posts.to_vec());
        self.entered.notify_one();
        if let Some(ref hold) = self.hold {
            hold.notified().await;
        }
        if posts.is_empty() {
            return None;
        }
        self.reply.clone()
    }
}

/// Serves canned history per channel; unknown channels fail to read.
pub struct StubReader {
    history: HashMap<String, Vec<ChannelPost>>,
    pub calls: Mutex<Vec<(String, usize)>>,
}

impl StubReader {
    pub fn new(history: &[(&str, Vec<ChannelPost>)]) -> Arc<Self> {
        Arc::new(Self {
            history: history
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChannelReader for StubReader {
    async fn read_recent(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<ChannelPost>, ChannelError> {
        self.calls.lock().unwrap().push((channel.to_string(), limit));
        self.history
            .get(channel)
            .cloned()
            .ok_or_else(|| ChannelError::ReadFailed {
                channel: channel.to_string(),
                reason: "private channel".into(),
            })
    }
}
