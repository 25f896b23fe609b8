//! Channel sources: the channel list file and readers for channel history.
//!
//! The shipped reader scrapes the public web preview that Telegram serves for
//! every public channel (`https://t.me/s/<name>`). It needs no user session,
//! only plain HTTPS.

use std::path::Path;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, instrument};

use crate::error::ChannelError;

/// One message read from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPost {
    /// Platform post reference (e.g. `channel/123`), when known.
    pub id: Option<String>,
    /// Text body. `None` for media-only messages.
    pub text: Option<String>,
}

impl ChannelPost {
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: Some(text.into()),
        }
    }

    pub fn media(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: None,
        }
    }
}

/// Reads recent history from a channel.
#[async_trait]
pub trait ChannelReader: Send + Sync {
    /// Up to `limit` most recent messages, newest first.
    async fn read_recent(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<ChannelPost>, ChannelError>;
}

/// Load the channel list: one identifier per line, trimmed, blank lines and
/// `#` comments skipped, order preserved.
pub async fn load_channel_list(path: &Path) -> std::io::Result<Vec<String>> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(parse_channel_list(&raw))
}

pub fn parse_channel_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Reduce `@name`, `t.me/name`, `https://t.me/s/name/` and similar to `name`.
pub fn normalize_channel(channel: &str) -> Option<String> {
    let mut name = channel.trim();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = name.strip_prefix(scheme) {
            name = rest;
        }
    }
    for host in ["t.me/", "telegram.me/"] {
        if let Some(rest) = name.strip_prefix(host) {
            name = rest.strip_prefix("s/").unwrap_or(rest);
        }
    }
    let name = name.trim_start_matches('@').trim_end_matches('/');
    let name = name.split(['/', '?']).next().unwrap_or_default();

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

// ── Web preview reader ──────────────────────────────────────────────

/// Reads public channels through their `t.me/s/` web preview.
pub struct WebPreviewReader {
    base_url: String,
    client: reqwest::Client,
}

impl WebPreviewReader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn preview_url(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url)
    }
}

#[async_trait]
impl ChannelReader for WebPreviewReader {
    #[instrument(level = "debug", skip(self))]
    async fn read_recent(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<ChannelPost>, ChannelError> {
        let read_failed = |reason: String| ChannelError::ReadFailed {
            channel: channel.to_string(),
            reason,
        };

        let name = normalize_channel(channel)
            .ok_or_else(|| read_failed("not a channel identifier".into()))?;

        let resp = self
            .client
            .get(self.preview_url(&name))
            .send()
            .await
            .map_err(|e| read_failed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(read_failed(format!("web preview returned {status}")));
        }

        let html = resp.text().await.map_err(|e| read_failed(e.to_string()))?;
        let mut posts = parse_preview(&html);
        debug!(channel = %name, found = posts.len(), "Parsed web preview");

        // The preview lists oldest first.
        posts.reverse();
        posts.truncate(limit);
        Ok(posts)
    }
}

/// Extract messages from a web preview page, in page order.
pub fn parse_preview(html: &str) -> Vec<ChannelPost> {
    let document = Html::parse_document(html);
    let message_selector = Selector::parse(".tgme_widget_message").unwrap();
    let text_selector =
        Selector::parse(".tgme_widget_message_text:not(.js-message_reply_text)").unwrap();

    document
        .select(&message_selector)
        .map(|message| {
            let id = message.value().attr("data-post").map(String::from);
            let text = message
                .select(&text_selector)
                .last()
                .map(element_text)
                .filter(|t| !t.is_empty());
            ChannelPost { id, text }
        })
        .collect()
}

/// Text content with `<br>` turned into newlines.
fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out.trim().to_string()
}
