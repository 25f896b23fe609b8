//! HTTP summarizer for OpenAI-compatible chat completion endpoints.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::Summarizer;
use crate::config::LlmConfig;
use crate::error::LlmError;

/// System instruction sent with every summarization request.
pub const SUMMARY_PROMPT: &str = "Ты аналитик-политолог. Создай краткий, понятный и объективный обзор новостей, \
связанных с выборами в Государственную Думу России 2026 года. \
Игнорируй любые новости, не относящиеся к выборам. \
Отметь ключевые события, цитаты политиков, решения ЦИК и тенденции кампании. \
Пиши в нейтральном журналистском стиле.";

/// Upper bound on generated tokens.
const SUMMARY_MAX_TOKENS: u32 = 1500;

/// Sampling temperature for summaries.
const SUMMARY_TEMPERATURE: f32 = 0.6;

const PROVIDER: &str = "chat-completions";

/// A chat message in the request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Request body: `{model, messages, temperature, max_tokens}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatCompletionRequest {
    /// Digest request for `posts`, joined with blank lines.
    pub fn digest(model: &str, posts: &[String]) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage::system(SUMMARY_PROMPT),
                ChatMessage::user(posts.join("\n\n")),
            ],
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: SUMMARY_MAX_TOKENS,
        }
    }
}

/// Response body. Only `choices[].message.content` is read.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Summarizer backed by a chat completions endpoint.
pub struct HttpSummarizer {
    config: LlmConfig,
    client: reqwest::Client,
}

impl HttpSummarizer {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    /// One request, every failure mode as an `LlmError`.
    async fn request_summary(&self, posts: &[String]) -> Result<String, LlmError> {
        let body = ChatCompletionRequest::digest(&self.config.model, posts);

        info!(url = %self.config.api_url, posts = posts.len(), "Requesting summary");

        let resp = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(self.config.api_key.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        provider: PROVIDER.into(),
                        timeout: self.config.timeout,
                    }
                } else {
                    LlmError::RequestFailed {
                        provider: PROVIDER.into(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.into(),
            reason: e.to_string(),
        })?;

        if status != reqwest::StatusCode::OK {
            return Err(LlmError::BadStatus {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.into(),
                reason: "no choices in response".into(),
            })?;

        let content = content.trim();
        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: PROVIDER.into(),
                reason: "empty completion".into(),
            });
        }

        Ok(content.to_string())
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, posts: &[String]) -> Option<String> {
        if posts.is_empty() {
            warn!("No posts to summarize");
            return None;
        }

        match self.request_summary(posts).await {
            Ok(summary) => {
                info!(chars = summary.chars().count(), "Summary created");
                Some(summary)
            }
            Err(e) => {
                error!(error = %e, "Summarization failed");
                None
            }
        }
    }
}
