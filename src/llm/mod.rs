//! LLM integration: election news summarization.
//!
//! Talks to any OpenAI-compatible chat completions endpoint (OpenRouter by
//! default) with plain `reqwest`. The `Summarizer` trait is the seam the
//! pipeline depends on; failures are logged inside and surface only as
//! "no summary".

mod summarizer;

pub use summarizer::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, HttpSummarizer, SUMMARY_PROMPT,
};

use async_trait::async_trait;

/// Turns a batch of posts into one digest.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// `None` means no summary: empty input, or any provider failure.
    async fn summarize(&self, posts: &[String]) -> Option<String>;
}
