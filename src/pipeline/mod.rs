//! Digest pipeline.
//!
//! Every run, scheduled or manual, flows through:
//! 1. `Collector::collect()`: channel list, recent history, keyword filter
//! 2. `Summarizer::summarize()`: one LLM call over the kept posts
//! 3. `to_telegram_html()`: markdown subset to Telegram HTML
//! 4. Draft to the admin with approve/reject buttons
//!
//! **No auto-publish path exists.** Every post to the target channel requires
//! the admin's approval.

pub mod collector;
pub mod filter;
pub mod processor;
pub mod types;

pub use collector::Collector;
pub use filter::KeywordFilter;
pub use processor::DigestPipeline;
pub use types::{RunOutcome, Trigger};
