//! Digest pipeline: collect, summarize, format, hand a draft to the admin.
//!
//! **Core invariant: nothing reaches the target channel from here.**
//! A run ends at the admin's chat with an approve/reject keyboard; publishing
//! happens only in the approval handler.
//!
//! Flow:
//! 1. Collector → filtered posts (may end the run with `NoPosts`)
//! 2. Summarizer → summary (may end the run with `NoSummary`)
//! 3. Formatter → Telegram HTML
//! 4. Draft sent to the admin, recorded under the sent message's id

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::channels::{InlineButton, Messenger, OutgoingMessage, TELEGRAM_MAX_MESSAGE_LENGTH};
use crate::drafts::{Decision, Draft, DraftStore};
use crate::error::PipelineError;
use crate::format::to_telegram_html;
use crate::llm::Summarizer;
use crate::pipeline::collector::Collector;
use crate::pipeline::types::{RunOutcome, Trigger};

/// Label of the approve button.
pub const APPROVE_LABEL: &str = "✅ Опубликовать";

/// Label of the reject button.
pub const REJECT_LABEL: &str = "❌ Отклонить";

/// Runs the digest pipeline. At most one run is in flight at a time.
pub struct DigestPipeline {
    collector: Collector,
    summarizer: Arc<dyn Summarizer>,
    messenger: Arc<dyn Messenger>,
    drafts: Arc<dyn DraftStore>,
    admin_chat_id: String,
    draft_ttl: Duration,
    run_lock: Mutex<()>,
}

impl DigestPipeline {
    pub fn new(
        collector: Collector,
        summarizer: Arc<dyn Summarizer>,
        messenger: Arc<dyn Messenger>,
        drafts: Arc<dyn DraftStore>,
        admin_chat_id: impl Into<String>,
        draft_ttl: Duration,
    ) -> Self {
        Self {
            collector,
            summarizer,
            messenger,
            drafts,
            admin_chat_id: admin_chat_id.into(),
            draft_ttl,
            run_lock: Mutex::new(()),
        }
    }

    /// Run once. A trigger arriving while another run is in flight is
    /// skipped with `AlreadyRunning`.
    pub async fn run(&self, trigger: Trigger) -> Result<RunOutcome, PipelineError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!(%trigger, "Pipeline already running, skipping trigger");
            return Ok(RunOutcome::AlreadyRunning);
        };

        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id, %trigger);

        async {
            let result = self.run_once().await;
            match &result {
                Ok(outcome) => info!(outcome = outcome.label(), "Pipeline run finished"),
                Err(e) => error!(error = %e, "Pipeline run failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_once(&self) -> Result<RunOutcome, PipelineError> {
        info!("Collecting posts from channels...");
        let posts = self.collector.collect().await;

        if posts.is_empty() {
            warn!("No posts found, nothing to send");
            return Ok(RunOutcome::NoPosts);
        }

        let Some(summary) = self.summarizer.summarize(&posts).await else {
            error!("Summarizer returned no summary");
            return Ok(RunOutcome::NoSummary);
        };

        let formatted = to_telegram_html(&summary);
        let chars = formatted.chars().count();
        info!(chars, "Summary received");
        if exceeds_message_limit(&formatted) {
            warn!(
                chars,
                limit = TELEGRAM_MAX_MESSAGE_LENGTH,
                "Draft is longer than a Telegram message, delivery will likely fail"
            );
        }

        let message = OutgoingMessage::html(&self.admin_chat_id, &formatted).with_buttons(vec![
            InlineButton::new(APPROVE_LABEL, Decision::Approve.callback_data()),
            InlineButton::new(REJECT_LABEL, Decision::Reject.callback_data()),
        ]);

        let message_id = self.messenger.send(message).await.map_err(|e| {
            error!(error = %e, chars, "Failed to send draft to admin");
            PipelineError::ChannelSend(e)
        })?;

        self.drafts
            .put(Draft::new(message_id, formatted, self.draft_ttl))
            .await;
        info!(message_id, "Draft sent to admin");

        Ok(RunOutcome::Drafted {
            message_id,
            posts: posts.len(),
        })
    }
}

/// Whether `text` is over Telegram's per-message character limit.
fn exceeds_message_limit(text: &str) -> bool {
    text.chars().count() > TELEGRAM_MAX_MESSAGE_LENGTH
}
