//! Pipeline types.

use std::fmt;

use crate::channels::MessageId;

/// What started a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Daily scheduler.
    Schedule,
    /// `/preview` command.
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Schedule => write!(f, "schedule"),
            Trigger::Manual => write!(f, "manual"),
        }
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A draft was sent to the admin.
    Drafted {
        message_id: MessageId,
        /// Posts that went into the summary.
        posts: usize,
    },
    /// Nothing survived collection and filtering.
    NoPosts,
    /// The summarizer produced nothing.
    NoSummary,
    /// Another run held the lock; this trigger was skipped.
    AlreadyRunning,
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Drafted { .. } => "drafted",
            RunOutcome::NoPosts => "no_posts",
            RunOutcome::NoSummary => "no_summary",
            RunOutcome::AlreadyRunning => "already_running",
        }
    }
}
