//! Draft store: correlates an admin decision with the text to publish.
//!
//! The first decision for a message id consumes its draft; later signals for
//! the same id find nothing. Undecided drafts are evicted once they expire.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::model::Draft;
use crate::channels::MessageId;

/// Transient draft storage.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Record a pending draft, replacing any draft with the same id.
    async fn put(&self, draft: Draft);

    /// Remove and return the draft if present and not expired.
    async fn take(&self, message_id: MessageId) -> Option<Draft>;

    /// Evict expired drafts. Returns how many were evicted.
    async fn expire_old(&self) -> usize;

    /// Number of stored drafts, expired or not.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// In-memory draft store, lost on restart.
#[derive(Default)]
pub struct InMemoryDraftStore {
    drafts: RwLock<HashMap<MessageId, Draft>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn put(&self, draft: Draft) {
        info!(
            message_id = draft.message_id,
            chars = draft.text.chars().count(),
            expires_at = %draft.expires_at,
            "Draft stored"
        );
        self.drafts.write().await.insert(draft.message_id, draft);
    }

    async fn take(&self, message_id: MessageId) -> Option<Draft> {
        let draft = self.drafts.write().await.remove(&message_id)?;
        if draft.is_expired() {
            debug!(message_id, "Draft expired before decision");
            return None;
        }
        Some(draft)
    }

    async fn expire_old(&self) -> usize {
        let mut drafts = self.drafts.write().await;
        let before = drafts.len();
        drafts.retain(|_, d| !d.is_expired());
        let expired = before - drafts.len();

        if expired > 0 {
            info!(count = expired, "Expired drafts");
        }

        expired
    }

    async fn len(&self) -> usize {
        self.drafts.read().await.len()
    }
}

/// How often the expiry task sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn a background task that periodically evicts expired drafts.
pub fn spawn_expiry_task(
    store: Arc<dyn DraftStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // Skip immediate first tick
        interval.tick().await;
        loop {
            interval.tick().await;
            store.expire_old().await;
        }
    })
}
