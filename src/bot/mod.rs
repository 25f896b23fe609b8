//! Bot front end: the update loop and its handlers.

pub mod handler;

pub use handler::{BotSettings, DecisionOutcome, DigestBot};

use std::future::Future;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Dispatch updates until the stream ends or `shutdown` resolves.
///
/// Each update runs in its own task so a long `/preview` run does not hold
/// up approvals. Handlers still in flight are awaited before returning.
pub async fn serve<S, F>(bot: Arc<DigestBot>, updates: S, shutdown: F)
where
    S: Stream<Item = crate::channels::BotUpdate> + Unpin,
    F: Future<Output = ()>,
{
    let mut updates = updates;
    let mut tasks = JoinSet::new();
    tokio::pin!(shutdown);

    info!("Bot ready and listening");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            update = updates.next() => match update {
                Some(update) => {
                    let bot = Arc::clone(&bot);
                    tasks.spawn(async move { bot.dispatch(update).await });
                }
                None => {
                    info!("Update stream ended");
                    break;
                }
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "Update handler task failed");
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Update handler task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channels::{BotUpdate, Sender};
    use crate::config::CollectorConfig;
    use crate::drafts::{Draft, DraftStore, InMemoryDraftStore};
    use crate::pipeline::{Collector, DigestPipeline};
    use crate::test_support::{RecordingMessenger, StubReader, StubSummarizer};

    fn bot(messenger: Arc<RecordingMessenger>, drafts: Arc<InMemoryDraftStore>) -> Arc<DigestBot> {
        let collector = Collector::new(StubReader::new(&[]), &CollectorConfig::default());
        let pipeline = Arc::new(DigestPipeline::new(
            collector,
            Arc::new(StubSummarizer::replying(None)),
            messenger.clone(),
            drafts.clone(),
            "42",
            Duration::from_secs(60),
        ));
        Arc::new(DigestBot::new(
            pipeline,
            messenger,
            drafts,
            BotSettings {
                admin_chat_id: "42".into(),
                target_channel_id: "@target".into(),
                allowed_users: vec!["*".into()],
            },
        ))
    }

    #[tokio::test]
    async fn handles_every_update_until_stream_ends() {
        let messenger = RecordingMessenger::new();
        let drafts = InMemoryDraftStore::new();
        drafts.put(Draft::new(9, "digest", Duration::from_secs(60))).await;

        let updates = futures::stream::iter(vec![
            BotUpdate::Command {
                name: "start".into(),
                chat_id: "5".into(),
                sender: Sender::default(),
            },
            BotUpdate::Callback {
                id: "cb".into(),
                data: "approve".into(),
                chat_id: "42".into(),
                message_id: 9,
                sender: Sender::default(),
            },
        ]);

        serve(bot(messenger.clone(), drafts.clone()), updates, std::future::pending()).await;

        assert_eq!(messenger.sent_to("5").len(), 1);
        assert_eq!(messenger.sent_to("@target").len(), 1);
        assert!(drafts.is_empty().await);
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let messenger = RecordingMessenger::new();
        let drafts = InMemoryDraftStore::new();

        serve(
            bot(messenger.clone(), drafts),
            futures::stream::pending::<BotUpdate>(),
            async {},
        )
        .await;

        assert_eq!(messenger.sent_count(), 0);
    }
}
