//! Update handlers: `/start`, `/preview`, and approve/reject decisions.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::channels::{
    BotUpdate, MessageId, Messenger, OutgoingMessage, Sender, check_user_allowed,
};
use crate::drafts::{Decision, DraftStore};
use crate::error::Error;
use crate::pipeline::{DigestPipeline, RunOutcome, Trigger};

pub const GREETING: &str = "Привет! Я бот для новостных сводок. Команда: /preview";
pub const GENERATING: &str = "Генерирую обзор, пожалуйста подожди ⏳...";
pub const ALREADY_RUNNING: &str = "⏳ Обзор уже готовится, дождись черновика.";
pub const ACCESS_DENIED: &str = "⛔ Нет доступа.";
pub const APPROVED: &str = "✅ Публикация одобрена. Отправляю в канал...";
pub const REJECTED: &str = "❌ Публикация отклонена.";
pub const PUBLISHED: &str = "✅ Пост опубликован в канале.";
pub const DRAFT_NOT_FOUND: &str = "Черновик не найден или уже обработан.";

/// Addresses and access rules the handlers need.
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Chat that receives drafts and error reports.
    pub admin_chat_id: String,
    /// Channel approved drafts are published to.
    pub target_channel_id: String,
    /// Who may use `/preview` (`*` for anyone).
    pub allowed_users: Vec<String>,
}

/// How a decision callback was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    Published,
    PublishFailed,
    Rejected,
    /// No pending draft for the message: decided already, or expired.
    DraftMissing,
    /// Callback came from a chat other than the admin's.
    Unauthorized,
    /// Callback data was neither approve nor reject.
    Ignored,
}

/// Reacts to inbound updates.
pub struct DigestBot {
    pipeline: Arc<DigestPipeline>,
    messenger: Arc<dyn Messenger>,
    drafts: Arc<dyn DraftStore>,
    settings: BotSettings,
}

impl DigestBot {
    pub fn new(
        pipeline: Arc<DigestPipeline>,
        messenger: Arc<dyn Messenger>,
        drafts: Arc<dyn DraftStore>,
        settings: BotSettings,
    ) -> Self {
        Self {
            pipeline,
            messenger,
            drafts,
            settings,
        }
    }

    /// Handle one update. Errors are logged and reported to the admin;
    /// they never propagate.
    pub async fn dispatch(&self, update: BotUpdate) {
        if let Err(e) = self.handle(update).await {
            error!(error = %e, "Error handling update");
            self.report_error(&e).await;
        }
    }

    pub async fn handle(&self, update: BotUpdate) -> Result<(), Error> {
        match update {
            BotUpdate::Command {
                name,
                chat_id,
                sender,
            } => self.on_command(&name, &chat_id, &sender).await,
            BotUpdate::Callback {
                id,
                data,
                chat_id,
                message_id,
                ..
            } => {
                let outcome = self.on_decision(&id, &data, &chat_id, message_id).await?;
                debug!(message_id, ?outcome, "Callback handled");
                Ok(())
            }
        }
    }

    async fn on_command(&self, name: &str, chat_id: &str, sender: &Sender) -> Result<(), Error> {
        match name {
            "start" => {
                self.reply(chat_id, GREETING).await?;
            }
            "preview" => {
                let identities = sender.identities();
                if !check_user_allowed(
                    &self.settings.allowed_users,
                    identities.iter().map(String::as_str),
                ) {
                    warn!(?identities, "Rejected /preview from user not on allowlist");
                    self.reply(chat_id, ACCESS_DENIED).await?;
                    return Ok(());
                }

                info!(?identities, "Manual digest requested");
                self.reply(chat_id, GENERATING).await?;

                if self.pipeline.run(Trigger::Manual).await? == RunOutcome::AlreadyRunning {
                    self.reply(chat_id, ALREADY_RUNNING).await?;
                }
            }
            other => {
                debug!(command = other, "Ignoring unknown command");
            }
        }
        Ok(())
    }

    /// Resolve an approve/reject press on the draft message `message_id`.
    ///
    /// The first decision for a draft consumes it; later presses find
    /// nothing and change nothing.
    pub async fn on_decision(
        &self,
        callback_id: &str,
        data: &str,
        chat_id: &str,
        message_id: MessageId,
    ) -> Result<DecisionOutcome, Error> {
        let Ok(decision) = data.parse::<Decision>() else {
            warn!(data, "Unknown callback data");
            self.acknowledge(callback_id, None).await;
            return Ok(DecisionOutcome::Ignored);
        };

        if chat_id != self.settings.admin_chat_id {
            warn!(chat_id, %decision, "Decision from outside the admin chat");
            self.acknowledge(callback_id, Some(ACCESS_DENIED)).await;
            return Ok(DecisionOutcome::Unauthorized);
        }

        let Some(draft) = self.drafts.take(message_id).await else {
            warn!(message_id, %decision, "No pending draft for decision");
            self.acknowledge(callback_id, Some(DRAFT_NOT_FOUND)).await;
            return Ok(DecisionOutcome::DraftMissing);
        };

        self.acknowledge(callback_id, None).await;
        info!(message_id, %decision, "Admin decided on draft");

        match decision {
            Decision::Approve => {
                self.edit_admin_message(message_id, APPROVED).await;

                let publish = OutgoingMessage::html(&self.settings.target_channel_id, draft.text);
                match self.messenger.send(publish).await {
                    Ok(_) => {
                        info!(channel = %self.settings.target_channel_id, "Digest published");
                        self.reply(&self.settings.admin_chat_id, PUBLISHED).await?;
                        Ok(DecisionOutcome::Published)
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to publish digest");
                        self.reply(
                            &self.settings.admin_chat_id,
                            &format!("⚠️ Ошибка публикации: {e}"),
                        )
                        .await?;
                        Ok(DecisionOutcome::PublishFailed)
                    }
                }
            }
            Decision::Reject => {
                self.edit_admin_message(message_id, REJECTED).await;
                Ok(DecisionOutcome::Rejected)
            }
        }
    }

    async fn reply(&self, chat_id: &str, text: &str) -> Result<MessageId, Error> {
        Ok(self
            .messenger
            .send(OutgoingMessage::text(chat_id, text))
            .await?)
    }

    /// Best effort: a stale callback or an unchanged message must not block
    /// the decision itself.
    async fn acknowledge(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.messenger.answer_callback(callback_id, text).await {
            warn!(error = %e, "Failed to answer callback");
        }
    }

    async fn edit_admin_message(&self, message_id: MessageId, text: &str) {
        if let Err(e) = self
            .messenger
            .edit_text(&self.settings.admin_chat_id, message_id, text)
            .await
        {
            warn!(message_id, error = %e, "Failed to edit draft message");
        }
    }

    async fn report_error(&self, err: &Error) {
        let notice = OutgoingMessage::text(
            &self.settings.admin_chat_id,
            format!("⚠️ Ошибка в боте:\n{err}"),
        );
        if let Err(e) = self.messenger.send(notice).await {
            error!(error = %e, "Failed to notify admin about error");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;
    use crate::channels::{ChannelPost, ParseMode};
    use crate::config::CollectorConfig;
    use crate::drafts::{Draft, InMemoryDraftStore};
    use crate::pipeline::Collector;
    use crate::test_support::{RecordingMessenger, StubReader, StubSummarizer};

    const ADMIN: &str = "42";
    const TARGET: &str = "@elections";
    const DRAFT_ID: MessageId = 7;

    struct Fixture {
        _dir: tempfile::TempDir,
        bot: DigestBot,
        pipeline: Arc<DigestPipeline>,
        summarizer: Arc<StubSummarizer>,
        messenger: Arc<RecordingMessenger>,
        drafts: Arc<InMemoryDraftStore>,
    }

    fn fixture(allowed_users: &[&str], summary: Option<&str>) -> Fixture {
        fixture_with(allowed_users, StubSummarizer::replying(summary))
    }

    fn fixture_with(allowed_users: &[&str], summarizer: StubSummarizer) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("channels.txt");
        std::fs::write(&list, "news").unwrap();

        let reader = StubReader::new(&[("news", vec![ChannelPost::text("news/1", "выборы")])]);
        let collector = Collector::new(
            reader,
            &CollectorConfig {
                channels_file: list,
                ..CollectorConfig::default()
            },
        );
        let messenger = RecordingMessenger::new();
        let drafts = InMemoryDraftStore::new();
        let summarizer = Arc::new(summarizer);
        let pipeline = Arc::new(DigestPipeline::new(
            collector,
            summarizer.clone(),
            messenger.clone(),
            drafts.clone(),
            ADMIN,
            Duration::from_secs(3600),
        ));

        let bot = DigestBot::new(
            pipeline.clone(),
            messenger.clone(),
            drafts.clone(),
            BotSettings {
                admin_chat_id: ADMIN.into(),
                target_channel_id: TARGET.into(),
                allowed_users: allowed_users.iter().map(|s| s.to_string()).collect(),
            },
        );

        Fixture {
            _dir: dir,
            bot,
            pipeline,
            summarizer,
            messenger,
            drafts,
        }
    }

    async fn with_draft(f: &Fixture) {
        f.drafts
            .put(Draft::new(DRAFT_ID, "<b>Итоги</b>", Duration::from_secs(3600)))
            .await;
    }

    fn command(name: &str, chat_id: &str, username: &str) -> BotUpdate {
        BotUpdate::Command {
            name: name.into(),
            chat_id: chat_id.into(),
            sender: Sender {
                user_id: Some(1),
                username: Some(username.into()),
            },
        }
    }

    fn texts(messages: Vec<OutgoingMessage>) -> Vec<String> {
        messages.into_iter().map(|m| m.text).collect()
    }

    #[tokio::test]
    async fn start_greets() {
        let f = fixture(&["*"], None);
        f.bot.dispatch(command("start", "5", "alice")).await;
        assert_eq!(texts(f.messenger.sent_to("5")), vec![GREETING]);
    }

    #[tokio::test]
    async fn preview_runs_pipeline() {
        let f = fixture(&["*"], Some("итоги дня"));
        f.bot.dispatch(command("preview", ADMIN, "alice")).await;

        let sent = f.messenger.sent_to(ADMIN);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].text, GENERATING);
        assert_eq!(sent[1].text, "итоги дня");
        assert_eq!(sent[1].buttons.len(), 2);
        assert_eq!(f.drafts.len().await, 1);
    }

    #[tokio::test]
    async fn preview_during_running_digest_tells_requester() {
        let hold = Arc::new(Notify::new());
        let f = fixture_with(
            &["*"],
            StubSummarizer::replying(Some("итоги")).holding(hold.clone()),
        );

        let scheduled = {
            let pipeline = f.pipeline.clone();
            tokio::spawn(async move { pipeline.run(Trigger::Schedule).await })
        };
        f.summarizer.entered.notified().await;

        f.bot.dispatch(command("preview", "5", "alice")).await;
        assert_eq!(
            texts(f.messenger.sent_to("5")),
            vec![GENERATING, ALREADY_RUNNING]
        );

        hold.notify_one();
        let outcome = scheduled.await.unwrap().unwrap();
        assert!(matches!(outcome, RunOutcome::Drafted { .. }));
        assert_eq!(f.summarizer.call_count(), 1);
        assert_eq!(f.drafts.len().await, 1);
    }

    #[tokio::test]
    async fn preview_denied_for_unlisted_user() {
        let f = fixture(&["bob"], Some("итоги"));
        f.bot.dispatch(command("preview", "5", "alice")).await;

        assert_eq!(texts(f.messenger.sent_to("5")), vec![ACCESS_DENIED]);
        assert!(f.drafts.is_empty().await);
    }

    #[tokio::test]
    async fn preview_draft_delivery_failure_reported() {
        let f = fixture(&["*"], Some("итоги"));
        f.messenger.fail_sends_to(ADMIN);
        f.bot.dispatch(command("preview", "5", "alice")).await;

        // Only the "generating" reply got through; the report to the admin
        // failed too and was logged.
        assert_eq!(texts(f.messenger.sent_to("5")), vec![GENERATING]);
        assert!(f.drafts.is_empty().await);
    }

    #[tokio::test]
    async fn preview_with_nothing_to_summarize_stays_quiet() {
        let f = fixture(&["*"], None);
        f.bot.dispatch(command("preview", "5", "alice")).await;

        assert_eq!(texts(f.messenger.sent_to("5")), vec![GENERATING]);
        assert!(f.messenger.sent_to(ADMIN).is_empty());
    }

    #[tokio::test]
    async fn unknown_command_ignored() {
        let f = fixture(&["*"], None);
        f.bot.dispatch(command("help", "5", "alice")).await;
        assert_eq!(f.messenger.sent_count(), 0);
    }

    #[tokio::test]
    async fn approve_publishes_stored_text() {
        let f = fixture(&["*"], None);
        with_draft(&f).await;

        let outcome = f.bot.on_decision("cb1", "approve", ADMIN, DRAFT_ID).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::Published);

        let published = f.messenger.sent_to(TARGET);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].text, "<b>Итоги</b>");
        assert_eq!(published[0].parse_mode, Some(ParseMode::Html));
        assert_eq!(texts(f.messenger.sent_to(ADMIN)), vec![PUBLISHED]);
        assert_eq!(
            *f.messenger.edits.lock().unwrap(),
            vec![(ADMIN.to_string(), DRAFT_ID, APPROVED.to_string())]
        );
        assert_eq!(
            *f.messenger.answers.lock().unwrap(),
            vec![("cb1".to_string(), None)]
        );
        assert!(f.drafts.is_empty().await);
    }

    #[tokio::test]
    async fn reject_publishes_nothing() {
        let f = fixture(&["*"], None);
        with_draft(&f).await;

        let outcome = f.bot.on_decision("cb1", "reject", ADMIN, DRAFT_ID).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::Rejected);
        assert!(f.messenger.sent_to(TARGET).is_empty());
        assert_eq!(
            *f.messenger.edits.lock().unwrap(),
            vec![(ADMIN.to_string(), DRAFT_ID, REJECTED.to_string())]
        );
        assert!(f.drafts.is_empty().await);
    }

    #[tokio::test]
    async fn second_decision_is_noop() {
        let f = fixture(&["*"], None);
        with_draft(&f).await;

        f.bot.on_decision("cb1", "approve", ADMIN, DRAFT_ID).await.unwrap();
        let outcome = f.bot.on_decision("cb2", "approve", ADMIN, DRAFT_ID).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::DraftMissing);

        let outcome = f.bot.on_decision("cb3", "reject", ADMIN, DRAFT_ID).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::DraftMissing);

        assert_eq!(f.messenger.sent_to(TARGET).len(), 1);
        assert_eq!(f.messenger.edits.lock().unwrap().len(), 1);
        assert_eq!(
            f.messenger.answers.lock().unwrap()[1],
            ("cb2".to_string(), Some(DRAFT_NOT_FOUND.to_string()))
        );
    }

    #[tokio::test]
    async fn publish_failure_reported_to_admin() {
        let f = fixture(&["*"], None);
        with_draft(&f).await;
        f.messenger.fail_sends_to(TARGET);

        let outcome = f.bot.on_decision("cb1", "approve", ADMIN, DRAFT_ID).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::PublishFailed);

        let admin = texts(f.messenger.sent_to(ADMIN));
        assert_eq!(admin.len(), 1);
        assert!(admin[0].starts_with("⚠️ Ошибка публикации: "));
        assert!(admin[0].contains("chat not found"));
    }

    #[tokio::test]
    async fn decision_outside_admin_chat_ignored() {
        let f = fixture(&["*"], None);
        with_draft(&f).await;

        let outcome = f.bot.on_decision("cb1", "approve", "999", DRAFT_ID).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::Unauthorized);
        assert_eq!(f.messenger.sent_count(), 0);
        assert_eq!(f.drafts.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_callback_data_ignored() {
        let f = fixture(&["*"], None);
        with_draft(&f).await;

        let outcome = f.bot.on_decision("cb1", "maybe", ADMIN, DRAFT_ID).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::Ignored);
        assert_eq!(f.drafts.len().await, 1);
        assert_eq!(f.messenger.answers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn handler_error_reported_to_admin() {
        let f = fixture(&["*"], None);
        with_draft(&f).await;
        // Confirmation to the admin fails after a successful publish...
        f.messenger.fail_sends_to(ADMIN);
        f.bot
            .dispatch(BotUpdate::Callback {
                id: "cb1".into(),
                data: "approve".into(),
                chat_id: ADMIN.into(),
                message_id: DRAFT_ID,
                sender: Sender::default(),
            })
            .await;

        // ...and so does the error report; both are only logged.
        assert_eq!(f.messenger.sent_to(TARGET).len(), 1);
        assert!(f.messenger.sent_to(ADMIN).is_empty());
    }
}
