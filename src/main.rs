use std::sync::Arc;

use anyhow::Context;
use digest_bot::bot::{self, BotSettings, DigestBot};
use digest_bot::channels::{TelegramChannel, WebPreviewReader};
use digest_bot::config::Config;
use digest_bot::drafts::{self, DraftStore, InMemoryDraftStore};
use digest_bot::llm::HttpSummarizer;
use digest_bot::pipeline::{Collector, DigestPipeline, Trigger};
use digest_bot::scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Values already in the environment take precedence over .env
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  See .env.example for the required variables.");
        std::process::exit(1);
    });

    eprintln!("📰 Digest bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!(
        "   Schedule: {:02}:{:02} {}",
        config.schedule.hour, config.schedule.minute, config.schedule.timezone
    );
    eprintln!("   Channels: {}", config.collector.channels_file.display());
    eprintln!("   Target: {}\n", config.telegram.target_channel_id);

    // ── Telegram ─────────────────────────────────────────────────────────
    let telegram = TelegramChannel::new(
        config.telegram.bot_token.clone(),
        &config.telegram.api_base,
    );
    let username = telegram
        .health_check()
        .await
        .context("Telegram health check failed")?;
    tracing::info!(bot = %username, "Connected to Telegram");
    let messenger = Arc::new(telegram.clone());

    // ── Drafts ───────────────────────────────────────────────────────────
    let draft_store = InMemoryDraftStore::new();
    let expiry_handle = drafts::spawn_expiry_task(
        Arc::clone(&draft_store) as Arc<dyn DraftStore>,
        drafts::SWEEP_INTERVAL,
    );

    // ── Pipeline ─────────────────────────────────────────────────────────
    let collector = Collector::new(
        Arc::new(WebPreviewReader::new(&config.collector.web_base)),
        &config.collector,
    );
    let pipeline = Arc::new(DigestPipeline::new(
        collector,
        Arc::new(HttpSummarizer::new(config.llm.clone())),
        messenger.clone(),
        draft_store.clone(),
        &config.telegram.admin_chat_id,
        config.draft_ttl,
    ));

    // ── Scheduler ────────────────────────────────────────────────────────
    let scheduler_handle = {
        let pipeline = Arc::clone(&pipeline);
        scheduler::spawn_daily_scheduler(config.schedule, move || {
            let pipeline = Arc::clone(&pipeline);
            async move {
                // Outcome and errors are logged inside the run span
                let _ = pipeline.run(Trigger::Schedule).await;
            }
        })
    };

    // ── Bot ──────────────────────────────────────────────────────────────
    let digest_bot = Arc::new(DigestBot::new(
        pipeline,
        messenger,
        draft_store,
        BotSettings {
            admin_chat_id: config.telegram.admin_chat_id.clone(),
            target_channel_id: config.telegram.target_channel_id.clone(),
            allowed_users: config.telegram.allowed_users.clone(),
        },
    ));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    bot::serve(digest_bot, telegram.start(), shutdown).await;

    tracing::info!("Shutting down...");
    scheduler_handle.shutdown().await;
    expiry_handle.abort();

    Ok(())
}
