use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::StreamExt;

use remodel_intake::channels::TelegramChannel;
use remodel_intake::config::{BotConfig, RunMode};
use remodel_intake::sink::{GoogleSheetsSink, RecordSink, ServiceAccountAuth};
use remodel_intake::survey::{SessionStore, SurveyManager, spawn_prune_task};
use remodel_intake::webhook::{WebhookState, webhook_routes};

/// How often abandoned sessions are swept.
const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("loading configuration")?;

    eprintln!("🏠 Remodel Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mode: {}", config.mode);
    eprintln!("   Sheet: {}", config.sheets.spreadsheet_id);

    // ── Telegram ─────────────────────────────────────────────────────────
    let telegram = TelegramChannel::new(config.bot_token.clone())
        .with_api_url(config.telegram_api_url.as_str())
        .with_send_policy(config.retry, config.call_timeout);
    if let Err(e) = telegram.health_check().await {
        tracing::warn!("Telegram health check failed: {e}");
    }

    // ── Google Sheets ────────────────────────────────────────────────────
    let auth = ServiceAccountAuth::from_json(&config.sheets.service_account_key)
        .context("loading GOOGLE_SERVICE_ACCOUNT_KEY")?;
    tracing::info!(client_email = auth.client_email(), "Loaded service account");
    let sink: Arc<dyn RecordSink> = Arc::new(GoogleSheetsSink::new(
        config.sheets.spreadsheet_id.clone(),
        config.sheets.sheet_title.clone(),
        Arc::new(auth),
    ));

    // ── Survey ───────────────────────────────────────────────────────────
    let sessions = SessionStore::new();
    spawn_prune_task(
        Arc::clone(&sessions),
        config.session_idle_timeout,
        PRUNE_INTERVAL,
    );
    let manager = Arc::new(
        SurveyManager::new(Arc::new(telegram.clone()), sink, sessions)
            .with_admin_chat(config.admin_chat_id)
            .with_call_timeout(config.call_timeout)
            .with_retry(config.retry),
    );

    match config.mode {
        RunMode::Polling => run_polling(telegram, manager).await,
        RunMode::Webhook => run_webhook(telegram, manager, &config).await,
    }
}

/// Long-poll Telegram and handle updates one at a time, in arrival order.
/// A panic while handling one update is logged and polling carries on.
async fn run_polling(telegram: TelegramChannel, manager: Arc<SurveyManager>) -> anyhow::Result<()> {
    // getUpdates is refused while a webhook is registered.
    telegram
        .delete_webhook()
        .await
        .context("removing webhook before polling")?;

    let mut updates = telegram.updates();
    while let Some(update) = updates.next().await {
        let update_id = update.update_id;
        if let Err(e) = manager.dispatch(update).await {
            tracing::error!(update_id, "Failed to handle update: {e}");
        }
    }

    tracing::info!("Update stream ended");
    Ok(())
}

/// Serve the webhook endpoint, registering it with Telegram first if a URL is set.
async fn run_webhook(
    telegram: TelegramChannel,
    manager: Arc<SurveyManager>,
    config: &BotConfig,
) -> anyhow::Result<()> {
    match config.webhook_url.as_deref() {
        Some(url) => {
            if let Err(e) = telegram.set_webhook(url).await {
                tracing::error!("Failed to register webhook: {e}");
            }
        }
        None => tracing::warn!("WEBHOOK_URL not set; register it later via /api/set-webhook"),
    }

    let app = webhook_routes(WebhookState {
        manager,
        telegram,
        webhook_url: config.webhook_url.clone(),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Webhook server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
