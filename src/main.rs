use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use form_bot::api::record_routes;
use form_bot::channels::{ChannelManager, CliChannel, TelegramChannel};
use form_bot::config::BotConfig;
use form_bot::dispatch::Dispatcher;
use form_bot::form::FormEngine;
use form_bot::store::{InMemoryRecordRepository, InMemorySessionStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export TELEGRAM_BOT_TOKEN=123456:ABC...   or   export FORM_BOT_CLI=1");
        std::process::exit(1);
    });

    // Initialize tracing; the guard flushes the log file on exit.
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "form-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();

    eprintln!("📝 Form Bot v{}", env!("CARGO_PKG_VERSION"));

    // ── Stores + engine ─────────────────────────────────────────────────
    let engine = Arc::new(FormEngine::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(InMemoryRecordRepository::new()),
    ));

    // ── Records API ─────────────────────────────────────────────────────
    if let Some(port) = config.http_port {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let app = record_routes(Arc::clone(&engine));
        eprintln!("   Records API: http://0.0.0.0:{port}/api/records/{{participant_id}}");
        tokio::spawn(async move {
            tracing::info!(port, "Records API server started");
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Records API server stopped");
            }
        });
    }

    // ── Channels ────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();

    if config.cli_enabled {
        channels.add(Box::new(CliChannel::new()));
        eprintln!("   CLI: enabled (/fillform to begin, #key to press a button)");
    }

    if let Some(token) = config.telegram_token {
        channels.add(Box::new(TelegramChannel::new(
            token,
            config.poll_timeout_secs,
        )));
        eprintln!(
            "   Telegram: enabled (long-poll {}s)",
            config.poll_timeout_secs
        );
    }

    eprintln!("   Channels: {}\n", channels.names().join(", "));

    for (name, e) in channels.health_check_all().await {
        tracing::warn!(channel = %name, error = %e, "Channel health check failed");
    }

    let dispatcher = Dispatcher::new(engine, channels);
    dispatcher.run().await?;

    Ok(())
}
