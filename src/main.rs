use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use ortograbot::channels::TwitterTransport;
use ortograbot::config::{BotConfig, ScheduleConfig, StoreConfig, TwitterConfig};
use ortograbot::lang::WhatlangClassifier;
use ortograbot::pipeline::controller::{RunController, RunDeps};
use ortograbot::pipeline::rules::RuleCatalog;
use ortograbot::scheduler::{Schedule, spawn_run_ticker};
use ortograbot::store::{EngagementStore, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing();

    let bot_config = BotConfig::from_env()?;
    let twitter_config = TwitterConfig::from_env(!bot_config.debug)?;
    let store_config = StoreConfig::from_env();
    let schedule_config = ScheduleConfig::from_env()?;

    eprintln!("📝 ortograbot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Handle: @{}", bot_config.bot_handle);
    eprintln!(
        "   Mode: {}",
        if bot_config.debug {
            "debug (no posting)"
        } else {
            "live"
        }
    );

    // ── Rules ────────────────────────────────────────────────────────
    let catalog = match &bot_config.rules_path {
        Some(path) => RuleCatalog::from_json_file(path)
            .with_context(|| format!("loading rules from {}", path.display()))?,
        None => RuleCatalog::default_rules(),
    };
    eprintln!("   Rules: {}", catalog.len());

    // ── History store ────────────────────────────────────────────────
    let store = Arc::new(
        LibSqlBackend::new_local(&store_config.db_path)
            .await
            .with_context(|| format!("opening database at {}", store_config.db_path.display()))?,
    );
    let recent = store
        .count_since(Utc::now() - bot_config.dedup_window)
        .await
        .unwrap_or(0);
    eprintln!(
        "   Database: {} ({} engagements inside dedup window)",
        store_config.db_path.display(),
        recent
    );

    // ── Controller ───────────────────────────────────────────────────
    let deps = RunDeps {
        transport: Arc::new(TwitterTransport::new(twitter_config)),
        classifier: Arc::new(WhatlangClassifier::new()),
        store,
    };
    let mut controller = RunController::new(&bot_config, catalog, deps)?;

    if schedule_config.run_once {
        eprintln!("   Schedule: single run\n");
        controller.run_once().await;
        return Ok(());
    }

    match &schedule_config.schedule {
        Schedule::Interval(period) => {
            eprintln!("   Schedule: every {} min\n", period.as_secs() / 60)
        }
        Schedule::Cron(expr) => eprintln!("   Schedule: cron {}\n", expr),
    }

    let (handle, shutdown) = spawn_run_ticker(controller, schedule_config.schedule);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Shutdown requested, waiting for current run to finish");
    shutdown.notify_one();
    handle.await.context("run ticker panicked")?;

    Ok(())
}

/// Console logging filtered by `RUST_LOG` (default `info`), plus a daily
/// rolling file when `ORTOGRA_LOG_DIR` is set.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match std::env::var("ORTOGRA_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ortograbot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}
