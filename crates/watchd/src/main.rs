//! Daemon entry point: load configuration, open the store, resolve the
//! configured providers, and run one poller per provider plus the adhoc
//! worker and the daily summary until a shutdown signal arrives.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use store::{ChangeScope, Store};
use watch_engine::{
    AdhocWorker, AdhocWorkerConfig, LogNotifier, Notifier, Poller, PollerConfig, SummaryConfig,
    SummaryTask,
};

mod config;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().context("configuration")?;
    info!(
        db_path = %config.db_path.display(),
        providers = ?config.providers,
        "starting campwatch"
    );

    let store = Store::open(&config.db_path)
        .await
        .with_context(|| format!("open store at {}", config.db_path.display()))?;

    let providers =
        providers::resolve_all(&config.providers).context("resolve configured providers")?;

    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let scope = if config.notify_preexisting_changes {
        ChangeScope::All
    } else {
        ChangeScope::SinceWatchCreation
    };

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    for provider in &providers {
        let poller = Poller::new(
            store.clone(),
            provider.clone(),
            notifier.clone(),
            scope,
            PollerConfig {
                min_interval: config.min_poll_interval,
                backoff_step: config.poll_backoff_step,
                summary_channel: config.summary_channel.clone(),
            },
        );
        tasks.push(tokio::spawn(poller.run(shutdown.clone())));
    }

    let worker = AdhocWorker::new(
        store.clone(),
        providers.clone(),
        notifier.clone(),
        scope,
        AdhocWorkerConfig {
            scan_interval: config.adhoc_scan_interval,
            ..AdhocWorkerConfig::default()
        },
    );
    tasks.push(tokio::spawn(worker.run(shutdown.clone())));

    let summary = SummaryTask::new(
        store.clone(),
        notifier.clone(),
        SummaryConfig {
            timezone: config.summary_timezone,
            local_hour: config.summary_local_hour,
            channel: config.summary_channel.clone(),
        },
    );
    tasks.push(tokio::spawn(summary.run(shutdown.clone())));

    wait_for_shutdown_signal().await?;
    info!("shutdown signal received");
    shutdown.cancel();

    for task in tasks {
        let _ = task.await;
    }

    info!("campwatch stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("install SIGINT handler")?,
        _ = sigterm.recv() => {}
    }

    Ok(())
}
