use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::Result;
use crate::mercury::MercuryClient;
use crate::monitor::{MonitorConfig, TransactionMonitor};
use crate::notify::LogNotifier;
use crate::settings;
use crate::store::TxnStore;
use crate::sync::SyncEngine;

/// The daemon. Two independent periodic tasks share the store and the API
/// client: the sync cycle (daily by default) and the notification poll
/// (60 s by default). Shutdown stops new ticks; an in-flight tick finishes
/// or times out on its own.
pub async fn run(cfg: Config) -> Result<()> {
    if let Some(dir) = cfg.db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let store = TxnStore::new(cfg.db_path.clone());
    store.init().await?;
    let client = MercuryClient::from_config(&cfg)?;
    let notification_settings = settings::load_settings();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = SyncEngine::new(client.clone(), store.clone());
    let mut sync_shutdown = shutdown_rx.clone();
    let sync_every = cfg.sync_interval;
    let sync_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(sync_every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = sync_shutdown.changed() => break,
                _ = interval.tick() => {
                    match engine.sync().await {
                        Ok(mode) => info!(?mode, "sync cycle complete"),
                        Err(e) => error!(error = %e, "sync cycle failed"),
                    }
                }
            }
        }
    });

    let mut monitor = TransactionMonitor::new(
        client,
        LogNotifier,
        notification_settings,
        MonitorConfig::default(),
    );
    let mut poll_shutdown = shutdown_rx;
    let poll_every = cfg.poll_interval;
    let monitor_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = poll_shutdown.changed() => break,
                _ = interval.tick() => {
                    match monitor.tick().await {
                        Ok(report) if report.seeded => info!("notification feed active"),
                        Ok(report) => debug!(fresh = report.fresh, emitted = report.emitted, "poll tick complete"),
                        Err(e) => error!(error = %e, "poll tick failed"),
                    }
                }
            }
        }
    });

    info!(db = %cfg.db_path.display(), "bursar serving; ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, waiting for in-flight work");
    let _ = shutdown_tx.send(true);
    let _ = sync_task.await;
    let _ = monitor_task.await;
    Ok(())
}
