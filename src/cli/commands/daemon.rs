//! Daemon mode: both jobs on their own intervals.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::error;

use super::helpers::{
    ingest_service, monitor_service, open_db, print_ingest_report, print_monitor_report,
};
use mangawatch::config::Settings;

/// Run ingestion and monitoring periodically until Ctrl-C.
///
/// Each job gets its own task, so a long monitor pass never delays
/// ingestion. Runs of the same job never overlap. Failed runs are logged and
/// retried on the next tick.
pub async fn cmd_daemon(settings: &Settings) -> anyhow::Result<()> {
    let db = open_db(settings).await?;
    let ingest = Arc::new(ingest_service(settings, db.clone())?);
    let monitor = Arc::new(monitor_service(settings, db)?);

    let ingest_every = Duration::from_secs(settings.schedule.ingest_interval_secs.max(1));
    let monitor_every = Duration::from_secs(settings.schedule.monitor_interval_secs.max(1));

    println!(
        "{} Running in daemon mode (ingest every {}s, monitor every {}s)",
        style("→").cyan(),
        ingest_every.as_secs(),
        monitor_every.as_secs()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ingest_task = {
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ingest_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }
                match ingest.run().await {
                    Ok(report) => print_ingest_report(&report),
                    Err(e) => error!("Ingest run failed: {}", e),
                }
            }
        })
    };

    let monitor_task = {
        let mut shutdown = shutdown_rx;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }
                match monitor.run().await {
                    Ok(report) => print_monitor_report(&report),
                    Err(e) => error!("Monitor run failed: {}", e),
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    println!(
        "{} Shutting down after current runs finish...",
        style("↻").cyan()
    );
    let _ = shutdown_tx.send(true);

    let (ingest_result, monitor_result) = tokio::join!(ingest_task, monitor_task);
    ingest_result?;
    monitor_result?;

    println!("{} Stopped", style("✓").green());
    Ok(())
}
