//! Shared helper functions for CLI commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use console::style;

use mangawatch::config::Settings;
use mangawatch::repository::DbContext;
use mangawatch::scrapers::{BrowserSessionProvider, HttpAssetFetcher};
use mangawatch::services::{
    notifier_from_settings, IngestReport, IngestService, MonitorReport, MonitorService,
};

/// Open the store, creating the data directory and schema when missing.
pub async fn open_db(settings: &Settings) -> anyhow::Result<DbContext> {
    if settings.database_url.is_none() {
        settings.ensure_directories().with_context(|| {
            format!("Failed to create data directory {}", settings.data_dir.display())
        })?;
    }

    let ctx = settings.create_db_context();
    ctx.init_schema()
        .await
        .with_context(|| format!("Failed to open database {}", settings.database_url()))?;
    Ok(ctx)
}

fn session_provider(settings: &Settings) -> BrowserSessionProvider {
    BrowserSessionProvider::new(settings.browser.clone(), settings.retry.clone())
}

/// Build the ingestion service from settings.
pub fn ingest_service(
    settings: &Settings,
    db: DbContext,
) -> anyhow::Result<IngestService<BrowserSessionProvider>> {
    let assets = HttpAssetFetcher::new(Duration::from_secs(settings.browser.timeout))
        .context("Failed to build HTTP client")?;
    Ok(IngestService::new(
        db,
        session_provider(settings),
        Arc::new(assets),
        settings.ingest_config(),
    ))
}

/// Build the availability monitor from settings.
pub fn monitor_service(
    settings: &Settings,
    db: DbContext,
) -> anyhow::Result<MonitorService<BrowserSessionProvider>> {
    let notifier = notifier_from_settings(&settings.telegram)
        .context("Failed to configure notifier")?;
    Ok(MonitorService::new(
        db,
        session_provider(settings),
        Arc::from(notifier),
        settings.monitor_config(),
    ))
}

pub fn print_ingest_report(report: &IngestReport) {
    let elapsed = report.finished_at - report.started_at;
    println!(
        "{} Ingest: {} processed, {} ingested, {} failed, {} skipped ({}s)",
        if report.failed == 0 {
            style("✓").green()
        } else {
            style("!").yellow()
        },
        report.processed,
        style(report.ingested).green(),
        style(report.failed).red(),
        report.skipped,
        elapsed.num_seconds()
    );
}

pub fn print_monitor_report(report: &MonitorReport) {
    let elapsed = report.finished_at - report.started_at;
    println!(
        "{} Monitor: {} checked, {} restocked, {} still unavailable, {} failed, {} already available ({}s)",
        if report.failed == 0 {
            style("✓").green()
        } else {
            style("!").yellow()
        },
        report.checked,
        style(report.restocked).green(),
        report.still_unavailable,
        style(report.failed).red(),
        report.skipped_available,
        elapsed.num_seconds()
    );
    if report.notifications_failed > 0 {
        println!(
            "  {} {} notification(s) could not be delivered",
            style("!").yellow(),
            report.notifications_failed
        );
    }
}
