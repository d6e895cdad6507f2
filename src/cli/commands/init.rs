//! Initialize command.

use console::style;

use super::helpers::open_db;
use mangawatch::config::Settings;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let pending = ctx.queue().count().await?;
    let stats = ctx.catalog().stats().await?;

    println!(
        "{} Initialized mangawatch at {}",
        style("✓").green(),
        settings.database_url()
    );
    println!(
        "  {} queued, {} available, {} unavailable",
        pending, stats.available, stats.unavailable
    );

    if settings.browser.remote_url.is_none() {
        println!(
            "  {} No browser.remote_url set, a local Chromium will be launched",
            style("→").dim()
        );
    }

    Ok(())
}
