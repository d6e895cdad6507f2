//! One-shot ingest and monitor runs.

use super::helpers::{
    ingest_service, monitor_service, open_db, print_ingest_report, print_monitor_report,
};
use mangawatch::config::Settings;

/// Run the ingestion worker once.
pub async fn cmd_ingest(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let db = open_db(settings).await?;
    let report = ingest_service(settings, db)?.run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_ingest_report(&report);
    }
    Ok(())
}

/// Run the availability monitor once.
pub async fn cmd_monitor(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let db = open_db(settings).await?;
    let report = monitor_service(settings, db)?.run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_monitor_report(&report);
    }
    Ok(())
}
