//! Notification test command.

use anyhow::Context;
use console::style;

use mangawatch::config::Settings;
use mangawatch::services::notifier_from_settings;

/// Send one message through the configured notifier.
pub async fn cmd_notify_test(settings: &Settings, message: Option<&str>) -> anyhow::Result<()> {
    let notifier = notifier_from_settings(&settings.telegram)?;
    let message = message.unwrap_or("mangawatch test notification");

    notifier
        .notify(message)
        .await
        .context("Failed to send notification")?;

    println!("{} Notification sent", style("✓").green());
    Ok(())
}
