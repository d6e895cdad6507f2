//! Queue ingress and inspection commands.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use console::style;

use super::helpers::open_db;
use mangawatch::config::Settings;

/// Queue URLs from arguments, a file, or stdin (`-`).
pub async fn cmd_add(settings: &Settings, urls: &[String], file: Option<&Path>) -> anyhow::Result<()> {
    let mut text = String::new();

    for url in urls {
        if url == "-" {
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read URLs from stdin")?;
        } else {
            text.push_str(url);
        }
        text.push('\n');
    }

    if let Some(path) = file {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        text.push_str(&contents);
    }

    if text.trim().is_empty() {
        println!("{} No URLs given", style("!").yellow());
        return Ok(());
    }

    let ctx = open_db(settings).await?;
    let inserted = ctx.queue().enqueue_text(&text).await?;
    let pending = ctx.queue().count().await?;

    println!(
        "{} Queued {} URL(s), {} pending",
        style("✓").green(),
        inserted,
        pending
    );
    Ok(())
}

/// List pending URLs.
pub async fn cmd_queue(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let pending = ctx.queue().pending().await?;

    if pending.is_empty() {
        println!("{} Queue is empty", style("✓").green());
        return Ok(());
    }

    println!("{} {} pending URL(s)", style("→").cyan(), pending.len());
    for item in &pending {
        println!("  {:>5}  {}", style(item.id).dim(), item.url);
    }
    Ok(())
}
