//! Catalog listing.

use console::style;

use super::helpers::open_db;
use mangawatch::config::Settings;

/// List every product with its price and availability.
pub async fn cmd_list(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let products = ctx.catalog().all().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&products)?);
        return Ok(());
    }

    if products.is_empty() {
        println!("{} Catalog is empty", style("!").yellow());
        return Ok(());
    }

    for product in &products {
        let availability = if product.availability.is_available() {
            style(product.availability.as_str()).green()
        } else {
            style(product.availability.as_str()).red()
        };
        let title = if product.title.is_empty() {
            "(untitled)"
        } else {
            product.title.as_str()
        };

        println!(
            "{:>5}  {:<3}  {:>10}  {}",
            style(product.id).dim(),
            availability,
            product.price_display(),
            style(title).bold()
        );
        println!("       {}", style(&product.url).dim());
    }

    let stats = ctx.catalog().stats().await?;
    println!(
        "\n{} {} product(s): {} available, {} unavailable",
        style("→").cyan(),
        products.len(),
        stats.available,
        stats.unavailable
    );
    Ok(())
}
