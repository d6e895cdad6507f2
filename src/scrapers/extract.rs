//! Product page extraction.
//!
//! The browser renders the page; the rendered HTML is then read with
//! `scraper`. Each field is read on its own, so a layout change that breaks
//! one selector only blanks that field.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::session::{AssetFetcher, PageSession};
use crate::error::Error;
use crate::models::PartialRecord;
use crate::utils::clean_text;

/// CSS selectors for the product page fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRules {
    pub title: String,
    /// Element whose mere presence means "out of stock".
    pub out_of_stock: String,
    pub price: String,
    pub rating: String,
    pub synopsis: String,
    pub cover: String,
    /// Attribute of the cover element holding the image URL.
    pub cover_attr: String,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            title: "#productTitle".to_string(),
            out_of_stock: "#outOfStock".to_string(),
            price: ".a-section.a-spacing-none.aok-align-center.aok-relative span.aok-offscreen"
                .to_string(),
            rating: "#acrPopover".to_string(),
            synopsis: "#bookDescription_feature_div span".to_string(),
            cover: "#landingImage".to_string(),
            cover_attr: "src".to_string(),
        }
    }
}

/// A page extraction plus the eagerly downloaded cover.
#[derive(Debug, Clone, Default)]
pub struct ExtractedProduct {
    pub record: PartialRecord,
    pub cover_image: Option<Vec<u8>>,
}

/// Render `url` and read every product field from it.
///
/// Only a navigation failure is an error; missing fields come back as `None`.
pub async fn extract<S>(
    session: &mut S,
    assets: &dyn AssetFetcher,
    rules: &ExtractionRules,
    url: &str,
    settle: Duration,
) -> Result<ExtractedProduct, Error>
where
    S: PageSession + ?Sized,
{
    let html = session.render(url, settle).await?;
    Ok(extract_rendered(&html, assets, rules, url).await)
}

/// Read every product field from already rendered HTML and download the cover.
pub async fn extract_rendered(
    html: &str,
    assets: &dyn AssetFetcher,
    rules: &ExtractionRules,
    url: &str,
) -> ExtractedProduct {
    let mut record = read_fields(html, rules, url);

    if let Some(src) = record.cover_url.take() {
        record.cover_url = Some(resolve_url(url, &src));
    }

    let cover_image = match record.cover_url.as_deref() {
        Some(cover_url) => match assets.fetch(cover_url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Cover download failed for {}: {}", url, e);
                None
            }
        },
        None => None,
    };

    ExtractedProduct {
        record,
        cover_image,
    }
}

/// Render `url` and read only the price text.
pub async fn extract_price<S>(
    session: &mut S,
    rules: &ExtractionRules,
    url: &str,
    settle: Duration,
) -> Result<Option<String>, Error>
where
    S: PageSession + ?Sized,
{
    let html = session.render(url, settle).await?;
    Ok(read_price(&html, rules))
}

/// Read all fields from rendered page HTML.
pub fn read_fields(html: &str, rules: &ExtractionRules, url: &str) -> PartialRecord {
    let document = Html::parse_document(html);

    let title = select_text(&document, &rules.title);
    if title.is_none() {
        warn!("No title found on {}", url);
    }

    let out_of_stock_marker = select_first(&document, &rules.out_of_stock).is_some();

    let raw_price = select_text(&document, &rules.price);
    if raw_price.is_none() {
        warn!("No price found on {}", url);
    }

    let rating = select_text(&document, &rules.rating);
    if rating.is_none() {
        warn!("No rating found on {}", url);
    }

    let synopsis = select_text(&document, &rules.synopsis);
    if synopsis.is_none() {
        warn!("No synopsis found on {}", url);
    }

    let cover_url = select_first(&document, &rules.cover)
        .and_then(|el| el.value().attr(&rules.cover_attr))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string);
    if cover_url.is_none() {
        warn!("No cover found on {}", url);
    }

    PartialRecord {
        title,
        out_of_stock_marker,
        raw_price,
        rating,
        synopsis,
        cover_url,
    }
}

/// Read the price text from rendered page HTML.
pub fn read_price(html: &str, rules: &ExtractionRules) -> Option<String> {
    let document = Html::parse_document(html);
    select_text(&document, &rules.price)
}

/// Resolve a possibly relative `src` against the page it was found on.
pub fn resolve_url(page_url: &str, src: &str) -> String {
    match Url::parse(page_url).and_then(|base| base.join(src)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => src.to_string(),
    }
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = match Selector::parse(css) {
        Ok(selector) => selector,
        Err(e) => {
            debug!("Invalid selector '{}': {:?}", css, e);
            return None;
        }
    };
    document.select(&selector).next()
}

fn select_text(document: &Html, css: &str) -> Option<String> {
    select_first(document, css).and_then(|el| clean_text(&el.text().collect::<String>()))
}
