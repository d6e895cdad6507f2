//! Ingestion worker.
//!
//! Turns every queued URL into a catalog product: render the page, read the
//! fields, normalize them, then insert the product and drop the queue entry
//! in one transaction. A URL that fails at any stage stays queued for the
//! next run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use super::with_session;
use crate::error::Error;
use crate::models::{Availability, NewProduct, PendingUrl};
use crate::repository::{DbContext, DequeueOutcome};
use crate::scrapers::{
    extract_rendered, normalize_price, normalize_rating, AssetFetcher, ExtractedProduct,
    ExtractionRules, MissingPrice, PageSession, SessionProvider,
};
use crate::utils::RetryPolicy;

/// Where a run currently is; carried in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Idle,
    FetchingQueue,
    Navigating,
    Extracting,
    Normalizing,
    Persisting,
    Dequeuing,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingQueue => "fetching_queue",
            Self::Navigating => "navigating",
            Self::Extracting => "extracting",
            Self::Normalizing => "normalizing",
            Self::Persisting => "persisting",
            Self::Dequeuing => "dequeuing",
        }
    }
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the ingestion worker.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Wait after navigation for dynamic content.
    pub settle: Duration,
    /// Throttle after every URL.
    pub delay: Duration,
    pub rules: ExtractionRules,
    pub retry: RetryPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(7),
            delay: Duration::from_secs(3),
            rules: ExtractionRules::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome counts of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// URLs attempted.
    pub processed: usize,
    /// Products inserted and dequeued.
    pub ingested: usize,
    /// URLs left queued after a failure.
    pub failed: usize,
    /// URLs whose queue entry was consumed by an overlapping run.
    pub skipped: usize,
}

impl IngestReport {
    fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            processed: 0,
            ingested: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

/// A per-URL failure and the stage it happened in.
struct StageError {
    stage: IngestStage,
    error: Error,
}

impl StageError {
    fn at(stage: IngestStage) -> impl FnOnce(Error) -> Self {
        move |error| Self { stage, error }
    }
}

/// Service for ingesting queued URLs.
pub struct IngestService<P> {
    db: DbContext,
    sessions: P,
    assets: Arc<dyn AssetFetcher>,
    config: IngestConfig,
}

impl<P: SessionProvider> IngestService<P> {
    /// Create a new ingestion service.
    pub fn new(
        db: DbContext,
        sessions: P,
        assets: Arc<dyn AssetFetcher>,
        config: IngestConfig,
    ) -> Self {
        Self {
            db,
            sessions,
            assets,
            config,
        }
    }

    /// Process every pending URL once.
    ///
    /// Fails only when the store or the browser cannot be reached; per-URL
    /// failures are counted in the report.
    pub async fn run(&self) -> Result<IngestReport, Error> {
        self.run_inner().instrument(info_span!("ingest")).await
    }

    async fn run_inner(&self) -> Result<IngestReport, Error> {
        let started_at = Utc::now();

        debug!(stage = %IngestStage::FetchingQueue, "Loading queue");
        self.db.connect_checked(&self.config.retry).await?;
        let pending = self.db.queue().pending().await?;

        if pending.is_empty() {
            info!("Queue is empty, nothing to ingest");
            return Ok(IngestReport::empty(started_at));
        }
        info!("Ingesting {} queued URL(s)", pending.len());

        let mut report = with_session(&self.sessions, |mut session| async move {
            let report = self.process_all(&mut session, &pending, started_at).await;
            (session, report)
        })
        .await?;

        report.finished_at = Utc::now();
        debug!(stage = %IngestStage::Idle, "Run finished");
        info!(
            "Ingested {}/{} URL(s) ({} failed, {} skipped)",
            report.ingested, report.processed, report.failed, report.skipped
        );
        Ok(report)
    }

    async fn process_all<S: PageSession>(
        &self,
        session: &mut S,
        pending: &[PendingUrl],
        started_at: DateTime<Utc>,
    ) -> IngestReport {
        let mut report = IngestReport::empty(started_at);

        for item in pending {
            let span = info_span!("url", id = item.id, url = %item.url);
            let outcome = self.process_one(session, item).instrument(span.clone()).await;

            report.processed += 1;
            span.in_scope(|| match outcome {
                Ok(DequeueOutcome::Inserted) => {
                    report.ingested += 1;
                    info!("Ingested");
                }
                Ok(DequeueOutcome::AlreadyDequeued) => {
                    report.skipped += 1;
                    warn!("Queue entry already consumed by another run, product not inserted");
                }
                Err(StageError { stage, error }) => {
                    report.failed += 1;
                    warn!(stage = %stage, "Failed, URL stays queued: {}", error);
                }
            });

            tokio::time::sleep(self.config.delay).await;
        }

        report
    }

    async fn process_one<S: PageSession>(
        &self,
        session: &mut S,
        item: &PendingUrl,
    ) -> Result<DequeueOutcome, StageError> {
        debug!(stage = %IngestStage::Navigating, "Loading page");
        let html = session
            .render(&item.url, self.config.settle)
            .await
            .map_err(StageError::at(IngestStage::Navigating))?;

        debug!(stage = %IngestStage::Extracting, "Reading fields");
        let extracted =
            extract_rendered(&html, self.assets.as_ref(), &self.config.rules, &item.url).await;

        debug!(stage = %IngestStage::Normalizing, "Normalizing");
        let product = to_new_product(&item.url, extracted);

        debug!(stage = %IngestStage::Persisting, "Saving product");
        let outcome = self
            .db
            .catalog()
            .insert_and_dequeue(item.id, product)
            .await
            .map_err(|e| StageError::at(IngestStage::Persisting)(e.into()))?;
        debug!(stage = %IngestStage::Dequeuing, ?outcome, "Committed");

        Ok(outcome)
    }
}

/// Normalize an extraction into an insertable product.
///
/// A missing or unparsable price is stored as the zero sentinel, and the
/// product is then always unavailable.
pub fn to_new_product(url: &str, extracted: ExtractedProduct) -> NewProduct {
    let ExtractedProduct {
        record,
        cover_image,
    } = extracted;
    let raw_price = record.raw_price.as_deref().unwrap_or_default();
    // Price text that does not parse counts as no price at all.
    let availability = match normalize_price(raw_price, MissingPrice::Absent) {
        Some(_) => record.availability(),
        None => Availability::Unavailable,
    };
    let price = normalize_price(raw_price, MissingPrice::ZeroSentinel);

    NewProduct {
        title: record.title.unwrap_or_default(),
        url: url.to_string(),
        price,
        availability,
        rating: record.rating.as_deref().map(normalize_rating),
        synopsis: record.synopsis,
        cover_url: record.cover_url,
        cover_image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Availability, PartialRecord};
    use crate::scrapers::normalize::zero_sentinel;
    use std::str::FromStr;

    #[test]
    fn test_to_new_product_full() {
        let extracted = ExtractedProduct {
            record: PartialRecord {
                title: Some("Berserk 1".to_string()),
                out_of_stock_marker: false,
                raw_price: Some("1.234,56 €".to_string()),
                rating: Some("4,8".to_string()),
                synopsis: Some("Guts.".to_string()),
                cover_url: Some("https://img.example.com/b1.jpg".to_string()),
            },
            cover_image: Some(vec![9]),
        };

        let product = to_new_product("https://shop.example.com/dp/B1", extracted);
        assert_eq!(product.title, "Berserk 1");
        assert_eq!(product.price, Some(rust_decimal::Decimal::from_str("1234.56").unwrap()));
        assert_eq!(product.availability, Availability::Available);
        assert_eq!(product.rating.as_deref(), Some("4.8"));
        assert_eq!(product.cover_image, Some(vec![9]));
    }

    #[test]
    fn test_to_new_product_without_price() {
        let extracted = ExtractedProduct {
            record: PartialRecord::default(),
            cover_image: None,
        };

        let product = to_new_product("https://shop.example.com/dp/X", extracted);
        assert_eq!(product.title, "");
        assert_eq!(product.price, Some(zero_sentinel()));
        assert_eq!(product.availability, Availability::Unavailable);
        assert!(product.rating.is_none());
    }

    #[test]
    fn test_unparsable_price_is_unavailable() {
        let extracted = ExtractedProduct {
            record: PartialRecord {
                title: Some("Vinland Saga 4".to_string()),
                out_of_stock_marker: false,
                raw_price: Some("Prezzo non disponibile".to_string()),
                ..Default::default()
            },
            cover_image: None,
        };

        let product = to_new_product("https://shop.example.com/dp/V4", extracted);
        assert_eq!(product.availability, Availability::Unavailable);
        assert_eq!(product.price, Some(zero_sentinel()));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(IngestStage::FetchingQueue.to_string(), "fetching_queue");
        assert_eq!(IngestStage::Persisting.as_str(), "persisting");
    }
}
