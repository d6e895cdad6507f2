//! Availability monitor.
//!
//! Revisits every unavailable product and flips it to available once its
//! page shows a price again. The flip is committed first and notified
//! after, so a notification always describes stored state.
//!
//! Products already available are not revisited: going out of stock again
//! is not detected.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use super::notify::{restock_message, Notifier};
use super::with_session;
use crate::error::Error;
use crate::models::Product;
use crate::repository::DbContext;
use crate::scrapers::{
    extract_price, normalize_price, ExtractionRules, MissingPrice, PageSession, SessionProvider,
};
use crate::utils::RetryPolicy;

/// Configuration for the availability monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Wait after navigation for dynamic content.
    pub settle: Duration,
    /// Throttle after every restock.
    pub delay: Duration,
    pub rules: ExtractionRules,
    pub retry: RetryPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(7),
            delay: Duration::from_secs(5),
            rules: ExtractionRules::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome counts of one monitor pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Unavailable products whose page was visited.
    pub checked: usize,
    /// Products skipped because they are already available.
    pub skipped_available: usize,
    pub restocked: usize,
    pub still_unavailable: usize,
    pub failed: usize,
    pub notifications_failed: usize,
}

impl MonitorReport {
    fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            checked: 0,
            skipped_available: 0,
            restocked: 0,
            still_unavailable: 0,
            failed: 0,
            notifications_failed: 0,
        }
    }
}

/// What a single product check came to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckOutcome {
    Restocked { notified: bool },
    StillUnavailable,
    /// Another pass committed the transition first.
    AlreadyAvailable,
}

/// Service for detecting restocks.
pub struct MonitorService<P> {
    db: DbContext,
    sessions: P,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
}

impl<P: SessionProvider> MonitorService<P> {
    /// Create a new monitor service.
    pub fn new(
        db: DbContext,
        sessions: P,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            db,
            sessions,
            notifier,
            config,
        }
    }

    /// Check every unavailable product once.
    pub async fn run(&self) -> Result<MonitorReport, Error> {
        self.run_inner().instrument(info_span!("monitor")).await
    }

    async fn run_inner(&self) -> Result<MonitorReport, Error> {
        let started_at = Utc::now();

        self.db.connect_checked(&self.config.retry).await?;
        let products = self.db.catalog().all().await?;

        let (available, unavailable): (Vec<Product>, Vec<Product>) = products
            .into_iter()
            .partition(|p| p.availability.is_available());
        for product in &available {
            debug!(id = product.id, "Already available, skipping {}", product.url);
        }

        let mut report = if unavailable.is_empty() {
            info!("No unavailable products to check");
            MonitorReport::empty(started_at)
        } else {
            info!("Checking {} unavailable product(s)", unavailable.len());
            with_session(&self.sessions, |mut session| async move {
                let report = self.check_all(&mut session, &unavailable, started_at).await;
                (session, report)
            })
            .await?
        };

        report.skipped_available += available.len();
        report.finished_at = Utc::now();
        info!(
            "Checked {} product(s): {} restocked, {} still unavailable, {} failed",
            report.checked, report.restocked, report.still_unavailable, report.failed
        );
        Ok(report)
    }

    async fn check_all<S: PageSession>(
        &self,
        session: &mut S,
        products: &[Product],
        started_at: DateTime<Utc>,
    ) -> MonitorReport {
        let mut report = MonitorReport::empty(started_at);

        for product in products {
            let span = info_span!("product", id = product.id, url = %product.url);
            let outcome = self.check_one(session, product).instrument(span.clone()).await;

            report.checked += 1;
            let restocked = span.in_scope(|| match outcome {
                Ok(CheckOutcome::Restocked { notified }) => {
                    report.restocked += 1;
                    if !notified {
                        report.notifications_failed += 1;
                    }
                    true
                }
                Ok(CheckOutcome::StillUnavailable) => {
                    report.still_unavailable += 1;
                    info!("Still unavailable");
                    false
                }
                Ok(CheckOutcome::AlreadyAvailable) => {
                    report.skipped_available += 1;
                    debug!("Restocked by an overlapping pass");
                    false
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("Check failed: {}", e);
                    false
                }
            });

            if restocked {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        report
    }

    async fn check_one<S: PageSession>(
        &self,
        session: &mut S,
        product: &Product,
    ) -> Result<CheckOutcome, Error> {
        let raw_price =
            extract_price(session, &self.config.rules, &product.url, self.config.settle).await?;

        let price = match raw_price
            .as_deref()
            .and_then(|text| normalize_price(text, MissingPrice::Absent))
        {
            Some(price) => price,
            None => return Ok(CheckOutcome::StillUnavailable),
        };

        if !self.db.catalog().mark_available(product.id, price).await? {
            return Ok(CheckOutcome::AlreadyAvailable);
        }
        info!("Back in stock at {}€", price);

        let notified = match self.notifier.notify(&restock_message(product, price)).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Notification failed: {}", e);
                false
            }
        };
        Ok(CheckOutcome::Restocked { notified })
    }
}
