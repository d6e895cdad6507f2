//! End-to-end ingest and monitor runs against fake browser sessions.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use diesel_async::SimpleAsyncConnection;
use rust_decimal::Decimal;
use tempfile::{tempdir, TempDir};

use mangawatch::models::Availability;
use mangawatch::repository::DbContext;
use mangawatch::scrapers::{AssetFetcher, ExtractionRules, PageSession, SessionProvider};
use mangawatch::services::{
    IngestConfig, IngestService, MonitorConfig, MonitorService, Notifier, NotifyError,
};
use mangawatch::utils::RetryPolicy;
use mangawatch::Error;

const BERSERK: &str = "https://shop.example.com/dp/berserk-1";
const VAGABOND: &str = "https://shop.example.com/dp/vagabond-3";
const MISSING: &str = "https://shop.example.com/dp/gone";

fn page(title: &str, price: Option<&str>, out_of_stock: bool) -> String {
    let price = price
        .map(|p| {
            format!(
                r#"<div class="a-section a-spacing-none aok-align-center aok-relative">
                     <span class="aok-offscreen">{}</span>
                   </div>"#,
                p
            )
        })
        .unwrap_or_default();
    let marker = if out_of_stock {
        r#"<div id="outOfStock">Currently unavailable.</div>"#
    } else {
        ""
    };
    format!(
        r#"<html><body>
             <span id="productTitle">{}</span>
             {}
             {}
             <span id="acrPopover">4,6</span>
             <img id="landingImage" src="/images/cover.jpg">
           </body></html>"#,
        title, price, marker
    )
}

/// Pages keyed by URL; a URL with no page fails navigation.
#[derive(Clone, Default)]
struct FakeSite {
    pages: Arc<Mutex<HashMap<String, String>>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl FakeSite {
    fn set(&self, url: &str, html: String) {
        self.pages.lock().unwrap().insert(url.to_string(), html);
    }
}

struct FakeSession {
    site: FakeSite,
}

#[async_trait]
impl PageSession for FakeSession {
    async fn render(&mut self, url: &str, _settle: Duration) -> Result<String, Error> {
        self.site
            .pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Browser(format!("net::ERR_NAME_NOT_RESOLVED {}", url)))
    }

    async fn close(&mut self) {
        self.site.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionProvider for FakeSite {
    type Session = FakeSession;

    async fn open(&self) -> Result<FakeSession, Error> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession { site: self.clone() })
    }
}

struct FakeAssets;

#[async_trait]
impl AssetFetcher for FakeAssets {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, Error> {
        Ok(vec![0xff, 0xd8, 0xff, 0xe0])
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            return Err(NotifyError::Api {
                status: 502,
                body: "Bad Gateway".to_string(),
            });
        }
        Ok(())
    }
}

async fn setup_db() -> (DbContext, TempDir) {
    let dir = tempdir().unwrap();
    let ctx = DbContext::new(&dir.path().join("mangawatch.db"));
    ctx.init_schema().await.unwrap();
    (ctx, dir)
}

/// Install SQL (typically a trigger) straight into the test database.
async fn execute_sql(db: &DbContext, sql: &str) {
    let mut conn = db.pool().get().await.unwrap();
    conn.batch_execute(sql).await.unwrap();
}

fn ingest_service(db: &DbContext, site: &FakeSite) -> IngestService<FakeSite> {
    IngestService::new(
        db.clone(),
        site.clone(),
        Arc::new(FakeAssets),
        IngestConfig {
            settle: Duration::ZERO,
            delay: Duration::ZERO,
            rules: ExtractionRules::default(),
            retry: RetryPolicy::once(),
        },
    )
}

fn monitor_service(
    db: &DbContext,
    site: &FakeSite,
    notifier: Arc<RecordingNotifier>,
) -> MonitorService<FakeSite> {
    MonitorService::new(
        db.clone(),
        site.clone(),
        notifier,
        MonitorConfig {
            settle: Duration::ZERO,
            delay: Duration::ZERO,
            rules: ExtractionRules::default(),
            retry: RetryPolicy::once(),
        },
    )
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn empty_queue_opens_no_session() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();

    let report = ingest_service(&db, &site).run().await.unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(site.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ingest_stores_product_and_dequeues() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();
    site.set(BERSERK, page("Berserk Deluxe 1", Some("1.234,56 €"), false));
    db.queue().enqueue_text(&format!("  {}  \n\n", BERSERK.to_uppercase())).await.unwrap();

    let report = ingest_service(&db, &site).run().await.unwrap();
    assert_eq!((report.processed, report.ingested, report.failed), (1, 1, 0));
    assert_eq!(db.queue().count().await.unwrap(), 0);
    assert_eq!(site.opened.load(Ordering::SeqCst), 1);
    assert_eq!(site.closed.load(Ordering::SeqCst), 1);

    let products = db.catalog().by_url(BERSERK).await.unwrap();
    assert_eq!(products.len(), 1);
    let product = &products[0];
    assert_eq!(product.title, "Berserk Deluxe 1");
    assert_eq!(product.price, Some(dec("1234.56")));
    assert_eq!(product.availability, Availability::Available);
    assert_eq!(product.rating.as_deref(), Some("4.6"));
    assert_eq!(
        product.cover_url.as_deref(),
        Some("https://shop.example.com/images/cover.jpg")
    );
    assert_eq!(product.cover_image, Some(vec![0xff, 0xd8, 0xff, 0xe0]));
}

#[tokio::test]
async fn duplicate_lines_produce_duplicate_products() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();
    site.set(BERSERK, page("Berserk Deluxe 1", Some("12,34 €"), false));
    db.queue()
        .enqueue_text(&format!("{}\n{}\n", BERSERK, BERSERK))
        .await
        .unwrap();

    let report = ingest_service(&db, &site).run().await.unwrap();

    assert_eq!(report.ingested, 2);
    assert_eq!(db.catalog().by_url(BERSERK).await.unwrap().len(), 2);
}

#[tokio::test]
async fn missing_price_without_marker_is_unavailable_with_sentinel() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();
    site.set(VAGABOND, page("Vagabond 3", None, false));
    db.queue().enqueue(VAGABOND).await.unwrap();

    ingest_service(&db, &site).run().await.unwrap();

    let product = &db.catalog().by_url(VAGABOND).await.unwrap()[0];
    assert_eq!(product.availability, Availability::Unavailable);
    assert!(product.price.unwrap().is_zero());
}

#[tokio::test]
async fn every_line_ends_as_product_or_pending() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();
    site.set(BERSERK, page("Berserk Deluxe 1", Some("12,34 €"), false));
    site.set(VAGABOND, page("Vagabond 3", None, true));
    let lines = [BERSERK, MISSING, VAGABOND];
    db.queue().enqueue_text(&lines.join("\n")).await.unwrap();

    let report = ingest_service(&db, &site).run().await.unwrap();
    assert_eq!((report.processed, report.ingested, report.failed), (3, 2, 1));

    let pending: Vec<String> = db
        .queue()
        .pending()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.url)
        .collect();
    assert_eq!(pending, vec![MISSING.to_string()]);

    for line in lines {
        let stored = db.catalog().by_url(line).await.unwrap().len();
        let queued = pending.iter().filter(|p| p.as_str() == line).count();
        assert_eq!(stored + queued, 1, "{} must be stored or queued", line);
    }
}

#[tokio::test]
async fn restock_commits_and_notifies_once() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();
    site.set(VAGABOND, page("Vagabond 3", None, true));
    db.queue().enqueue(VAGABOND).await.unwrap();
    ingest_service(&db, &site).run().await.unwrap();

    site.set(VAGABOND, page("Vagabond 3", Some("9,99 €"), false));
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = monitor_service(&db, &site, notifier.clone());

    let first = monitor.run().await.unwrap();
    assert_eq!((first.checked, first.restocked), (1, 1));

    let product = &db.catalog().by_url(VAGABOND).await.unwrap()[0];
    assert_eq!(product.availability, Availability::Available);
    assert_eq!(product.price, Some(dec("9.99")));

    {
        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Vagabond 3"));
        assert!(messages[0].contains(VAGABOND));
        assert!(messages[0].contains("9.99€"));
    }

    let second = monitor.run().await.unwrap();
    assert_eq!(second.checked, 0);
    assert_eq!(second.restocked, 0);
    assert_eq!(second.skipped_available, 1);
    assert_eq!(notifier.messages.lock().unwrap().len(), 1);
    assert_eq!(db.catalog().by_url(VAGABOND).await.unwrap()[0], *product);
}

#[tokio::test]
async fn marker_absence_alone_does_not_restock() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();
    site.set(VAGABOND, page("Vagabond 3", None, true));
    db.queue().enqueue(VAGABOND).await.unwrap();
    ingest_service(&db, &site).run().await.unwrap();

    site.set(VAGABOND, page("Vagabond 3", None, false));
    let notifier = Arc::new(RecordingNotifier::default());
    let report = monitor_service(&db, &site, notifier.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.still_unavailable, 1);
    assert_eq!(report.restocked, 0);
    assert!(notifier.messages.lock().unwrap().is_empty());
    assert_eq!(
        db.catalog().by_url(VAGABOND).await.unwrap()[0].availability,
        Availability::Unavailable
    );
}

#[tokio::test]
async fn failed_notification_keeps_committed_state() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();
    site.set(VAGABOND, page("Vagabond 3", None, true));
    db.queue().enqueue(VAGABOND).await.unwrap();
    ingest_service(&db, &site).run().await.unwrap();

    site.set(VAGABOND, page("Vagabond 3", Some("7,50 €"), false));
    let notifier = Arc::new(RecordingNotifier {
        fail: true,
        ..Default::default()
    });
    let report = monitor_service(&db, &site, notifier).run().await.unwrap();

    assert_eq!(report.restocked, 1);
    assert_eq!(report.notifications_failed, 1);
    let product = &db.catalog().by_url(VAGABOND).await.unwrap()[0];
    assert_eq!(product.availability, Availability::Available);
    assert_eq!(product.price, Some(dec("7.50")));
}

#[tokio::test]
async fn navigation_failure_in_monitor_is_isolated() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();
    site.set(VAGABOND, page("Vagabond 3", None, true));
    site.set(BERSERK, page("Berserk Deluxe 1", None, true));
    db.queue()
        .enqueue_text(&format!("{}\n{}", VAGABOND, BERSERK))
        .await
        .unwrap();
    ingest_service(&db, &site).run().await.unwrap();

    site.pages.lock().unwrap().remove(VAGABOND);
    site.set(BERSERK, page("Berserk Deluxe 1", Some("30,00 €"), false));
    let notifier = Arc::new(RecordingNotifier::default());
    let report = monitor_service(&db, &site, notifier.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.checked, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.restocked, 1);
    assert_eq!(notifier.messages.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unparsable_price_is_stored_unavailable_and_monitored() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();
    site.set(VAGABOND, page("Vagabond 3", Some("Prezzo non disponibile"), false));
    db.queue().enqueue(VAGABOND).await.unwrap();

    ingest_service(&db, &site).run().await.unwrap();

    let product = &db.catalog().by_url(VAGABOND).await.unwrap()[0];
    assert_eq!(product.availability, Availability::Unavailable);
    assert!(product.price.unwrap().is_zero());

    let notifier = Arc::new(RecordingNotifier::default());
    let report = monitor_service(&db, &site, notifier).run().await.unwrap();
    assert_eq!((report.checked, report.still_unavailable), (1, 1));
}

#[tokio::test]
async fn failed_insert_leaves_url_queued() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();
    site.set(BERSERK, page("Berserk Deluxe 1", Some("12,34 €"), false));
    db.queue().enqueue(BERSERK).await.unwrap();
    execute_sql(
        &db,
        "CREATE TRIGGER reject_insert BEFORE INSERT ON manga \
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
    )
    .await;

    let report = ingest_service(&db, &site).run().await.unwrap();

    assert_eq!((report.processed, report.ingested, report.failed), (1, 0, 1));
    assert_eq!(db.queue().count().await.unwrap(), 1);
    assert!(db.catalog().all().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_restock_update_is_skipped_and_run_continues() {
    let (db, _dir) = setup_db().await;
    let site = FakeSite::default();
    site.set(VAGABOND, page("Vagabond 3", None, true));
    site.set(BERSERK, page("Berserk Deluxe 1", None, true));
    db.queue()
        .enqueue_text(&format!("{}\n{}", VAGABOND, BERSERK))
        .await
        .unwrap();
    ingest_service(&db, &site).run().await.unwrap();

    execute_sql(
        &db,
        &format!(
            "CREATE TRIGGER reject_update BEFORE UPDATE ON manga WHEN OLD.url = '{}' \
             BEGIN SELECT RAISE(ABORT, 'locked'); END;",
            VAGABOND
        ),
    )
    .await;
    site.set(VAGABOND, page("Vagabond 3", Some("9,99 €"), false));
    site.set(BERSERK, page("Berserk Deluxe 1", Some("30,00 €"), false));
    let notifier = Arc::new(RecordingNotifier::default());
    let report = monitor_service(&db, &site, notifier.clone())
        .run()
        .await
        .unwrap();

    assert_eq!((report.checked, report.failed, report.restocked), (2, 1, 1));
    assert_eq!(notifier.messages.lock().unwrap().len(), 1);
    assert_eq!(
        db.catalog().by_url(VAGABOND).await.unwrap()[0].availability,
        Availability::Unavailable
    );
    assert_eq!(
        db.catalog().by_url(BERSERK).await.unwrap()[0].availability,
        Availability::Available
    );
}
