//! Service layer for the ingest and monitor jobs.
//!
//! Services receive the store, session provider, asset fetcher and notifier
//! as constructor parameters and can be driven by the CLI, the daemon or
//! tests alike.

pub mod ingest;
pub mod monitor;
pub mod notify;

pub use ingest::{IngestConfig, IngestReport, IngestService, IngestStage};
pub use monitor::{MonitorConfig, MonitorReport, MonitorService};
pub use notify::{
    notifier_from_settings, restock_message, LogNotifier, Notifier, NotifyError,
    TelegramNotifier, TelegramSettings,
};

use std::future::Future;

use crate::error::Error;
use crate::scrapers::{PageSession, SessionProvider};

/// Open a session, run `body` with it and close it again.
///
/// `body` hands the session back when done so it can be closed; if `body`
/// panics the session is dropped, which tears down its CDP handler.
pub async fn with_session<P, T, F, Fut>(provider: &P, body: F) -> Result<T, Error>
where
    P: SessionProvider,
    F: FnOnce(P::Session) -> Fut,
    Fut: Future<Output = (P::Session, T)>,
{
    let session = provider.open().await?;
    let (mut session, value) = body(session).await;
    session.close().await;
    Ok(value)
}
