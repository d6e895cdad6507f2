//! Seams between the workers and the outside world they scrape.
//!
//! Workers only see these traits; `BrowserSessionProvider` and
//! `HttpAssetFetcher` are the production implementations.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;

/// A live browser session that can be pointed at product pages.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate to `url`, wait `settle` for dynamic content, and return the
    /// rendered document HTML.
    async fn render(&mut self, url: &str, settle: Duration) -> Result<String, Error>;

    /// Release the session. Must be safe to call on a half-broken session.
    async fn close(&mut self);
}

/// Opens browser sessions, one per worker run.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: PageSession;

    /// Acquire a session. Failure is fatal for the run.
    async fn open(&self) -> Result<Self::Session, Error>;
}

/// Best-effort download of binary assets such as cover images.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, Error>;
}
