//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all database operations.
//! It holds the connection factory and hands out repositories that share it.

use std::path::Path;

use diesel_async::SimpleAsyncConnection;

use super::catalog::CatalogRepository;
use super::pool::{DbError, SqlitePool};
use super::queue::QueueRepository;
use crate::error::Error;
use crate::utils::RetryPolicy;

/// Database context that manages the connection pool and provides repository access.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::from_url("sqlite:mangawatch.db");
/// let pending = ctx.queue().pending().await?;
/// ```
#[derive(Clone, Debug)]
pub struct DbContext {
    pool: SqlitePool,
}

impl DbContext {
    /// Create a context from a database file path.
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: SqlitePool::from_path(db_path),
        }
    }

    /// Create a context from a `sqlite:` URL or path.
    pub fn from_url(url: &str) -> Self {
        Self {
            pool: SqlitePool::new(url),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the pending-URL queue repository.
    pub fn queue(&self) -> QueueRepository {
        QueueRepository::new(self.pool.clone())
    }

    /// Get the product catalog repository.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Verify the store is reachable, retrying per `policy`.
    ///
    /// Called at the start of every run; exhausting the policy makes the run fail.
    pub async fn connect_checked(&self, policy: &RetryPolicy) -> Result<(), Error> {
        let mut conn = self.pool.get_with_retry(policy).await?;
        conn.batch_execute("SELECT 1").await?;
        Ok(())
    }

    /// Create the queue and catalog tables if they don't exist.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA_SQL).await
    }
}

/// Schema for the queue (`urls`) and the catalog (`manga`).
pub(crate) const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS urls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS manga (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        price TEXT,
        availability TEXT NOT NULL CHECK (availability IN ('Yes', 'No')),
        rating TEXT,
        trama TEXT,
        cover TEXT,
        cover_bin BLOB
    );

    CREATE INDEX IF NOT EXISTS idx_manga_availability ON manga(availability);
"#;
