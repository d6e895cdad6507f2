//! SQLite connection factory.
//!
//! Uses diesel-async's SyncConnectionWrapper to provide an async interface
//! for SQLite. Connections are cheap, so each operation opens its own and
//! drops it when done; nothing is held across a browser wait.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};

use super::util::{sqlite_path, to_diesel_error};
use crate::error::Error;
use crate::utils::{retry_with_backoff, RetryPolicy};

/// Diesel error type alias.
pub type DbError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// How long SQLite waits on a locked database before failing a statement.
/// Lets an ingest run and a monitor run write concurrently.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// SQLite connection pool (lightweight - creates connections on demand).
#[derive(Clone, Debug)]
pub struct SqlitePool {
    database_url: String,
}

impl SqlitePool {
    /// Create a new SQLite pool.
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: sqlite_path(database_url).to_string(),
        }
    }

    /// Create pool from a file path.
    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.display().to_string())
    }

    /// Get a connection.
    pub async fn get(&self) -> Result<SqliteConn, DbError> {
        let mut conn = SqliteConn::establish(&self.database_url)
            .await
            .map_err(to_diesel_error)?;
        conn.batch_execute(&format!("PRAGMA busy_timeout = {};", BUSY_TIMEOUT_MS))
            .await?;
        Ok(conn)
    }

    /// Get a connection, retrying connectivity faults per `policy`.
    pub async fn get_with_retry(&self, policy: &RetryPolicy) -> Result<SqliteConn, Error> {
        retry_with_backoff(policy, "database", || self.get()).await
    }
}
