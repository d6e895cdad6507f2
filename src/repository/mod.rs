//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM over SQLite. The queue (`urls`) and
//! the catalog (`manga`) share one database file.

pub mod catalog;
pub mod context;
pub mod models;
pub mod pool;
pub mod queue;
pub mod util;

pub use catalog::{CatalogRepository, CatalogStats, DequeueOutcome};
pub use context::DbContext;
pub use pool::{DbError, SqlitePool};
pub use queue::{parse_submission, QueueRepository};
