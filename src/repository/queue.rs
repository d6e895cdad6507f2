//! Pending-URL queue repository.

use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::info;

use super::models::{NewPendingUrl, PendingUrlRecord};
use super::pool::{DbError, SqlitePool};
use crate::models::PendingUrl;
use crate::schema::urls;

/// Split submitted text into queue entries.
///
/// One entry per non-empty line, trimmed and lower-cased. No URL
/// validation happens here; malformed entries fail at extraction time.
pub fn parse_submission(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Repository for the `urls` table.
#[derive(Clone)]
pub struct QueueRepository {
    pool: SqlitePool,
}

impl QueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Queue a single URL as given.
    pub async fn enqueue(&self, url: &str) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;

        diesel::insert_into(urls::table)
            .values(&NewPendingUrl { url })
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Queue every line of a newline-separated submission.
    ///
    /// Returns the number of rows inserted. Duplicates are queued as-is.
    pub async fn enqueue_text(&self, text: &str) -> Result<usize, DbError> {
        let entries = parse_submission(text);
        if entries.is_empty() {
            return Ok(0);
        }

        let mut conn = self.pool.get().await?;
        let inserted = conn
            .transaction(|conn| {
                Box::pin(async move {
                    let mut inserted = 0;
                    for url in &entries {
                        inserted += diesel::insert_into(urls::table)
                            .values(&NewPendingUrl { url: url.as_str() })
                            .execute(conn)
                            .await?;
                    }
                    Ok::<_, DbError>(inserted)
                })
            })
            .await?;

        info!("Queued {} URL(s)", inserted);
        Ok(inserted)
    }

    /// All queued URLs, oldest first.
    pub async fn pending(&self) -> Result<Vec<PendingUrl>, DbError> {
        let mut conn = self.pool.get().await?;

        urls::table
            .order(urls::id.asc())
            .load::<PendingUrlRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(PendingUrl::from).collect())
    }

    /// Number of queued URLs.
    pub async fn count(&self) -> Result<i64, DbError> {
        let mut conn = self.pool.get().await?;

        urls::table.count().get_result(&mut conn).await
    }
}
