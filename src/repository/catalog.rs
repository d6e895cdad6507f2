//! Product catalog repository.

use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use rust_decimal::Decimal;

use super::models::{NewProductRecord, ProductRecord};
use super::pool::{DbError, SqlitePool};
use crate::models::{Availability, NewProduct, Product};
use crate::schema::{manga, urls};

/// Result of committing an ingested product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueOutcome {
    /// The queue entry was removed and the product inserted.
    Inserted,
    /// The queue entry was already gone (consumed by an overlapping run);
    /// nothing was inserted.
    AlreadyDequeued,
}

/// Catalog counts by availability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub available: i64,
    pub unavailable: i64,
}

/// Repository for the `manga` table.
#[derive(Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an ingested product and remove its queue entry atomically.
    ///
    /// The delete runs first: if the entry is already gone nothing is
    /// inserted. A failed insert rolls the delete back so the URL stays
    /// queued for the next run.
    pub async fn insert_and_dequeue(
        &self,
        pending_id: i32,
        product: NewProduct,
    ) -> Result<DequeueOutcome, DbError> {
        let record = NewProductRecord::from(product);
        let mut conn = self.pool.get().await?;

        conn.transaction(|conn| {
            Box::pin(async move {
                let removed = diesel::delete(urls::table.filter(urls::id.eq(pending_id)))
                    .execute(conn)
                    .await?;
                if removed == 0 {
                    return Ok(DequeueOutcome::AlreadyDequeued);
                }

                diesel::insert_into(manga::table)
                    .values(&record)
                    .execute(conn)
                    .await?;

                Ok::<_, DbError>(DequeueOutcome::Inserted)
            })
        })
        .await
    }

    /// Every product in the catalog, by id.
    pub async fn all(&self) -> Result<Vec<Product>, DbError> {
        let mut conn = self.pool.get().await?;

        manga::table
            .order(manga::id.asc())
            .load::<ProductRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Product::from).collect())
    }

    /// Products with the given URL (duplicates are possible).
    pub async fn by_url(&self, url: &str) -> Result<Vec<Product>, DbError> {
        let mut conn = self.pool.get().await?;

        manga::table
            .filter(manga::url.eq(url))
            .order(manga::id.asc())
            .load::<ProductRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Product::from).collect())
    }

    /// Get a product by id.
    pub async fn get(&self, id: i32) -> Result<Option<Product>, DbError> {
        let mut conn = self.pool.get().await?;

        manga::table
            .find(id)
            .first::<ProductRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Product::from))
    }

    /// Commit an Unavailable -> Available transition.
    ///
    /// Guarded on the current availability, so of several overlapping
    /// monitor passes only one sees `true` and notifies.
    pub async fn mark_available(&self, id: i32, price: Decimal) -> Result<bool, DbError> {
        let mut conn = self.pool.get().await?;

        let updated = diesel::update(
            manga::table
                .filter(manga::id.eq(id))
                .filter(manga::availability.eq(Availability::Unavailable.as_str())),
        )
        .set((
            manga::availability.eq(Availability::Available.as_str()),
            manga::price.eq(Some(price.to_string())),
        ))
        .execute(&mut conn)
        .await?;

        Ok(updated > 0)
    }

    /// Count products by availability.
    pub async fn stats(&self) -> Result<CatalogStats, DbError> {
        let mut conn = self.pool.get().await?;

        let counts: Vec<(String, i64)> = manga::table
            .group_by(manga::availability)
            .select((manga::availability, diesel::dsl::count_star()))
            .load(&mut conn)
            .await?;

        let mut stats = CatalogStats::default();
        for (availability, count) in counts {
            match Availability::from_str(&availability) {
                Some(Availability::Available) => stats.available += count,
                _ => stats.unavailable += count,
            }
        }
        Ok(stats)
    }
}
