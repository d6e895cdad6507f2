//! Diesel ORM models for the queue and catalog tables.

use diesel::prelude::*;
use rust_decimal::Decimal;

use crate::models::{Availability, NewProduct, PendingUrl, Product};
use crate::schema;

/// Queued URL record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::urls)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PendingUrlRecord {
    pub id: i32,
    pub url: String,
}

/// New queued URL for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::urls)]
pub struct NewPendingUrl<'a> {
    pub url: &'a str,
}

/// Catalog record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::manga)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProductRecord {
    pub id: i32,
    pub title: String,
    pub url: String,
    pub price: Option<String>,
    pub availability: String,
    pub rating: Option<String>,
    pub trama: Option<String>,
    pub cover: Option<String>,
    pub cover_bin: Option<Vec<u8>>,
}

/// New catalog row for insertion.
///
/// Owns its data so it can move into a transaction closure.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = schema::manga)]
pub struct NewProductRecord {
    pub title: String,
    pub url: String,
    pub price: Option<String>,
    pub availability: String,
    pub rating: Option<String>,
    pub trama: Option<String>,
    pub cover: Option<String>,
    pub cover_bin: Option<Vec<u8>>,
}

impl From<PendingUrlRecord> for PendingUrl {
    fn from(record: PendingUrlRecord) -> Self {
        PendingUrl {
            id: record.id,
            url: record.url,
        }
    }
}

impl From<ProductRecord> for Product {
    fn from(record: ProductRecord) -> Self {
        Product {
            id: record.id,
            title: record.title,
            url: record.url,
            price: record.price.as_deref().and_then(|p| p.parse::<Decimal>().ok()),
            // The column is constrained to Yes/No; anything else reads as out of stock.
            availability: Availability::from_str(&record.availability)
                .unwrap_or(Availability::Unavailable),
            rating: record.rating,
            synopsis: record.trama,
            cover_url: record.cover,
            cover_image: record.cover_bin,
        }
    }
}

impl From<NewProduct> for NewProductRecord {
    fn from(product: NewProduct) -> Self {
        NewProductRecord {
            title: product.title,
            url: product.url,
            price: product.price.map(|p| p.to_string()),
            availability: product.availability.as_str().to_string(),
            rating: product.rating,
            trama: product.synopsis,
            cover: product.cover_url,
            cover_bin: product.cover_image,
        }
    }
}
