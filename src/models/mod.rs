//! Data models for mangawatch.

mod product;

pub use product::{Availability, NewProduct, PartialRecord, PendingUrl, Product};
