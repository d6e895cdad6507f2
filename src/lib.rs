//! mangawatch - manga catalog scraper and restock monitor.
//!
//! Queued product URLs are rendered in a headless browser, read into typed
//! records and stored in SQLite. A monitor pass revisits out-of-stock
//! products and notifies when one comes back.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
