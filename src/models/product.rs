//! Catalog models: queued URLs, extracted records and stored products.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stock state of a product as shown on its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable,
}

impl Availability {
    /// Textual form stored in the `manga.availability` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Yes",
            Self::Unavailable => "No",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Yes" => Some(Self::Available),
            "No" => Some(Self::Unavailable),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// A submitted product page URL waiting for its first extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUrl {
    pub id: i32,
    pub url: String,
}

/// Fields read from a product page in a single extraction pass.
///
/// Every field is optional: a missing element is recorded as `None`
/// and never aborts the pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartialRecord {
    pub title: Option<String>,
    /// Whether the "out of stock" marker element was present.
    pub out_of_stock_marker: bool,
    /// Price text exactly as shown (before normalization).
    pub raw_price: Option<String>,
    pub rating: Option<String>,
    pub synopsis: Option<String>,
    pub cover_url: Option<String>,
}

impl PartialRecord {
    /// Availability derived from the marker, overridden to unavailable
    /// whenever no price could be read.
    pub fn availability(&self) -> Availability {
        if self.raw_price.is_none() || self.out_of_stock_marker {
            Availability::Unavailable
        } else {
            Availability::Available
        }
    }
}

/// A product ready to be inserted into the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub title: String,
    pub url: String,
    pub price: Option<Decimal>,
    pub availability: Availability,
    pub rating: Option<String>,
    pub synopsis: Option<String>,
    pub cover_url: Option<String>,
    pub cover_image: Option<Vec<u8>>,
}

/// A product stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: i32,
    pub title: String,
    pub url: String,
    pub price: Option<Decimal>,
    pub availability: Availability,
    pub rating: Option<String>,
    pub synopsis: Option<String>,
    pub cover_url: Option<String>,
    #[serde(skip)]
    pub cover_image: Option<Vec<u8>>,
}

impl Product {
    /// Human-readable price, `-` when unknown.
    pub fn price_display(&self) -> String {
        match self.price {
            Some(p) if self.availability.is_available() => format!("{:.2}€", p),
            _ => "-".to_string(),
        }
    }
}
