//! Locale-formatted price and rating normalization.
//!
//! The target site formats numbers as `1.234,56 €`: dots group thousands
//! and the comma is the decimal separator.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

/// Everything that is not a digit or the decimal comma.
static PRICE_NOISE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\d,]").unwrap());

/// What an empty or unparsable price turns into.
///
/// Ingestion stores a zero placeholder; monitoring needs to tell "still no
/// price" apart from a real value, so it gets `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPrice {
    /// Yield `0.00` (ingestion path).
    ZeroSentinel,
    /// Yield `None` (monitoring path).
    Absent,
}

/// The placeholder stored for products ingested without a price.
pub fn zero_sentinel() -> Decimal {
    Decimal::new(0, 2)
}

/// Parse locale-formatted price text into a decimal.
pub fn normalize_price(text: &str, missing: MissingPrice) -> Option<Decimal> {
    let cleaned = PRICE_NOISE.replace_all(text, "").replace(',', ".");
    let parsed = if cleaned.is_empty() {
        None
    } else {
        Decimal::from_str(&cleaned).ok()
    };

    match (parsed, missing) {
        (Some(price), _) => Some(price),
        (None, MissingPrice::ZeroSentinel) => Some(zero_sentinel()),
        (None, MissingPrice::Absent) => None,
    }
}

/// Convert the decimal separator of a rating; no numeric parse.
pub fn normalize_rating(text: &str) -> String {
    text.replace(',', ".")
}
