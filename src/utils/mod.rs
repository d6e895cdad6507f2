//! Shared utility functions.
//!
//! - `retry`: bounded exponential backoff for connectivity faults
//! - `text`: whitespace cleanup for scraped text

mod retry;
mod text;

pub use retry::{retry_with_backoff, RetryPolicy};
pub use text::clean_text;
