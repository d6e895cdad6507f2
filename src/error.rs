//! Error types shared by the pipeline.

use thiserror::Error;

/// Errors surfaced by the store, the browser session and the workers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{what} unavailable after {attempts} attempt(s): {last_error}")]
    Unavailable {
        what: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn browser(e: impl std::fmt::Display) -> Self {
        Self::Browser(e.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
