//! Browser session configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to obtain a browser session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Remote Chrome DevTools URL (e.g., "http://selenium:9222").
    /// If set, connects to that browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Run a locally launched browser headless (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// CDP request and navigation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Chrome executable to launch; searched for when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            remote_url: None,
            headless: default_headless(),
            timeout: default_timeout(),
            chrome_path: None,
            chrome_args: Vec::new(),
        }
    }
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

/// Turn a DevTools URL into the HTTP endpoint serving `/json/version`.
pub fn version_endpoint(remote_url: &str) -> String {
    let http_url = remote_url
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    format!("{}/json/version", http_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_endpoint() {
        assert_eq!(
            version_endpoint("ws://selenium:9222/"),
            "http://selenium:9222/json/version"
        );
        assert_eq!(
            version_endpoint("http://localhost:9222"),
            "http://localhost:9222/json/version"
        );
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let settings: BrowserSettings = toml::from_str("").unwrap();
        assert_eq!(settings, BrowserSettings::default());
        assert!(settings.headless);
        assert_eq!(settings.timeout, 30);
    }
}
