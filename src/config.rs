//! Configuration management.
//!
//! `Config` is the on-disk file (TOML or JSON); `Settings` is the resolved
//! runtime configuration after defaults, the file, the environment and CLI
//! flags have been layered on top of each other.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::repository::DbContext;
use crate::scrapers::{BrowserSettings, ExtractionRules};
use crate::services::{IngestConfig, MonitorConfig, TelegramSettings};
use crate::utils::RetryPolicy;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "mangawatch.db";

/// Name under which `prefer` discovers the config file.
pub const CONFIG_NAME: &str = "mangawatch";

/// Page timing, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Wait after navigation for dynamic content.
    pub settle_secs: u64,
    /// Throttle after every ingested URL.
    pub ingest_delay_secs: u64,
    /// Throttle after every restock.
    pub monitor_delay_secs: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            settle_secs: 7,
            ingest_delay_secs: 3,
            monitor_delay_secs: 5,
        }
    }
}

/// Daemon intervals, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub ingest_interval_secs: u64,
    pub monitor_interval_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            ingest_interval_secs: 120,
            monitor_interval_secs: 10_800,
        }
    }
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename inside `data_dir`.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    pub browser: BrowserSettings,
    pub timing: TimingSettings,
    pub schedule: ScheduleSettings,
    pub retry: RetryPolicy,
    pub telegram: TelegramSettings,
    pub rules: ExtractionRules,
}

impl Default for Settings {
    fn default() -> Self {
        // ~/.local/share/mangawatch on Linux; falls back to home, then CWD
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mangawatch");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            browser: BrowserSettings::default(),
            timing: TimingSettings::default(),
            schedule: ScheduleSettings::default(),
            retry: RetryPolicy::default(),
            telegram: TelegramSettings::default(),
            rules: ExtractionRules::default(),
        }
    }
}

impl Settings {
    /// Resolve settings from an optional config file, the environment and
    /// an optional data directory override.
    ///
    /// Without `config_path`, the file is discovered in the standard
    /// locations by `prefer`.
    pub async fn load(config_path: Option<&Path>, data_dir: Option<&str>) -> Result<Self, Error> {
        let config_path = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => discover_config().await,
        };
        Self::load_from(config_path.as_deref(), data_dir).await
    }

    /// Resolve settings from a known config file (or none).
    pub async fn load_from(config_path: Option<&Path>, data_dir: Option<&str>) -> Result<Self, Error> {
        let mut settings = Self::default();
        let cwd = std::env::current_dir()?;

        if let Some(path) = config_path {
            let config = Config::load_from_path(path).await?;
            let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());
            config.apply_to_settings(&mut settings, &base_dir);
            debug!("Loaded config from {}", path.display());
        }

        settings.apply_env_overrides(|key| std::env::var(key).ok());

        if let Some(dir) = data_dir {
            settings.data_dir = resolve_path(dir, &cwd);
        }

        Ok(settings)
    }

    /// Apply overrides from environment variables, read through `var`.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(url) = non_empty("BROWSER_REMOTE_URL") {
            self.browser.remote_url = Some(url);
        }
        if let Some(token) = non_empty("TELEGRAM_BOT_TOKEN") {
            self.telegram.token = Some(token);
        }
        if let Some(chat_id) = non_empty("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => format!("sqlite:{}", self.database_path().display()),
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }

    /// Create a database context for these settings.
    pub fn create_db_context(&self) -> DbContext {
        DbContext::from_url(&self.database_url())
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            settle: Duration::from_secs(self.timing.settle_secs),
            delay: Duration::from_secs(self.timing.ingest_delay_secs),
            rules: self.rules.clone(),
            retry: self.retry.clone(),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            settle: Duration::from_secs(self.timing.settle_secs),
            delay: Duration::from_secs(self.timing.monitor_delay_secs),
            rules: self.rules.clone(),
            retry: self.retry.clone(),
        }
    }
}

/// Configuration file contents. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory; `~` is expanded, relative paths are resolved
    /// against the config file's directory.
    pub data_dir: Option<String>,
    /// Database filename inside the data directory.
    pub database: Option<String>,
    pub database_url: Option<String>,
    pub browser: Option<BrowserSettings>,
    pub timing: Option<TimingSettings>,
    pub schedule: Option<ScheduleSettings>,
    pub retry: Option<RetryPolicy>,
    pub telegram: Option<TelegramSettings>,
    pub rules: Option<ExtractionRules>,

    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// TOML for `.toml` files, JSON otherwise.
    pub async fn load_from_path(path: &Path) -> Result<Self, Error> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse config text in the format named by `ext`.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, Error> {
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e))),
            _ => serde_json::from_str(contents)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e))),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref url) = self.database_url {
            settings.database_url = Some(url.clone());
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone();
        }
        if let Some(ref timing) = self.timing {
            settings.timing = timing.clone();
        }
        if let Some(ref schedule) = self.schedule {
            settings.schedule = schedule.clone();
        }
        if let Some(ref retry) = self.retry {
            settings.retry = retry.clone();
        }
        if let Some(ref telegram) = self.telegram {
            settings.telegram = telegram.clone();
        }
        if let Some(ref rules) = self.rules {
            settings.rules = rules.clone();
        }
    }
}

/// Find the config file in the standard locations.
pub async fn discover_config() -> Option<PathBuf> {
    match prefer::load(CONFIG_NAME).await {
        Ok(found) => found.source_path().map(|path| path.to_path_buf()),
        // No config file found
        Err(_) => None,
    }
}

/// Resolve a path that may be relative or start with `~`.
pub fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(path_str);
    let path = Path::new(expanded.as_ref());

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    const SAMPLE_TOML: &str = r#"
        data_dir = "data"
        database = "catalog.db"

        [browser]
        remote_url = "http://selenium:9222"

        [timing]
        settle_secs = 2

        [schedule]
        monitor_interval_secs = 600

        [retry]
        max_attempts = 3

        [rules]
        price = "span.price"
    "#;

    #[test]
    fn test_parse_toml_partial_sections() {
        let config = Config::parse(SAMPLE_TOML, "toml").unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/etc/mangawatch"));

        assert_eq!(settings.data_dir, PathBuf::from("/etc/mangawatch/data"));
        assert_eq!(
            settings.database_path(),
            PathBuf::from("/etc/mangawatch/data/catalog.db")
        );
        assert_eq!(
            settings.browser.remote_url.as_deref(),
            Some("http://selenium:9222")
        );
        assert_eq!(settings.timing.settle_secs, 2);
        assert_eq!(settings.timing.ingest_delay_secs, 3);
        assert_eq!(settings.schedule.monitor_interval_secs, 600);
        assert_eq!(settings.schedule.ingest_interval_secs, 120);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.deadline_secs, 60);
        assert_eq!(settings.rules.price, "span.price");
        assert_eq!(settings.rules.title, "#productTitle");
    }

    #[test]
    fn test_parse_json() {
        let config =
            Config::parse(r#"{"database_url": "sqlite:/tmp/x.db", "timing": {"settle_secs": 1}}"#, "json")
                .unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/"));

        assert_eq!(settings.database_url(), "sqlite:/tmp/x.db");
        assert_eq!(settings.ingest_config().settle, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        assert!(matches!(
            Config::parse("data_dir = [", "toml"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite:/srv/m.db"),
            ("BROWSER_REMOTE_URL", "ws://chrome:9222"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", ""),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.database_url(), "sqlite:/srv/m.db");
        assert_eq!(settings.browser.remote_url.as_deref(), Some("ws://chrome:9222"));
        assert_eq!(settings.telegram.token.as_deref(), Some("123:abc"));
        assert!(settings.telegram.chat_id.is_none());
    }

    #[test]
    fn test_worker_configs_from_timing() {
        let settings = Settings::default();
        let ingest = settings.ingest_config();
        let monitor = settings.monitor_config();

        assert_eq!(ingest.settle, Duration::from_secs(7));
        assert_eq!(ingest.delay, Duration::from_secs(3));
        assert_eq!(monitor.delay, Duration::from_secs(5));
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/base");
        assert_eq!(resolve_path("/abs", base), PathBuf::from("/abs"));
        assert_eq!(resolve_path("rel", base), PathBuf::from("/base/rel"));
        assert!(!resolve_path("~/x", base).starts_with("~"));
    }

    #[tokio::test]
    async fn test_load_from_path_records_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mangawatch.toml");
        std::fs::write(&path, "database = \"other.db\"\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));
        assert_eq!(config.database.as_deref(), Some("other.db"));
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let dir = tempdir().unwrap();
        let result = Config::load_from_path(&dir.path().join("nope.toml")).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_load_from_discovered_file() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join(".config").join(CONFIG_NAME);
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join("mangawatch.toml");
        std::fs::write(
            &path,
            "data_dir = \"state\"\n\n[browser]\nheadless = false\n\n[timing]\nsettle_secs = 1\n",
        )
        .unwrap();

        let settings = Settings::load_from(Some(&path), None).await.unwrap();
        assert_eq!(settings.data_dir, config_dir.join("state"));
        assert!(!settings.browser.headless);
        assert_eq!(settings.timing.settle_secs, 1);
    }

    #[tokio::test]
    async fn test_explicit_path_skips_discovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(&path, r#"{"database": "explicit.db"}"#).unwrap();

        let settings = Settings::load(Some(&path), Some("/srv/mangawatch")).await.unwrap();
        assert_eq!(settings.database_filename, "explicit.db");
        assert_eq!(settings.data_dir, PathBuf::from("/srv/mangawatch"));
    }
}
