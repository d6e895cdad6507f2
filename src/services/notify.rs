//! Outbound notifications for restocked products.
//!
//! Delivery is fire-and-forget: callers log failures and move on, and no
//! delivery is retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::Product;

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// A channel that restock messages are sent to.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bot token; normally supplied through `TELEGRAM_BOT_TOKEN`.
    #[serde(default)]
    pub token: Option<String>,

    /// Target chat; normally supplied through `TELEGRAM_CHAT_ID`.
    #[serde(default)]
    pub chat_id: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token: None,
            chat_id: None,
            timeout: default_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_timeout() -> u64 {
    10
}

/// Sends messages through a Telegram bot.
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(
        api_base: &str,
        token: &str,
        chat_id: &str,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": message,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Telegram message delivered to chat {}", self.chat_id);
        Ok(())
    }
}

/// Writes messages to the log; used when no bot is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        info!("Notification: {}", message.replace('\n', " | "));
        Ok(())
    }
}

/// Build the notifier for the given settings.
///
/// Falls back to [`LogNotifier`] unless both token and chat id are set.
pub fn notifier_from_settings(
    settings: &TelegramSettings,
) -> Result<Box<dyn Notifier>, NotifyError> {
    match (settings.token.as_deref(), settings.chat_id.as_deref()) {
        (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
            Ok(Box::new(TelegramNotifier::new(
                &settings.api_base,
                token,
                chat_id,
                Duration::from_secs(settings.timeout),
            )?))
        }
        _ => {
            warn!("Telegram credentials not configured, notifications will only be logged");
            Ok(Box::new(LogNotifier))
        }
    }
}

/// Text sent when `product` comes back in stock at `price`.
pub fn restock_message(product: &Product, price: Decimal) -> String {
    let mut message = format!(
        "Back in stock!\n\n{}\n\nTitle: {}\n\nPrice: {}€",
        product.url, product.title, price
    );
    if let Some(cover) = &product.cover_url {
        message.push('\n');
        message.push_str(cover);
    }
    message
}
