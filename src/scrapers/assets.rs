//! Cover image downloads over plain HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::session::AssetFetcher;
use crate::error::Error;

/// User agent sent with asset downloads.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Downloads images with reqwest.
#[derive(Clone)]
pub struct HttpAssetFetcher {
    client: Client,
}

impl HttpAssetFetcher {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, Error> {
        let response = self.client.get(url).send().await?;
        let response = response.error_for_status().inspect_err(|e| {
            warn!("Failed to download {}: {}", url, e);
        })?;

        let bytes = response.bytes().await?;
        debug!("Downloaded {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }
}
