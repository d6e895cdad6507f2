//! Headless browser sessions over the Chrome DevTools Protocol.
//!
//! Product pages render their price and stock widgets with JavaScript, so
//! pages are loaded in a real Chromium driven by chromiumoxide. Sessions
//! either attach to a remote DevTools endpoint or launch a local browser.

mod config;

pub use config::{version_endpoint, BrowserSettings};

#[cfg(feature = "browser")]
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::handler::{Handler, HandlerConfig};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;

#[cfg(feature = "browser")]
use super::assets::USER_AGENT;
use super::session::{PageSession, SessionProvider};
use crate::error::Error;
use crate::utils::{retry_with_backoff, RetryPolicy};

/// Opens chromiumoxide sessions, retrying connectivity per `RetryPolicy`.
#[derive(Debug, Clone)]
pub struct BrowserSessionProvider {
    settings: BrowserSettings,
    retry: RetryPolicy,
}

impl BrowserSessionProvider {
    pub fn new(settings: BrowserSettings, retry: RetryPolicy) -> Self {
        Self { settings, retry }
    }
}

#[async_trait]
impl SessionProvider for BrowserSessionProvider {
    type Session = BrowserSession;

    async fn open(&self) -> Result<BrowserSession, Error> {
        retry_with_backoff(&self.retry, "browser", || {
            BrowserSession::open(&self.settings)
        })
        .await
    }
}

/// One browser plus the single tab every page of a run is loaded in.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
    remote: bool,
    timeout: Duration,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    async fn open(settings: &BrowserSettings) -> Result<Self, Error> {
        let timeout = Duration::from_secs(settings.timeout);
        let (browser, handler, remote) = match settings.remote_url.as_deref() {
            Some(remote_url) => {
                let (browser, handler) = Self::connect_remote(remote_url, timeout).await?;
                (browser, handler, true)
            }
            None => {
                let (browser, handler) = Self::launch(settings).await?;
                (browser, handler, false)
            }
        };

        let mut session = Self {
            browser,
            page: None,
            handler,
            remote,
            timeout,
        };

        match session.new_tab().await {
            Ok(page) => {
                session.page = Some(page);
                Ok(session)
            }
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }

    async fn new_tab(&self) -> Result<Page, Error> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(Error::browser)?;
        page.execute(SetUserAgentOverrideParams::new(USER_AGENT.to_string()))
            .await
            .map_err(Error::browser)?;
        Ok(page)
    }

    fn find_chrome() -> Result<PathBuf, Error> {
        Self::CHROME_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or_else(|| {
                Error::Browser(
                    "Chrome/Chromium not found; install it, set browser.chrome_path, \
                     or point browser.remote_url at a DevTools endpoint"
                        .to_string(),
                )
            })
    }

    async fn launch(settings: &BrowserSettings) -> Result<(Browser, JoinHandle<()>), Error> {
        let chrome_path = match &settings.chrome_path {
            Some(path) => path.clone(),
            None => Self::find_chrome()?,
        };
        info!(
            "Launching browser {} (headless={})",
            chrome_path.display(),
            settings.headless
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(Duration::from_secs(settings.timeout))
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !settings.headless {
            builder = builder.with_head();
        }
        for arg in &settings.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(Error::Browser)?;
        let (browser, handler) = Browser::launch(config).await.map_err(Error::browser)?;
        Ok((browser, Self::spawn_handler(handler)))
    }

    async fn connect_remote(
        remote_url: &str,
        timeout: Duration,
    ) -> Result<(Browser, JoinHandle<()>), Error> {
        let version_url = version_endpoint(remote_url);
        info!("Connecting to remote browser at {}", version_url);

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let resp: serde_json::Value = client
            .get(&version_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Browser("No webSocketDebuggerUrl in response".to_string()))?;
        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = HandlerConfig {
            request_timeout: timeout,
            ..Default::default()
        };
        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(Error::browser)?;
        Ok((browser, Self::spawn_handler(handler)))
    }

    fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSession for BrowserSession {
    async fn render(&mut self, url: &str, settle: Duration) -> Result<String, Error> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| Error::Browser("Session already closed".to_string()))?;

        debug!("Navigating to {}", url);
        match tokio::time::timeout(self.timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(Error::browser(e)),
            Err(_) => {
                return Err(Error::Browser(format!(
                    "Timed out after {:?} navigating to {}",
                    self.timeout, url
                )))
            }
        }

        tokio::time::sleep(settle).await;
        page.content().await.map_err(Error::browser)
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Failed to close page: {}", e);
            }
        }

        // A remote browser is shared; only tear down what we launched.
        if !self.remote {
            if let Err(e) = self.browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            let _ = self.browser.wait().await;
        }
        self.handler.abort();
    }
}

#[cfg(feature = "browser")]
impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserSession {
    _private: (),
}

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    async fn open(_settings: &BrowserSettings) -> Result<Self, Error> {
        Err(Error::Browser(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageSession for BrowserSession {
    async fn render(&mut self, _url: &str, _settle: Duration) -> Result<String, Error> {
        Err(Error::Browser("Browser support not compiled".to_string()))
    }

    async fn close(&mut self) {}
}
