//! Browser-backed fetch sessions
//!
//! A session is one isolated browser process bound to an egress identity
//! (optional proxy plus user agent). Pages are rendered by Chromium so that
//! tables filled in client-side are visible in the snapshot.

use crate::config::SessionConfig;
use crate::error::CrawlError;
use crate::proxy::{describe_egress, ProxyIdentity};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Collects every anchor's href, already resolved against the page URL
const LINKS_SCRIPT: &str = "Array.from(document.querySelectorAll('a[href]'), a => a.href)";

/// Rendered page as seen by the browser
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    /// URL after redirects
    pub url: String,
    /// Serialized DOM after scripts ran
    pub markup: String,
    /// Hyperlinks in document order
    pub links: Vec<String>,
}

/// A network identity that can load pages
#[async_trait]
pub trait FetchSession: Send {
    /// Load a page and snapshot its DOM and links
    async fn load(&mut self, url: &str) -> Result<PageSnapshot, CrawlError>;

    /// Release the underlying browser. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens sessions for workers
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(
        &self,
        index: usize,
        proxy: Option<&ProxyIdentity>,
        user_agent: &str,
    ) -> Result<Box<dyn FetchSession>, CrawlError>;
}

/// Launches one headless Chromium per session
pub struct ChromeSessionFactory {
    config: SessionConfig,
}

impl ChromeSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    fn browser_config(
        &self,
        profile_dir: PathBuf,
        proxy: Option<&ProxyIdentity>,
        user_agent: &str,
    ) -> Result<BrowserConfig, String> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(self.config.page_timeout)
            .user_data_dir(profile_dir)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={}", user_agent));

        if let Some(proxy) = proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy.url()));
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder.build()
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(
        &self,
        index: usize,
        proxy: Option<&ProxyIdentity>,
        user_agent: &str,
    ) -> Result<Box<dyn FetchSession>, CrawlError> {
        let init_error = |reason: String| CrawlError::SessionInit {
            proxy: describe_egress(proxy),
            reason,
        };

        // Concurrent browsers must not share a profile directory
        let profile_dir = std::env::temp_dir().join(format!(
            "proxy-harvest-{}-{}",
            std::process::id(),
            index
        ));
        let config = self
            .browser_config(profile_dir.clone(), proxy, user_agent)
            .map_err(init_error)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| init_error(e.to_string()))?;

        // The CDP handler has to be polled for the browser to make progress
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let mut session = ChromeSession {
            browser: Some(browser),
            page: None,
            handler: Some(handler_task),
            profile_dir,
            config: self.config.clone(),
        };

        match session.browser_page().await {
            Ok(page) => {
                session.page = Some(page);
                debug!(proxy = %describe_egress(proxy), "Browser session started");
                Ok(Box::new(session))
            }
            Err(e) => {
                session.close().await;
                Err(init_error(e))
            }
        }
    }
}

/// One Chromium process and its single tab
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    profile_dir: PathBuf,
    config: SessionConfig,
}

impl ChromeSession {
    async fn browser_page(&self) -> Result<Page, String> {
        let browser = self.browser.as_ref().ok_or("browser already closed")?;
        browser
            .new_page("about:blank")
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl FetchSession for ChromeSession {
    async fn load(&mut self, url: &str) -> Result<PageSnapshot, CrawlError> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| CrawlError::navigation(url, "session closed"))?;

        match tokio::time::timeout(self.config.page_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(CrawlError::navigation(url, e)),
            Err(_) => {
                return Err(CrawlError::navigation(
                    url,
                    format!("timed out after {:?}", self.config.page_timeout),
                ))
            }
        }

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let markup = page
            .content()
            .await
            .map_err(|e| CrawlError::navigation(url, e))?;
        let links: Vec<String> = page
            .evaluate(LINKS_SCRIPT)
            .await
            .map_err(|e| CrawlError::navigation(url, e))?
            .into_value()
            .map_err(|e| CrawlError::navigation(url, e))?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(PageSnapshot {
            url: final_url,
            markup,
            links,
        })
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!(error = %e, "Failed to close tab");
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "Failed to close browser");
            }
            if let Err(e) = browser.wait().await {
                warn!(error = %e, "Browser process did not exit cleanly");
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if tokio::fs::remove_dir_all(&self.profile_dir).await.is_err() {
            debug!(dir = %self.profile_dir.display(), "Profile directory not removed");
        }
    }
}
