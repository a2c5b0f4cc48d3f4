//! Direct fetch of bulk proxy lists
//!
//! Download-like links found during traversal are fetched with a plain HTTP
//! client rather than the browser and scanned line by line for `ip:port`.

use crate::config::PoolConfig;
use crate::crawl::extractor::scan_lines;
use crate::error::CrawlError;
use crate::proxy::{CandidateAddress, ProxyIdentity};
use crate::Result;
use reqwest::{Client, Proxy as ReqwestProxy};
use std::collections::BTreeSet;
use tracing::{info, warn};

pub struct ListDownloader {
    client: Client,
}

impl ListDownloader {
    /// Build a client presenting `user_agent`, routed through `proxy` if given
    pub fn new(config: &PoolConfig, user_agent: &str, proxy: Option<&ProxyIdentity>) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.download_timeout)
            .user_agent(user_agent);

        if let Some(proxy) = proxy {
            builder = builder.proxy(ReqwestProxy::all(proxy.url())?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Fetch one list and extract its addresses
    pub async fn fetch(&self, url: &str) -> std::result::Result<BTreeSet<CandidateAddress>, CrawlError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CrawlError::download(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::download(url, format!("HTTP status: {}", status)));
        }

        let content = response
            .text()
            .await
            .map_err(|e| CrawlError::download(url, e))?;
        Ok(scan_lines(&content))
    }

    /// Fetch every list, skipping the ones that fail
    pub async fn fetch_all<'a, I>(&self, urls: I) -> BTreeSet<CandidateAddress>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut found = BTreeSet::new();

        for url in urls {
            match self.fetch(url).await {
                Ok(addresses) => {
                    info!(url = %url, count = addresses.len(), "Downloaded proxy list");
                    found.extend(addresses);
                }
                Err(e) => warn!(url = %url, error = %e, "Skipping proxy list"),
            }
        }

        found
    }
}
