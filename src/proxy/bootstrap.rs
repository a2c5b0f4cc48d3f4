//! Seed providers for the proxy pool
//!
//! The crawl core only consumes an ordered list of [`ProxyIdentity`]; where it
//! comes from is pluggable. Two providers ship with the crate: a fixed list
//! and a scraper for public listing pages laid out as `ip | port | ...` tables.

use crate::proxy::models::ProxyIdentity;
use crate::proxy::parser::ProxyParser;
use crate::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{info, warn};

/// Default public listing scraped when bootstrapping is requested
pub const DEFAULT_LISTING_URL: &str = "https://www.sslproxies.org/";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

const LISTING_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table tbody tr").expect("Invalid row selector"));
static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("Invalid cell selector"));

/// Anything that can supply an initial proxy pool
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<ProxyIdentity>>;
}

/// A fixed proxy list, typically from CLI flags or a file
pub struct StaticProxies {
    proxies: Vec<ProxyIdentity>,
}

impl StaticProxies {
    pub fn new(proxies: Vec<ProxyIdentity>) -> Self {
        Self { proxies }
    }
}

#[async_trait]
impl ProxySource for StaticProxies {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<ProxyIdentity>> {
        Ok(self.proxies.clone())
    }
}

/// Scrapes a public proxy listing page
pub struct ListingBootstrap {
    url: String,
    client: Client,
}

impl ListingBootstrap {
    pub fn new() -> Result<Self> {
        Self::with_url(DEFAULT_LISTING_URL)
    }

    pub fn with_url(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(LISTING_USER_AGENT)
            .build()?;

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    /// Parse table rows with the ip in column 1 and the port in column 2
    pub fn parse_listing(html: &str) -> Vec<ProxyIdentity> {
        let document = Html::parse_document(html);

        document
            .select(&ROW_SELECTOR)
            .filter_map(|row| {
                let mut cells = row.select(&CELL_SELECTOR);
                let ip = cell_text(cells.next()?);
                let port = cell_text(cells.next()?);
                if ip.is_empty() || port.is_empty() {
                    return None;
                }
                ProxyParser::parse_line(&format!("{}:{}", ip, port))
            })
            .collect()
    }
}

fn cell_text(cell: scraper::ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

#[async_trait]
impl ProxySource for ListingBootstrap {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<ProxyIdentity>> {
        info!(url = %self.url, "Fetching proxy listing");
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let body = response.text().await?;
        let proxies = Self::parse_listing(&body);
        info!(url = %self.url, count = proxies.len(), "Fetched proxy listing");
        Ok(proxies)
    }
}

/// Gather every source into one pool, keeping first-seen order
///
/// A failing source is logged and contributes nothing; an empty pool
/// means the crawl runs with direct egress.
pub async fn assemble_pool(sources: &[Box<dyn ProxySource>]) -> Vec<ProxyIdentity> {
    let mut pool = Vec::new();

    for source in sources {
        match source.fetch().await {
            Ok(proxies) => pool.extend(proxies),
            Err(e) => warn!(source = source.name(), error = %e, "Proxy source failed, skipping"),
        }
    }

    ProxyParser::dedup(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"
<html><body>
<table>
  <thead><tr><th>IP Address</th><th>Port</th><th>Code</th></tr></thead>
  <tbody>
    <tr><td>1.2.3.4</td><td>8080</td><td>US</td></tr>
    <tr><td> 5.6.7.8 </td><td> 3128 </td><td>DE</td></tr>
    <tr><td></td><td>80</td><td>FR</td></tr>
    <tr><td>9.9.9.9</td><td>not-a-port</td><td>NL</td></tr>
    <tr><td>only-one-cell</td></tr>
  </tbody>
</table>
</body></html>
"#;

    #[test]
    fn test_parse_listing() {
        let proxies = ListingBootstrap::parse_listing(LISTING);
        assert_eq!(
            proxies,
            vec![
                ProxyIdentity::new("1.2.3.4".to_string(), 8080),
                ProxyIdentity::new("5.6.7.8".to_string(), 3128),
            ]
        );
    }

    #[test]
    fn test_parse_listing_without_table() {
        assert!(ListingBootstrap::parse_listing("<p>nothing here</p>").is_empty());
    }

    #[tokio::test]
    async fn test_listing_bootstrap_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&server)
            .await;

        let bootstrap = ListingBootstrap::with_url(&format!("{}/list", server.uri())).unwrap();
        let proxies = bootstrap.fetch().await.unwrap();
        assert_eq!(proxies.len(), 2);
    }

    #[tokio::test]
    async fn test_assemble_pool_skips_failed_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sources: Vec<Box<dyn ProxySource>> = vec![
            Box::new(ListingBootstrap::with_url(&server.uri()).unwrap()),
            Box::new(StaticProxies::new(vec![
                ProxyIdentity::new("1.1.1.1".to_string(), 80),
                ProxyIdentity::new("1.1.1.1".to_string(), 80),
                ProxyIdentity::new("2.2.2.2".to_string(), 80),
            ])),
        ];

        let pool = assemble_pool(&sources).await;
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].host, "1.1.1.1");
    }
}
