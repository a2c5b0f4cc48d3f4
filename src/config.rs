//! Run configuration
//!
//! [`SeedConfig`] describes what to crawl and where results go; it is built
//! once from external input and read-only for the rest of the run.
//! [`SessionConfig`] and [`PoolConfig`] tune the browser and the worker pool.

use crate::error::CrawlError;
use crate::proxy::ProxyIdentity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default output file
pub const DEFAULT_OUTPUT_PATH: &str = "proxies_output.txt";

/// Default traversal depth below the seed page
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Default page load timeout in seconds
const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 30;

/// Default wait after load for client-side rendering, in milliseconds
const DEFAULT_SETTLE_MILLIS: u64 = 2_000;

/// Default delay between launching proxy-bound workers, in milliseconds
const DEFAULT_STAGGER_MILLIS: u64 = 2_000;

/// Default timeout for direct list downloads in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// User agents handed out round-robin when none are configured
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 10; SM-G973F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; WOW64; rv:45.0) Gecko/20100101 Firefox/45.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/18.18363",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Ubuntu Chromium/91.0.4472.124 Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Linux; U; Android 4.1.1; en-us; Nexus 7 Build/JRO03D) AppleWebKit/534.30 (KHTML, like Gecko) Version/4.0 Safari/534.30",
    "Mozilla/5.0 (Windows NT 6.1; WOW64; rv:50.0) Gecko/20100101 Firefox/50.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_6) AppleWebKit/601.7.7 (KHTML, like Gecko)",
    "Mozilla/5.0 (Linux; Android 9; Pixel 3 XL Build/PQ3B.190705.003) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/76.0.3809.132 Mobile Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:89.0) Gecko/20100101 Firefox/89.0",
];

/// How the aggregator treats an existing output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Append,
    Overwrite,
}

/// What to crawl and where to put the results
#[derive(Debug, Clone)]
pub struct SeedConfig {
    /// Absolute HTTP(S) URL every worker starts from
    pub url: String,
    /// Navigation hops allowed below the seed (0 = seed page only)
    pub max_depth: usize,
    /// Output file
    pub output_path: PathBuf,
    /// Append to or replace the output file
    pub output_mode: OutputMode,
    /// One worker per entry; empty means a single direct worker
    pub proxy_pool: Vec<ProxyIdentity>,
    /// Handed out by worker index, wrapping around
    pub user_agents: Vec<String>,
}

impl SeedConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim().to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            output_mode: OutputMode::default(),
            proxy_pool: Vec::new(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_output_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_proxy_pool(mut self, proxies: Vec<ProxyIdentity>) -> Self {
        self.proxy_pool = proxies;
        self
    }

    /// Replace the user-agent pool; an empty list keeps the defaults
    pub fn with_user_agents(mut self, user_agents: Vec<String>) -> Self {
        if !user_agents.is_empty() {
            self.user_agents = user_agents;
        }
        self
    }

    /// User agent for the worker at `index`
    pub fn user_agent_for(&self, index: usize) -> &str {
        if self.user_agents.is_empty() {
            return DEFAULT_USER_AGENTS[index % DEFAULT_USER_AGENTS.len()];
        }
        &self.user_agents[index % self.user_agents.len()]
    }

    /// Check the seed is an absolute HTTP(S) URL
    pub fn validate(&self) -> Result<Url, CrawlError> {
        let invalid = |reason: &str| CrawlError::InvalidSeed {
            url: self.url.clone(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(&self.url).map_err(|e| invalid(&e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(invalid(&format!("unsupported scheme {}", other))),
        }
        if parsed.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        Ok(parsed)
    }
}

/// Browser session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on a single navigation
    pub page_timeout: Duration,
    /// Wait after load so scripts can populate the DOM
    pub settle_delay: Duration,
    /// Chromium binary; auto-detected when unset
    pub chrome_executable: Option<PathBuf>,
    pub headless: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(DEFAULT_PAGE_TIMEOUT_SECS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MILLIS),
            chrome_executable: None,
            headless: true,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_chrome_executable(mut self, path: PathBuf) -> Self {
        self.chrome_executable = Some(path);
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

/// Worker pool tuning
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Delay between consecutive worker launches
    pub launch_stagger: Duration,
    /// Upper bound on one worker's traversal and downloads
    pub worker_timeout: Option<Duration>,
    /// Timeout for each direct list download
    pub download_timeout: Duration,
    /// Route list downloads through the worker's proxy instead of directly
    pub download_via_proxy: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            launch_stagger: Duration::from_millis(DEFAULT_STAGGER_MILLIS),
            worker_timeout: None,
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            download_via_proxy: false,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_launch_stagger(mut self, stagger: Duration) -> Self {
        self.launch_stagger = stagger;
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = Some(timeout);
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_download_via_proxy(mut self, via_proxy: bool) -> Self {
        self.download_via_proxy = via_proxy;
        self
    }
}
