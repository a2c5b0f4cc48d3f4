//! Proxy Harvest - browser-driven proxy discovery
//!
//! Crawls a seed page and the pages it links to, with one headless browser
//! per proxy identity, and extracts every plausible `ip:port` it can find
//! in tables, lists, free text and downloadable list files.

pub mod config;
pub mod crawl;
pub mod error;
pub mod proxy;

pub use config::{OutputMode, PoolConfig, SeedConfig, SessionConfig};
pub use crawl::*;
pub use error::CrawlError;
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
