//! Error taxonomy for a crawl run
//!
//! Only [`CrawlError::Persistence`] (and [`CrawlError::InvalidSeed`], which is
//! raised before any worker starts) ends a run. Everything else is scoped to a
//! single link or a single worker and is logged and skipped by the caller.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// The seed URL is not an absolute HTTP(S) URL
    #[error("invalid seed url {url:?}: {reason}")]
    InvalidSeed { url: String, reason: String },

    /// A page could not be loaded (DNS, timeout, driver fault)
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// The browser engine refused to start with the given identity
    #[error("session for proxy {proxy} failed to start: {reason}")]
    SessionInit { proxy: String, reason: String },

    /// A bulk list could not be fetched directly
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// The output sink could not be written
    #[error("cannot write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CrawlError {
    pub fn navigation(url: &str, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn download(url: &str, reason: impl ToString) -> Self {
        Self::Download {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
