//! Crawl-and-extract engine
//!
//! This module provides functionality for:
//! - Loading pages through isolated browser sessions, one per egress identity
//! - Depth-bounded, deduplicated link traversal from a seed page
//! - Heuristic extraction of `ip:port` candidates from arbitrary markup
//! - Direct download of bulk proxy lists found along the way
//! - Merging worker results and persisting them

pub mod aggregator;
pub mod download;
pub mod extractor;
pub mod frontier;
pub mod pool;
pub mod report;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::Aggregator;
pub use download::ListDownloader;
pub use extractor::{AddressExtractor, ExtractionPass, FreeTextPass, StructuredPass};
pub use frontier::{is_download_link, normalize_link, LinkFrontier, VisitedSet};
pub use pool::WorkerPool;
pub use report::{RunReport, WorkerSummary};
pub use session::{ChromeSessionFactory, FetchSession, PageSnapshot, SessionFactory};
