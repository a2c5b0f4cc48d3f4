//! Proxy module for the identities workers browse through and the
//! addresses the crawl discovers
//!
//! This module provides functionality for:
//! - Modelling proxy identities, candidate addresses and per-worker results
//! - Parsing proxy pools from user input (IP:PORT, scheme://IP:PORT)
//! - Bootstrapping a pool from a public listing page

pub mod bootstrap;
pub mod models;
pub mod parser;

pub use bootstrap::{assemble_pool, ListingBootstrap, ProxySource, StaticProxies};
pub use models::{describe_egress, CandidateAddress, CrawlResult, ProxyIdentity, ProxyScheme};
pub use parser::ProxyParser;
