//! Proxy parser for building a proxy pool from user input

use crate::proxy::models::{ProxyIdentity, ProxyScheme};
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::warn;

static URL_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?i:https?|socks[45]))://([^:/@\s]+):(\d+)/?$").expect("Invalid proxy URL regex")
});

/// Proxy parser for parsing proxy identities from strings and files
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single proxy line
    ///
    /// Supports formats:
    /// - IP:PORT
    /// - scheme://IP:PORT
    pub fn parse_line(line: &str) -> Option<ProxyIdentity> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        if let Some(caps) = URL_FORMAT.captures(line) {
            let scheme = ProxyScheme::from_scheme(&caps[1])?;
            return Self::identity(&caps[2], &caps[3]).map(|proxy| proxy.with_scheme(scheme));
        }

        let (host, port) = line.split_once(':')?;
        if host.is_empty() || port.contains(':') {
            return None;
        }
        Self::identity(host, port)
    }

    fn identity(host: &str, port: &str) -> Option<ProxyIdentity> {
        let port: u16 = port.parse().ok()?;
        if port == 0 {
            return None;
        }
        Some(ProxyIdentity::new(host.to_string(), port))
    }

    /// Parse proxies from a string (multiple lines), warning on rejected lines
    pub fn parse_string(content: &str) -> Vec<ProxyIdentity> {
        content
            .lines()
            .filter(|line| {
                let trimmed = line.trim();
                !trimmed.is_empty() && !trimmed.starts_with('#')
            })
            .filter_map(|line| {
                let parsed = Self::parse_line(line);
                if parsed.is_none() {
                    warn!(line = line.trim(), "Ignoring malformed proxy entry");
                }
                parsed
            })
            .collect()
    }

    /// Parse proxies from a file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<ProxyIdentity>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_string(&content))
    }

    /// Drop repeated identities, keeping first-seen order
    pub fn dedup(proxies: Vec<ProxyIdentity>) -> Vec<ProxyIdentity> {
        let mut seen = HashSet::new();
        proxies
            .into_iter()
            .filter(|proxy| seen.insert(proxy.clone()))
            .collect()
    }
}
