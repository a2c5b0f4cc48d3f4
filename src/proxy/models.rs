//! Proxy and crawl data models

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Protocol spoken by a proxy endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    #[default]
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyScheme {
    /// Parse a URL scheme, case-insensitively
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(ProxyScheme::Http),
            "https" => Some(ProxyScheme::Https),
            "socks4" => Some(ProxyScheme::Socks4),
            "socks5" => Some(ProxyScheme::Socks5),
            _ => None,
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyScheme::Http => write!(f, "http"),
            ProxyScheme::Https => write!(f, "https"),
            ProxyScheme::Socks4 => write!(f, "socks4"),
            ProxyScheme::Socks5 => write!(f, "socks5"),
        }
    }
}

/// Network egress identity a worker browses through
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyIdentity {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub scheme: ProxyScheme,
}

impl ProxyIdentity {
    /// Create an HTTP proxy identity
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            scheme: ProxyScheme::Http,
        }
    }

    pub fn with_scheme(mut self, scheme: ProxyScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Get the proxy URL string as passed to the browser and HTTP client
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Get the proxy string in IP:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_simple_string())
    }
}

/// Render an optional identity for logs ("direct" when absent)
pub fn describe_egress(proxy: Option<&ProxyIdentity>) -> String {
    proxy.map_or_else(|| "direct".to_string(), ProxyIdentity::to_simple_string)
}

/// A syntactically valid `ip:port` token. Not checked for reachability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateAddress(String);

impl CandidateAddress {
    /// Build from separate tokens, rejecting anything that is not a
    /// dotted quad with octets <= 255 or a port outside 1..=65535
    pub fn new(ip: &str, port: &str) -> Option<Self> {
        let parts: Vec<&str> = ip.split('.').collect();
        if parts.len() != 4 {
            return None;
        }
        for part in parts {
            if part.is_empty() || part.len() > 3 {
                return None;
            }
            let num: u32 = part.parse().ok()?;
            if num > 255 {
                return None;
            }
        }

        let port: u16 = port.parse().ok()?;
        if port == 0 {
            return None;
        }

        Some(Self(format!("{}:{}", ip, port)))
    }

    /// Parse a combined `ip:port` token
    pub fn parse(token: &str) -> Option<Self> {
        let (ip, port) = token.trim().split_once(':')?;
        Self::new(ip, port)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of one worker's crawl
///
/// A failed worker still produces a result so the pool can report it
/// alongside its siblings; its sets are empty and `error` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlResult {
    /// Proxy the worker used, `None` for direct egress
    pub proxy: Option<ProxyIdentity>,
    /// User agent the worker presented
    pub user_agent: String,
    /// Number of pages the worker loaded successfully
    pub pages_loaded: usize,
    /// Download-like links found during traversal
    pub discovered_links: BTreeSet<String>,
    /// Addresses extracted from pages and downloaded lists
    pub candidates: BTreeSet<CandidateAddress>,
    /// Error message if the worker failed
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn new(proxy: Option<ProxyIdentity>, user_agent: String) -> Self {
        Self {
            proxy,
            user_agent,
            ..Default::default()
        }
    }

    /// Create a failed crawl result
    pub fn failure(proxy: Option<ProxyIdentity>, user_agent: String, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(proxy, user_agent)
        }
    }

    /// Check if the worker finished without a fatal error
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_identity_strings() {
        let proxy = ProxyIdentity::new("127.0.0.1".to_string(), 8080);
        assert_eq!(proxy.url(), "http://127.0.0.1:8080");
        assert_eq!(proxy.to_simple_string(), "127.0.0.1:8080");
        assert_eq!(proxy.to_string(), "127.0.0.1:8080");
        assert_eq!(describe_egress(Some(&proxy)), "127.0.0.1:8080");
        assert_eq!(describe_egress(None), "direct");
    }

    #[test]
    fn test_candidate_address_valid() {
        let addr = CandidateAddress::new("192.168.1.5", "8080").unwrap();
        assert_eq!(addr.as_str(), "192.168.1.5:8080");
        assert_eq!(CandidateAddress::parse(" 10.0.0.1:3128 "), Some(addr_of("10.0.0.1:3128")));
    }

    #[test]
    fn test_candidate_address_rejects_bad_octets() {
        assert!(CandidateAddress::new("999.1.1.1", "80").is_none());
        assert!(CandidateAddress::new("1.2.3", "80").is_none());
        assert!(CandidateAddress::new("1.2.3.4.5", "80").is_none());
        assert!(CandidateAddress::new("1..3.4", "80").is_none());
    }

    #[test]
    fn test_candidate_address_rejects_bad_ports() {
        assert!(CandidateAddress::new("1.2.3.4", "0").is_none());
        assert!(CandidateAddress::new("1.2.3.4", "70000").is_none());
        assert!(CandidateAddress::new("1.2.3.4", "abc").is_none());
        assert!(CandidateAddress::parse("1.2.3.4").is_none());
    }

    #[test]
    fn test_crawl_result_failure() {
        let result = CrawlResult::failure(None, "ua".to_string(), "launch failed".to_string());
        assert!(!result.is_success());
        assert!(result.candidates.is_empty());
        assert_eq!(result.error.as_deref(), Some("launch failed"));
    }

    #[test]
    fn test_proxy_identity_keeps_scheme() {
        let proxy = ProxyIdentity::new("10.0.0.2".to_string(), 1080).with_scheme(ProxyScheme::Socks5);
        assert_eq!(proxy.url(), "socks5://10.0.0.2:1080");
        assert_eq!(proxy.to_simple_string(), "10.0.0.2:1080");
        assert_ne!(proxy, ProxyIdentity::new("10.0.0.2".to_string(), 1080));

        assert_eq!(ProxyScheme::from_scheme("SOCKS4"), Some(ProxyScheme::Socks4));
        assert_eq!(ProxyScheme::from_scheme("ftp"), None);
    }

    fn addr_of(token: &str) -> CandidateAddress {
        CandidateAddress::parse(token).unwrap()
    }
}
