//! Structure-agnostic address extraction
//!
//! Pages list proxies in every shape imaginable, so extraction is a stack of
//! heuristic passes over the parsed document whose results are unioned:
//! - [`StructuredPass`] reads table rows and list items, pairing the first
//!   valid IPv4 token with the nearest 2-5 digit number in the same row
//! - [`FreeTextPass`] finds literal `ip:port` tokens anywhere in the text
//!
//! Both may yield false positives; the output is a set of plausible
//! candidates, not working proxies.

use crate::proxy::CandidateAddress;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;

/// Regex pattern to match IP:PORT patterns in text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}(?:\.\d{1,3}){3}):(\d{2,5})\b").expect("Invalid IP:PORT regex")
});

static IPV4_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").expect("Invalid IPv4 regex"));

static PORT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{2,5}\b").expect("Invalid port regex"));

/// Rows nested in row-holding containers
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table tr, div tr, ul tr, ol tr, table li, div li, ul li, ol li")
        .expect("Invalid row selector")
});

/// One heuristic over a parsed document
pub trait ExtractionPass: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, document: &Html) -> BTreeSet<CandidateAddress>;
}

/// Pairs an address and a port found in the same row
pub struct StructuredPass;

impl StructuredPass {
    /// Extract a candidate from one row's text
    pub fn extract_row(text: &str) -> Option<CandidateAddress> {
        IPV4_REGEX.find_iter(text).find_map(|ip| {
            // Look for the port after the address first so the address's own
            // octets are never mistaken for it.
            let port = PORT_REGEX
                .find(&text[ip.end()..])
                .or_else(|| PORT_REGEX.find(&text[..ip.start()]))?;

            CandidateAddress::new(ip.as_str(), port.as_str())
        })
    }
}

impl ExtractionPass for StructuredPass {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn extract(&self, document: &Html) -> BTreeSet<CandidateAddress> {
        document
            .select(&ROW_SELECTOR)
            .filter_map(|row| Self::extract_row(&element_text(row)))
            .collect()
    }
}

/// Finds already-combined `ip:port` tokens
pub struct FreeTextPass;

impl ExtractionPass for FreeTextPass {
    fn name(&self) -> &'static str {
        "free-text"
    }

    fn extract(&self, document: &Html) -> BTreeSet<CandidateAddress> {
        scan_text(&element_text(document.root_element()))
    }
}

/// Text nodes joined with a separator so adjacent cells never fuse
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// Scan plain text for literal `ip:port` tokens
pub fn scan_text(text: &str) -> BTreeSet<CandidateAddress> {
    IP_PORT_REGEX
        .captures_iter(text)
        .filter_map(|cap| CandidateAddress::new(cap.get(1)?.as_str(), cap.get(2)?.as_str()))
        .collect()
}

/// Scan a raw list body line by line
pub fn scan_lines(content: &str) -> BTreeSet<CandidateAddress> {
    content.lines().flat_map(scan_text).collect()
}

/// Runs every configured pass over a page and unions the results
pub struct AddressExtractor {
    passes: Vec<Box<dyn ExtractionPass>>,
}

impl AddressExtractor {
    /// Create an extractor with the structured and free-text passes
    pub fn new() -> Self {
        Self::with_passes(vec![Box::new(StructuredPass), Box::new(FreeTextPass)])
    }

    pub fn with_passes(passes: Vec<Box<dyn ExtractionPass>>) -> Self {
        Self { passes }
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    pub fn extract(&self, markup: &str) -> BTreeSet<CandidateAddress> {
        let document = Html::parse_document(markup);
        self.passes
            .iter()
            .flat_map(|pass| pass.extract(&document))
            .collect()
    }
}

impl Default for AddressExtractor {
    fn default() -> Self {
        Self::new()
    }
}
