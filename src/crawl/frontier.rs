//! Depth-bounded link traversal
//!
//! Traversal is depth-first over an explicit stack of `(url, depth)` pairs.
//! Each visited page is passed to the [`AddressExtractor`] as soon as it is
//! loaded; its outbound links are marked visited before they are pushed, so a
//! link reachable from several pages is only ever navigated once.
//!
//! The visited set belongs to one frontier, and one frontier to one worker.
//! Workers on different proxies may overlap on the same site; that costs some
//! duplicate work but never correctness.

use crate::crawl::extractor::AddressExtractor;
use crate::crawl::session::FetchSession;
use crate::error::CrawlError;
use crate::proxy::CrawlResult;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// Links likely to serve a bulk proxy dump
static DOWNLOAD_LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)proxy.*list.*download|(?:csv|txt)(?:[?#].*)?$")
        .expect("Invalid download link regex")
});

/// Normalized URLs already scheduled for navigation
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a URL visited; `false` if it already was
    pub fn insert(&mut self, url: String) -> bool {
        self.urls.insert(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }
}

/// Resolve `href` against `base` and keep it only if it is HTTP(S).
/// Fragments are dropped so in-page anchors collapse onto their page.
pub fn normalize_link(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let mut url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

/// Whether a link looks like a downloadable proxy list
pub fn is_download_link(link: &str) -> bool {
    DOWNLOAD_LINK_REGEX.is_match(link)
}

pub struct LinkFrontier<'a> {
    extractor: &'a AddressExtractor,
    visited: VisitedSet,
}

impl<'a> LinkFrontier<'a> {
    pub fn new(extractor: &'a AddressExtractor) -> Self {
        Self {
            extractor,
            visited: VisitedSet::new(),
        }
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    /// Crawl from `start_url` up to `max_depth` hops and collect download-like
    /// links plus every address seen on the way
    pub async fn expand(
        &mut self,
        session: &mut dyn FetchSession,
        start_url: &str,
        max_depth: usize,
    ) -> Result<CrawlResult, CrawlError> {
        let mut result = CrawlResult::default();
        self.expand_into(session, start_url, max_depth, &mut result)
            .await?;
        Ok(result)
    }

    /// Like [`expand`](Self::expand) but accumulates into `result`, so a
    /// caller that abandons the traversal keeps whatever was gathered.
    ///
    /// Fails only when the start page itself cannot be loaded.
    pub async fn expand_into(
        &mut self,
        session: &mut dyn FetchSession,
        start_url: &str,
        max_depth: usize,
        result: &mut CrawlResult,
    ) -> Result<(), CrawlError> {
        let start = normalize_link(None, start_url)
            .ok_or_else(|| CrawlError::navigation(start_url, "not an absolute http(s) url"))?;
        self.visited.insert(start.clone());

        let mut stack = vec![(start, 0usize)];

        while let Some((url, depth)) = stack.pop() {
            let page = match session.load(&url).await {
                Ok(page) => page,
                Err(e) if depth == 0 => return Err(e),
                Err(e) => {
                    warn!(url = %url, depth, error = %e, "Skipping unreachable link");
                    continue;
                }
            };
            result.pages_loaded += 1;

            let found = self.extractor.extract(&page.markup);
            debug!(url = %url, depth, candidates = found.len(), links = page.links.len(), "Visited page");
            result.candidates.extend(found);

            if depth >= max_depth {
                continue;
            }

            let base = Url::parse(&page.url).or_else(|_| Url::parse(&url)).ok();
            if let Some(landed) = base.as_ref().and_then(|b| normalize_link(None, b.as_str())) {
                self.visited.insert(landed);
            }

            let mut new_links = Vec::new();
            for href in &page.links {
                if let Some(link) = normalize_link(base.as_ref(), href) {
                    if self.visited.insert(link.clone()) {
                        new_links.push(link);
                    }
                }
            }

            for link in new_links.iter().filter(|link| is_download_link(link)) {
                debug!(url = %link, "Found download link");
                result.discovered_links.insert(link.clone());
            }

            // Reversed so the first link on the page is explored first
            stack.extend(new_links.into_iter().rev().map(|link| (link, depth + 1)));
        }

        Ok(())
    }
}
