//! In-memory sessions over a synthetic link graph

use crate::crawl::session::{FetchSession, PageSnapshot, SessionFactory};
use crate::error::CrawlError;
use crate::proxy::ProxyIdentity;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
pub struct GraphSession {
    pages: HashMap<String, (String, Vec<String>)>,
    failing: HashSet<String>,
    pub loads: Vec<String>,
    delay: Option<Duration>,
    closes: Option<Arc<Mutex<usize>>>,
}

impl GraphSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, markup: &str, links: &[&str]) -> Self {
        self.pages.insert(
            url.to_string(),
            (
                markup.to_string(),
                links.iter().map(|link| link.to_string()).collect(),
            ),
        );
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Every load takes `delay` before answering
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl FetchSession for GraphSession {
    async fn load(&mut self, url: &str) -> Result<PageSnapshot, CrawlError> {
        self.loads.push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(url) {
            return Err(CrawlError::navigation(url, "net::ERR_CONNECTION_RESET"));
        }
        let (markup, links) = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| CrawlError::navigation(url, "404"))?;
        Ok(PageSnapshot {
            url: url.to_string(),
            markup,
            links,
        })
    }

    async fn close(&mut self) {
        if let Some(ref closes) = self.closes {
            *closes.lock().unwrap() += 1;
        }
    }
}

/// Hands every worker a copy of the same graph; proxies listed in
/// `broken` fail to start
#[derive(Default)]
pub struct GraphFactory {
    graph: GraphSession,
    broken: HashSet<ProxyIdentity>,
    pub closes: Arc<Mutex<usize>>,
    pub opened: Arc<Mutex<Vec<(Option<ProxyIdentity>, String)>>>,
}

impl GraphFactory {
    pub fn new(graph: GraphSession) -> Self {
        Self {
            graph,
            ..Default::default()
        }
    }

    pub fn broken(mut self, proxy: ProxyIdentity) -> Self {
        self.broken.insert(proxy);
        self
    }

    pub fn close_count(&self) -> usize {
        *self.closes.lock().unwrap()
    }
}

#[async_trait]
impl SessionFactory for GraphFactory {
    async fn open(
        &self,
        _index: usize,
        proxy: Option<&ProxyIdentity>,
        user_agent: &str,
    ) -> Result<Box<dyn FetchSession>, CrawlError> {
        self.opened
            .lock()
            .unwrap()
            .push((proxy.cloned(), user_agent.to_string()));

        if let Some(proxy) = proxy.filter(|p| self.broken.contains(*p)) {
            return Err(CrawlError::SessionInit {
                proxy: proxy.to_string(),
                reason: "chrome exited during startup".to_string(),
            });
        }

        let mut session = self.graph.clone();
        session.closes = Some(Arc::clone(&self.closes));
        Ok(Box::new(session))
    }
}
