//! Concurrent workers, one per egress identity

use crate::config::{PoolConfig, SeedConfig};
use crate::crawl::download::ListDownloader;
use crate::crawl::extractor::AddressExtractor;
use crate::crawl::frontier::LinkFrontier;
use crate::crawl::session::{FetchSession, SessionFactory};
use crate::proxy::{describe_egress, CrawlResult, ProxyIdentity};
use crate::Result;
use anyhow::anyhow;
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Runs one crawl worker per configured proxy (or a single direct one)
pub struct WorkerPool {
    factory: Arc<dyn SessionFactory>,
    extractor: Arc<AddressExtractor>,
    config: PoolConfig,
}

impl WorkerPool {
    pub fn new(factory: Arc<dyn SessionFactory>, config: PoolConfig) -> Self {
        Self {
            factory,
            extractor: Arc::new(AddressExtractor::new()),
            config,
        }
    }

    pub fn with_extractor(mut self, extractor: AddressExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Run every worker to completion
    ///
    /// Returns one result per worker in pool order. A worker that fails to
    /// start, times out or panics is reported as a failed entry; its
    /// siblings are unaffected.
    pub async fn run(&self, seed: &SeedConfig) -> Vec<CrawlResult> {
        let seed = Arc::new(seed.clone());

        let identities: Vec<Option<ProxyIdentity>> = if seed.proxy_pool.is_empty() {
            vec![None]
        } else {
            seed.proxy_pool.iter().cloned().map(Some).collect()
        };

        info!(
            url = %seed.url,
            workers = identities.len(),
            max_depth = seed.max_depth,
            "Starting crawl"
        );

        let workers: Vec<Worker> = identities
            .into_iter()
            .enumerate()
            .map(|(index, proxy)| Worker {
                index,
                user_agent: seed.user_agent_for(index).to_string(),
                proxy,
                seed: Arc::clone(&seed),
                factory: Arc::clone(&self.factory),
                extractor: Arc::clone(&self.extractor),
                config: self.config.clone(),
            })
            .collect();

        let labels: Vec<(Option<ProxyIdentity>, String)> = workers
            .iter()
            .map(|w| (w.proxy.clone(), w.user_agent.clone()))
            .collect();

        let handles = workers
            .into_iter()
            .map(|worker| tokio::spawn(worker.run()));
        let joined = join_all(handles).await;

        joined
            .into_iter()
            .zip(labels)
            .map(|(joined, (proxy, user_agent))| match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!(proxy = %describe_egress(proxy.as_ref()), error = %e, "Worker aborted");
                    CrawlResult::failure(proxy, user_agent, format!("worker aborted: {}", e))
                }
            })
            .collect()
    }
}

struct Worker {
    index: usize,
    proxy: Option<ProxyIdentity>,
    user_agent: String,
    seed: Arc<SeedConfig>,
    factory: Arc<dyn SessionFactory>,
    extractor: Arc<AddressExtractor>,
    config: PoolConfig,
}

impl Worker {
    async fn run(self) -> CrawlResult {
        let egress = describe_egress(self.proxy.as_ref());

        let delay = self.config.launch_stagger * self.index as u32;
        if !delay.is_zero() {
            sleep(delay).await;
        }

        info!(worker = self.index, proxy = %egress, user_agent = %self.user_agent, "Worker started");

        let mut session = match self
            .factory
            .open(self.index, self.proxy.as_ref(), &self.user_agent)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(worker = self.index, proxy = %egress, error = %e, "Session failed to start");
                return CrawlResult::failure(self.proxy.clone(), self.user_agent.clone(), e.to_string());
            }
        };

        let mut result = CrawlResult::new(self.proxy.clone(), self.user_agent.clone());

        let outcome = match self.config.worker_timeout {
            Some(limit) => timeout(limit, self.crawl(session.as_mut(), &mut result))
                .await
                .unwrap_or_else(|_| Err(anyhow!("worker timed out after {:?}", limit))),
            None => self.crawl(session.as_mut(), &mut result).await,
        };

        // Released on every path, including timeouts
        session.close().await;

        if let Err(e) = outcome {
            warn!(worker = self.index, proxy = %egress, error = %e, "Worker failed");
            result.error = Some(e.to_string());
        }

        info!(
            worker = self.index,
            proxy = %egress,
            pages = result.pages_loaded,
            downloads = result.discovered_links.len(),
            candidates = result.candidates.len(),
            "Worker finished"
        );
        result
    }

    async fn crawl(&self, session: &mut dyn FetchSession, result: &mut CrawlResult) -> Result<()> {
        let mut frontier = LinkFrontier::new(&self.extractor);
        frontier
            .expand_into(session, &self.seed.url, self.seed.max_depth, result)
            .await?;
        debug!(worker = self.index, visited = frontier.visited().len(), "Traversal finished");

        if result.discovered_links.is_empty() {
            return Ok(());
        }

        let via = self.proxy.as_ref().filter(|_| self.config.download_via_proxy);
        let downloader = ListDownloader::new(&self.config, &self.user_agent, via)?;
        let links = result.discovered_links.clone();
        let found = downloader.fetch_all(&links).await;
        result.candidates.extend(found);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::extractor::FreeTextPass;
    use crate::crawl::testing::{GraphFactory, GraphSession};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_pool(factory: Arc<GraphFactory>) -> WorkerPool {
        WorkerPool::new(factory, PoolConfig::new().with_launch_stagger(Duration::ZERO))
    }

    fn proxy(host: &str) -> ProxyIdentity {
        ProxyIdentity::new(host.to_string(), 8080)
    }

    fn simple_graph() -> GraphSession {
        GraphSession::new().page(
            "http://a.test/",
            "<table><tr><td>1.2.3.4</td><td>80</td></tr></table>",
            &[],
        )
    }

    #[tokio::test]
    async fn test_single_direct_worker_without_proxies() {
        let factory = Arc::new(GraphFactory::new(simple_graph()));
        let pool = fast_pool(Arc::clone(&factory));

        let results = pool.run(&SeedConfig::new("http://a.test/")).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
        assert!(results[0].proxy.is_none());
        assert_eq!(results[0].candidates.len(), 1);
        assert_eq!(factory.close_count(), 1);
    }

    #[tokio::test]
    async fn test_one_worker_per_proxy_with_round_robin_agents() {
        let factory = Arc::new(GraphFactory::new(simple_graph()));
        let pool = fast_pool(Arc::clone(&factory));
        let seed = SeedConfig::new("http://a.test/")
            .with_proxy_pool(vec![proxy("10.0.0.1"), proxy("10.0.0.2"), proxy("10.0.0.3")])
            .with_user_agents(vec!["UA-1".to_string(), "UA-2".to_string()]);

        let results = pool.run(&seed).await;

        assert_eq!(results.len(), 3);
        let agents: Vec<&str> = results.iter().map(|r| r.user_agent.as_str()).collect();
        assert_eq!(agents, vec!["UA-1", "UA-2", "UA-1"]);
        assert_eq!(results[2].proxy, Some(proxy("10.0.0.3")));
        assert_eq!(factory.opened.lock().unwrap().len(), 3);
        assert_eq!(factory.close_count(), 3);
    }

    #[tokio::test]
    async fn test_session_init_failure_is_isolated() {
        let factory = Arc::new(GraphFactory::new(simple_graph()).broken(proxy("10.0.0.2")));
        let pool = fast_pool(Arc::clone(&factory));
        let seed = SeedConfig::new("http://a.test/").with_proxy_pool(vec![
            proxy("10.0.0.1"),
            proxy("10.0.0.2"),
            proxy("10.0.0.3"),
        ]);

        let results = pool.run(&seed).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert!(results[1].candidates.is_empty());
        assert!(results[1].error.as_deref().unwrap().contains("10.0.0.2"));
        assert!(results[2].is_success());
        assert_eq!(results[2].candidates.len(), 1);
        // The broken session never opened, so only two closes
        assert_eq!(factory.close_count(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_seed_marks_worker_failed_and_still_closes() {
        let factory = Arc::new(GraphFactory::new(
            GraphSession::new().failing("http://a.test/"),
        ));
        let pool = fast_pool(Arc::clone(&factory));

        let results = pool.run(&SeedConfig::new("http://a.test/")).await;

        assert!(!results[0].is_success());
        assert_eq!(factory.close_count(), 1);
    }

    #[tokio::test]
    async fn test_download_links_are_fetched_directly() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("3.3.3.3:9090\n"))
            .mount(&server)
            .await;

        let seed_url = format!("{}/", server.uri());
        let list_url = format!("{}/list.txt", server.uri());
        let graph = GraphSession::new()
            .page(&seed_url, "", &[list_url.as_str()])
            // The browser sees an empty page; only the direct download has data
            .page(&list_url, "", &[]);
        let factory = Arc::new(GraphFactory::new(graph));
        let pool = fast_pool(factory);

        let results = pool.run(&SeedConfig::new(&seed_url).with_max_depth(1)).await;

        let candidates: Vec<&str> = results[0].candidates.iter().map(|c| c.as_str()).collect();
        assert_eq!(candidates, vec!["3.3.3.3:9090"]);
        assert!(results[0].discovered_links.contains(&list_url));
    }

    #[tokio::test]
    async fn test_worker_timeout_still_closes_session() {
        let factory = Arc::new(GraphFactory::new(
            simple_graph().slow(Duration::from_secs(30)),
        ));
        let pool = WorkerPool::new(
            Arc::clone(&factory) as Arc<dyn SessionFactory>,
            PoolConfig::new()
                .with_launch_stagger(Duration::ZERO)
                .with_worker_timeout(Duration::from_millis(50)),
        );

        let results = pool.run(&SeedConfig::new("http://a.test/")).await;

        assert_eq!(results.len(), 1);
        assert!(results[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("worker timed out"));
        assert!(results[0].candidates.is_empty());
        assert_eq!(factory.close_count(), 1);
    }

    #[tokio::test]
    async fn test_downloads_routed_through_worker_proxy() {
        // The mock server plays the proxy; the list host itself does not resolve
        let proxy_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("4.4.4.4:4444\n"))
            .expect(1)
            .mount(&proxy_server)
            .await;

        let seed_url = "http://lists.invalid/";
        let list_url = "http://lists.invalid/list.txt";
        let graph = GraphSession::new()
            .page(seed_url, "", &[list_url])
            .page(list_url, "", &[]);
        let factory = Arc::new(GraphFactory::new(graph));
        let pool = WorkerPool::new(
            factory,
            PoolConfig::new()
                .with_launch_stagger(Duration::ZERO)
                .with_download_via_proxy(true),
        );

        let egress = ProxyIdentity::new("127.0.0.1".to_string(), proxy_server.address().port());
        let seed = SeedConfig::new(seed_url)
            .with_max_depth(1)
            .with_proxy_pool(vec![egress]);
        let results = pool.run(&seed).await;

        assert!(results[0].is_success());
        let candidates: Vec<&str> = results[0].candidates.iter().map(|c| c.as_str()).collect();
        assert_eq!(candidates, vec!["4.4.4.4:4444"]);
    }

    #[tokio::test]
    async fn test_custom_extractor_is_used_by_workers() {
        let factory = Arc::new(GraphFactory::new(
            GraphSession::new().page(
                "http://a.test/",
                "<table><tr><td>1.2.3.4</td><td>80</td></tr></table><p>5.6.7.8:3128</p>",
                &[],
            ),
        ));
        let pool = fast_pool(factory)
            .with_extractor(AddressExtractor::with_passes(vec![Box::new(FreeTextPass)]));

        let results = pool.run(&SeedConfig::new("http://a.test/")).await;

        let candidates: Vec<&str> = results[0].candidates.iter().map(|c| c.as_str()).collect();
        assert_eq!(candidates, vec!["5.6.7.8:3128"]);
    }
}
