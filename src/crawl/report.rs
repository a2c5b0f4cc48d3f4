//! JSON summary of a crawl run

use crate::proxy::{describe_egress, CrawlResult};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub egress: String,
    pub user_agent: String,
    pub pages_loaded: usize,
    pub download_links: Vec<String>,
    pub candidates: usize,
    pub error: Option<String>,
}

impl From<&CrawlResult> for WorkerSummary {
    fn from(result: &CrawlResult) -> Self {
        Self {
            egress: describe_egress(result.proxy.as_ref()),
            user_agent: result.user_agent.clone(),
            pages_loaded: result.pages_loaded,
            download_links: result.discovered_links.iter().cloned().collect(),
            candidates: result.candidates.len(),
            error: result.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub seed_url: String,
    pub max_depth: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub workers: Vec<WorkerSummary>,
    pub addresses_written: usize,
}

impl RunReport {
    pub fn new(
        seed_url: &str,
        max_depth: usize,
        started_at: DateTime<Utc>,
        results: &[CrawlResult],
        addresses_written: usize,
    ) -> Self {
        Self {
            seed_url: seed_url.to_string(),
            max_depth,
            started_at,
            finished_at: Utc::now(),
            workers: results.iter().map(WorkerSummary::from).collect(),
            addresses_written,
        }
    }

    pub fn failed_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.error.is_some()).count()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
