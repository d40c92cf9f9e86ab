//! Per-job robots.txt cache
//!
//! Each host's robots.txt is fetched at most once per job. Concurrent
//! workers asking for the same host wait on a shared cell instead of
//! issuing duplicate requests.

use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::authority_key;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use url::Url;

type Slot = Arc<OnceCell<Arc<ParsedRobots>>>;

/// Robots rules keyed by `host:port`, scoped to a single job
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rules for the host of `url`, fetching them on first use
    pub async fn rules_for(&self, client: &Client, url: &Url) -> Arc<ParsedRobots> {
        let Some(key) = authority_key(url) else {
            return Arc::new(ParsedRobots::allow_all());
        };

        let slot = {
            let mut entries = self.entries.lock().await;
            entries.entry(key).or_default().clone()
        };

        slot.get_or_init(|| async { Arc::new(fetch_robots(client, url).await) })
            .await
            .clone()
    }

    /// Seeds the cache with known rules for a host
    pub async fn insert(&self, url: &Url, robots: ParsedRobots) {
        if let Some(key) = authority_key(url) {
            let cell = OnceCell::new_with(Some(Arc::new(robots)));
            self.entries.lock().await.insert(key, Arc::new(cell));
        }
    }

    /// Number of hosts with resolved rules
    pub async fn len(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
