//! Frontier queue and per-host request scheduling
//!
//! This module handles:
//! - The FIFO frontier of (URL, depth) pairs and the per-job seen-set
//! - Global and per-host concurrency limits via semaphores
//! - Spacing requests to the same host by a fixed delay plus random jitter
//! - Widening that spacing when robots.txt asks for a larger crawl delay

use crate::config::CrawlerConfig;
use crate::state::HostState;
use crate::url::{authority_key, dedup_key};
use rand::Rng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use url::Url;

/// A resolved absolute URL and the depth it would be fetched at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub url: Url,
    pub depth: u32,
}

impl LinkCandidate {
    pub fn new(url: Url, depth: u32) -> Self {
        Self { url, depth }
    }
}

/// Breadth-first frontier owned by a single traversal
///
/// A URL is marked seen when it is enqueued, so the first discovery fixes
/// its depth and later paths to the same URL are ignored.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<LinkCandidate>,
    seen: HashSet<String>,
}

impl Frontier {
    /// Creates a frontier holding only the start URL at depth 0
    pub fn seeded(start_url: Url) -> Self {
        let mut frontier = Self::default();
        frontier.push(LinkCandidate::new(start_url, 0));
        frontier
    }

    /// Enqueues a candidate unless its dedup key was already seen
    ///
    /// Returns true if the candidate was enqueued.
    pub fn push(&mut self, candidate: LinkCandidate) -> bool {
        if !self.seen.insert(dedup_key(&candidate.url)) {
            return false;
        }
        self.queue.push_back(candidate);
        true
    }

    pub fn pop(&mut self) -> Option<LinkCandidate> {
        self.queue.pop_front()
    }

    /// Checks a dedup key against the seen-set
    pub fn has_seen(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// Permits held for the duration of one request
///
/// Dropping it frees both the global and the per-host slot.
#[derive(Debug)]
pub struct FetchPermit {
    _global: OwnedSemaphorePermit,
    _host: OwnedSemaphorePermit,
}

#[derive(Debug)]
struct HostSlot {
    permits: Arc<Semaphore>,
    state: HostState,
}

/// Politeness gate shared by all fetch workers of one job
///
/// Bounds in-flight requests globally and per host, and hands out start
/// times so that requests to one host are spaced by the configured delay
/// plus up to `jitter` of random extra wait.
#[derive(Debug)]
pub struct HostThrottle {
    global: Arc<Semaphore>,
    per_host_limit: usize,
    delay: Duration,
    jitter: Duration,
    hosts: Mutex<HashMap<String, HostSlot>>,
}

impl HostThrottle {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            global: Arc::new(Semaphore::new(config.max_concurrent_fetches as usize)),
            per_host_limit: config.max_fetches_per_host as usize,
            delay: Duration::from_millis(config.request_delay_ms),
            jitter: Duration::from_millis(config.request_jitter_ms),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to the host of `url` may start
    ///
    /// `min_delay` raises the spacing for this host (robots.txt Crawl-delay).
    /// Fails only after [`HostThrottle::close`] was called.
    pub async fn acquire(
        &self,
        url: &Url,
        min_delay: Option<Duration>,
    ) -> Result<FetchPermit, AcquireError> {
        let key = authority_key(url).unwrap_or_default();

        let host_permits = {
            let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            hosts
                .entry(key.clone())
                .or_insert_with(|| HostSlot {
                    permits: Arc::new(Semaphore::new(self.per_host_limit)),
                    state: HostState::new(),
                })
                .permits
                .clone()
        };

        let host = host_permits.acquire_owned().await?;
        let global = self.global.clone().acquire_owned().await?;

        let spacing = self.spacing(min_delay);
        let start = {
            let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            match hosts.get_mut(&key) {
                Some(slot) => slot.state.reserve_slot(Instant::now(), spacing),
                None => Instant::now(),
            }
        };

        tokio::time::sleep_until(tokio::time::Instant::from_std(start)).await;

        Ok(FetchPermit {
            _global: global,
            _host: host,
        })
    }

    /// Makes every pending and future `acquire` fail
    pub fn close(&self) {
        self.global.close();
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        for slot in hosts.values() {
            slot.permits.close();
        }
    }

    /// Number of requests issued to the host of `url` so far
    pub fn request_count(&self, url: &Url) -> u32 {
        let Some(key) = authority_key(url) else {
            return 0;
        };
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.get(&key).map_or(0, |slot| slot.state.request_count)
    }

    fn spacing(&self, min_delay: Option<Duration>) -> Duration {
        let jitter = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            let millis = self.jitter.as_millis() as u64;
            Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
        };
        let base = min_delay.map_or(self.delay, |d| d.max(self.delay));
        base + jitter
    }
}
