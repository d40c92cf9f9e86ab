//! Crawl engine - breadth-first traversal of one job
//!
//! A single coordinating task owns the frontier, the seen-set, the counters
//! and the corpus database. Fetch workers run in a [`JoinSet`] and only hand
//! results back; they never touch the frontier or storage. This keeps the
//! traversal state single-writer while still allowing several requests in
//! flight.

use crate::config::Config;
use crate::crawler::extractor::{extract_page, ExtractedPage};
use crate::crawler::fetcher::{FetchError, FetchErrorKind, Fetcher};
use crate::crawler::images::ImageDownloader;
use crate::crawler::scheduler::{Frontier, LinkCandidate};
use crate::state::CrawlState;
use crate::storage::{
    images_path, open_storage, CrawlSummary, FailureRecord, ImageRecord, SqliteStorage, Storage,
};
use crate::url::LinkFilter;
use crate::{PagefoldError, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// What a worker task hands back to the coordinator
#[derive(Debug)]
enum WorkOutcome {
    Page {
        candidate: LinkCandidate,
        result: std::result::Result<ExtractedPage, FetchError>,
    },
    Image {
        result: std::result::Result<ImageRecord, FailureRecord>,
    },
}

/// Traversal context for one crawl
///
/// Owned by exactly one run and never shared across jobs.
pub struct CrawlEngine {
    fetcher: Arc<Fetcher>,
    images: Arc<ImageDownloader>,
    storage: SqliteStorage,
    filter: LinkFilter,
    frontier: Frontier,
    scheduled_images: HashSet<String>,
    start_url: Url,
    config_hash: String,
    max_in_flight: usize,
    cancel: CancellationToken,
    pages_crawled: u64,
    images_downloaded: u64,
    failures: u64,
}

impl CrawlEngine {
    /// Prepares a crawl rooted at `start_url`
    ///
    /// Creates the image directory and the corpus database under `work_dir`.
    /// Failing to do so is fatal to the job.
    pub fn new(
        config: &Config,
        config_hash: &str,
        start_url: Url,
        max_depth: u32,
        work_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let images_dir = images_path(work_dir);
        std::fs::create_dir_all(&images_dir)?;
        let storage = open_storage(work_dir)?;
        let fetcher = Fetcher::new(config)?;

        Ok(Self {
            fetcher: Arc::new(fetcher),
            images: Arc::new(ImageDownloader::new(images_dir)),
            storage,
            filter: LinkFilter::new(&start_url, max_depth),
            frontier: Frontier::seeded(start_url.clone()),
            scheduled_images: HashSet::new(),
            start_url,
            config_hash: config_hash.to_string(),
            max_in_flight: config.crawler.max_concurrent_fetches.max(1) as usize,
            cancel,
            pages_crawled: 0,
            images_downloaded: 0,
            failures: 0,
        })
    }

    /// Runs the traversal until the frontier drains
    ///
    /// Page and image failures are logged to the corpus and never abort the
    /// crawl. Storage errors and cancellation do.
    pub async fn run(mut self) -> Result<CrawlSummary> {
        tracing::info!(
            url = %self.start_url,
            max_depth = self.filter.max_depth(),
            "Starting crawl"
        );

        let cancel = self.cancel.clone();
        let mut tasks: JoinSet<WorkOutcome> = JoinSet::new();

        loop {
            while tasks.len() < self.max_in_flight && !cancel.is_cancelled() {
                let Some(candidate) = self.frontier.pop() else {
                    break;
                };
                self.spawn_page(&mut tasks, candidate);
            }

            if tasks.is_empty() {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                joined = tasks.join_next() => joined,
            };

            let Some(joined) = joined else {
                if cancel.is_cancelled() {
                    break;
                }
                continue;
            };

            match joined {
                Ok(outcome) => self.handle(outcome, &mut tasks)?,
                Err(e) if e.is_panic() => {
                    tasks.abort_all();
                    return Err(PagefoldError::Worker(e.to_string()));
                }
                Err(_) => {}
            }
        }

        if cancel.is_cancelled() {
            self.fetcher.close();
            tasks.abort_all();
            tracing::info!(url = %self.start_url, "Crawl cancelled");
            return Err(PagefoldError::Cancelled);
        }

        let summary = CrawlSummary {
            start_url: self.start_url.to_string(),
            max_depth: self.filter.max_depth(),
            pages_crawled: self.pages_crawled,
            images_downloaded: self.images_downloaded,
            failures: self.failures,
            config_hash: self.config_hash.clone(),
            crawled_at: Utc::now(),
        };
        self.storage.save_summary(&summary)?;

        tracing::info!(
            url = %self.start_url,
            pages = summary.pages_crawled,
            images = summary.images_downloaded,
            failures = summary.failures,
            "Crawl completed"
        );

        Ok(summary)
    }

    fn spawn_page(&self, tasks: &mut JoinSet<WorkOutcome>, candidate: LinkCandidate) {
        log_state(&candidate.url, CrawlState::Queued, CrawlState::Fetching);

        let fetcher = Arc::clone(&self.fetcher);
        tasks.spawn(async move {
            let result = fetcher.fetch_page(&candidate.url).await.map(|page| {
                log_state(&candidate.url, CrawlState::Fetching, CrawlState::Extracting);
                extract_page(
                    page.text(),
                    &candidate.url,
                    &page.final_url,
                    candidate.depth,
                    page.status_code,
                )
            });
            WorkOutcome::Page { candidate, result }
        });
    }

    fn spawn_image(&self, tasks: &mut JoinSet<WorkOutcome>, image_url: Url, page_url: String) {
        let fetcher = Arc::clone(&self.fetcher);
        let images = Arc::clone(&self.images);
        tasks.spawn(async move {
            let result = images.download(&fetcher, &image_url, &page_url).await;
            WorkOutcome::Image { result }
        });
    }

    fn handle(&mut self, outcome: WorkOutcome, tasks: &mut JoinSet<WorkOutcome>) -> Result<()> {
        match outcome {
            WorkOutcome::Page {
                candidate,
                result: Ok(extracted),
            } => {
                let ExtractedPage {
                    record,
                    links,
                    images,
                } = extracted;

                self.storage.insert_page(&record)?;
                self.pages_crawled += 1;
                tracing::info!(url = %candidate.url, depth = candidate.depth, title = %record.title, "Crawled page");

                for image_url in images {
                    if self.scheduled_images.insert(image_url.to_string()) {
                        self.spawn_image(tasks, image_url, record.url.clone());
                    }
                }

                if candidate.depth < self.filter.max_depth() {
                    log_state(&candidate.url, CrawlState::Extracting, CrawlState::Recursing);
                    let enqueued = self.enqueue_links(links, candidate.depth + 1);
                    tracing::debug!(url = %candidate.url, enqueued, "Enqueued links");
                    log_state(&candidate.url, CrawlState::Recursing, CrawlState::Done);
                } else {
                    log_state(&candidate.url, CrawlState::Extracting, CrawlState::Done);
                }
            }

            WorkOutcome::Page {
                candidate,
                result: Err(error),
            } => {
                log_state(&candidate.url, CrawlState::Fetching, CrawlState::Done);
                if error.kind == FetchErrorKind::Cancelled {
                    return Ok(());
                }
                tracing::warn!(url = %error.url, depth = candidate.depth, error = %error.kind, "Page fetch failed");
                self.record_failure(FailureRecord::page(error.url, error.kind))?;
            }

            WorkOutcome::Image { result: Ok(image) } => {
                self.storage.insert_image(&image)?;
                self.images_downloaded += 1;
            }

            WorkOutcome::Image {
                result: Err(failure),
            } => {
                self.record_failure(failure)?;
            }
        }

        Ok(())
    }

    /// Filters discovered links and pushes the eligible ones at `depth`
    fn enqueue_links(&mut self, links: Vec<Url>, depth: u32) -> usize {
        let mut enqueued = 0;
        for link in links {
            let frontier = &self.frontier;
            if self
                .filter
                .is_eligible(&link, depth, |key| frontier.has_seen(key))
                && self.frontier.push(LinkCandidate::new(link, depth))
            {
                enqueued += 1;
            }
        }
        enqueued
    }

    fn record_failure(&mut self, failure: FailureRecord) -> Result<()> {
        self.storage.insert_failure(&failure)?;
        self.failures += 1;
        Ok(())
    }
}

fn log_state(url: &Url, from: CrawlState, to: CrawlState) {
    debug_assert!(from.can_transition_to(to), "{} -> {}", from, to);
    tracing::trace!(url = %url, from = %from, to = %to, "Frontier entry advanced");
}

/// Runs a complete crawl of `start_url` into `work_dir`
///
/// # Example
///
/// ```no_run
/// use pagefold::config::Config;
/// use pagefold::crawler::run_crawl;
/// use tokio_util::sync::CancellationToken;
/// use url::Url;
///
/// # async fn example() -> pagefold::Result<()> {
/// let config = Config::default();
/// let start = Url::parse("https://example.com/").unwrap();
/// let work_dir = std::env::temp_dir().join("pagefold-example");
/// let summary = run_crawl(&config, "", start, 1, &work_dir, CancellationToken::new()).await?;
/// println!("{} pages", summary.pages_crawled);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    start_url: Url,
    max_depth: u32,
    work_dir: &Path,
    cancel: CancellationToken,
) -> Result<CrawlSummary> {
    CrawlEngine::new(config, config_hash, start_url, max_depth, work_dir, cancel)?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.crawler.request_delay_ms = 0;
        config.crawler.request_jitter_ms = 0;
        config.crawler.request_timeout_secs = 2;
        config
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_raw(
                format!("<html><head><title>T</title></head><body>{}</body></html>", body),
                "text/html",
            )
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let start = Url::parse("http://127.0.0.1:9/").unwrap();
        let result = run_crawl(&test_config(), "", start, 2, dir.path(), cancel).await;
        assert!(matches!(result, Err(PagefoldError::Cancelled)));
    }

    #[tokio::test]
    async fn test_shared_image_downloaded_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(r#"<img src="/logo.png"><a href="/a">a</a>"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(html(r#"<img src="/logo.png"><p>A</p>"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64]))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let start = Url::parse(&format!("{}/", server.uri())).unwrap();
        let summary = run_crawl(&test_config(), "hash", start, 1, dir.path(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.pages_crawled, 2);
        assert_eq!(summary.images_downloaded, 1);
        assert_eq!(summary.config_hash, "hash");

        let storage = open_storage(dir.path()).unwrap();
        let pages = storage.load_pages().unwrap();
        assert!(pages.iter().all(|p| p.images.len() == 1));
        assert_eq!(storage.load_summary().unwrap().unwrap(), summary);
    }

    #[tokio::test]
    async fn test_failed_image_is_logged_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(r#"<img src="/broken.png">"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken.png"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let start = Url::parse(&format!("{}/", server.uri())).unwrap();
        let summary = run_crawl(&test_config(), "", start, 0, dir.path(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.pages_crawled, 1);
        assert_eq!(summary.images_downloaded, 0);
        assert_eq!(summary.failures, 1);

        let failures = open_storage(dir.path()).unwrap().load_failures().unwrap();
        assert_eq!(failures[0].error, "HTTP 500");
        assert_eq!(failures[0].category, crate::storage::FailureCategory::Image);
        assert!(std::fs::read_dir(images_path(dir.path())).unwrap().next().is_none());
    }
}
