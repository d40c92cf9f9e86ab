//! Crawler module for bounded-depth site traversal
//!
//! This module contains the crawl engine and its collaborators:
//! - HTTP fetching with robots.txt checks and typed failures
//! - Content extraction from HTML
//! - Frontier management and per-host request spacing
//! - Image downloading with unique filenames
//! - The coordinating traversal loop

mod coordinator;
mod extractor;
mod fetcher;
mod images;
mod scheduler;

pub use coordinator::{run_crawl, CrawlEngine};
pub use extractor::{extract_page, ExtractedPage, UNTITLED};
pub use fetcher::{build_http_client, FetchError, FetchErrorKind, FetchedPage, Fetcher};
pub use images::{derive_filename, unique_filename, ImageDownloader};
pub use scheduler::{FetchPermit, Frontier, HostThrottle, LinkCandidate};
