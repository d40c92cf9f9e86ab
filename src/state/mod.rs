//! State module for tracking job and crawl progress
//!
//! # Components
//!
//! - `JobStatus`: Lifecycle of a conversion job (starting, crawling, ocr, generating, completed, failed)
//! - `CrawlState`: Lifecycle of a single frontier entry inside the crawl engine
//! - `HostState`: Per-host politeness bookkeeping (request spacing)

mod crawl_state;
mod host_state;
mod job_state;

// Re-export main types
pub use crawl_state::CrawlState;
pub use host_state::HostState;
pub use job_state::JobStatus;
