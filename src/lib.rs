//! Pagefold: turns a website into a single offline document
//!
//! This crate crawls a site breadth-first to a bounded depth, extracts page text
//! and images, optionally recovers text embedded in those images, and renders the
//! aggregate into one paginated document. Conversions run as background jobs
//! whose status can be polled while they execute.

pub mod config;
pub mod crawler;
pub mod jobs;
pub mod ocr;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Pagefold operations
#[derive(Debug, Error)]
pub enum PagefoldError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Document rendering failed: {0}")]
    Render(#[from] output::RenderError),

    #[error("Text recovery failed: {0}")]
    Ocr(#[from] ocr::OcrError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Pagefold operations
pub type Result<T> = std::result::Result<T, PagefoldError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use crate::config::Config;
pub use crate::jobs::{JobError, JobId, JobManager, JobSnapshot};
pub use crate::state::{CrawlState, JobStatus};
pub use crate::url::{dedup_key, extract_host, LinkFilter};
