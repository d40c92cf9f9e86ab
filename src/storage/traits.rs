//! Storage traits and error types

use crate::ocr::{OcrResult, OcrSummary};
use crate::storage::{CrawlSummary, FailureRecord, ImageRecord, PageRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for corpus storage backends
///
/// Writes happen only from the crawl engine's coordinating task and the
/// text recovery stage; the renderer only reads.
pub trait Storage {
    // ===== Crawl output =====

    /// Persists a page with its headings and image references
    ///
    /// Fails with `ConstraintViolation` if the URL is already stored.
    fn insert_page(&mut self, page: &PageRecord) -> StorageResult<i64>;

    /// Persists a downloaded image
    fn insert_image(&mut self, image: &ImageRecord) -> StorageResult<()>;

    /// Appends to the failure log
    fn insert_failure(&mut self, failure: &FailureRecord) -> StorageResult<()>;

    /// Stores the crawl summary, replacing any previous one
    fn save_summary(&mut self, summary: &CrawlSummary) -> StorageResult<()>;

    // ===== Text recovery =====

    /// Stores per-image results and totals, replacing any previous run
    fn save_ocr_summary(&mut self, summary: &OcrSummary) -> StorageResult<()>;

    // ===== Reads =====

    /// All pages in fetch order
    fn load_pages(&self) -> StorageResult<Vec<PageRecord>>;

    /// All images in download order
    fn load_images(&self) -> StorageResult<Vec<ImageRecord>>;

    /// The failure log in append order
    fn load_failures(&self) -> StorageResult<Vec<FailureRecord>>;

    fn load_summary(&self) -> StorageResult<Option<CrawlSummary>>;

    /// Text recovery results ordered by filename
    fn load_ocr_results(&self) -> StorageResult<Vec<OcrResult>>;

    fn count_pages(&self) -> StorageResult<u64>;
}
