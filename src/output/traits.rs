//! Document renderer trait and the corpus it consumes

use crate::ocr::OcrResult;
use crate::storage::{
    images_path, open_storage, CrawlSummary, ImageRecord, PageRecord, Storage, StorageError,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while rendering the document
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to write document: {0}")]
    Write(String),

    #[error("Corpus is incomplete: {0}")]
    MissingData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Turns a job's persisted corpus into a single document
///
/// Renderers read only the job working directory, so they can run
/// independently of the crawl that produced it. Rendering is blocking work;
/// async callers run it on the blocking pool.
pub trait DocumentRenderer: Send + Sync {
    /// Renders the corpus under `work_dir` and returns the document path
    fn render(&self, work_dir: &Path) -> RenderResult<PathBuf>;

    /// File extension of produced documents, without the dot
    fn extension(&self) -> &str;
}

/// Everything a renderer needs, loaded from a job working directory
#[derive(Debug, Clone)]
pub struct DocumentContext {
    pub summary: CrawlSummary,
    pub pages: Vec<PageRecord>,
    pub images: Vec<ImageRecord>,
    pub ocr_results: Vec<OcrResult>,
    pub images_dir: PathBuf,
    pub generated_at: DateTime<Utc>,
}

impl DocumentContext {
    /// Loads the corpus of `work_dir`
    ///
    /// Fails if the crawl summary was never written.
    pub fn load(work_dir: &Path) -> RenderResult<Self> {
        let storage = open_storage(work_dir)?;
        let summary = storage
            .load_summary()?
            .ok_or_else(|| RenderError::MissingData("no crawl summary recorded".to_string()))?;

        Ok(Self {
            summary,
            pages: storage.load_pages()?,
            images: storage.load_images()?,
            ocr_results: storage.load_ocr_results()?,
            images_dir: images_path(work_dir),
            generated_at: Utc::now(),
        })
    }

    /// Number of images recognition ran on successfully
    pub fn images_processed(&self) -> usize {
        self.ocr_results.iter().filter(|r| r.success).count()
    }

    /// Number of images that yielded any text
    pub fn images_with_text(&self) -> usize {
        self.ocr_results.iter().filter(|r| r.has_text()).count()
    }

    /// Recovered text of the images `page` referenced, in reference order
    ///
    /// Only images with text are returned; an image referenced by several
    /// pages shows up under each of them.
    pub fn recovered_text_for(&self, page: &PageRecord) -> Vec<&OcrResult> {
        let filenames: HashMap<&str, &str> = self
            .images
            .iter()
            .map(|image| (image.url.as_str(), image.filename.as_str()))
            .collect();
        let results: HashMap<&str, &OcrResult> = self
            .ocr_results
            .iter()
            .filter(|r| r.has_text())
            .map(|r| (r.filename.as_str(), r))
            .collect();

        page.images
            .iter()
            .filter_map(|url| filenames.get(url.as_str()))
            .filter_map(|filename| results.get(filename).copied())
            .collect()
    }
}
