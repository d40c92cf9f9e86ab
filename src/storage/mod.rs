//! Storage module for persisting a job's corpus
//!
//! Every job owns one SQLite database inside its working directory holding:
//! - The page corpus (one row per fetched page, with headings and image references)
//! - The image corpus and the failure log
//! - The crawl summary handed to the later pipeline stages
//! - Text recovery results, when that stage ran
//!
//! The rendering stage reads only this database and the image directory, so it
//! can be invoked independently of the crawl.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// File name of the corpus database inside a job's working directory
pub const CORPUS_FILE: &str = "corpus.db";

/// Directory name of the image corpus inside a job's working directory
pub const IMAGES_DIR: &str = "images";

/// Path of the corpus database for a job working directory
pub fn corpus_path(work_dir: &Path) -> PathBuf {
    work_dir.join(CORPUS_FILE)
}

/// Path of the image directory for a job working directory
pub fn images_path(work_dir: &Path) -> PathBuf {
    work_dir.join(IMAGES_DIR)
}

/// Opens (creating if needed) the corpus of a job working directory
pub fn open_storage(work_dir: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(&corpus_path(work_dir))
}

/// A heading in a page's outline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// 1 through 6
    pub level: u8,
    pub text: String,
    /// Value of the element's `id` attribute, empty when absent
    pub anchor: String,
}

/// A successfully fetched and extracted page
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    /// Outline in document order
    pub headings: Vec<Heading>,
    pub depth: u32,
    pub fetched_at: DateTime<Utc>,
    pub status_code: u16,
    /// Absolute URLs of the images this page referenced, in document order
    pub images: Vec<String>,
}

/// A downloaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub url: String,
    /// Unique within the job's image directory
    pub filename: String,
    /// Page that first referenced this image
    pub page_url: String,
    pub size: u64,
}

/// What kind of resource a failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    Page,
    Image,
}

impl FailureCategory {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Image => "image",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "page" => Some(Self::Page),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

/// One entry of the append-only failure log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub url: String,
    pub error: String,
    pub category: FailureCategory,
}

impl FailureRecord {
    pub fn page(url: impl Into<String>, error: impl ToString) -> Self {
        Self {
            url: url.into(),
            error: error.to_string(),
            category: FailureCategory::Page,
        }
    }

    pub fn image(url: impl Into<String>, error: impl ToString) -> Self {
        Self {
            url: url.into(),
            error: error.to_string(),
            category: FailureCategory::Image,
        }
    }
}

/// Aggregate result of a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub start_url: String,
    pub max_depth: u32,
    pub pages_crawled: u64,
    pub images_downloaded: u64,
    pub failures: u64,
    /// SHA-256 of the configuration the crawl ran with
    pub config_hash: String,
    pub crawled_at: DateTime<Utc>,
}
