//! Conversion jobs
//!
//! A job turns one target URL into one document by running three stages in
//! order: crawl, text recovery, render. Jobs run as independent tokio tasks
//! supervised by the [`JobManager`]; their progress is observable through a
//! process-wide [`JobRegistry`] that only the manager and the job pipelines
//! mutate.
//!
//! # Example
//!
//! ```no_run
//! use pagefold::config::Config;
//! use pagefold::jobs::JobManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = JobManager::from_config(Config::default(), String::new());
//! let job = manager.submit("example.com", Some(1))?;
//! let done = manager.wait(job.id).await?;
//! println!("{}: {}", done.status, done.message);
//! # Ok(())
//! # }
//! ```

mod manager;
mod pipeline;
mod registry;

pub use manager::{Artifact, JobManager};
pub use registry::{JobRegistry, JobSnapshot};

use crate::state::JobStatus;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Opaque job identity
pub type JobId = Uuid;

/// Depth used when a submission does not name one
pub const DEFAULT_MAX_DEPTH: u32 = 2;

/// Largest accepted max depth
pub const MAX_DEPTH_LIMIT: u32 = 5;

/// Job-level errors
///
/// `InvalidInput` messages are shown to the submitter verbatim.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Conversion not completed yet (status: {0})")]
    NotCompleted(JobStatus),

    #[error("Document not found: {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// Checks a numeric max depth against `0..=MAX_DEPTH_LIMIT`
pub fn validate_depth(depth: i64) -> Result<u32, JobError> {
    if (0..=i64::from(MAX_DEPTH_LIMIT)).contains(&depth) {
        Ok(depth as u32)
    } else {
        Err(JobError::InvalidInput(format!(
            "Max depth must be between 0 and {}",
            MAX_DEPTH_LIMIT
        )))
    }
}

/// Parses a max depth given as text, e.g. from a form field or CLI flag
pub fn parse_depth(raw: &str) -> Result<u32, JobError> {
    let depth = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| JobError::InvalidInput("Max depth must be a valid number".to_string()))?;
    validate_depth(depth)
}

/// Download name of a job's document: `website_{domain}_{YYYYMMDD_HHMMSS}.{ext}`
///
/// An explicit port is kept in the domain part, joined with `_`.
pub fn artifact_filename(url: &Url, created_at: DateTime<Utc>, extension: &str) -> String {
    let mut domain = url.host_str().unwrap_or("site").to_lowercase();
    if let Some(port) = url.port() {
        domain = format!("{}_{}", domain, port);
    }

    format!(
        "website_{}_{}.{}",
        domain,
        created_at.format("%Y%m%d_%H%M%S"),
        extension
    )
}
