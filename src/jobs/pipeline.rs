//! The staged conversion pipeline run by each job worker
//!
//! Only crawl and render failures end a job. Text recovery is best effort:
//! whether the capability is missing or fails midway, the job moves on to
//! rendering without recovered text.

use crate::config::Config;
use crate::crawler::run_crawl;
use crate::jobs::{JobError, JobId, JobRegistry};
use crate::ocr::{recover_text, Capability, OcrEngine, OcrSummary, TextRecognizer};
use crate::output::DocumentRenderer;
use crate::state::JobStatus;
use crate::storage::{images_path, open_storage, CrawlSummary, Storage};
use crate::PagefoldError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Why a job ended in `failed`
#[derive(Debug, Error)]
pub(crate) enum StageError {
    #[error("Job cancelled")]
    Cancelled,

    #[error("Crawling failed: {0}")]
    Crawl(PagefoldError),

    #[error("{0}")]
    Render(PagefoldError),

    #[error(transparent)]
    Job(#[from] JobError),
}

/// Collaborators shared by every job of one manager
#[derive(Clone)]
pub(crate) struct Pipeline {
    pub registry: JobRegistry,
    pub config: Arc<Config>,
    pub config_hash: String,
    pub ocr: Arc<dyn OcrEngine>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

/// One job's inputs
#[derive(Debug, Clone)]
pub(crate) struct JobSpec {
    pub id: JobId,
    pub url: Url,
    pub max_depth: u32,
    pub work_dir: PathBuf,
    pub cancel: CancellationToken,
}

impl Pipeline {
    /// Runs the stages and returns the rendered document's path
    pub async fn execute(&self, job: &JobSpec) -> Result<PathBuf, StageError> {
        let summary = self.crawl(job).await?;
        self.recover_text(job, &summary).await?;
        self.render(job).await
    }

    async fn crawl(&self, job: &JobSpec) -> Result<CrawlSummary, StageError> {
        checkpoint(&job.cancel)?;
        self.registry
            .advance(job.id, JobStatus::Crawling, 10, "Starting web crawling...")?;

        let summary = run_crawl(
            &self.config,
            &self.config_hash,
            job.url.clone(),
            job.max_depth,
            &job.work_dir,
            job.cancel.clone(),
        )
        .await
        .map_err(|e| match e {
            PagefoldError::Cancelled => StageError::Cancelled,
            other => StageError::Crawl(other),
        })?;

        self.registry.advance(
            job.id,
            JobStatus::Crawling,
            40,
            format!(
                "Crawled {} pages, downloaded {} images",
                summary.pages_crawled, summary.images_downloaded
            ),
        )?;
        Ok(summary)
    }

    async fn recover_text(&self, job: &JobSpec, summary: &CrawlSummary) -> Result<(), StageError> {
        checkpoint(&job.cancel)?;

        if summary.images_downloaded == 0 {
            self.registry
                .advance(job.id, JobStatus::Ocr, 70, "No images found, skipping OCR")?;
            return Ok(());
        }

        self.registry
            .advance(job.id, JobStatus::Ocr, 50, "Processing images with OCR...")?;

        let message = match self.ocr.probe().await {
            Capability::Available(recognizer) => {
                let outcome = tokio::select! {
                    _ = job.cancel.cancelled() => return Err(StageError::Cancelled),
                    outcome = recover_and_store(recognizer.as_ref(), &job.work_dir) => outcome,
                };
                match outcome {
                    Ok(ocr) => format!(
                        "OCR completed: {}/{} images processed",
                        ocr.processed, summary.images_downloaded
                    ),
                    Err(e) => {
                        tracing::warn!(job_id = %job.id, error = %e, "Text recovery failed");
                        "OCR processing failed, continuing without OCR".to_string()
                    }
                }
            }
            Capability::Unavailable(reason) => {
                tracing::warn!(job_id = %job.id, reason = %reason, "Text recovery unavailable");
                "OCR not available, skipping image text extraction".to_string()
            }
        };

        self.registry.advance(job.id, JobStatus::Ocr, 70, message)?;
        Ok(())
    }

    async fn render(&self, job: &JobSpec) -> Result<PathBuf, StageError> {
        checkpoint(&job.cancel)?;
        self.registry
            .advance(job.id, JobStatus::Generating, 80, "Generating document...")?;

        let renderer = Arc::clone(&self.renderer);
        let work_dir = job.work_dir.clone();
        let rendered = tokio::task::spawn_blocking(move || renderer.render(&work_dir))
            .await
            .map_err(|e| StageError::Render(PagefoldError::Worker(e.to_string())))?;

        rendered.map_err(|e| StageError::Render(e.into()))
    }
}

/// Recognizes every downloaded image and persists the results
async fn recover_and_store(
    recognizer: &dyn TextRecognizer,
    work_dir: &Path,
) -> Result<OcrSummary, PagefoldError> {
    let summary = recover_text(recognizer, &images_path(work_dir)).await?;
    let mut storage = open_storage(work_dir)?;
    storage.save_ocr_summary(&summary)?;
    Ok(summary)
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), StageError> {
    if cancel.is_cancelled() {
        Err(StageError::Cancelled)
    } else {
        Ok(())
    }
}
