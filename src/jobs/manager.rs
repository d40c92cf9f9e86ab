//! Job submission, supervision and retention

use crate::config::Config;
use crate::jobs::pipeline::{JobSpec, Pipeline, StageError};
use crate::jobs::{
    artifact_filename, validate_depth, JobError, JobId, JobRegistry, JobSnapshot,
    DEFAULT_MAX_DEPTH,
};
use crate::ocr::{engine_from_config, OcrEngine};
use crate::output::{DocumentRenderer, MarkdownRenderer};
use crate::state::JobStatus;
use crate::url::normalize_submission;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A completed job's document and the name to offer it under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub filename: String,
}

/// Owns the job registry and launches one supervised worker per job
///
/// Must be used from within a tokio runtime.
pub struct JobManager {
    pipeline: Pipeline,
    workers: Mutex<HashMap<JobId, JoinHandle<()>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl JobManager {
    pub fn new(
        config: Config,
        config_hash: impl Into<String>,
        ocr: Arc<dyn OcrEngine>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            pipeline: Pipeline {
                registry: JobRegistry::new(),
                config: Arc::new(config),
                config_hash: config_hash.into(),
                ocr,
                renderer,
            },
            workers: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Manager with the capabilities named by the configuration
    pub fn from_config(config: Config, config_hash: impl Into<String>) -> Self {
        let ocr = engine_from_config(&config.ocr);
        Self::new(config, config_hash, ocr, Arc::new(MarkdownRenderer))
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.pipeline.registry
    }

    /// Validates a submission and starts its job
    ///
    /// `max_depth` defaults to 2. Nothing is created when validation fails.
    pub fn submit(&self, url: &str, max_depth: Option<i64>) -> Result<JobSnapshot, JobError> {
        if url.trim().is_empty() {
            return Err(JobError::InvalidInput("URL is required".to_string()));
        }
        let max_depth = match max_depth {
            Some(depth) => validate_depth(depth)?,
            None => DEFAULT_MAX_DEPTH,
        };
        let url = normalize_submission(url)
            .map_err(|e| JobError::InvalidInput(format!("Invalid URL: {}", e)))?;

        let id = Uuid::new_v4();
        let work_dir = self
            .pipeline
            .config
            .jobs
            .work_dir
            .join(format!("job_{}", id.simple()));
        let cancel = self.shutdown.child_token();

        let snapshot = JobSnapshot::new(id, url.to_string(), max_depth);
        self.pipeline
            .registry
            .insert(snapshot.clone(), work_dir.clone(), cancel.clone());

        let job = JobSpec {
            id,
            url,
            max_depth,
            work_dir,
            cancel,
        };
        let handle = tokio::spawn(supervise(self.pipeline.clone(), job));

        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        workers.retain(|_, handle| !handle.is_finished());
        workers.insert(id, handle);

        tracing::info!(job_id = %id, url = %snapshot.url, max_depth, "Job submitted");
        Ok(snapshot)
    }

    pub fn status(&self, id: JobId) -> Result<JobSnapshot, JobError> {
        self.pipeline.registry.get(id).ok_or(JobError::NotFound(id))
    }

    /// All known jobs, newest first
    pub fn list(&self) -> Vec<JobSnapshot> {
        self.pipeline.registry.list()
    }

    /// The document of a completed job
    pub fn artifact(&self, id: JobId) -> Result<Artifact, JobError> {
        let snapshot = self.status(id)?;
        if snapshot.status != JobStatus::Completed {
            return Err(JobError::NotCompleted(snapshot.status));
        }

        let path = snapshot
            .artifact_path
            .ok_or_else(|| JobError::ArtifactMissing(PathBuf::new()))?;
        if !path.exists() {
            return Err(JobError::ArtifactMissing(path));
        }

        let url = normalize_submission(&snapshot.url)
            .map_err(|e| JobError::InvalidInput(e.to_string()))?;
        let filename = artifact_filename(
            &url,
            snapshot.created_at,
            self.pipeline.renderer.extension(),
        );
        Ok(Artifact { path, filename })
    }

    /// Waits until a job reaches a terminal status
    pub async fn wait(&self, id: JobId) -> Result<JobSnapshot, JobError> {
        let mut rx = self
            .pipeline
            .registry
            .subscribe(id)
            .ok_or(JobError::NotFound(id))?;

        let snapshot = match rx.wait_for(JobSnapshot::is_terminal).await {
            Ok(snapshot) => snapshot.clone(),
            // Sender dropped: the job was swept while we waited
            Err(_) => return Err(JobError::NotFound(id)),
        };
        Ok(snapshot)
    }

    /// Requests cancellation of a job
    ///
    /// The job fails with `Job cancelled` at its next checkpoint. Terminal
    /// jobs are unaffected.
    pub fn cancel(&self, id: JobId) -> Result<(), JobError> {
        let token = self
            .pipeline
            .registry
            .cancel_token(id)
            .ok_or(JobError::NotFound(id))?;
        token.cancel();
        tracing::info!(job_id = %id, "Cancellation requested");
        Ok(())
    }

    /// Forgets a finished job and deletes its working directory
    ///
    /// Active jobs are refused with [`JobError::NotCompleted`].
    pub async fn remove(&self, id: JobId) -> Result<(), JobError> {
        let work_dir = self.pipeline.registry.remove_terminal(id)?;
        reclaim_dir(id, &work_dir).await;
        tracing::debug!(job_id = %id, "Job removed");
        Ok(())
    }

    /// Starts the periodic retention sweep
    ///
    /// Calling it again replaces the previous sweeper.
    pub fn start_sweeper(&self) {
        let registry = self.pipeline.registry.clone();
        let jobs = &self.pipeline.config.jobs;
        let interval = Duration::from_secs(jobs.sweep_interval_secs.max(1));
        let retention = Duration::from_secs(jobs.retention_secs);
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        sweep_expired(&registry, retention).await;
                    }
                }
            }
            tracing::debug!("Retention sweeper stopped");
        });

        let mut sweeper = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = sweeper.replace(handle) {
            previous.abort();
        }
    }

    /// Runs one retention sweep now and returns the number of removed jobs
    pub async fn sweep(&self) -> usize {
        let retention = Duration::from_secs(self.pipeline.config.jobs.retention_secs);
        sweep_expired(&self.pipeline.registry, retention).await
    }

    /// Cancels every job, stops the sweeper and waits for workers to exit
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.pipeline.registry.cancel_all();

        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            workers.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }

        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = sweeper {
            let _ = handle.await;
        }
        tracing::info!("Job manager shut down");
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Runs a job's pipeline in its own task and records the outcome
///
/// A panic inside the pipeline still ends the job as `failed`.
async fn supervise(pipeline: Pipeline, job: JobSpec) {
    let id = job.id;
    let registry = pipeline.registry.clone();
    let worker = tokio::spawn(async move { pipeline.execute(&job).await });

    let recorded = match worker.await {
        Ok(Ok(artifact)) => registry.complete(id, artifact),
        Ok(Err(StageError::Job(e))) => Err(e),
        Ok(Err(e)) => {
            tracing::error!(job_id = %id, error = %e, "Job failed");
            registry.fail(id, e.to_string())
        }
        Err(e) => {
            tracing::error!(job_id = %id, error = %e, "Job worker aborted");
            registry.fail(id, format!("Worker task failed: {}", e))
        }
    };

    if let Err(e) = recorded {
        tracing::warn!(job_id = %id, error = %e, "Could not record job outcome");
    }
}

/// Removes expired terminal jobs and their working directories
async fn sweep_expired(registry: &JobRegistry, retention: Duration) -> usize {
    let retention =
        chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::weeks(5200));
    let removed = registry.remove_expired(Utc::now(), retention);

    for (id, work_dir) in &removed {
        reclaim_dir(*id, work_dir).await;
    }

    tracing::info!(removed = removed.len(), "Cleaned up old jobs");
    removed.len()
}

async fn reclaim_dir(id: JobId, work_dir: &Path) {
    match tokio::fs::remove_dir_all(work_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(job_id = %id, dir = %work_dir.display(), error = %e, "Failed to remove job directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::DisabledOcr;

    fn manager(dir: &std::path::Path) -> JobManager {
        let mut config = Config::default();
        config.jobs.work_dir = dir.to_path_buf();
        JobManager::new(config, "", Arc::new(DisabledOcr), Arc::new(MarkdownRenderer))
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let err = manager.submit("   ", Some(1)).unwrap_err();
        assert_eq!(err.to_string(), "URL is required");
        let err = manager.submit("example.test", Some(7)).unwrap_err();
        assert_eq!(err.to_string(), "Max depth must be between 0 and 5");
        assert!(manager.submit("example.test", Some(-1)).is_err());
        assert!(manager.submit("ftp://example.test", None).is_err());

        assert!(manager.list().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job_ids() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let id = Uuid::new_v4();

        assert!(matches!(manager.status(id), Err(JobError::NotFound(_))));
        assert!(matches!(manager.artifact(id), Err(JobError::NotFound(_))));
        assert!(matches!(manager.cancel(id), Err(JobError::NotFound(_))));
        assert!(matches!(manager.wait(id).await, Err(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cancelled_job_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        // Unroutable: cancellation must win over the connection attempt
        let job = manager.submit("http://10.255.255.1/", Some(0)).unwrap();
        manager.cancel(job.id).unwrap();

        let done = manager.wait(job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("Job cancelled"));
        assert!(matches!(
            manager.artifact(job.id),
            Err(JobError::NotCompleted(JobStatus::Failed))
        ));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_terminal_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let job = manager.submit("http://10.255.255.1/", Some(0)).unwrap();
        manager.cancel(job.id).unwrap();
        manager.wait(job.id).await.unwrap();

        assert_eq!(manager.sweep().await, 0);

        manager
            .registry()
            .backdate(job.id, chrono::Duration::hours(2));
        assert_eq!(manager.sweep().await, 1);
        assert!(manager.list().is_empty());
        assert!(!dir.path().join(format!("job_{}", job.id.simple())).exists());
    }

    fn register_job(manager: &JobManager, work_dir: &Path) -> JobId {
        let id = Uuid::new_v4();
        std::fs::create_dir_all(work_dir).unwrap();
        manager.registry().insert(
            JobSnapshot::new(id, "https://example.test/".to_string(), 1),
            work_dir.to_path_buf(),
            CancellationToken::new(),
        );
        id
    }

    #[tokio::test]
    async fn test_remove_reclaims_finished_job() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let work_dir = dir.path().join("job_done");
        let id = register_job(&manager, &work_dir);

        assert!(matches!(
            manager.remove(id).await,
            Err(JobError::NotCompleted(JobStatus::Starting))
        ));
        assert!(work_dir.exists());

        manager.registry().fail(id, "boom").unwrap();
        manager.remove(id).await.unwrap();
        assert!(!work_dir.exists());
        assert!(matches!(manager.status(id), Err(JobError::NotFound(_))));
        assert!(matches!(manager.remove(id).await, Err(JobError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.jobs.work_dir = dir.path().to_path_buf();
        config.jobs.sweep_interval_secs = 60;
        config.jobs.retention_secs = 3600;
        let manager =
            JobManager::new(config, "", Arc::new(DisabledOcr), Arc::new(MarkdownRenderer));

        let old_dir = dir.path().join("job_old");
        let old = register_job(&manager, &old_dir);
        manager.registry().fail(old, "boom").unwrap();
        manager.registry().backdate(old, chrono::Duration::hours(2));

        let active_dir = dir.path().join("job_active");
        let active = register_job(&manager, &active_dir);
        manager.registry().backdate(active, chrono::Duration::hours(2));

        manager.start_sweeper();
        // Replaces the first sweeper
        manager.start_sweeper();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(manager.list().len(), 2);

        tokio::time::sleep(Duration::from_secs(31)).await;
        for _ in 0..50 {
            if manager.list().len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let remaining = manager.list();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, active);
        assert!(!old_dir.exists());
        assert!(active_dir.exists());

        manager.shutdown().await;
        assert!(manager
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none());
    }
}
