//! Process-wide job registry
//!
//! Each job's status record lives behind a `watch` channel so observers can
//! either read the latest snapshot or wait for the next change. All writes go
//! through [`JobRegistry`], which enforces the status state machine and keeps
//! progress monotonic.

use crate::jobs::{JobError, JobId};
use crate::state::JobStatus;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Externally visible state of one job
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub url: String,
    pub max_depth: u32,
    pub status: JobStatus,
    /// 0 through 100
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set only once the job completed
    pub artifact_path: Option<PathBuf>,
}

impl JobSnapshot {
    pub(crate) fn new(id: JobId, url: String, max_depth: u32) -> Self {
        Self {
            id,
            url,
            max_depth,
            status: JobStatus::Starting,
            progress: 0,
            message: "Initializing conversion...".to_string(),
            error: None,
            created_at: Utc::now(),
            artifact_path: None,
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug)]
struct JobEntry {
    status: watch::Sender<JobSnapshot>,
    work_dir: PathBuf,
    cancel: CancellationToken,
}

/// Job records keyed by id, shared by the manager and every job worker
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, snapshot: JobSnapshot, work_dir: PathBuf, cancel: CancellationToken) {
        let id = snapshot.id;
        log_transition(&snapshot);
        let (status, _) = watch::channel(snapshot);
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        jobs.insert(
            id,
            JobEntry {
                status,
                work_dir,
                cancel,
            },
        );
    }

    /// Latest snapshot of a job
    pub fn get(&self, id: JobId) -> Option<JobSnapshot> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(&id).map(|entry| entry.status.borrow().clone())
    }

    /// All jobs, newest first
    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> = {
            let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
            jobs.values()
                .map(|entry| entry.status.borrow().clone())
                .collect()
        };
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receiver that observes every change to a job's record
    pub fn subscribe(&self, id: JobId) -> Option<watch::Receiver<JobSnapshot>> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(&id).map(|entry| entry.status.subscribe())
    }

    pub(crate) fn cancel_token(&self, id: JobId) -> Option<CancellationToken> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(&id).map(|entry| entry.cancel.clone())
    }

    /// Trips the cancellation token of every job
    pub(crate) fn cancel_all(&self) {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        for entry in jobs.values() {
            entry.cancel.cancel();
        }
    }

    /// Moves a job to `status` with a new progress value and message
    ///
    /// Progress never decreases; a lower value keeps the current one.
    pub fn advance(
        &self,
        id: JobId,
        status: JobStatus,
        progress: u8,
        message: impl Into<String>,
    ) -> Result<JobSnapshot, JobError> {
        let message = message.into();
        self.modify(id, status, |snapshot| {
            snapshot.progress = snapshot.progress.max(progress.min(100));
            snapshot.message = message;
        })
    }

    /// Moves a job to `failed`, keeping its last progress
    pub fn fail(&self, id: JobId, error: impl Into<String>) -> Result<JobSnapshot, JobError> {
        let error = error.into();
        self.modify(id, JobStatus::Failed, |snapshot| {
            snapshot.message = format!("Conversion failed: {}", error);
            snapshot.error = Some(error);
        })
    }

    /// Moves a job to `completed` and records its document
    pub fn complete(&self, id: JobId, artifact: PathBuf) -> Result<JobSnapshot, JobError> {
        self.modify(id, JobStatus::Completed, |snapshot| {
            snapshot.progress = 100;
            snapshot.message = "Conversion completed successfully!".to_string();
            snapshot.artifact_path = Some(artifact);
        })
    }

    fn modify<F>(&self, id: JobId, next: JobStatus, apply: F) -> Result<JobSnapshot, JobError>
    where
        F: FnOnce(&mut JobSnapshot),
    {
        let jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let entry = jobs.get(&id).ok_or(JobError::NotFound(id))?;

        let current = entry.status.borrow().status;
        if !current.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        entry.status.send_modify(|snapshot| {
            snapshot.status = next;
            apply(snapshot);
        });

        let snapshot = entry.status.borrow().clone();
        log_transition(&snapshot);
        Ok(snapshot)
    }

    /// Removes terminal jobs created more than `retention` before `now`
    ///
    /// Active jobs are never removed, however old. Returns the removed ids
    /// with their working directories for the caller to reclaim.
    pub(crate) fn remove_expired(
        &self,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Vec<(JobId, PathBuf)> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let expired: Vec<JobId> = jobs
            .iter()
            .filter(|(_, entry)| {
                let snapshot = entry.status.borrow();
                snapshot.is_terminal() && now - snapshot.created_at > retention
            })
            .map(|(id, _)| *id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| jobs.remove(&id).map(|entry| (id, entry.work_dir)))
            .collect()
    }

    /// Removes one terminal job, returning its working directory
    pub(crate) fn remove_terminal(&self, id: JobId) -> Result<PathBuf, JobError> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let status = jobs
            .get(&id)
            .map(|entry| entry.status.borrow().status)
            .ok_or(JobError::NotFound(id))?;
        if !status.is_terminal() {
            return Err(JobError::NotCompleted(status));
        }

        jobs.remove(&id)
            .map(|entry| entry.work_dir)
            .ok_or(JobError::NotFound(id))
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, id: JobId, by: Duration) {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = jobs.get(&id) {
            entry
                .status
                .send_modify(|snapshot| snapshot.created_at = snapshot.created_at - by);
        }
    }
}

fn log_transition(snapshot: &JobSnapshot) {
    tracing::info!(
        job_id = %snapshot.id,
        status = %snapshot.status,
        progress = snapshot.progress,
        message = %snapshot.message,
        at = %Utc::now().to_rfc3339(),
        "Job status changed"
    );
}
