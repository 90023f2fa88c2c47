// Job store - in-memory registry keyed by job id

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{Job, JobUpdate};
use super::JobError;

struct JobEntry {
    job: Job,
    cancel: CancellationToken,
}

/// Cloneable handle to the shared job registry
#[derive(Clone, Default)]
pub struct JobStore {
    inner: Arc<RwLock<HashMap<String, JobEntry>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new `queued` job and return a snapshot of it
    pub fn create_job(&self, url: &str, quality: &str, format: &str, is_playlist: bool) -> Job {
        let id = Uuid::new_v4().to_string();
        let job = Job::new(
            id.clone(),
            url.to_string(),
            quality.to_string(),
            format.to_string(),
            is_playlist,
            OffsetDateTime::now_utc(),
        );

        self.inner.write().insert(
            id.clone(),
            JobEntry {
                job: job.clone(),
                cancel: CancellationToken::new(),
            },
        );
        info!(job_id = %id, url, is_playlist, "job created");
        job
    }

    pub fn get_job(&self, id: &str) -> Result<Job, JobError> {
        self.inner
            .read()
            .get(id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub fn list_jobs(&self) -> Vec<Job> {
        self.inner.read().values().map(|entry| entry.job.clone()).collect()
    }

    /// Cancel a job. Cancelling a terminal job succeeds without changing it.
    pub fn cancel_job(&self, id: &str) -> Result<(), JobError> {
        let mut jobs = self.inner.write();
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        if entry.job.cancel(OffsetDateTime::now_utc()) {
            entry.cancel.cancel();
            info!(job_id = %id, "job cancelled");
        } else {
            debug!(job_id = %id, status = ?entry.job.status, "cancel ignored for finished job");
        }
        Ok(())
    }

    /// Token fired when the job is cancelled
    pub fn cancellation_token(&self, id: &str) -> Option<CancellationToken> {
        self.inner.read().get(id).map(|entry| entry.cancel.clone())
    }

    /// Apply a worker update. Unknown ids and illegal transitions are ignored.
    pub fn advance(&self, id: &str, update: JobUpdate) -> bool {
        let mut jobs = self.inner.write();
        match jobs.get_mut(id) {
            Some(entry) => entry.job.apply(update, OffsetDateTime::now_utc()),
            None => false,
        }
    }

    /// Remove terminal jobs that finished more than `retention` before `now`
    pub fn sweep_expired(&self, now: OffsetDateTime, retention: time::Duration) -> usize {
        let mut jobs = self.inner.write();
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.job.finished_at() {
            Some(finished) => now - finished <= retention,
            None => true,
        });
        before - jobs.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
