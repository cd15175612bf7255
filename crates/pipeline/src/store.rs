//! In-memory job registry.
//!
//! The only shared mutable state in the pipeline. Every mutation goes
//! through [`JobStore::update`], which validates and applies a whole
//! [`JobUpdate`] under one write lock, so readers never observe a
//! half-applied change (e.g. `completed` with no results).

use std::collections::HashMap;

use chrono::Utc;
use kura_core::error::CoreError;
use kura_core::job::{Job, JobInput, JobStatus, JobUpdate};
use kura_core::types::{JobId, Timestamp};
use tokio::sync::RwLock;

/// Process-wide mapping from job id to job record.
///
/// Designed to be wrapped in `Arc` and shared between request handlers,
/// job continuations and the retention sweeper.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh `initializing` record.
    pub async fn create(&self, id: JobId, input: JobInput) -> Result<Job, CoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&id) {
            return Err(CoreError::Conflict(format!("Job {id} already exists")));
        }
        let job = Job::new(id.clone(), input, Utc::now());
        jobs.insert(id, job.clone());
        Ok(job)
    }

    /// Snapshot of the current record.
    pub async fn get(&self, id: &str) -> Result<Job, CoreError> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Merge `update` into the record and return the new snapshot.
    ///
    /// Rejected updates (backward or post-terminal transitions, results or
    /// errors in the wrong state) leave the record unchanged.
    pub async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, CoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or_else(|| not_found(id))?;
        job.apply(update, Utc::now())?;
        Ok(job.clone())
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Fail every non-terminal job not updated since `cutoff`.
    ///
    /// Returns the ids that were failed. A continuation still running for
    /// one of them gets a `Conflict` on its next write.
    pub async fn fail_stale(&self, cutoff: Timestamp, message: &str) -> Vec<JobId> {
        let now = Utc::now();
        let mut jobs = self.jobs.write().await;
        let mut failed = Vec::new();

        for job in jobs.values_mut() {
            if job.status.is_terminal() || job.updated_at >= cutoff {
                continue;
            }
            match job.apply(JobUpdate::failed(vec![message.to_string()]), now) {
                Ok(()) => failed.push(job.id.clone()),
                Err(e) => tracing::warn!(job_id = %job.id, error = %e, "Could not fail stale job"),
            }
        }

        failed
    }

    /// Remove terminal jobs whose last update is older than `cutoff`.
    ///
    /// Returns the number of records removed.
    pub async fn evict_finished(&self, cutoff: Timestamp) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !(job.status.is_terminal() && job.updated_at < cutoff));
        before - jobs.len()
    }

    /// Count jobs per status.
    pub async fn status_counts(&self) -> HashMap<JobStatus, usize> {
        let mut counts = HashMap::new();
        for job in self.jobs.read().await.values() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        counts
    }
}

fn not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "Job",
        id: id.to_string(),
    }
}
