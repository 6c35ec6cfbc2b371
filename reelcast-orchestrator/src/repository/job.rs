//! Job Repository
//!
//! In-memory store owning every job record. Records live only as long as the
//! process: nothing is persisted, so a restart loses pending and in-flight
//! jobs.
//!
//! All accessors hand out clones; the canonical record is only mutated through
//! the methods below, which enforce forward-only status transitions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Duration;
use reelcast_core::clock::Clock;
use reelcast_core::domain::job::{
    Job, JobFailure, JobOutput, JobProgress, JobRequest, JobStats, JobStatus,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Job store error type
#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("progress must be between 0 and 100, got {0}")]
    InvalidProgress(u8),

    #[error("job {id} is {status}, progress can only change while processing")]
    NotProcessing { id: Uuid, status: JobStatus },

    #[error("job {id} cannot carry {field} when moving to {status}")]
    InvalidPatch {
        id: Uuid,
        status: JobStatus,
        field: &'static str,
    },
}

/// Auxiliary fields merged into a record by [`JobStore::update_status`].
///
/// `progress` is only accepted for `processing`, `result` only for `completed`
/// and `error` only for `failed`.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub progress: Option<JobProgress>,
    pub result: Option<JobOutput>,
    pub error: Option<JobFailure>,
}

impl JobPatch {
    /// First field that the target status does not allow
    fn disallowed_field(&self, status: JobStatus) -> Option<&'static str> {
        if self.progress.is_some() && status != JobStatus::Processing {
            Some("progress")
        } else if self.result.is_some() && status != JobStatus::Completed {
            Some("result")
        } else if self.error.is_some() && status != JobStatus::Failed {
            Some("error")
        } else {
            None
        }
    }
}

#[derive(Default)]
struct Records {
    next_seq: u64,
    /// Creation sequence -> record; iteration order is creation order
    by_seq: BTreeMap<u64, Job>,
    seq_of: HashMap<Uuid, u64>,
}

impl Records {
    fn get_mut(&mut self, id: Uuid) -> Result<&mut Job, JobStoreError> {
        let seq = self.seq_of.get(&id).ok_or(JobStoreError::NotFound(id))?;
        self.by_seq.get_mut(seq).ok_or(JobStoreError::NotFound(id))
    }
}

pub struct JobStore {
    records: RwLock<Records>,
    clock: Arc<dyn Clock>,
}

impl JobStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(Records::default()),
            clock,
        }
    }

    /// Stores a new `pending` job and returns a copy of it.
    pub async fn create(&self, request: JobRequest) -> Job {
        let job = Job::new(request, self.clock.now());

        let mut records = self.records.write().await;
        let seq = records.next_seq;
        records.next_seq += 1;
        records.seq_of.insert(job.id, seq);
        records.by_seq.insert(seq, job.clone());

        tracing::info!(job_id = %job.id, "Job created");
        job
    }

    pub async fn get(&self, id: Uuid) -> Result<Job, JobStoreError> {
        let records = self.records.read().await;
        records
            .seq_of
            .get(&id)
            .and_then(|seq| records.by_seq.get(seq))
            .cloned()
            .ok_or(JobStoreError::NotFound(id))
    }

    /// Moves a job to `status`, merging the optional patch.
    ///
    /// `completed_at` is stamped the first time the job becomes terminal.
    /// Entering `completed` clears any error and entering `failed` clears any
    /// result.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        patch: Option<JobPatch>,
    ) -> Result<Job, JobStoreError> {
        let patch = patch.unwrap_or_default();
        if let Some(field) = patch.disallowed_field(status) {
            return Err(JobStoreError::InvalidPatch { id, status, field });
        }

        self.transition(id, status, |job| {
            if let Some(progress) = patch.progress {
                job.progress = progress;
            }
            match status {
                JobStatus::Completed => {
                    job.error = None;
                    if patch.result.is_some() {
                        job.result = patch.result;
                    }
                }
                JobStatus::Failed => {
                    job.result = None;
                    if patch.error.is_some() {
                        job.error = patch.error;
                    }
                }
                JobStatus::Pending | JobStatus::Processing => {}
            }
        })
        .await
    }

    pub async fn update_progress(
        &self,
        id: Uuid,
        step: &str,
        percent: u8,
    ) -> Result<(), JobStoreError> {
        if percent > 100 {
            return Err(JobStoreError::InvalidProgress(percent));
        }

        let now = self.clock.now();
        let mut records = self.records.write().await;
        let job = records.get_mut(id)?;

        if job.status != JobStatus::Processing {
            return Err(JobStoreError::NotProcessing {
                id,
                status: job.status,
            });
        }

        job.progress = JobProgress {
            step: Some(step.to_string()),
            percent,
        };
        job.updated_at = now;

        tracing::debug!(job_id = %id, step, percent, "Job progress");
        Ok(())
    }

    pub async fn set_completed(&self, id: Uuid, output: JobOutput) -> Result<Job, JobStoreError> {
        self.transition(id, JobStatus::Completed, |job| {
            job.result = Some(output);
            job.error = None;
            job.progress.percent = 100;
        })
        .await
    }

    pub async fn set_failed(
        &self,
        id: Uuid,
        message: impl Into<String>,
        trace: Option<String>,
    ) -> Result<Job, JobStoreError> {
        let failed_at = self.clock.now();
        let message = message.into();
        self.transition(id, JobStatus::Failed, |job| {
            job.error = Some(JobFailure {
                message,
                trace,
                failed_at,
            });
            job.result = None;
        })
        .await
    }

    /// Jobs in `status`, oldest first.
    pub async fn list_by_status(&self, status: JobStatus) -> Vec<Job> {
        self.records
            .read()
            .await
            .by_seq
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect()
    }

    pub async fn list_all(&self) -> Vec<Job> {
        self.records.read().await.by_seq.values().cloned().collect()
    }

    /// Removes every job created more than `max_age_hours` ago, whatever its
    /// status. Returns the number of records removed.
    ///
    /// An age too large to represent keeps every job.
    pub async fn cleanup_expired(&self, max_age_hours: u64) -> usize {
        let cutoff = i64::try_from(max_age_hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|age| self.clock.now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            tracing::warn!(max_age_hours, "Job retention out of range, nothing pruned");
            return 0;
        };

        let mut records = self.records.write().await;
        let stale: Vec<(u64, Uuid)> = records
            .by_seq
            .iter()
            .filter(|(_, job)| job.created_at < cutoff)
            .map(|(seq, job)| (*seq, job.id))
            .collect();

        for (seq, id) in &stale {
            records.by_seq.remove(seq);
            records.seq_of.remove(id);
        }

        if !stale.is_empty() {
            tracing::info!(removed = stale.len(), max_age_hours, "Pruned stale jobs");
        }
        stale.len()
    }

    pub async fn stats(&self) -> JobStats {
        let records = self.records.read().await;
        let mut stats = JobStats::default();
        for job in records.by_seq.values() {
            stats.record(job.status);
        }
        stats
    }

    async fn transition(
        &self,
        id: Uuid,
        status: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> Result<Job, JobStoreError> {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let job = records.get_mut(id)?;

        if !job.status.can_transition_to(status) {
            return Err(JobStoreError::InvalidTransition {
                id,
                from: job.status,
                to: status,
            });
        }

        let previous = job.status;
        job.status = status;
        apply(job);
        job.updated_at = now;
        if status.is_terminal() && job.completed_at.is_none() {
            job.completed_at = Some(now);
        }

        if previous != status {
            tracing::debug!(job_id = %id, from = %previous, to = %status, "Job status transition");
        }
        Ok(job.clone())
    }
}
