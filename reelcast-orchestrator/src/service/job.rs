//! Job Service
//!
//! Turns raw API input into job store operations.

use reelcast_core::domain::job::{Job, JobStatus};
use reelcast_core::dto::job::{CreateJob, ValidationError};
use uuid::Uuid;

use crate::repository::{JobStore, JobStoreError};

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(JobStoreError),
}

impl From<JobStoreError> for JobError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(id) => JobError::NotFound(id),
            other => JobError::Store(other),
        }
    }
}

/// Parse, validate and enqueue a new job
pub async fn create_job(store: &JobStore, body: &[u8]) -> Result<Job, JobError> {
    let req: CreateJob =
        serde_json::from_slice(body).map_err(|e| JobError::MalformedBody(e.to_string()))?;
    let request = req.validate()?;

    let job = store.create(request).await;
    tracing::info!(job_id = %job.id, handle = %job.request.handle, "Job enqueued");

    Ok(job)
}

/// Get a job by ID
pub async fn get_job(store: &JobStore, id: Uuid) -> Result<Job, JobError> {
    Ok(store.get(id).await?)
}

/// List jobs, optionally restricted to one status
pub async fn list_jobs(store: &JobStore, status: Option<JobStatus>) -> Vec<Job> {
    match status {
        Some(status) => store.list_by_status(status).await,
        None => store.list_all().await,
    }
}
