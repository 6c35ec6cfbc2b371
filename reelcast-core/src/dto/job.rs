//! Job DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{Job, JobRequest, JobStatus, Theme};

const MAX_TEXT_LEN: usize = 500;
const MAX_NAME_LEN: usize = 100;

/// Request to create a new job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJob {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
}

/// A job creation request that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("imageUrl must be an http(s) URL: {0}")]
    InvalidUrl(String),
}

impl CreateJob {
    /// Validates the request and turns it into the pipeline's input.
    pub fn validate(self) -> Result<JobRequest, ValidationError> {
        let text = required("text", self.text, MAX_TEXT_LEN)?;
        let display_name = required("displayName", self.display_name, MAX_NAME_LEN)?;
        let handle = required("handle", self.handle, MAX_NAME_LEN)?;
        let image_url = required("imageUrl", self.image_url, 2048)?;

        if !(image_url.starts_with("http://") || image_url.starts_with("https://")) {
            return Err(ValidationError::InvalidUrl(image_url));
        }

        Ok(JobRequest {
            text,
            image_url,
            display_name,
            handle: handle.trim_start_matches('@').to_string(),
            theme: self.theme.unwrap_or_default(),
        })
    }
}

fn required(field: &'static str, value: String, max: usize) -> Result<String, ValidationError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value)
}

/// Response to a successful job creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Job> for CreateJobResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            created_at: job.created_at,
        }
    }
}

/// Job status as reported to clients.
///
/// The populated fields depend on the job's state:
/// - pending: id, status and creation time only
/// - processing: adds the current step and progress
/// - completed: adds completion time and the artifact reference
/// - failed: adds failure time and error message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        let mut response = Self {
            job_id: job.id,
            status: job.status,
            created_at: job.created_at,
            current_step: None,
            progress: None,
            completed_at: None,
            download_url: None,
            expires_at: None,
            file_size: None,
            duration: None,
            resolution: None,
            failed_at: None,
            error: None,
        };

        match job.status {
            JobStatus::Pending => {}
            JobStatus::Processing => {
                response.current_step = job.progress.step.clone();
                response.progress = Some(job.progress.percent);
            }
            JobStatus::Completed => {
                response.completed_at = job.completed_at;
                if let Some(output) = &job.result {
                    response.download_url = Some(output.download_url.clone());
                    response.expires_at = Some(output.expires_at);
                    response.file_size = Some(output.file_size);
                    response.duration = Some(output.duration_secs);
                    response.resolution = Some(output.resolution.clone());
                }
            }
            JobStatus::Failed => {
                if let Some(failure) = &job.error {
                    response.failed_at = Some(failure.failed_at);
                    response.error = Some(failure.message.clone());
                }
            }
        }

        response
    }
}
