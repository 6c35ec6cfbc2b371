//! Job-related API endpoints

use chrono::Utc;
use reelcast_core::domain::job::JobStatus;
use reelcast_core::dto::job::{CreateJob, CreateJobResponse, JobStatusResponse};
use reelcast_core::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use reqwest::header::CONTENT_TYPE;
use uuid::Uuid;

use crate::ReelcastClient;
use crate::error::{ClientError, Result};

/// Body and headers of a signed request
#[derive(Debug)]
struct SignedBody {
    canonical: String,
    timestamp: i64,
    signature: String,
}

fn sign_body(secret: &str, raw: &[u8], timestamp: i64) -> Result<SignedBody> {
    let canonical =
        signature::canonical_body(raw).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
    let signature = signature::sign(secret, timestamp, &canonical);
    Ok(SignedBody {
        canonical,
        timestamp,
        signature,
    })
}

impl ReelcastClient {
    /// Submit a new job
    ///
    /// The body is sent in canonical form together with `X-Timestamp` and
    /// `X-Signature` headers.
    pub async fn create_job(&self, req: &CreateJob) -> Result<CreateJobResponse> {
        let secret = self.secret.as_deref().ok_or(ClientError::MissingSecret)?;
        let raw = serde_json::to_vec(req).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let signed = sign_body(secret, &raw, Utc::now().timestamp())?;

        let url = format!("{}/api/jobs", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(TIMESTAMP_HEADER, signed.timestamp.to_string())
            .header(SIGNATURE_HEADER, signed.signature)
            .body(signed.canonical)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a job's current status
    pub async fn get_job(&self, job_id: Uuid) -> Result<JobStatusResponse> {
        let url = format!("{}/api/jobs/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List jobs, optionally restricted to one status
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<JobStatusResponse>> {
        let url = match status {
            Some(status) => format!("{}/api/jobs?status={}", self.base_url, status),
            None => format!("{}/api/jobs", self.base_url),
        };
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_body_verifies() {
        let raw = br#"{ "text": "hi",   "handle": "jane" }"#;
        let signed = sign_body("secret", raw, 1_700_000_000).unwrap();

        assert_eq!(signed.canonical, r#"{"handle":"jane","text":"hi"}"#);
        assert!(signature::verify(
            "secret",
            1_700_000_000,
            &signed.canonical,
            &signed.signature
        ));
        assert!(!signature::verify(
            "other",
            1_700_000_000,
            &signed.canonical,
            &signed.signature
        ));
    }

    #[test]
    fn test_sign_body_rejects_non_json() {
        let err = sign_body("secret", b"not json", 0).unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_create_job_requires_secret() {
        let client = ReelcastClient::new("http://127.0.0.1:9");
        let err = client.create_job(&CreateJob::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::MissingSecret));
    }
}
