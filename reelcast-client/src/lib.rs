//! Reelcast HTTP Client
//!
//! A type-safe HTTP client for the Reelcast orchestrator API. Job creation
//! is signed with the shared secret; every other endpoint is open.
//!
//! # Example
//!
//! ```no_run
//! use reelcast_client::ReelcastClient;
//! use reelcast_core::dto::job::CreateJob;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ReelcastClient::new("http://localhost:8080").with_secret("s3cret");
//!
//!     let created = client
//!         .create_job(&CreateJob {
//!             text: "Shipped the new release today".to_string(),
//!             image_url: "https://example.com/avatar.png".to_string(),
//!             display_name: "Jane Doe".to_string(),
//!             handle: "jane".to_string(),
//!             theme: None,
//!         })
//!         .await?;
//!
//!     println!("Created job: {}", created.job_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;

pub use error::{ClientError, Result};

use reelcast_core::dto::health::HealthResponse;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// HTTP client for the Reelcast orchestrator API
#[derive(Clone)]
pub struct ReelcastClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// Shared secret used to sign job submissions
    secret: Option<String>,
    /// HTTP client instance
    client: Client,
}

/// Error payload returned by the orchestrator
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl ReelcastClient {
    /// Create a new client without a signing secret
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: None,
            client,
        }
    }

    /// Set the shared secret used for signed endpoints
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch job counts and background task state
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Download a stored video
    pub async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let url = format!("{}/api/download/{}", self.base_url, name);
        tracing::debug!("Downloading {}", url);
        let response = self.client.get(&url).send().await?;

        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Turn a non-success status into an [`ClientError::ApiError`], extracting
    /// the server's `{"error": ..}` message when present.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ClientError::api_error(status.as_u16(), error_message(&text)))
    }
}

impl std::fmt::Debug for ReelcastClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReelcastClient")
            .field("base_url", &self.base_url)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ReelcastClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_debug_hides_secret() {
        let client = ReelcastClient::new("http://localhost:8080").with_secret("hunter2");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"Job 1 not found"}"#), "Job 1 not found");
        assert_eq!(error_message("plain text"), "plain text");
    }
}
