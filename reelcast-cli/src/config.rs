//! Configuration module
//!
//! Handles CLI configuration: orchestrator URL and signing secret.

use reelcast_client::ReelcastClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,
    /// Shared secret for signed requests, if any
    pub secret: Option<String>,
}

impl Config {
    /// Build a client for the configured orchestrator
    pub fn client(&self) -> ReelcastClient {
        let client = ReelcastClient::new(&self.orchestrator_url);
        match &self.secret {
            Some(secret) => client.with_secret(secret),
            None => client,
        }
    }
}
