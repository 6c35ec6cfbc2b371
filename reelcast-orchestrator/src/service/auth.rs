//! Request authentication
//!
//! Verifies the `X-Timestamp` / `X-Signature` pair on state-mutating requests.
//! A request is accepted when the signature matches and the timestamp is
//! within the tolerance window of the server clock. Replays inside that window
//! are not detected.

use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::Duration;
use reelcast_core::clock::Clock;
use reelcast_core::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing X-Timestamp header")]
    MissingTimestamp,

    #[error("missing X-Signature header")]
    MissingSignature,

    #[error("invalid X-Timestamp header: {0:?}")]
    InvalidTimestamp(String),

    #[error("request timestamp is {skew_secs}s away from server time")]
    Stale { skew_secs: i64 },

    #[error("request body is not valid JSON")]
    MalformedBody,

    #[error("invalid signature")]
    InvalidSignature,
}

pub struct RequestAuthenticator {
    secret: String,
    tolerance: Duration,
    clock: Arc<dyn Clock>,
}

impl RequestAuthenticator {
    pub fn new(secret: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: Duration::seconds(signature::DEFAULT_TOLERANCE_SECS),
            clock,
        }
    }

    /// Verifies a request from its raw header values and body.
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        body: &[u8],
        signature_hex: Option<&str>,
    ) -> Result<(), AuthError> {
        let result = self.check(timestamp, body, signature_hex);
        if let Err(e) = &result {
            tracing::warn!(reason = %e, "Rejected unauthenticated request");
        }
        result
    }

    /// Same as [`verify`](Self::verify), reading the headers from a request.
    pub fn verify_headers(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), AuthError> {
        let timestamp = headers
            .get(TIMESTAMP_HEADER)
            .map(|v| v.to_str().unwrap_or_default());
        let signature_hex = headers
            .get(SIGNATURE_HEADER)
            .map(|v| v.to_str().unwrap_or_default());
        self.verify(timestamp, body, signature_hex)
    }

    fn check(
        &self,
        timestamp: Option<&str>,
        body: &[u8],
        signature_hex: Option<&str>,
    ) -> Result<(), AuthError> {
        let timestamp = timestamp
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingTimestamp)?;
        let signature_hex = signature_hex
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingSignature)?;

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| AuthError::InvalidTimestamp(timestamp.to_string()))?;

        let skew_secs = self
            .clock
            .now()
            .timestamp()
            .checked_sub(ts)
            .ok_or_else(|| AuthError::InvalidTimestamp(timestamp.to_string()))?;
        if skew_secs.unsigned_abs() > self.tolerance.num_seconds().unsigned_abs() {
            return Err(AuthError::Stale { skew_secs });
        }

        let canonical = signature::canonical_body(body).map_err(|_| AuthError::MalformedBody)?;
        if !signature::verify(&self.secret, ts, &canonical, signature_hex) {
            return Err(AuthError::InvalidSignature);
        }

        Ok(())
    }
}

impl std::fmt::Debug for RequestAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuthenticator")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}
