//! Artifact storage contract
//!
//! Produced videos are stored by name with a time-to-live. Any backend has to
//! honour the same rules:
//! - names are reduced to their final path segment before use
//! - saving under an existing name silently replaces content and metadata
//! - reading an expired artifact deletes it and reports not found
//! - an expired artifact does not exist, even before it is evicted
//! - `evict_expired` actively removes everything past its expiry, including
//!   leftovers whose metadata is missing or unreadable

use async_trait::async_trait;
use reelcast_core::domain::artifact::{ArtifactInfo, ArtifactMetadata};
use serde_json::{Map, Value as JsonValue};

/// Storage error type
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("invalid artifact name: {0:?}")]
    InvalidName(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt metadata for {name}: {reason}")]
    Metadata { name: String, reason: String },

    #[error("artifact ttl of {0} hours is out of range")]
    TtlOutOfRange(u64),
}

/// Outcome of a successful save
#[derive(Debug, Clone)]
pub struct SavedArtifact {
    pub name: String,
    pub size: u64,
    pub metadata: ArtifactMetadata,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `bytes` under the sanitized form of `name`.
    async fn save(
        &self,
        name: &str,
        bytes: &[u8],
        extra: Map<String, JsonValue>,
    ) -> Result<SavedArtifact, StorageError>;

    /// Reads an artifact, evicting it instead if it has expired.
    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Removes payload and metadata. Returns whether anything was removed.
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;

    /// Whether a live artifact is stored under `name`. Expired artifacts are
    /// evicted and reported as absent.
    async fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Live (non-expired) artifacts, oldest first.
    async fn list(&self) -> Result<Vec<ArtifactInfo>, StorageError>;

    async fn metadata(&self, name: &str) -> Result<ArtifactMetadata, StorageError>;

    /// Deletes every expired artifact and returns how many were removed.
    ///
    /// An item that cannot be removed is logged and left for the next pass.
    async fn evict_expired(&self) -> Result<usize, StorageError>;
}

/// Reduces caller input to a bare file name.
///
/// Any directory components are dropped, so `../../etc/passwd` becomes
/// `passwd`. Empty names, dot-files and `..` are rejected.
pub fn sanitize_name(input: &str) -> Result<String, StorageError> {
    let candidate = input.rsplit(['/', '\\']).next().unwrap_or_default().trim();

    if candidate.is_empty()
        || candidate.starts_with('.')
        || candidate.chars().any(|c| c.is_control())
    {
        return Err(StorageError::InvalidName(input.to_string()));
    }

    Ok(candidate.to_string())
}

/// Stricter check for names arriving from URLs: the input must already be
/// in sanitized form and use only `[A-Za-z0-9._-]`.
pub fn validate_name(input: &str) -> Result<&str, StorageError> {
    let sanitized = sanitize_name(input)?;
    let charset_ok = input
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if sanitized != input || !charset_ok {
        return Err(StorageError::InvalidName(input.to_string()));
    }
    Ok(input)
}
