//! Artifact domain types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Keys of the sidecar record that caller fields may not override.
pub const RESERVED_KEYS: [&str; 4] = ["size", "createdAt", "expiresAt", "ttlHours"];

/// Sidecar record stored next to every artifact payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ttl_hours: u64,
    /// Caller-supplied descriptive fields
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl ArtifactMetadata {
    /// Builds the record for a payload saved at `now`.
    ///
    /// Caller fields named like one of [`RESERVED_KEYS`] are dropped. Returns
    /// `None` when the expiry cannot be represented.
    pub fn new(
        size: u64,
        now: DateTime<Utc>,
        ttl_hours: u64,
        mut extra: Map<String, JsonValue>,
    ) -> Option<Self> {
        let ttl = Duration::try_hours(i64::try_from(ttl_hours).ok()?)?;
        let expires_at = now.checked_add_signed(ttl)?;
        extra.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));

        Some(Self {
            size,
            created_at: now,
            expires_at,
            ttl_hours,
            extra,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Listing entry for a stored artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: ArtifactMetadata,
}

impl ArtifactInfo {
    pub fn new(name: impl Into<String>, metadata: ArtifactMetadata) -> Self {
        Self {
            name: name.into(),
            size: metadata.size,
            created_at: metadata.created_at,
            expires_at: metadata.expires_at,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_created_plus_ttl() {
        let now = Utc::now();
        let meta = ArtifactMetadata::new(10, now, 24, Map::new()).unwrap();
        assert_eq!(meta.expires_at - meta.created_at, Duration::hours(24));
        assert!(!meta.is_expired(now + Duration::hours(24)));
        assert!(meta.is_expired(now + Duration::hours(24) + Duration::seconds(1)));
    }

    #[test]
    fn test_extra_fields_are_flattened() {
        let mut extra = Map::new();
        extra.insert("jobId".to_string(), JsonValue::from("abc"));
        let meta = ArtifactMetadata::new(3, Utc::now(), 1, extra).unwrap();

        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["jobId"], "abc");
        assert_eq!(value["ttlHours"], 1);

        let back: ArtifactMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_reserved_keys_cannot_be_overridden() {
        let mut extra = Map::new();
        extra.insert("size".to_string(), JsonValue::from(1));
        extra.insert("expiresAt".to_string(), JsonValue::from("never"));
        extra.insert("jobId".to_string(), JsonValue::from("abc"));
        let meta = ArtifactMetadata::new(3, Utc::now(), 1, extra).unwrap();

        assert_eq!(meta.extra.len(), 1);
        let raw = serde_json::to_vec(&meta).unwrap();
        let back: ArtifactMetadata = serde_json::from_slice(&raw).unwrap();
        assert_eq!(back.size, 3);
        assert_eq!(back, meta);
    }

    #[test]
    fn test_unrepresentable_ttl() {
        let now = Utc::now();
        assert!(ArtifactMetadata::new(1, now, 10_000_000_000, Map::new()).is_none());
        assert!(ArtifactMetadata::new(1, now, u64::MAX, Map::new()).is_none());
    }
}
