//! Local filesystem artifact store
//!
//! Layout under the storage root:
//! - `<name>`: payload bytes
//! - `.meta/<name>.json`: metadata sidecar
//! - `.tmp/`: scratch space for atomic writes
//!
//! Each file is written to `.tmp` and renamed into place, payload first and
//! metadata second. The sidecar is authoritative: a payload without one is
//! invisible to readers. Such orphans, and sidecars that fail to parse, are
//! aged by file modification time and evicted once older than the TTL.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reelcast_core::clock::Clock;
use reelcast_core::domain::artifact::{ArtifactInfo, ArtifactMetadata};
use serde_json::{Map, Value as JsonValue};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::artifact::{ArtifactStore, SavedArtifact, StorageError, sanitize_name};

const META_DIR: &str = ".meta";
const TMP_DIR: &str = ".tmp";

pub struct LocalArtifactStore {
    root: PathBuf,
    ttl_hours: u64,
    clock: Arc<dyn Clock>,
}

impl LocalArtifactStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        ttl_hours: u64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(root.join(META_DIR))?;
        std::fs::create_dir_all(root.join(TMP_DIR))?;

        info!(root = %root.display(), ttl_hours, "Artifact store ready");
        Ok(Self {
            root,
            ttl_hours,
            clock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn payload_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.root.join(META_DIR).join(format!("{}.json", name))
    }

    async fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let tmp = self.root.join(TMP_DIR).join(Uuid::new_v4().to_string());
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_metadata(&self, name: &str) -> Result<Option<ArtifactMetadata>, StorageError> {
        let raw = match fs::read(self.meta_path(name)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| StorageError::Metadata {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Loads metadata for a live artifact, evicting it if it has expired.
    async fn live_metadata(&self, name: &str) -> Result<ArtifactMetadata, StorageError> {
        let meta = self
            .read_metadata(name)
            .await?
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        if meta.is_expired(self.clock.now()) {
            debug!(name, expires_at = %meta.expires_at, "Evicting expired artifact on access");
            self.remove(name).await?;
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(meta)
    }

    async fn remove(&self, name: &str) -> Result<bool, StorageError> {
        let payload = remove_if_present(&self.payload_path(name)).await?;
        let meta = remove_if_present(&self.meta_path(name)).await?;
        Ok(payload || meta)
    }

    /// Removes an artifact, logging instead of failing so a sweep can go on.
    async fn evict(&self, name: &str) -> bool {
        match self.remove(name).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(name, error = %e, "Failed to evict artifact, will retry");
                false
            }
        }
    }

    /// Whether a file with no usable metadata was last written more than a
    /// TTL ago.
    async fn outlived_ttl(&self, path: &Path) -> Result<bool, StorageError> {
        let Some(ttl) = i64::try_from(self.ttl_hours)
            .ok()
            .and_then(Duration::try_hours)
        else {
            return Ok(false);
        };
        let modified: DateTime<Utc> = fs::metadata(path).await?.modified()?.into();
        Ok(self.clock.now().signed_duration_since(modified) > ttl)
    }

    /// Payloads in the root that have no metadata sidecar.
    async fn orphan_names(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.starts_with('.') && !fs::try_exists(self.meta_path(name)).await? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Names of every artifact that has a metadata sidecar.
    async fn stored_names(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(self.root.join(META_DIR)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(".json") {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn save(
        &self,
        name: &str,
        bytes: &[u8],
        extra: Map<String, JsonValue>,
    ) -> Result<SavedArtifact, StorageError> {
        let name = sanitize_name(name)?;
        let metadata =
            ArtifactMetadata::new(bytes.len() as u64, self.clock.now(), self.ttl_hours, extra)
                .ok_or(StorageError::TtlOutOfRange(self.ttl_hours))?;

        let meta_bytes =
            serde_json::to_vec_pretty(&metadata).map_err(|e| StorageError::Metadata {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        self.write_atomic(&self.payload_path(&name), bytes).await?;
        self.write_atomic(&self.meta_path(&name), &meta_bytes)
            .await?;

        info!(name = %name, size = metadata.size, expires_at = %metadata.expires_at, "Artifact saved");
        Ok(SavedArtifact {
            size: metadata.size,
            name,
            metadata,
        })
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let name = sanitize_name(name)?;
        self.live_metadata(&name).await?;

        match fs::read(self.payload_path(&name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let name = sanitize_name(name)?;
        let removed = self.remove(&name).await?;
        if removed {
            debug!(name = %name, "Artifact deleted");
        }
        Ok(removed)
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let name = sanitize_name(name)?;
        match self.live_metadata(&name).await {
            Ok(_) => Ok(fs::try_exists(self.payload_path(&name)).await?),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list(&self) -> Result<Vec<ArtifactInfo>, StorageError> {
        let now = self.clock.now();
        let mut items = Vec::new();

        for name in self.stored_names().await? {
            match self.read_metadata(&name).await {
                Ok(Some(meta)) if !meta.is_expired(now) => items.push(ArtifactInfo::new(name, meta)),
                Ok(_) => {}
                Err(e) => warn!(name = %name, error = %e, "Skipping unreadable artifact"),
            }
        }

        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn metadata(&self, name: &str) -> Result<ArtifactMetadata, StorageError> {
        let name = sanitize_name(name)?;
        self.live_metadata(&name).await
    }

    async fn evict_expired(&self) -> Result<usize, StorageError> {
        let now = self.clock.now();
        let mut removed = 0;

        for name in self.stored_names().await? {
            let expired = match self.read_metadata(&name).await {
                Ok(Some(meta)) => meta.is_expired(now),
                // Deleted concurrently by a lazy eviction
                Ok(None) => continue,
                Err(StorageError::Metadata { reason, .. }) => {
                    match self.outlived_ttl(&self.meta_path(&name)).await {
                        Ok(outlived) => {
                            warn!(name = %name, reason = %reason, outlived, "Artifact has unreadable metadata");
                            outlived
                        }
                        Err(e) => {
                            warn!(name = %name, error = %e, "Skipping artifact with unreadable metadata");
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!(name = %name, error = %e, "Skipping artifact with unreadable metadata");
                    continue;
                }
            };

            if expired && self.evict(&name).await {
                debug!(name = %name, "Evicted expired artifact");
                removed += 1;
            }
        }

        for name in self.orphan_names().await? {
            match self.outlived_ttl(&self.payload_path(&name)).await {
                Ok(true) => {
                    if self.evict(&name).await {
                        debug!(name = %name, "Evicted payload without metadata");
                        removed += 1;
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(name = %name, error = %e, "Skipping payload without metadata"),
            }
        }

        Ok(removed)
    }
}

async fn remove_if_present(path: &Path) -> Result<bool, StorageError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use reelcast_core::clock::ManualClock;

    fn create_test_store() -> (tempfile::TempDir, Arc<ManualClock>, LocalArtifactStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        let store = LocalArtifactStore::new(dir.path().join("videos"), 24, clock.clone()).unwrap();
        (dir, clock, store)
    }

    fn extra(key: &str, value: &str) -> Map<String, JsonValue> {
        let mut map = Map::new();
        map.insert(key.to_string(), JsonValue::from(value));
        map
    }

    #[tokio::test]
    async fn test_save_then_get_returns_bytes() {
        let (_dir, clock, store) = create_test_store();

        let saved = store
            .save("reel.mp4", b"video bytes", extra("jobId", "j-1"))
            .await
            .unwrap();
        assert_eq!(saved.name, "reel.mp4");
        assert_eq!(saved.size, 11);
        assert_eq!(saved.metadata.ttl_hours, 24);
        assert_eq!(
            saved.metadata.expires_at,
            saved.metadata.created_at + Duration::hours(24)
        );

        clock.advance(Duration::hours(23));
        assert_eq!(store.get("reel.mp4").await.unwrap(), b"video bytes");

        let meta = store.metadata("reel.mp4").await.unwrap();
        assert_eq!(meta.extra.get("jobId"), Some(&JsonValue::from("j-1")));
    }

    #[tokio::test]
    async fn test_expired_get_evicts_lazily() {
        let (_dir, clock, store) = create_test_store();
        store.save("reel.mp4", b"data", Map::new()).await.unwrap();

        clock.advance(Duration::hours(25));

        let result = store.get("reel.mp4").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(!store.exists("reel.mp4").await.unwrap());
        assert!(!store.root().join("reel.mp4").exists());
    }

    #[tokio::test]
    async fn test_traversal_is_confined_to_root() {
        let (dir, _clock, store) = create_test_store();

        let saved = store
            .save("../../../etc/passwd", b"not really", Map::new())
            .await
            .unwrap();
        assert_eq!(saved.name, "passwd");
        assert!(store.root().join("passwd").exists());
        assert!(!dir.path().join("etc").exists());

        assert_eq!(store.get("passwd").await.unwrap(), b"not really");
        assert!(matches!(
            store.save("..", b"x", Map::new()).await,
            Err(StorageError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_save_overwrites_existing() {
        let (_dir, clock, store) = create_test_store();
        store.save("reel.mp4", b"first", extra("v", "1")).await.unwrap();
        clock.advance(Duration::hours(1));
        store.save("reel.mp4", b"second!", extra("v", "2")).await.unwrap();

        assert_eq!(store.get("reel.mp4").await.unwrap(), b"second!");
        let meta = store.metadata("reel.mp4").await.unwrap();
        assert_eq!(meta.size, 7);
        assert_eq!(meta.extra.get("v"), Some(&JsonValue::from("2")));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_tolerant() {
        let (_dir, _clock, store) = create_test_store();
        store.save("reel.mp4", b"data", Map::new()).await.unwrap();

        // Payload already gone; metadata still removed
        std::fs::remove_file(store.root().join("reel.mp4")).unwrap();
        assert!(store.delete("reel.mp4").await.unwrap());
        assert!(!store.delete("reel.mp4").await.unwrap());
        assert!(!store.exists("reel.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_excludes_expired() {
        let (_dir, clock, store) = create_test_store();
        store.save("old.mp4", b"old", Map::new()).await.unwrap();
        clock.advance(Duration::hours(12));
        store.save("new.mp4", b"new", Map::new()).await.unwrap();
        clock.advance(Duration::hours(13));

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(names, vec!["new.mp4".to_string()]);
    }

    #[tokio::test]
    async fn test_evict_expired_removes_exactly_expired() {
        let (_dir, clock, store) = create_test_store();
        store.save("a.mp4", b"a", Map::new()).await.unwrap();
        store.save("b.mp4", b"b", Map::new()).await.unwrap();
        clock.advance(Duration::hours(20));
        store.save("c.mp4", b"c", extra("keep", "yes")).await.unwrap();
        clock.advance(Duration::hours(5));

        assert_eq!(store.evict_expired().await.unwrap(), 2);
        assert!(!store.exists("a.mp4").await.unwrap());
        assert!(!store.exists("b.mp4").await.unwrap());
        assert!(store.exists("c.mp4").await.unwrap());
        assert_eq!(
            store.metadata("c.mp4").await.unwrap().extra.get("keep"),
            Some(&JsonValue::from("yes"))
        );

        assert_eq!(store.evict_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_payload_without_metadata_is_invisible() {
        let (_dir, _clock, store) = create_test_store();
        std::fs::write(store.root().join("orphan.mp4"), b"partial").unwrap();

        assert!(matches!(
            store.get("orphan.mp4").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!store.exists("orphan.mp4").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_metadata_is_reported_then_evicted() {
        let (_dir, clock, store) = create_test_store();
        store.save("reel.mp4", b"data", Map::new()).await.unwrap();
        let sidecar = store.root().join(".meta/reel.mp4.json");
        std::fs::write(&sidecar, b"{oops").unwrap();

        assert!(matches!(
            store.get("reel.mp4").await,
            Err(StorageError::Metadata { .. })
        ));
        assert_eq!(store.evict_expired().await.unwrap(), 0);
        assert!(sidecar.exists());

        clock.advance(Duration::hours(25));
        assert_eq!(store.evict_expired().await.unwrap(), 1);
        assert!(!sidecar.exists());
        assert!(!store.root().join("reel.mp4").exists());
    }

    #[tokio::test]
    async fn test_reserved_extra_keys_keep_artifact_readable() {
        let (_dir, clock, store) = create_test_store();
        let mut fields = extra("jobId", "j-1");
        fields.insert("size".to_string(), JsonValue::from(1));
        fields.insert("ttlHours".to_string(), JsonValue::from("forever"));

        store.save("reel.mp4", b"data", fields).await.unwrap();
        assert_eq!(store.get("reel.mp4").await.unwrap(), b"data");
        let meta = store.metadata("reel.mp4").await.unwrap();
        assert_eq!(meta.size, 4);
        assert_eq!(meta.ttl_hours, 24);
        assert_eq!(meta.extra.get("jobId"), Some(&JsonValue::from("j-1")));

        clock.advance(Duration::hours(25));
        assert_eq!(store.evict_expired().await.unwrap(), 1);
        assert!(!store.root().join("reel.mp4").exists());
    }

    #[tokio::test]
    async fn test_orphan_payload_is_evicted_after_ttl() {
        let (_dir, clock, store) = create_test_store();
        let orphan = store.root().join("orphan.mp4");
        std::fs::write(&orphan, b"partial").unwrap();
        store.save("live.mp4", b"live", Map::new()).await.unwrap();

        assert_eq!(store.evict_expired().await.unwrap(), 0);
        assert!(orphan.exists());

        clock.advance(Duration::hours(25));
        assert_eq!(store.evict_expired().await.unwrap(), 2);
        assert!(!orphan.exists());
        assert!(store.root().join(".meta").is_dir());
        assert!(store.root().join(".tmp").is_dir());
    }

    #[tokio::test]
    async fn test_eviction_continues_past_failed_removal() {
        let (_dir, clock, store) = create_test_store();
        store.save("stuck.mp4", b"stuck", Map::new()).await.unwrap();
        store.save("free.mp4", b"free", Map::new()).await.unwrap();

        // A directory in place of the payload cannot be removed as a file
        let stuck = store.root().join("stuck.mp4");
        std::fs::remove_file(&stuck).unwrap();
        std::fs::create_dir(&stuck).unwrap();

        clock.advance(Duration::hours(25));
        assert_eq!(store.evict_expired().await.unwrap(), 1);
        assert!(!store.root().join("free.mp4").exists());
        assert!(store.root().join(".meta/stuck.mp4.json").exists());
    }

    #[tokio::test]
    async fn test_exists_treats_expired_as_absent() {
        let (_dir, clock, store) = create_test_store();
        store.save("reel.mp4", b"data", Map::new()).await.unwrap();
        assert!(store.exists("reel.mp4").await.unwrap());

        clock.advance(Duration::hours(25));
        assert!(!store.exists("reel.mp4").await.unwrap());
        assert!(!store.root().join("reel.mp4").exists());
        assert!(!store.root().join(".meta/reel.mp4.json").exists());
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_fails_save() {
        let dir = tempfile::TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        let store = LocalArtifactStore::new(dir.path(), 10_000_000_000, clock).unwrap();

        assert!(matches!(
            store.save("reel.mp4", b"data", Map::new()).await,
            Err(StorageError::TtlOutOfRange(10_000_000_000))
        ));
        assert!(!dir.path().join("reel.mp4").exists());
    }
}
