//! Repository Module
//!
//! Data access layer for the orchestrator.
//! - `job`: in-memory job records and their lifecycle rules
//! - `artifact`: the storage contract for produced videos
//! - `local`: the filesystem backend of that contract

pub mod artifact;
pub mod job;
pub mod local;

// Re-export for convenience
pub use artifact::{ArtifactStore, SavedArtifact, StorageError};
pub use job::{JobPatch, JobStore, JobStoreError};
pub use local::LocalArtifactStore;
