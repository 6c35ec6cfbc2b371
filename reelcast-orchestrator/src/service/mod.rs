//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services sit between the HTTP handlers and the repositories.

pub mod auth;
pub mod job;

// Re-export for convenience
pub use auth::{AuthError, RequestAuthenticator};
pub use job as job_service;
