//! Reelcast Core
//!
//! Core types and abstractions shared by the Reelcast services.
//!
//! This crate contains:
//! - Domain types: jobs, their lifecycle and the artifacts they produce
//! - DTOs: wire shapes exchanged between the orchestrator and its clients
//! - Request signing used by both sides of the authenticated API
//! - A pluggable time source

pub mod clock;
pub mod domain;
pub mod dto;
pub mod signature;
