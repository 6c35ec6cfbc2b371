//! Core domain types
//!
//! These types represent the fundamental business entities and are shared
//! between the orchestrator (which owns and mutates them) and clients
//! (which only ever see copies).

pub mod artifact;
pub mod job;
