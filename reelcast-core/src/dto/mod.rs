//! Data Transfer Objects
//!
//! Wire shapes exchanged between the orchestrator's HTTP API and its clients.

pub mod health;
pub mod job;
