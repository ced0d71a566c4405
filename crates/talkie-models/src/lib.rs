//! Shared data models for the Talkie backend.
//!
//! This crate provides Serde-serializable types for:
//! - Task identifiers and persisted task records
//! - The task status state machine
//! - Queue entries handed from the API to the worker

pub mod entry;
pub mod status;
pub mod task;

// Re-export common types
pub use entry::QueueEntry;
pub use status::{InvalidTransition, TaskStatus, UnknownStatus};
pub use task::{TaskId, TaskRecord};
