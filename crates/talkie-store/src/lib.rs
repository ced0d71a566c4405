//! Task record persistence.
//!
//! This crate provides:
//! - The [`TaskStore`] contract used by the API and the worker
//! - A SQLite implementation backed by `sqlx`, with embedded migrations

pub mod error;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteTaskStore;
pub use store::TaskStore;
