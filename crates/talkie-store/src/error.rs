//! Store error types.

use talkie_models::{InvalidTransition, UnknownStatus};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task already exists: {0}")]
    AlreadyExists(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {0} was modified concurrently")]
    Conflict(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Corrupt record: {0}")]
    InvalidStatus(#[from] UnknownStatus),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict(id.into())
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists(id.into())
    }

    /// Check if the error means the record is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
