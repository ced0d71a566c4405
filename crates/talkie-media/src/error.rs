//! Error types for inference invocation.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while invoking the inference tool.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Inference executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to start inference process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Inference timed out after {0} seconds")]
    Timeout(u64),
}
