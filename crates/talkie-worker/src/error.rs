//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("Media error: {0}")]
    Media(#[from] talkie_media::MediaError),

    #[error("Store error: {0}")]
    Store(#[from] talkie_store::StoreError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Convert a join error from a job task into a worker error.
    pub fn from_join(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            let payload = err.into_panic();
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Self::Panicked(msg)
        } else {
            Self::job_failed("job task was cancelled")
        }
    }
}
