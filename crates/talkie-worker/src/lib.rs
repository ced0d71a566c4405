//! Talking-head inference worker.
//!
//! This crate provides:
//! - The task executor loop that drains the queue one job at a time
//! - Invocation of the inference tool and result detection
//! - Status transitions persisted through the task store
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::TaskExecutor;
pub use logging::JobLogger;
pub use processor::TaskOutcome;
