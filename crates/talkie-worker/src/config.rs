//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Inference executable (name on PATH or absolute path)
    pub inference_bin: String,
    /// Leading argument passed before the input flags
    pub inference_script: Option<String>,
    /// Extra arguments appended after the input flags
    pub extra_args: Vec<String>,
    /// Working directory of the inference process
    pub workdir: Option<PathBuf>,
    /// Per-job wall-clock limit, disabled when `None`
    pub job_timeout: Option<Duration>,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            inference_bin: "python".to_string(),
            inference_script: Some("inference.py".to_string()),
            extra_args: vec!["--enhancer".to_string(), "gfpgan".to_string()],
            workdir: None,
            job_timeout: None,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            inference_bin: std::env::var("INFERENCE_BIN").unwrap_or_else(|_| "python".to_string()),
            inference_script: match std::env::var("INFERENCE_SCRIPT") {
                Ok(s) if s.trim().is_empty() => None,
                Ok(s) => Some(s),
                Err(_) => Some("inference.py".to_string()),
            },
            extra_args: std::env::var("INFERENCE_EXTRA_ARGS")
                .map(|s| split_args(&s))
                .unwrap_or_else(|_| vec!["--enhancer".to_string(), "gfpgan".to_string()]),
            workdir: std::env::var("INFERENCE_WORKDIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            job_timeout: std::env::var("INFERENCE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

/// Split a space-delimited argument string, dropping empty pieces.
pub fn split_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
