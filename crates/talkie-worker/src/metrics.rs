//! Worker metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder that exports them.

use metrics::{counter, gauge, histogram};

use talkie_models::TaskStatus;

/// Metric names as constants for consistency.
pub mod names {
    pub const QUEUE_LENGTH: &str = "talkie_queue_length";
    pub const TASKS_STARTED_TOTAL: &str = "talkie_tasks_started_total";
    pub const TASKS_FINISHED_TOTAL: &str = "talkie_tasks_finished_total";
    pub const INFERENCE_DURATION_SECONDS: &str = "talkie_inference_duration_seconds";
    pub const STORE_ERRORS_TOTAL: &str = "talkie_store_errors_total";
}

/// Update queue length gauge.
pub fn set_queue_length(length: usize) {
    gauge!(names::QUEUE_LENGTH).set(length as f64);
}

/// Record a job leaving the queue.
pub fn record_task_started() {
    counter!(names::TASKS_STARTED_TOTAL).increment(1);
}

/// Record a job reaching a terminal status.
pub fn record_task_finished(status: TaskStatus) {
    let labels = [("status", status.as_str().to_string())];
    counter!(names::TASKS_FINISHED_TOTAL, &labels).increment(1);
}

/// Record the wall-clock duration of one inference run.
pub fn record_inference_duration(duration_secs: f64) {
    histogram!(names::INFERENCE_DURATION_SECONDS).record(duration_secs);
}

/// Record a status write that could not be persisted.
pub fn record_store_error(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::STORE_ERRORS_TOTAL, &labels).increment(1);
}
