//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "talkie_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "talkie_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "talkie_http_requests_in_flight";

    // Submission metrics
    pub const TASKS_SUBMITTED_TOTAL: &str = "talkie_tasks_submitted_total";
    pub const UPLOAD_BYTES_TOTAL: &str = "talkie_upload_bytes_total";

    // Auth and rate limiting
    pub const AUTH_FAILURES_TOTAL: &str = "talkie_auth_failures_total";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "talkie_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an accepted submission.
pub fn record_task_submitted(upload_bytes: u64) {
    counter!(names::TASKS_SUBMITTED_TOTAL).increment(1);
    counter!(names::UPLOAD_BYTES_TOTAL).increment(upload_bytes);
}

/// Record a rejected ticket.
pub fn record_auth_failure() {
    counter!(names::AUTH_FAILURES_TOTAL).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static STATUS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/status/[^/]+$").expect("valid regex"));
static RESULT_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/result/[^/]+$").expect("valid regex"));

/// Sanitize path for metrics labels (remove IDs and file names).
fn sanitize_path(path: &str) -> String {
    let path = STATUS_PATH.replace(path, "/status/:task_id");
    let path = RESULT_PATH.replace(&path, "/result/:file_name");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
