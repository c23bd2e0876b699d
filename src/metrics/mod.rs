//! Metrics module
//!
//! Prometheus metrics for harness runs: every API call, authentication,
//! status poll and large-object segment is counted so a run can be summarised
//! after the fact.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Request metrics
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "cloudroast_requests_total",
        "Total number of API requests issued",
        &["service", "method", "status"]
    ).unwrap();

    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "cloudroast_request_duration_seconds",
        "API request duration in seconds",
        &["service", "method"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // Auth metrics
    pub static ref AUTH_ATTEMPTS: CounterVec = register_counter_vec!(
        "cloudroast_auth_attempts_total",
        "Authentication attempts",
        &["method", "status"]
    ).unwrap();

    // Poll metrics
    pub static ref POLL_WAITS: CounterVec = register_counter_vec!(
        "cloudroast_poll_waits_total",
        "Status waits by outcome",
        &["target", "outcome"]
    ).unwrap();

    pub static ref POLL_DURATION: HistogramVec = register_histogram_vec!(
        "cloudroast_poll_duration_seconds",
        "Time spent waiting for a status",
        &["target"],
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0]
    ).unwrap();

    // Large object metrics
    pub static ref SEGMENTS_UPLOADED: CounterVec = register_counter_vec!(
        "cloudroast_segments_uploaded_total",
        "Large object segments uploaded",
        &["kind", "status"]
    ).unwrap();
}

/// Record one API request
pub fn record_request(service: &str, method: &str, status: u16, duration_secs: f64) {
    REQUESTS_TOTAL
        .with_label_values(&[service, method, &status.to_string()])
        .inc();
    REQUEST_DURATION
        .with_label_values(&[service, method])
        .observe(duration_secs);
}

/// Record a request that never produced a response
pub fn record_transport_error(service: &str, method: &str) {
    REQUESTS_TOTAL
        .with_label_values(&[service, method, "transport_error"])
        .inc();
}

/// Record authentication attempt
pub fn record_auth_attempt(method: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    AUTH_ATTEMPTS.with_label_values(&[method, status]).inc();
}

/// Record the end of a status wait
///
/// # Arguments
/// * `target` - Kind of wait ("status", "resize", "deletion", "object_absent")
/// * `outcome` - "ok", "failed" or "timeout"
pub fn record_poll(target: &str, outcome: &str, duration_secs: f64) {
    POLL_WAITS.with_label_values(&[target, outcome]).inc();
    POLL_DURATION
        .with_label_values(&[target])
        .observe(duration_secs);
}

/// Record a segment upload
pub fn record_segment_upload(kind: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    SEGMENTS_UPLOADED.with_label_values(&[kind, status]).inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
