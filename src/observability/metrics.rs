//! Metrics emission.
//!
//! # Metrics
//! - `fetch_requests_total` (counter): completed exchanges by method, status
//! - `fetch_request_duration_seconds` (histogram): time to response headers by method
//! - `fetch_retries_total` (counter): retried attempts by method
//! - `fetch_timeouts_total` (counter): fired deadlines by kind (`request`, `read`)
//!
//! # Design Decisions
//! - Emitted through the `metrics` facade; without a recorder every call is a no-op
//! - Failures without a status (timeouts, connection errors) use status `0`

use std::time::Instant;

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("fetch_requests_total", &labels).increment(1);
    metrics::histogram!("fetch_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(method: &str) {
    metrics::counter!("fetch_retries_total", "method" => method.to_string()).increment(1);
}

pub fn record_timeout(kind: &'static str) {
    metrics::counter!("fetch_timeouts_total", "kind" => kind).increment(1);
}
