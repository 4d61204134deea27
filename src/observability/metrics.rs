//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, mount
//! - `gateway_request_duration_seconds` (histogram): latency by mount
//! - `gateway_upstream_attempts_total` (counter): attempts by result
//! - `gateway_retries_total` (counter): attempts scheduled after a failure
//! - `gateway_responses_total` (counter): relayed responses by kind
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, mount: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "mount" => mount.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "mount" => mount.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_attempt(result: &'static str) {
    counter!("gateway_upstream_attempts_total", "result" => result).increment(1);
}

pub fn record_retry() {
    counter!("gateway_retries_total").increment(1);
}

pub fn record_response_kind(kind: &'static str) {
    counter!("gateway_responses_total", "kind" => kind).increment(1);
}
