//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, gate rejections, upstream errors)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_rate_limited_total` (counter): rate gate rejections
//! - `gateway_auth_failures_total` (counter): auth gate rejections by reason
//! - `gateway_upstream_errors_total` (counter): relay failures by service, kind
//! - `gateway_upstream_health` (gauge): 1=healthy, 0=unhealthy
//! - `gateway_rate_limiter_clients` (gauge): tracked client windows
//! - `gateway_internal_faults_total` (counter): contained panics
//!
//! # Design Decisions
//! - Recording is a no-op until the exporter is installed
//! - Labels are low-cardinality: route names, never raw paths

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, started: Instant) {
    ::metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    ::metrics::counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    ::metrics::counter!("gateway_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_upstream_error(service: &str, kind: &'static str) {
    ::metrics::counter!(
        "gateway_upstream_errors_total",
        "service" => service.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_upstream_health(service: &str, healthy: bool) {
    ::metrics::gauge!("gateway_upstream_health", "service" => service.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_rate_limiter_clients(count: usize) {
    ::metrics::gauge!("gateway_rate_limiter_clients").set(count as f64);
}

pub fn record_internal_fault() {
    ::metrics::counter!("gateway_internal_faults_total").increment(1);
}
