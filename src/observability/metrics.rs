//! Metrics collection and exposition.
//!
//! # Metrics
//! - `engine_requests_total` (counter): requests by method, status
//! - `engine_request_duration_seconds` (histogram): latency distribution
//! - `engine_listener_failures_total` (counter): listener failures by context, phase
//! - `engine_filter_instances_total` (counter): filter instantiations by context

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    ::metrics::counter!(
        "engine_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    ::metrics::histogram!(
        "engine_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_listener_failure(context: &str, phase: &'static str) {
    ::metrics::counter!(
        "engine_listener_failures_total",
        "context" => context.to_string(),
        "phase" => phase
    )
    .increment(1);
}

pub fn record_filter_instantiated(context: &str) {
    ::metrics::counter!("engine_filter_instances_total", "context" => context.to_string())
        .increment(1);
}
