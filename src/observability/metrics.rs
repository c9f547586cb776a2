//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): sampler requests by route, outcome
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_gate_busy_total` (counter): fail-fast rejections by gate
//! - `gateway_uploads_total` (counter): uploads by result
//! - `gateway_config_reloads_total` (counter): reloads by result
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

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

/// Record one sampler request.
pub fn record_request(route: &str, gate: &str, outcome: &'static str, start: Instant) {
    ::metrics::counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());

    if outcome == "busy" {
        ::metrics::counter!("gateway_gate_busy_total", "gate" => gate.to_string()).increment(1);
    }
}

/// Record one upload.
pub fn record_upload(result: &'static str) {
    ::metrics::counter!("gateway_uploads_total", "result" => result).increment(1);
}

/// Record a completed config reload.
pub fn record_reload(success: bool) {
    ::metrics::counter!(
        "gateway_config_reloads_total",
        "result" => if success { "ok" } else { "rejected" }
    )
    .increment(1);
}
