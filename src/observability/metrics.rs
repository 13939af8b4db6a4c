//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webservice_requests_total` (counter): requests by method, status, service
//! - `webservice_request_duration_seconds` (histogram): latency distribution
//! - `websocket_sessions_active` (gauge): open WebSocket sessions
//! - `websocket_frames_total` (counter): frames by direction

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished HTTP request.
pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    let service = service.to_string();
    metrics::counter!(
        "webservice_requests_total",
        "method" => method.clone(),
        "status" => status.clone(),
        "service" => service.clone()
    )
    .increment(1);
    metrics::histogram!(
        "webservice_request_duration_seconds",
        "method" => method,
        "status" => status,
        "service" => service
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn session_opened(protocol: &str) {
    metrics::gauge!("websocket_sessions_active", "protocol" => protocol.to_string()).increment(1.0);
}

pub fn session_closed(protocol: &str) {
    metrics::gauge!("websocket_sessions_active", "protocol" => protocol.to_string()).decrement(1.0);
}

/// Count one frame; `direction` is "in" or "out".
pub fn record_frame(direction: &'static str) {
    metrics::counter!("websocket_frames_total", "direction" => direction).increment(1);
}
