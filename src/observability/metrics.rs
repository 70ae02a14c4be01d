//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_chain_cache_rebuilds_total` (counter): rebuilds by result (ok, failed)
//! - `gateway_chain_cache_routes` (gauge): routes in the current snapshot
//! - `gateway_chain_lookups_total` (counter): lookups by result (hit, empty)
//! - `gateway_requests_total` (counter): requests by status
//! - `gateway_request_duration_seconds` (histogram): dispatch latency

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_cache_rebuild(result: &'static str) {
    counter!("gateway_chain_cache_rebuilds_total", "result" => result).increment(1);
}

pub fn record_cache_routes(routes: usize) {
    gauge!("gateway_chain_cache_routes").set(routes as f64);
}

pub fn record_lookup(hit: bool) {
    let result = if hit { "hit" } else { "empty" };
    counter!("gateway_chain_lookups_total", "result" => result).increment(1);
}

pub fn record_request(status: u16, start: Instant) {
    counter!("gateway_requests_total", "status" => status.to_string()).increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
