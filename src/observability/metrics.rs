//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): inbound requests by outcome
//! - `relay_request_duration_seconds` (histogram): time to finish a relay
//! - `relay_upstream_attempts_total` (counter): upstream attempts by result
//! - `relay_bytes_streamed_total` (counter): bytes written to clients
//! - `relay_short_writes_total` (counter): chunks the client only partly took
//! - `relay_ledger_writes_total` (counter): ledger writes by result
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str, start: Instant) {
    counter!("relay_requests_total", "outcome" => outcome).increment(1);
    histogram!("relay_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_attempt(result: &'static str) {
    counter!("relay_upstream_attempts_total", "result" => result).increment(1);
}

pub fn record_bytes_streamed(bytes: u64, short_writes: u64) {
    counter!("relay_bytes_streamed_total").increment(bytes);
    if short_writes > 0 {
        counter!("relay_short_writes_total").increment(short_writes);
    }
}

pub fn record_ledger_write(result: &'static str) {
    counter!("relay_ledger_writes_total", "result" => result).increment(1);
}
