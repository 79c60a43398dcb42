//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_policy_hits_total` (counter): WAF hits by action
//! - `gateway_cache_writes_total` (counter): static cache writes by outcome
//! - `gateway_captcha_entries` (gauge): pending CAPTCHA challenges
//! - `gateway_registry_version` (gauge): current registry snapshot version
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_policy_hit(action: &'static str) {
    counter!("gateway_policy_hits_total", "action" => action).increment(1);
}

pub fn record_cache_write(outcome: &'static str) {
    counter!("gateway_cache_writes_total", "outcome" => outcome).increment(1);
}

pub fn record_captcha_entries(count: usize) {
    gauge!("gateway_captcha_entries").set(count as f64);
}

pub fn record_registry_version(version: u64) {
    gauge!("gateway_registry_version").set(version as f64);
}
