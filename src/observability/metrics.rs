//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): accepted client connections
//! - `proxy_bad_requests_total` (counter): requests answered with 400
//! - `proxy_cache_lookups_total` (counter): lookups by `result` (hit, miss)
//! - `proxy_cache_entries` (gauge): responses held in the cache
//! - `proxy_rewrites_total` (counter): rewrites by `target` and `outcome`
//! - `proxy_upstream_errors_total` (counter): failed origin round trips
//! - `proxy_upstream_duration_seconds` (histogram): origin round trip latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection() {
    metrics::counter!("proxy_connections_total").increment(1);
}

pub fn record_bad_request() {
    metrics::counter!("proxy_bad_requests_total").increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("proxy_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("proxy_cache_entries").set(entries as f64);
}

/// `target` is `request` or `response`; `outcome` is `applied`, `skipped` or `failed`.
pub fn record_rewrite(target: &'static str, outcome: &'static str) {
    metrics::counter!("proxy_rewrites_total", "target" => target, "outcome" => outcome)
        .increment(1);
}

pub fn record_upstream(start: Instant, ok: bool) {
    metrics::histogram!("proxy_upstream_duration_seconds").record(start.elapsed().as_secs_f64());
    if !ok {
        metrics::counter!("proxy_upstream_errors_total").increment(1);
    }
}
