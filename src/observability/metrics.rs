//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resolver_upstream_requests_total` (counter): upstream attempts by endpoint, outcome
//! - `resolver_upstream_retries_total` (counter): retries by endpoint
//! - `resolver_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `resolver_breaker_transitions_total` (counter): transitions by target state
//! - `resolver_tier_hits_total` / `resolver_tier_errors_total` (counter): per cache tier
//! - `resolver_backfill_failures_total` (counter): per cache tier
//! - `resolver_singleflight_shared_total` (counter): callers that joined an in-flight load
//! - `resolver_search_requests_total` (counter): by resolution path
//! - `resolver_search_duration_seconds` (histogram)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests free of globals
//! - Exposition is the Prometheus exporter's own HTTP listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_upstream_request(endpoint: &str, outcome: &str) {
    counter!(
        "resolver_upstream_requests_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_upstream_retry(endpoint: &str) {
    counter!("resolver_upstream_retries_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_breaker_state(breaker: &str, state: u8) {
    gauge!("resolver_breaker_state", "breaker" => breaker.to_string()).set(f64::from(state));
}

pub fn record_breaker_transition(breaker: &str, to: &'static str) {
    counter!(
        "resolver_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to
    )
    .increment(1);
}

pub fn record_tier_hit(tier: &'static str) {
    counter!("resolver_tier_hits_total", "tier" => tier).increment(1);
}

pub fn record_tier_error(tier: &'static str) {
    counter!("resolver_tier_errors_total", "tier" => tier).increment(1);
}

pub fn record_backfill_failure(tier: &'static str) {
    counter!("resolver_backfill_failures_total", "tier" => tier).increment(1);
}

pub fn record_singleflight_shared(cache: &'static str) {
    counter!("resolver_singleflight_shared_total", "cache" => cache).increment(1);
}

pub fn record_search(path: &'static str, start: Instant) {
    counter!("resolver_search_requests_total", "path" => path).increment(1);
    histogram!("resolver_search_duration_seconds").record(start.elapsed().as_secs_f64());
}
