//! Upstream monitoring hooks.
//!
//! Fired on every upstream attempt outcome. Purely observational: nothing in
//! the resolution pipeline reads them back.

use std::sync::Arc;

use crate::observability::metrics;

/// Receives the outcome of each upstream attempt.
pub trait UpstreamMonitor: Send + Sync + std::fmt::Debug {
    fn record_success(&self, endpoint: &str);
    fn record_failure(&self, endpoint: &str, reason: &str);
}

/// Monitor that forwards outcomes to the metrics facade and the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsMonitor;

impl UpstreamMonitor for MetricsMonitor {
    fn record_success(&self, endpoint: &str) {
        metrics::record_upstream_request(endpoint, "success");
    }

    fn record_failure(&self, endpoint: &str, reason: &str) {
        metrics::record_upstream_request(endpoint, "failure");
        tracing::debug!(endpoint = %endpoint, reason = %reason, "Upstream attempt failed");
    }
}

/// Shared handle used by components.
pub type SharedMonitor = Arc<dyn UpstreamMonitor>;

pub fn default_monitor() -> SharedMonitor {
    Arc::new(MetricsMonitor)
}
