//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → monitor.rs (per-attempt upstream outcome hooks)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON or text)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
pub mod monitor;

pub use monitor::{default_monitor, MetricsMonitor, SharedMonitor, UpstreamMonitor};
