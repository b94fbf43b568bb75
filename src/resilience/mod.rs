//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream call:
//!     → circuit_breaker.rs (is the call allowed at all?)
//!     → retries.rs (attempt, classify, back off via backoff.rs)
//!     → circuit_breaker.rs (record the definitive outcome)
//!
//! External search attempt:
//!     → timeouts.rs (hard per-attempt deadline, fall through on expiry)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - Retries only for 5xx, 429 and transport failures
//! - The breaker sees one outcome per logical call, not one per attempt

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::BackoffPolicy;
pub use circuit_breaker::{
    BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState, Clock, FailureKind,
    ManualClock, ProbePolicy, SystemClock,
};
pub use retries::{run_with_retry, RetryOutcome, RetryTerminal, Retryable};
pub use timeouts::{with_timeout, TimedOut};
