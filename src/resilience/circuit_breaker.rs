//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed unhealthy, calls fail fast
//! - Half-Open: one probe call is testing whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: rate-limit failures >= rate_limit_threshold
//!                or failures of any kind >= failure_threshold
//! Open → Half-Open: now >= policy.next_probe_deadline(open_since), one CAS winner
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (open_since refreshed)
//! ```
//!
//! # Design Decisions
//! - One breaker per protected endpoint class, shared via Arc
//! - State lives in atomics; every transition is a single compare-and-swap
//! - Timestamps come from an injected `Clock` so policies are testable
//! - Terminal client errors never reach the breaker (they say nothing about upstream health)
//! - A probe that never reports back (caller dropped) is re-armed after `probe_delay`

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::{BreakerConfig, BreakerPolicyKind};
use crate::observability::metrics;

const MILLIS_PER_DAY: u64 = 86_400_000;

/// Circuit state. Numeric values are stored in an `AtomicU8`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a failure counts toward tripping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Upstream signalled quota exhaustion (HTTP 429).
    RateLimited,
    /// 5xx, transport failure or timeout.
    Generic,
}

/// Wall-clock source in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Decides when an open breaker may let a probe through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePolicy {
    /// Probe once `probe_delay` has elapsed since the breaker opened.
    Rolling { probe_delay: Duration },
    /// Stay open until the next UTC midnight (quota resets on a fixed schedule).
    DailyReset,
}

impl ProbePolicy {
    /// Earliest instant (epoch millis) a probe may run for a breaker opened at `open_since`.
    pub fn next_probe_deadline(&self, open_since: u64) -> u64 {
        match self {
            ProbePolicy::Rolling { probe_delay } => {
                open_since.saturating_add(probe_delay.as_millis() as u64)
            }
            ProbePolicy::DailyReset => (open_since / MILLIS_PER_DAY + 1) * MILLIS_PER_DAY,
        }
    }
}

/// Thresholds and policy for one breaker.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    pub policy: ProbePolicy,
    pub rate_limit_threshold: u32,
    pub failure_threshold: u32,
    /// How long a granted probe may stay unreported before another is allowed.
    pub probe_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from_config(&BreakerConfig::default())
    }
}

impl BreakerSettings {
    pub fn from_config(config: &BreakerConfig) -> Self {
        let probe_delay = config.probe_delay();
        match config.policy {
            BreakerPolicyKind::Rolling => Self {
                policy: ProbePolicy::Rolling { probe_delay },
                rate_limit_threshold: config.rate_limit_threshold.max(1),
                failure_threshold: config.failure_threshold.max(1),
                probe_timeout: probe_delay,
            },
            // Daily quota: the first 429 means the rest of the day is gone.
            BreakerPolicyKind::DailyReset => Self {
                policy: ProbePolicy::DailyReset,
                rate_limit_threshold: 1,
                failure_threshold: config.failure_threshold.max(1),
                probe_timeout: probe_delay,
            },
        }
    }
}

/// Point-in-time view of a breaker, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failures: u32,
    pub rate_limit_failures: u32,
    pub last_failure_ms: Option<u64>,
    pub open_since_ms: Option<u64>,
    pub next_probe_ms: Option<u64>,
}

/// Process-wide health gate for one upstream endpoint class.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    state: AtomicU8,
    /// Consecutive failures of any kind since the last success.
    failures: AtomicU32,
    /// Consecutive rate-limit failures since the last success.
    rate_limit_failures: AtomicU32,
    /// Epoch millis; 0 = unset.
    last_failure_ms: AtomicU64,
    open_since_ms: AtomicU64,
    probe_granted_ms: AtomicU64,
    settings: BreakerSettings,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self::with_clock(name, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(name: impl Into<String>, settings: BreakerSettings, clock: Arc<dyn Clock>) -> Self {
        let breaker = Self {
            name: name.into(),
            state: AtomicU8::new(CircuitState::Closed as u8),
            failures: AtomicU32::new(0),
            rate_limit_failures: AtomicU32::new(0),
            last_failure_ms: AtomicU64::new(0),
            open_since_ms: AtomicU64::new(0),
            probe_granted_ms: AtomicU64::new(0),
            settings,
            clock,
        };
        metrics::record_breaker_state(&breaker.name, CircuitState::Closed as u8);
        breaker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Returns true if the caller may attempt an upstream call now.
    ///
    /// While open, the first caller at or after the probe deadline wins the
    /// transition to half-open and is the only one allowed through.
    pub fn is_call_allowed(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let now = self.clock.now_millis();
                let open_since = self.open_since_ms.load(Ordering::Acquire);
                if now < self.settings.policy.next_probe_deadline(open_since) {
                    return false;
                }
                // Written before the CAS so half-open readers never see a stale grant time.
                self.probe_granted_ms.store(now, Ordering::Release);
                if self.transition(CircuitState::Open, CircuitState::HalfOpen) {
                    self.failures.store(0, Ordering::Release);
                    self.rate_limit_failures.store(0, Ordering::Release);
                    tracing::info!(breaker = %self.name, "Circuit breaker half-open, probing upstream");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                let now = self.clock.now_millis();
                let granted = self.probe_granted_ms.load(Ordering::Acquire);
                let timeout = self.settings.probe_timeout.as_millis() as u64;
                if now.saturating_sub(granted) < timeout {
                    return false;
                }
                let rearmed = self
                    .probe_granted_ms
                    .compare_exchange(granted, now, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if rearmed {
                    tracing::warn!(breaker = %self.name, "Probe never reported back, granting a new probe");
                }
                rearmed
            }
        }
    }

    /// Report a successful upstream call.
    pub fn record_success(&self) {
        match self.state() {
            CircuitState::HalfOpen => {
                if self.transition(CircuitState::HalfOpen, CircuitState::Closed) {
                    self.clear_counters();
                    tracing::info!(breaker = %self.name, "Circuit breaker closed, upstream recovered");
                }
            }
            CircuitState::Closed => {
                self.failures.store(0, Ordering::Release);
                self.rate_limit_failures.store(0, Ordering::Release);
            }
            // A straggler that started before the breaker opened proves nothing.
            CircuitState::Open => {}
        }
    }

    /// Report a failed upstream call that reflects upstream health.
    pub fn record_failure(&self, kind: FailureKind) {
        let now = self.clock.now_millis();
        self.last_failure_ms.store(now, Ordering::Release);

        match self.state() {
            CircuitState::HalfOpen => {
                self.open_since_ms.store(now, Ordering::Release);
                if self.transition(CircuitState::HalfOpen, CircuitState::Open) {
                    tracing::warn!(breaker = %self.name, ?kind, "Probe failed, circuit breaker re-opened");
                }
            }
            CircuitState::Closed => {
                let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
                let rate_limited = match kind {
                    FailureKind::RateLimited => {
                        self.rate_limit_failures.fetch_add(1, Ordering::AcqRel) + 1
                    }
                    FailureKind::Generic => self.rate_limit_failures.load(Ordering::Acquire),
                };

                if rate_limited >= self.settings.rate_limit_threshold
                    || failures >= self.settings.failure_threshold
                {
                    self.open_since_ms.store(now, Ordering::Release);
                    if self.transition(CircuitState::Closed, CircuitState::Open) {
                        tracing::warn!(
                            breaker = %self.name,
                            failures,
                            rate_limit_failures = rate_limited,
                            ?kind,
                            "Circuit breaker opened"
                        );
                    }
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Force the breaker closed and clear all counters (admin override).
    pub fn reset(&self) {
        // Counters are zeroed before the state flips so a failure landing in
        // between never sees Closed with a stale count. The second clear
        // drops anything recorded while the swap was in progress.
        self.clear_counters();
        let previous = CircuitState::from(self.state.swap(CircuitState::Closed as u8, Ordering::AcqRel));
        self.clear_counters();
        if previous != CircuitState::Closed {
            metrics::record_breaker_transition(&self.name, CircuitState::Closed.as_str());
        }
        metrics::record_breaker_state(&self.name, CircuitState::Closed as u8);
        tracing::info!(breaker = %self.name, previous = %previous, "Circuit breaker reset");
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state();
        let open_since = non_zero(self.open_since_ms.load(Ordering::Acquire));
        BreakerSnapshot {
            name: self.name.clone(),
            state,
            failures: self.failures.load(Ordering::Acquire),
            rate_limit_failures: self.rate_limit_failures.load(Ordering::Acquire),
            last_failure_ms: non_zero(self.last_failure_ms.load(Ordering::Acquire)),
            open_since_ms: open_since,
            next_probe_ms: match state {
                CircuitState::Open => open_since.map(|t| self.settings.policy.next_probe_deadline(t)),
                _ => None,
            },
        }
    }

    fn transition(&self, from: CircuitState, to: CircuitState) -> bool {
        let won = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            metrics::record_breaker_transition(&self.name, to.as_str());
            metrics::record_breaker_state(&self.name, to as u8);
        }
        won
    }

    fn clear_counters(&self) {
        self.failures.store(0, Ordering::Release);
        self.rate_limit_failures.store(0, Ordering::Release);
        self.last_failure_ms.store(0, Ordering::Release);
        self.open_since_ms.store(0, Ordering::Release);
        self.probe_granted_ms.store(0, Ordering::Release);
    }
}

fn non_zero(v: u64) -> Option<u64> {
    (v != 0).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    const START: u64 = 1_700_000_000_000;

    fn rolling(delay_secs: u64) -> BreakerSettings {
        BreakerSettings {
            policy: ProbePolicy::Rolling {
                probe_delay: Duration::from_secs(delay_secs),
            },
            rate_limit_threshold: 3,
            failure_threshold: 6,
            probe_timeout: Duration::from_secs(delay_secs),
        }
    }

    fn breaker(settings: BreakerSettings) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        (CircuitBreaker::with_clock("test", settings, clock.clone()), clock)
    }

    #[test]
    fn test_trips_after_rate_limit_threshold() {
        let (cb, _) = breaker(rolling(60));
        cb.record_failure(FailureKind::RateLimited);
        cb.record_failure(FailureKind::RateLimited);
        assert!(cb.is_call_allowed());
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure(FailureKind::RateLimited);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_call_allowed());
    }

    #[test]
    fn test_generic_failures_use_higher_threshold() {
        let (cb, _) = breaker(rolling(60));
        for _ in 0..5 {
            cb.record_failure(FailureKind::Generic);
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure(FailureKind::Generic);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_counter() {
        let (cb, _) = breaker(rolling(60));
        cb.record_failure(FailureKind::RateLimited);
        cb.record_failure(FailureKind::RateLimited);
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        cb.record_failure(FailureKind::RateLimited);
        cb.record_failure(FailureKind::RateLimited);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_probe_waits_for_delay() {
        let (cb, clock) = breaker(rolling(60));
        for _ in 0..3 {
            cb.record_failure(FailureKind::RateLimited);
        }
        clock.advance(Duration::from_secs(59));
        assert!(!cb.is_call_allowed());
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(1));
        assert!(cb.is_call_allowed());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.is_call_allowed(), "only one probe at a time");
    }

    #[test]
    fn test_concurrent_callers_get_one_probe() {
        let (cb, clock) = breaker(rolling(1));
        for _ in 0..3 {
            cb.record_failure(FailureKind::RateLimited);
        }
        clock.advance(Duration::from_secs(1));

        let threads = 16;
        let barrier = Barrier::new(threads);
        let allowed = AtomicU32::new(0);
        std::thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    barrier.wait();
                    if cb.is_call_allowed() {
                        allowed.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(allowed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_half_open_success_closes() {
        let (cb, clock) = breaker(rolling(10));
        for _ in 0..3 {
            cb.record_failure(FailureKind::RateLimited);
        }
        clock.advance(Duration::from_secs(10));
        assert!(cb.is_call_allowed());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        let snapshot = cb.snapshot();
        assert!(snapshot.open_since_ms.is_none());
        assert!(snapshot.last_failure_ms.is_none());
    }

    #[test]
    fn test_half_open_failure_reopens_with_fresh_timestamp() {
        let (cb, clock) = breaker(rolling(10));
        for _ in 0..3 {
            cb.record_failure(FailureKind::RateLimited);
        }
        let first_open = cb.snapshot().open_since_ms.unwrap();

        clock.advance(Duration::from_secs(10));
        assert!(cb.is_call_allowed());
        cb.record_failure(FailureKind::Generic);

        assert_eq!(cb.state(), CircuitState::Open);
        let reopened = cb.snapshot().open_since_ms.unwrap();
        assert_eq!(reopened, first_open + 10_000);
        assert!(!cb.is_call_allowed());
    }

    #[test]
    fn test_unreported_probe_is_rearmed() {
        let (cb, clock) = breaker(rolling(5));
        for _ in 0..3 {
            cb.record_failure(FailureKind::RateLimited);
        }
        clock.advance(Duration::from_secs(5));
        assert!(cb.is_call_allowed());
        clock.advance(Duration::from_secs(4));
        assert!(!cb.is_call_allowed());
        clock.advance(Duration::from_secs(1));
        assert!(cb.is_call_allowed());
        assert!(!cb.is_call_allowed());
    }

    #[test]
    fn test_daily_reset_policy() {
        let config = BreakerConfig {
            policy: BreakerPolicyKind::DailyReset,
            ..BreakerConfig::default()
        };
        let settings = BreakerSettings::from_config(&config);
        let clock = Arc::new(ManualClock::new(3 * MILLIS_PER_DAY + 1_000));
        let cb = CircuitBreaker::with_clock("daily", settings, clock.clone());

        cb.record_failure(FailureKind::RateLimited);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.snapshot().next_probe_ms, Some(4 * MILLIS_PER_DAY));

        clock.set(4 * MILLIS_PER_DAY - 1);
        assert!(!cb.is_call_allowed());
        clock.set(4 * MILLIS_PER_DAY);
        assert!(cb.is_call_allowed());
    }

    #[test]
    fn test_reset_forces_closed() {
        let (cb, _) = breaker(rolling(600));
        for _ in 0..3 {
            cb.record_failure(FailureKind::RateLimited);
        }
        assert!(!cb.is_call_allowed());
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.is_call_allowed());
    }

    #[test]
    fn test_reset_starts_counting_from_zero() {
        let (cb, _) = breaker(rolling(600));
        for _ in 0..3 {
            cb.record_failure(FailureKind::RateLimited);
        }
        cb.reset();
        cb.record_failure(FailureKind::RateLimited);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().rate_limit_failures, 1);
    }

    #[test]
    fn test_failure_racing_reset_does_not_reopen() {
        for _ in 0..500 {
            let (cb, _) = breaker(rolling(600));
            for _ in 0..3 {
                cb.record_failure(FailureKind::RateLimited);
            }
            assert_eq!(cb.state(), CircuitState::Open);

            let barrier = Barrier::new(2);
            std::thread::scope(|s| {
                s.spawn(|| {
                    barrier.wait();
                    cb.reset();
                });
                s.spawn(|| {
                    barrier.wait();
                    cb.record_failure(FailureKind::RateLimited);
                });
            });
            assert_eq!(cb.state(), CircuitState::Closed);
        }
    }

    #[test]
    fn test_success_while_open_is_ignored() {
        let (cb, _) = breaker(rolling(600));
        for _ in 0..3 {
            cb.record_failure(FailureKind::RateLimited);
        }
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
