//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay schedule between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: true,
        }
    }

    /// No waiting between attempts; used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delay to wait after the given failed attempt (1-based): base, 2×base, 4×base, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let shift = (attempt - 1).min(20);
        let base_ms = self.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << shift);
        let capped = delay_ms.min(self.max_delay.as_millis() as u64);

        let jitter_range = if self.jitter { capped / 10 } else { 0 };
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: bool) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(5_000),
            jitter,
        }
    }

    #[test]
    fn test_doubling_without_jitter() {
        let p = policy(false);
        assert_eq!(p.delay_after(1), Duration::from_millis(1_000));
        assert_eq!(p.delay_after(2), Duration::from_millis(2_000));
        assert_eq!(p.delay_after(3), Duration::from_millis(4_000));
        assert_eq!(p.delay_after(4), Duration::from_millis(5_000));
        assert_eq!(p.delay_after(40), Duration::from_millis(5_000));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let p = policy(true);
        for _ in 0..50 {
            let d = p.delay_after(2).as_millis();
            assert!((2_000..2_200).contains(&d), "delay {d} out of range");
        }
    }

    #[test]
    fn test_immediate_policy() {
        let p = BackoffPolicy::immediate(0);
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.delay_after(3), Duration::ZERO);
    }
}
