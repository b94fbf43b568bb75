//! Retry logic.
//!
//! # Responsibilities
//! - Execute one async operation under a bounded retry policy
//! - Let the error type decide what is retryable
//! - Report how many retries were needed
//!
//! # Design Decisions
//! - The runner knows nothing about HTTP; classification lives on the error
//! - A caller-supplied `keep_going` check can abort between attempts
//!   (used to stop retrying once the breaker has opened)
//! - Exhaustion returns the last error together with the attempt count

use std::fmt::Display;
use std::future::Future;

use crate::observability::metrics;
use crate::resilience::backoff::BackoffPolicy;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Successful result of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Attempts beyond the first.
    pub retries: u32,
}

/// Terminal failure of a retried operation.
#[derive(Debug)]
pub struct RetryTerminal<E> {
    pub error: E,
    pub attempts: u32,
    /// True if the last error was retryable but the budget ran out.
    pub exhausted_retryable: bool,
}

/// Run `op` until it succeeds, fails terminally, or the attempt budget is spent.
///
/// `op` receives the 1-based attempt number. `keep_going` is consulted before
/// every retry; returning false surfaces the last error immediately.
pub async fn run_with_retry<T, E, F, Fut, K>(
    policy: &BackoffPolicy,
    endpoint: &str,
    mut op: F,
    mut keep_going: K,
) -> Result<RetryOutcome<T>, RetryTerminal<E>>
where
    E: Retryable + Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    K: FnMut() -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                return Ok(RetryOutcome {
                    value,
                    retries: attempt - 1,
                })
            }
            Err(error) => {
                let retryable = error.is_retryable();
                if !retryable || attempt >= max_attempts || !keep_going() {
                    if retryable && attempt >= max_attempts {
                        tracing::warn!(
                            endpoint = %endpoint,
                            attempts = attempt,
                            error = %error,
                            "Retries exhausted"
                        );
                    }
                    return Err(RetryTerminal {
                        error,
                        attempts: attempt,
                        exhausted_retryable: retryable && attempt >= max_attempts,
                    });
                }

                let delay = policy.delay_after(attempt);
                tracing::info!(
                    endpoint = %endpoint,
                    attempt,
                    delay = ?delay,
                    error = %error,
                    "Retrying upstream call"
                );
                metrics::record_upstream_retry(endpoint);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
