// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential-backoff-with-jitter retrier, generalized from the teacher's
//! `RetryPolicy`/`RetryExecutor` sketch.

use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry parameters. `max_attempts` counts the first try, so `3` means at
/// most 2 retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, initial_delay: Duration, backoff_factor: f64, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_factor,
            jitter: true,
        }
    }

    /// Base delay for 1-based attempt `n`, before jitter.
    pub fn base_delay_for_attempt(&self, n: usize) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_factor.powi((n as i32) - 1);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    fn delay_for_attempt(&self, n: usize) -> Duration {
        let base = self.base_delay_for_attempt(n);
        if self.jitter {
            let extra_frac: f64 = rand::thread_rng().gen_range(0.0..0.1);
            base + Duration::from_secs_f64(base.as_secs_f64() * extra_frac)
        } else {
            base
        }
    }
}

/// A cancellation observer the retrier consults between attempts. Kept as
/// a trait rather than a concrete type so the Execution Context (C5) can be
/// the implementor without this module depending on it directly.
pub trait CancellationToken: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl CancellationToken for () {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Retries `op` according to `policy`. `op` must itself be idempotent; this
/// function does not enforce that.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, cancellation: &dyn CancellationToken, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 1;
    loop {
        if cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.retryable() {
                    return Err(err);
                }
                if attempt >= policy.max_attempts {
                    warn!(attempts = attempt, "retry exhausted");
                    return Err(Error::RetriesExhausted { attempts: attempt, source: Box::new(err) });
                }

                let delay = retry_after_override(&err).unwrap_or_else(|| policy.delay_for_attempt(attempt));
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = wait_for_cancellation(cancellation) => {
                        return Err(Error::Cancelled);
                    }
                }

                attempt += 1;
            }
        }
    }
}

/// Polls the cancellation token until it flips, for use inside a `select!`
/// race against the backoff sleep.
async fn wait_for_cancellation(cancellation: &dyn CancellationToken) {
    loop {
        if cancellation.is_cancelled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// A provider that sent back an explicit `Retry-After` overrides the
/// computed backoff delay for the next attempt (spec §4.6).
fn retry_after_override(err: &Error) -> Option<Duration> {
    match err {
        Error::Provider { retry_after, .. } => *retry_after,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retry_exhaustion_invokes_exactly_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_factor: 2.0,
            jitter: false,
        };

        let attempts = AtomicUsize::new(0);
        let result: Result<(), Error> = retry(&policy, &(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Provider { retryable: true, message: "boom".to_string(), retry_after: None }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        match result.unwrap_err() {
            Error::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retry_after_override_replaces_computed_delay() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: false,
        };

        let attempts = AtomicUsize::new(0);
        let started = std::time::Instant::now();
        let result = retry(&policy, &(), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(Error::Provider {
                        retryable: true,
                        message: "rate limited".to_string(),
                        retry_after: Some(Duration::from_millis(5)),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(1), "retry_after override should have shortened the wait");
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let policy = RetryPolicy::default();
        let attempts = AtomicUsize::new(0);

        let result: Result<(), Error> = retry(&policy, &(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Type { message: "nope".to_string() }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failure() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
            jitter: false,
        };

        let attempts = AtomicUsize::new(0);
        let result = retry(&policy, &(), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(Error::Provider { retryable: true, message: "transient".to_string(), retry_after: None })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_delay_growth_bounded_by_max() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            jitter: false,
        };

        assert_eq!(policy.base_delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.base_delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.base_delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.base_delay_for_attempt(4), Duration::from_millis(500));
    }
}
