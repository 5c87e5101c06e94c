// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Three-state circuit breaker guarding a flaky downstream operation.

use crate::error::Error;
use parking_lot::Mutex;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub success_threshold: usize,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

struct Inner {
    state: BreakerState,
    consecutive_failures: usize,
    consecutive_successes: usize,
    opened_at: Option<Instant>,
}

/// A `parking_lot::Mutex`-guarded state machine, matching the teacher's
/// concurrency idiom elsewhere in this crate.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Whether a new call may proceed. Transitions Open → Half-Open as a
    /// side effect if `reset_timeout` has elapsed.
    fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    debug!("circuit breaker transitioning Open -> HalfOpen");
                    inner.state = BreakerState::HalfOpen;
                    inner.consecutive_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    debug!("circuit breaker transitioning HalfOpen -> Closed");
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                }
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(failures = inner.consecutive_failures, "circuit breaker opening");
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                warn!("circuit breaker re-opening after half-open trial failure");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
            }
            BreakerState::Open => {
                inner.opened_at = Some(Instant::now());
            }
        }
    }

    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        if !self.allow_request() {
            return Err(Error::CircuitOpen);
        }

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(60),
        });

        for _ in 0..2 {
            let _ = breaker
                .call(|| async { Err::<(), _>(Error::Provider { retryable: true, message: "x".into(), retry_after: None }) })
                .await;
        }

        assert_eq!(breaker.state(), BreakerState::Open);

        let result = breaker.call(|| async { Ok::<_, Error>(()) }).await;
        assert!(matches!(result, Err(Error::CircuitOpen)));
    }

    #[tokio::test]
    async fn test_half_open_closes_after_success_threshold() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 2,
            reset_timeout: Duration::from_millis(1),
        });

        let _ = breaker
            .call(|| async { Err::<(), _>(Error::Provider { retryable: true, message: "x".into(), retry_after: None }) })
            .await;
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(5)).await;

        breaker.call(|| async { Ok::<_, Error>(()) }).await.unwrap();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.call(|| async { Ok::<_, Error>(()) }).await.unwrap();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 2,
            reset_timeout: Duration::from_millis(1),
        });

        let _ = breaker
            .call(|| async { Err::<(), _>(Error::Provider { retryable: true, message: "x".into(), retry_after: None }) })
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let _ = breaker
            .call(|| async { Err::<(), _>(Error::Provider { retryable: true, message: "y".into(), retry_after: None }) })
            .await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
