// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry, circuit-breaking, and timeout composition: `Retrier(ctx, op) :=
//! retry(breaker(op))` per §4.6.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use retry::{retry, CancellationToken, RetryPolicy};

use crate::error::Error;
use std::future::Future;
use std::time::Duration;

/// Runs `op` through the breaker, then wraps the whole thing in the retry
/// loop, imposing `timeout` as a deadline on each individual attempt if the
/// caller didn't already bound it.
pub async fn resilient_call<T, F, Fut>(
    policy: &RetryPolicy,
    breaker: &CircuitBreaker,
    cancellation: &dyn CancellationToken,
    timeout: Duration,
    mut op: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    retry(policy, cancellation, || async {
        breaker
            .call(|| async {
                match tokio::time::timeout(timeout, op()).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout { elapsed: timeout, retryable: true }),
                }
            })
            .await
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resilient_call_short_circuits_through_breaker() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_factor: 1.0,
            jitter: false,
        };
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(60),
        });

        let result: Result<(), Error> = resilient_call(&policy, &breaker, &(), Duration::from_millis(50), || async {
            Err(Error::Provider { retryable: true, message: "down".to_string(), retry_after: None })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
