// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment- and builder-driven configuration for resilience and
//! conversation defaults, resolved once at context/executor construction.

use crate::resilience::{CircuitBreakerConfig, RetryPolicy};
use std::time::Duration;

/// Top-level configuration for a `WorkflowExecutor`.
///
/// Provider credentials (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`) are read
/// straight from the environment at provider-construction time; they are
/// not part of this struct and are never cached globally.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub default_timeout: Duration,
    pub default_retry: RetryPolicy,
    pub default_circuit_breaker: CircuitBreakerConfig,
    pub max_conversation_turns: usize,
    pub event_channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(60),
            default_retry: RetryPolicy::default(),
            default_circuit_breaker: CircuitBreakerConfig::default(),
            max_conversation_turns: 10,
            event_channel_capacity: 256,
        }
    }
}

impl OrchestratorConfig {
    /// Overlays `LACQUER_*` environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_usize("LACQUER_MAX_RETRY_ATTEMPTS") {
            config.default_retry.max_attempts = v;
        }
        if let Some(v) = env_u64("LACQUER_RETRY_INITIAL_DELAY_MS") {
            config.default_retry.initial_delay = Duration::from_millis(v);
        }
        if let Some(v) = env_u64("LACQUER_RETRY_MAX_DELAY_MS") {
            config.default_retry.max_delay = Duration::from_millis(v);
        }
        if let Some(v) = env_f64("LACQUER_RETRY_BACKOFF_FACTOR") {
            config.default_retry.backoff_factor = v;
        }
        if let Some(v) = env_bool("LACQUER_RETRY_JITTER") {
            config.default_retry.jitter = v;
        }
        if let Some(v) = env_usize("LACQUER_CIRCUIT_FAILURE_THRESHOLD") {
            config.default_circuit_breaker.failure_threshold = v;
        }
        if let Some(v) = env_usize("LACQUER_CIRCUIT_SUCCESS_THRESHOLD") {
            config.default_circuit_breaker.success_threshold = v;
        }
        if let Some(v) = env_u64("LACQUER_CIRCUIT_RESET_TIMEOUT_SECS") {
            config.default_circuit_breaker.reset_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_usize("LACQUER_MAX_CONVERSATION_TURNS") {
            config.max_conversation_turns = v;
        }
        if let Some(v) = env_usize("LACQUER_EVENT_CHANNEL_CAPACITY") {
            config.event_channel_capacity = v;
        }
        if let Some(v) = env_u64("LACQUER_DEFAULT_TIMEOUT_SECS") {
            config.default_timeout = Duration::from_secs(v);
        }

        config
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.default_retry.max_attempts, 3);
        assert_eq!(config.default_retry.initial_delay, Duration::from_millis(500));
        assert_eq!(config.default_retry.max_delay, Duration::from_secs(30));
        assert_eq!(config.default_retry.backoff_factor, 2.0);
        assert!(config.default_retry.jitter);
        assert_eq!(config.default_circuit_breaker.failure_threshold, 5);
        assert_eq!(config.default_circuit_breaker.reset_timeout, Duration::from_secs(30));
        assert_eq!(config.default_circuit_breaker.success_threshold, 2);
        assert_eq!(config.max_conversation_turns, 10);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.default_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_from_env_overlay() {
        std::env::set_var("LACQUER_MAX_RETRY_ATTEMPTS", "7");
        let config = OrchestratorConfig::from_env();
        assert_eq!(config.default_retry.max_attempts, 7);
        std::env::remove_var("LACQUER_MAX_RETRY_ATTEMPTS");
    }
}
