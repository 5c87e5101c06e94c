// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crate-wide error type.

use std::time::Duration;

/// Result alias used throughout `lacquer-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type every fallible boundary in this crate returns.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Expression or template failed to parse.
    #[error("parse error: {message} (at \"{source_snippet}\")")]
    Parse { message: String, source_snippet: String },

    /// A variable path had no value.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// A variable path's root scope is unrecognized.
    #[error("unknown scope: {scope}")]
    Scope { scope: String },

    /// An operation was applied to a value of the wrong kind.
    #[error("type error: {message}")]
    Type { message: String },

    /// Division, modulo, or another arithmetic operation is invalid.
    #[error("arithmetic error: {message}")]
    Arithmetic { message: String },

    /// A list index was out of range.
    #[error("index out of range: {index} (len {len})")]
    Index { index: i64, len: usize },

    /// An unknown function was called.
    #[error("unknown function: {name}")]
    Name { name: String },

    /// A tool invocation failed.
    #[error("tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    /// A model provider call failed.
    #[error("provider error: {message}")]
    Provider { retryable: bool, message: String, retry_after: Option<Duration> },

    /// The run was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// An operation exceeded its deadline.
    #[error("timed out after {elapsed:?}")]
    Timeout { elapsed: Duration, retryable: bool },

    /// A panic was caught and converted at a step boundary, or some other
    /// invariant violation that doesn't fit an earlier variant.
    #[error("runtime error: {message}")]
    Runtime { message: String },

    /// A step referenced by id does not exist in the current scope.
    #[error("step not found: {step_id}")]
    StepNotFound { step_id: String },

    /// A step's configuration doesn't match its declared kind.
    #[error("invalid config for step '{step_id}': {reason}")]
    InvalidStepConfig { step_id: String, reason: String },

    /// A step declared a kind this engine doesn't know how to dispatch.
    #[error("unknown step kind '{kind}' for step '{step_id}'")]
    UnknownStepKind { step_id: String, kind: String },

    /// A retrier gave up after exhausting `attempts` tries; wraps the last
    /// failure.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted { attempts: usize, #[source] source: Box<Error> },

    /// An `agent` step referenced an agent definition that doesn't exist.
    #[error("unknown agent: {name}")]
    UnknownAgent { name: String },

    /// The breaker is open; a request was short-circuited.
    #[error("circuit breaker open")]
    CircuitOpen,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether the Resilience layer should retry an operation that failed
    /// with this error. Only provider and timeout failures are ever
    /// retryable; everything else is a programming or data error that will
    /// not resolve itself on a second attempt.
    pub fn retryable(&self) -> bool {
        match self {
            Error::Provider { retryable, .. } => *retryable,
            Error::Timeout { retryable, .. } => *retryable,
            _ => false,
        }
    }

    pub fn parse(message: impl Into<String>, source_snippet: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
            source_snippet: source_snippet.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound { path: path.into() }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type { message: message.into() }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Error::Runtime { message: message.into() }
    }
}

impl From<lacquer_providers::ProviderError> for Error {
    fn from(err: lacquer_providers::ProviderError) -> Self {
        let retryable = err.retryable();
        match err {
            lacquer_providers::ProviderError::Timeout => Error::Timeout {
                elapsed: Duration::default(),
                retryable: true,
            },
            lacquer_providers::ProviderError::RateLimitExceeded { retry_after } => Error::Provider {
                retryable,
                message: "rate limit exceeded".to_string(),
                retry_after,
            },
            other => Error::Provider {
                retryable,
                message: other.to_string(),
                retry_after: None,
            },
        }
    }
}
