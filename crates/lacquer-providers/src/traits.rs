// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider and tool wire-format trait definitions.
//!
//! A model provider is anything that can turn a [`CompletionRequest`] into a
//! [`CompletionResponse`]: a hosted API (Anthropic, OpenAI), a local model
//! runtime, or a test double. The agent conversation loop in `lacquer-core`
//! only ever talks to this trait, never to a specific vendor's wire format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A model provider capable of generating completions.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generates a completion for the given request.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Returns the provider's name, used for registry lookup and logging.
    fn name(&self) -> &str;

    /// Whether this provider resolves tool calls internally (a "local"
    /// provider in the sense of §4.8) rather than expecting the conversation
    /// loop to drive a multi-turn tool protocol.
    fn handles_tool_calls_internally(&self) -> bool {
        false
    }

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// A single message in a conversation, in the provider-agnostic wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
        }
    }

    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::User,
            content: results,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single content block, matching the tool-call wire format in §6: either
/// free text, a tool-use request from the model, or a tool result fed back
/// to the model. Preserved bit-exactly per the spec — do not add fields that
/// would change the JSON shape a structured-tool-calling provider expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// A tool descriptor the conversation loop advertises to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model name.
    pub model: String,

    /// Full running message list for this turn.
    pub messages: Vec<Message>,

    /// System prompt (optional).
    pub system: Option<String>,

    /// Temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,

    /// Tools available to the model this turn.
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,

    /// Additional provider-specific parameters.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CompletionRequest {
    /// Convenience constructor for a single-user-turn request with no tools,
    /// matching the shape most step kinds (e.g. a plain templated prompt)
    /// actually need.
    pub fn single_turn(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user_text(prompt)],
            system: None,
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
            extra: HashMap::new(),
        }
    }
}

/// Completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Ordered content blocks returned by the model.
    pub content: Vec<ContentBlock>,

    /// Model used.
    pub model: String,

    /// Tokens used.
    pub tokens_used: Option<TokenUsage>,

    /// Why the model stopped generating (`end_turn`, `tool_use`, ...).
    pub stop_reason: Option<String>,

    /// Additional metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CompletionResponse {
    /// Concatenates every `Text` block, in order — the response's
    /// "textual content" per §4.8 step 4.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Returns every tool-use block, in the order the model emitted them.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_uses(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Provider error.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Authentication error.
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded. Carries the `Retry-After` delay the provider
    /// sent back, if any, so the Resilience layer can honor it verbatim
    /// instead of computing its own backoff.
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: Option<Duration> },

    /// Invalid request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Provider-specific error.
    #[error("Provider error: {0}")]
    ProviderSpecific(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Timeout error.
    #[error("Request timed out")]
    Timeout,

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// Classifies whether the Resilience layer (§4.6/§7) should retry this
    /// error: rate limits and transient HTTP failures are retryable; auth
    /// and client (invalid request) errors are not.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimitExceeded { .. } | ProviderError::HttpError(_) | ProviderError::Timeout
        )
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
