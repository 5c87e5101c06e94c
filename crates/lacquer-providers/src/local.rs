// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A deterministic, in-process provider for tests and offline workflow runs.
//!
//! Production code registers vendor providers only when their API key is
//! present (see `lacquer-cli`'s `from_env`-gated registration). `LocalProvider`
//! fills the same slot when no key is configured, or when a workflow is run
//! with `--offline`: it returns scripted responses instead of calling out to
//! a vendor API.

use crate::traits::{CompletionRequest, CompletionResponse, ContentBlock, LLMProvider, ProviderError, TokenUsage};
use async_trait::async_trait;
use std::sync::Mutex;

/// Replays a fixed queue of responses, one per call, and then falls back to
/// echoing the last user message as plain text.
pub struct LocalProvider {
    name: String,
    scripted: Mutex<Vec<CompletionResponse>>,
}

impl LocalProvider {
    /// Creates a provider that always echoes the caller's last user message.
    pub fn echo() -> Self {
        Self {
            name: "local".to_string(),
            scripted: Mutex::new(Vec::new()),
        }
    }

    /// Creates a provider that replays `responses` in order, one per call.
    pub fn scripted(responses: Vec<CompletionResponse>) -> Self {
        Self {
            name: "local".to_string(),
            scripted: Mutex::new(responses),
        }
    }

    /// Pushes one more scripted response onto the back of the queue.
    pub fn push(&self, response: CompletionResponse) {
        self.scripted.lock().unwrap().push(response);
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::echo()
    }
}

#[async_trait]
impl LLMProvider for LocalProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        {
            let mut queue = self.scripted.lock().unwrap();
            if !queue.is_empty() {
                return Ok(queue.remove(0));
            }
        }

        let last_user_text = request
            .messages
            .iter()
            .rev()
            .find_map(|m| {
                m.content.iter().find_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.clone()),
                    _ => None,
                })
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: vec![ContentBlock::Text {
                text: format!("echo: {last_user_text}"),
            }],
            model: request.model,
            tokens_used: Some(TokenUsage {
                input_tokens: last_user_text.split_whitespace().count() as u32,
                output_tokens: 0,
            }),
            stop_reason: Some("end_turn".to_string()),
            metadata: std::collections::HashMap::new(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn handles_tool_calls_internally(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Message;

    #[tokio::test]
    async fn test_echo_provider() {
        let provider = LocalProvider::echo();
        let response = provider
            .complete(CompletionRequest::single_turn("local-echo", "hello there"))
            .await
            .unwrap();
        assert_eq!(response.text(), "echo: hello there");
    }

    #[tokio::test]
    async fn test_scripted_provider_replays_in_order() {
        let first = CompletionResponse {
            content: vec![ContentBlock::Text {
                text: "first".to_string(),
            }],
            model: "local".to_string(),
            tokens_used: None,
            stop_reason: None,
            metadata: std::collections::HashMap::new(),
        };
        let second = CompletionResponse {
            content: vec![ContentBlock::Text {
                text: "second".to_string(),
            }],
            model: "local".to_string(),
            tokens_used: None,
            stop_reason: None,
            metadata: std::collections::HashMap::new(),
        };

        let provider = LocalProvider::scripted(vec![first, second]);

        let r1 = provider
            .complete(CompletionRequest::single_turn("local", "a"))
            .await
            .unwrap();
        assert_eq!(r1.text(), "first");

        let r2 = provider
            .complete(CompletionRequest::single_turn("local", "b"))
            .await
            .unwrap();
        assert_eq!(r2.text(), "second");

        let r3 = provider
            .complete(CompletionRequest {
                messages: vec![Message::user_text("fallback")],
                ..CompletionRequest::single_turn("local", "c")
            })
            .await
            .unwrap();
        assert_eq!(r3.text(), "echo: fallback");
    }
}
