// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI provider implementation.

use crate::traits::{
    CompletionRequest, CompletionResponse, ContentBlock as CoreContentBlock, LLMProvider, Message,
    MessageRole, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI API provider.
pub struct OpenAIProvider {
    /// HTTP client.
    client: Client,
    /// API key.
    api_key: String,
    /// API base URL.
    base_url: String,
}

/// OpenAI chat completion request.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
    #[serde(default)]
    stream: bool,
}

/// Chat message, OpenAI's flat-content-plus-tool_calls shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    tool_calls: Vec<ChatToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: ChatToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: ChatToolFunction,
}

#[derive(Debug, Serialize)]
struct ChatToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// OpenAI chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[allow(dead_code)]
    id: String,
    choices: Vec<Choice>,
    usage: Usage,
}

/// Completion choice.
#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

/// Token usage information.
#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    #[allow(dead_code)]
    total_tokens: u32,
}

/// OpenAI error response.
#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
    #[allow(dead_code)]
    code: Option<String>,
}

impl OpenAIProvider {
    /// Converts a reqwest error to a ProviderError.
    fn convert_reqwest_error(err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_status() {
            if let Some(status) = err.status() {
                if status == 401 || status == 403 {
                    ProviderError::AuthError(err.to_string())
                } else if status == 429 {
                    ProviderError::RateLimitExceeded { retry_after: None }
                } else {
                    ProviderError::HttpError(err.to_string())
                }
            } else {
                ProviderError::HttpError(err.to_string())
            }
        } else {
            ProviderError::HttpError(err.to_string())
        }
    }

    /// Creates a new OpenAI provider.
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenAI API key
    ///
    /// # Example
    ///
    /// ```no_run
    /// use lacquer_providers::OpenAIProvider;
    ///
    /// let provider = OpenAIProvider::new("sk-...".to_string());
    /// ```
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".to_string())
    }

    /// Creates a new OpenAI provider with a custom base URL.
    ///
    /// Useful for testing or using OpenAI-compatible APIs.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url,
        }
    }

    /// Creates a new OpenAI provider from environment variable.
    ///
    /// Reads the API key from `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::InvalidRequest("OPENAI_API_KEY environment variable not set".to_string()))?;

        Ok(Self::new(api_key))
    }

    /// Converts a provider completion request to OpenAI format.
    fn to_openai_request(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        let mut messages = Vec::new();

        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }

        for message in &request.messages {
            messages.extend(to_chat_messages(message));
        }

        let tools = request
            .tools
            .iter()
            .map(|t| ChatTool {
                tool_type: "function".to_string(),
                function: ChatToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                },
            })
            .collect();

        ChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools,
            stream: false,
        }
    }

    /// Parses an error response from OpenAI. `retry_after` is the
    /// `Retry-After` response header, if any, extracted by the caller before
    /// the response body is consumed.
    fn parse_error(&self, status: StatusCode, body: &str, retry_after: Option<Duration>) -> ProviderError {
        // Try to parse as OpenAI error format
        if let Ok(error_response) = serde_json::from_str::<OpenAIErrorResponse>(body) {
            let error = error_response.error;

            // Detect rate limiting
            if status == StatusCode::TOO_MANY_REQUESTS || error.error_type == "rate_limit_exceeded" {
                return ProviderError::RateLimitExceeded { retry_after };
            }

            // Detect authentication errors
            if status == StatusCode::UNAUTHORIZED || error.error_type == "invalid_api_key" {
                return ProviderError::AuthError(error.message);
            }

            // Generic API error
            return ProviderError::ProviderSpecific(format!(
                "[{}] {}: {}",
                status.as_u16(),
                error.error_type,
                error.message
            ));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return ProviderError::RateLimitExceeded { retry_after };
        }

        // Fallback to generic error
        ProviderError::HttpError(format!("[{}] {}", status.as_u16(), body))
    }

    /// Parses the `Retry-After` response header (delta-seconds form) into a
    /// `Duration`, if present and well-formed.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

fn to_chat_messages(message: &Message) -> Vec<ChatMessage> {
    match message.role {
        MessageRole::User | MessageRole::System => {
            // A user turn may carry tool results, which OpenAI expects as
            // separate "tool"-role messages rather than content blocks.
            let text: String = message
                .content
                .iter()
                .filter_map(|b| match b {
                    CoreContentBlock::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .collect();

            let mut out = Vec::new();
            if !text.is_empty() {
                out.push(ChatMessage {
                    role: "user".to_string(),
                    content: Some(text),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                });
            }

            for block in &message.content {
                if let CoreContentBlock::ToolResult {
                    tool_use_id, content, ..
                } = block
                {
                    out.push(ChatMessage {
                        role: "tool".to_string(),
                        content: Some(content.clone()),
                        tool_calls: Vec::new(),
                        tool_call_id: Some(tool_use_id.clone()),
                    });
                }
            }

            if out.is_empty() {
                out.push(ChatMessage {
                    role: "user".to_string(),
                    content: Some(String::new()),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                });
            }

            out
        }
        MessageRole::Assistant => {
            let mut text = String::new();
            let mut tool_calls = Vec::new();

            for block in &message.content {
                match block {
                    CoreContentBlock::Text { text: t } => text.push_str(t),
                    CoreContentBlock::ToolUse { id, name, input } => tool_calls.push(ChatToolCall {
                        id: id.clone(),
                        call_type: "function".to_string(),
                        function: ChatToolCallFunction {
                            name: name.clone(),
                            arguments: input.to_string(),
                        },
                    }),
                    CoreContentBlock::ToolResult { .. } => {}
                }
            }

            vec![ChatMessage {
                role: "assistant".to_string(),
                content: if text.is_empty() { None } else { Some(text) },
                tool_calls,
                tool_call_id: None,
            }]
        }
    }
}

fn from_chat_message(message: ChatMessage) -> Vec<CoreContentBlock> {
    let mut blocks = Vec::new();

    if let Some(content) = message.content {
        if !content.is_empty() {
            blocks.push(CoreContentBlock::Text { text: content });
        }
    }

    for call in message.tool_calls {
        let input = serde_json::from_str(&call.function.arguments)
            .unwrap_or_else(|_| serde_json::json!({ "raw": call.function.arguments }));
        blocks.push(CoreContentBlock::ToolUse {
            id: call.id,
            name: call.function.name,
            input,
        });
    }

    blocks
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let openai_request = self.to_openai_request(&request);

        // Make API request
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&openai_request)
            .send()
            .await
            .map_err(Self::convert_reqwest_error)?;

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("Failed to read response body"));

        // Handle errors
        if !status.is_success() {
            return Err(self.parse_error(status, &body, retry_after));
        }

        // Parse success response
        let completion: ChatCompletionResponse = serde_json::from_str(&body)?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::SerializationError("No choices in response".to_string()))?;

        let mut metadata = std::collections::HashMap::new();
        if let Some(finish_reason) = &choice.finish_reason {
            metadata.insert("finish_reason".to_string(), serde_json::json!(finish_reason));
        }

        let stop_reason = choice.finish_reason.clone();

        Ok(CompletionResponse {
            content: from_chat_message(choice.message),
            model: request.model.clone(),
            tokens_used: Some(TokenUsage {
                input_tokens: completion.usage.prompt_tokens,
                output_tokens: completion.usage.completion_tokens,
            }),
            stop_reason,
            metadata,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        // Simple health check: list models endpoint
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(Self::convert_reqwest_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::HttpError(format!(
                "Health check failed with status {}",
                response.status().as_u16()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::new("test-key".to_string());
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_provider_with_custom_base_url() {
        let provider =
            OpenAIProvider::with_base_url("test-key".to_string(), "http://localhost:8080".to_string());
        assert_eq!(provider.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_to_openai_request() {
        let provider = OpenAIProvider::new("test-key".to_string());

        let request = CompletionRequest {
            model: "gpt-4".to_string(),
            messages: vec![Message::user_text("Hello, world!")],
            system: Some("You are a helpful assistant".to_string()),
            temperature: Some(0.7),
            max_tokens: Some(100),
            tools: Vec::new(),
            extra: std::collections::HashMap::new(),
        };

        let openai_req = provider.to_openai_request(&request);

        assert_eq!(openai_req.model, "gpt-4");
        assert_eq!(openai_req.messages.len(), 2);
        assert_eq!(openai_req.messages[0].role, "system");
        assert_eq!(openai_req.messages[1].role, "user");
        assert_eq!(openai_req.messages[1].content, Some("Hello, world!".to_string()));
        assert_eq!(openai_req.temperature, Some(0.7));
        assert_eq!(openai_req.max_tokens, Some(100));
    }

    #[test]
    fn test_to_openai_request_with_tool_result() {
        let provider = OpenAIProvider::new("test-key".to_string());

        let request = CompletionRequest {
            model: "gpt-4".to_string(),
            messages: vec![
                Message::user_text("What's the weather?"),
                Message::assistant(vec![CoreContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "get_weather".to_string(),
                    input: serde_json::json!({"city": "SF"}),
                }]),
                Message::tool_results(vec![CoreContentBlock::ToolResult {
                    tool_use_id: "call_1".to_string(),
                    content: "72F, sunny".to_string(),
                    is_error: false,
                }]),
            ],
            system: None,
            temperature: None,
            max_tokens: Some(100),
            tools: Vec::new(),
            extra: std::collections::HashMap::new(),
        };

        let openai_req = provider.to_openai_request(&request);
        let tool_msg = openai_req.messages.iter().find(|m| m.role == "tool").unwrap();
        assert_eq!(tool_msg.tool_call_id, Some("call_1".to_string()));

        let assistant_msg = openai_req.messages.iter().find(|m| m.role == "assistant").unwrap();
        assert_eq!(assistant_msg.tool_calls.len(), 1);
        assert_eq!(assistant_msg.tool_calls[0].function.name, "get_weather");
    }

    #[test]
    fn test_parse_rate_limit_error() {
        let provider = OpenAIProvider::new("test-key".to_string());

        let error_json = r#"{
            "error": {
                "message": "Rate limit exceeded",
                "type": "rate_limit_exceeded",
                "code": "rate_limit_exceeded"
            }
        }"#;

        let error = provider.parse_error(StatusCode::TOO_MANY_REQUESTS, error_json, Some(Duration::from_secs(10)));

        match error {
            ProviderError::RateLimitExceeded { retry_after } => assert_eq!(retry_after, Some(Duration::from_secs(10))),
            _ => panic!("Expected RateLimitExceeded error"),
        }
    }

    #[test]
    fn test_parse_auth_error() {
        let provider = OpenAIProvider::new("test-key".to_string());

        let error_json = r#"{
            "error": {
                "message": "Invalid API key",
                "type": "invalid_api_key",
                "code": "invalid_api_key"
            }
        }"#;

        let error = provider.parse_error(StatusCode::UNAUTHORIZED, error_json, None);

        match error {
            ProviderError::AuthError(msg) => assert_eq!(msg, "Invalid API key"),
            _ => panic!("Expected AuthError"),
        }
    }
}
