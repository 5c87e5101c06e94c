// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent Conversation (C8): the multi-turn loop driving a model provider
//! through tool calls, with schema-guided output parsing. Modeled on the
//! teacher's single-call `execute_llm_step`, generalized from "one call"
//! to "loop until tool-free or turn cap" per §4.8.

use crate::context::ExecutionContext;
use crate::error::Error;
use crate::events::{Event, EventSender};
use crate::resilience::{resilient_call, CancellationToken, CircuitBreaker, RetryPolicy};
use crate::tools::ToolRegistry;
use crate::value::Value;
use lacquer_providers::{CompletionRequest, ContentBlock, LLMProvider, Message};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct AgentRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub allowed_tools: Vec<String>,
    pub initial_prompt: String,
}

/// Fixed sentinel header prepended before a fenced JSON schema when the
/// step declares an `outputs` shape (§4.8 "Inputs").
const OUTPUT_SCHEMA_SENTINEL: &str =
    "Respond with JSON matching this schema, inside a ```json fenced code block:";

pub fn with_output_schema_directive(prompt: &str, schema: &Value) -> String {
    format!(
        "{prompt}\n\n{OUTPUT_SCHEMA_SENTINEL}\n```json\n{}\n```",
        serde_json::to_string_pretty(&serde_json::Value::from(schema.clone())).unwrap_or_default()
    )
}

pub struct AgentConversation<'a> {
    pub provider: Arc<dyn LLMProvider>,
    pub tools: &'a ToolRegistry,
    pub retry_policy: &'a RetryPolicy,
    pub breaker: &'a CircuitBreaker,
    pub timeout: Duration,
    pub max_turns: usize,
    pub events: EventSender,
    pub run_id: String,
    pub step_id: String,
}

impl<'a> AgentConversation<'a> {
    pub async fn run(&self, ctx: &ExecutionContext, request: AgentRequest) -> Result<String, Error> {
        let tool_descriptors = self.tools.descriptors_for(&request.allowed_tools);

        if self.provider.handles_tool_calls_internally() {
            let completion_request = CompletionRequest {
                model: request.model.clone(),
                messages: vec![Message::user_text(request.initial_prompt)],
                system: request.system_prompt.clone(),
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                tools: tool_descriptors,
                extra: Default::default(),
            };
            let response = self.call_provider(ctx, completion_request).await?;
            return Ok(response.content.last().map(content_block_text).unwrap_or_default());
        }

        let mut messages = vec![Message::user_text(request.initial_prompt)];

        for _turn in 0..self.max_turns {
            let completion_request = CompletionRequest {
                model: request.model.clone(),
                messages: messages.clone(),
                system: request.system_prompt.clone(),
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                tools: tool_descriptors.clone(),
                extra: Default::default(),
            };

            let response = self.call_provider(ctx, completion_request).await?;

            if !response.has_tool_uses() {
                return Ok(response.text());
            }

            let tool_uses = response.tool_uses();
            let results = self.run_tool_calls(ctx, &tool_uses).await;

            messages.push(Message::assistant(response.content.clone()));
            messages.push(Message::tool_results(results));
        }

        Ok("Max conversation turns reached without completion".to_string())
    }

    async fn call_provider(
        &self,
        ctx: &ExecutionContext,
        completion_request: CompletionRequest,
    ) -> Result<lacquer_providers::CompletionResponse, Error> {
        let action_id = Uuid::new_v4().to_string();
        self.emit(Event::action_started(
            self.run_id.clone(),
            self.step_id.clone(),
            action_id.clone(),
            format!("calling {}", completion_request.model),
        ))
        .await;

        let result = resilient_call(
            self.retry_policy,
            self.breaker,
            ctx as &dyn CancellationToken,
            self.timeout,
            || async { Ok(self.provider.complete(completion_request.clone()).await?) },
        )
        .await;

        match &result {
            Ok(_) => {
                self.emit(Event::action_completed(self.run_id.clone(), self.step_id.clone(), action_id)).await;
            }
            Err(err) => {
                self.emit(Event::action_failed(self.run_id.clone(), self.step_id.clone(), action_id, err.to_string())).await;
            }
        }

        result
    }

    /// Dispatches every tool-use block from one turn concurrently, then
    /// reassembles results in the original tool-use-block order (§5, §9:
    /// an indexed buffer, not a completion-ordered queue).
    async fn run_tool_calls(&self, ctx: &ExecutionContext, tool_uses: &[(&str, &str, &serde_json::Value)]) -> Vec<ContentBlock> {
        let futures = tool_uses.iter().map(|(id, name, input)| {
            let id = id.to_string();
            let name = name.to_string();
            let input = Value::from((*input).clone());
            async move {
                let action_id = Uuid::new_v4().to_string();
                self.emit(Event::action_started(self.run_id.clone(), self.step_id.clone(), action_id.clone(), format!("tool {name}"))).await;
                let output = self.tools.dispatch(ctx, &name, input).await;
                if output.success {
                    self.emit(Event::action_completed(self.run_id.clone(), self.step_id.clone(), action_id)).await;
                } else {
                    self.emit(Event::action_failed(
                        self.run_id.clone(),
                        self.step_id.clone(),
                        action_id,
                        output.error.clone().unwrap_or_default(),
                    ))
                    .await;
                }
                let content = if output.success {
                    serde_json::to_string(&serde_json::Value::from(output.output)).unwrap_or_default()
                } else {
                    output.error.clone().unwrap_or_default()
                };
                ContentBlock::ToolResult { tool_use_id: id, content, is_error: !output.success }
            }
        });

        futures::future::join_all(futures).await
    }

    async fn emit(&self, event: Event) {
        let _ = self.events.send(event).await;
    }
}

fn content_block_text(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Text { text } => text.clone(),
        ContentBlock::ToolUse { name, .. } => format!("<tool_use:{name}>"),
        ContentBlock::ToolResult { content, .. } => content.clone(),
    }
}

static FENCE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)```").unwrap());
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// Parses a model response into the step's `output` mapping. When the step
/// declares no `outputs` schema, the raw response is wrapped verbatim
/// (§4.8 "Output parsing").
pub fn parse_output(response: &str, declares_outputs: bool) -> Value {
    let mut output = std::collections::BTreeMap::new();
    output.insert("output".to_string(), Value::String(response.to_string()));

    if !declares_outputs {
        return Value::Map(output);
    }

    match extract_json(response) {
        Some(parsed) => {
            output.insert("outputs".to_string(), Value::from(parsed));
        }
        None => {
            output.insert("outputs".to_string(), Value::map());
        }
    }

    Value::Map(output)
}

fn extract_json(response: &str) -> Option<serde_json::Value> {
    if let Some(caps) = FENCE_PATTERN.captures(response) {
        let body = caps.get(1).unwrap().as_str().trim();
        if let Ok(parsed) = serde_json::from_str(body) {
            return Some(parsed);
        }
        if let Some(repaired) = repair_json(body) {
            return Some(repaired);
        }
    }

    if let Some(candidate) = first_balanced_json(response) {
        if let Ok(parsed) = serde_json::from_str(&candidate) {
            return Some(parsed);
        }
        if let Some(repaired) = repair_json(&candidate) {
            return Some(repaired);
        }
    }

    None
}

fn repair_json(candidate: &str) -> Option<serde_json::Value> {
    let without_trailing_commas = TRAILING_COMMA.replace_all(candidate, "$1");
    let single_to_double = without_trailing_commas.replace('\'', "\"");
    serde_json::from_str(&single_to_double).ok()
}

/// Scans for the first balanced `{…}` or `[…]` span in `text`, ignoring
/// braces/brackets inside string literals.
fn first_balanced_json(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.iter().position(|&c| c == '{' || c == '[')?;
    let open = chars[start];
    let close = if open == '{' { '}' } else { ']' };

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for i in start..chars.len() {
        let c = chars[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(chars[start..=i].iter().collect());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_without_schema_wraps_raw_response() {
        let output = parse_output("hello", false);
        assert_eq!(output.get("output"), Some(&Value::String("hello".to_string())));
        assert!(output.get("outputs").is_none());
    }

    #[test]
    fn test_parse_output_extracts_fenced_json() {
        let response = "Here: ```json\n{\"x\":1,\"y\":[2,3]}\n```";
        let output = parse_output(response, true);
        let outputs = output.get("outputs").unwrap();
        assert_eq!(outputs.get("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_parse_output_extracts_balanced_braces_without_fence() {
        let response = "the answer is {\"ok\": true} thanks";
        let output = parse_output(response, true);
        let outputs = output.get("outputs").unwrap();
        assert_eq!(outputs.get("ok"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_parse_output_repairs_trailing_comma_and_single_quotes() {
        let response = "```json\n{'x': 1,}\n```";
        let output = parse_output(response, true);
        let outputs = output.get("outputs").unwrap();
        assert_eq!(outputs.get("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_parse_output_failure_falls_back_to_empty_outputs() {
        let output = parse_output("not json at all", true);
        assert_eq!(output.get("outputs"), Some(&Value::map()));
    }
}
