// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool Registry & Dispatcher (C7): a named, schema-typed capability the
//! Agent Conversation loop may call on the model's request. Modeled after
//! `lacquer-providers::LLMProvider`'s trait shape, applied to tool calls.

use crate::context::ExecutionContext;
use crate::value::Value;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of a single tool call. A tool failure never propagates as an
/// `Error`; the dispatcher turns it into this struct so the conversation
/// loop can feed an `is_error` tool-result back to the model (§7).
pub struct ToolOutput {
    pub success: bool,
    pub output: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(output: Value) -> Self {
        Self { success: true, output, error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, output: Value::Null, error: Some(message.into()) }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// A structural, `Value`-shaped description of the tool's expected
    /// input, surfaced to the model as part of its tool descriptor.
    fn input_schema(&self) -> Value;

    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> ToolOutput;
}

/// `HashMap<String, Arc<dyn Tool>>` behind the same `parking_lot` guard
/// style as the Execution Context; registration happens once during
/// executor construction (mirrors the teacher's `WorkflowExecutor::with_provider`
/// builder, generalized to `with_tool`).
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(self, tool: Arc<dyn Tool>) -> Self {
        self.tools.write().insert(tool.name().to_string(), tool);
        self
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.write().insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// The subset of registered tools an Agent definition is allowed to
    /// see, as descriptors for the provider request.
    pub fn descriptors_for(&self, allowed: &[String]) -> Vec<lacquer_providers::ToolDescriptor> {
        let tools = self.tools.read();
        allowed
            .iter()
            .filter_map(|name| tools.get(name))
            .map(|tool| lacquer_providers::ToolDescriptor {
                name: tool.name().to_string(),
                description: String::new(),
                input_schema: tool.input_schema().into(),
            })
            .collect()
    }

    pub async fn dispatch(&self, ctx: &ExecutionContext, name: &str, input: Value) -> ToolOutput {
        match self.get(name) {
            Some(tool) => tool.execute(ctx, input).await,
            None => ToolOutput::failure(format!("unknown tool '{name}'")),
        }
    }
}
