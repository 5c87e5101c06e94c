// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model provider integrations for the Lacquer workflow engine.

pub mod anthropic;
pub mod local;
pub mod openai;
pub mod traits;

// Re-exports
pub use anthropic::AnthropicProvider;
pub use local::LocalProvider;
pub use openai::OpenAIProvider;
pub use traits::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMProvider, Message, MessageRole,
    ProviderError, TokenUsage, ToolDescriptor,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
