// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core execution engine for Lacquer: a declarative AI workflow format.
//!
//! A workflow (§3) is a YAML document naming `agents`, a sequential list of
//! `steps`, shared `state`, and an `outputs` mapping. The [`scheduler`]
//! dispatches each step in definition order against an [`ExecutionContext`],
//! resolving `${{ … }}` templates (the [`expr`]/[`template`] pair) against
//! [`VariableResolver`]-shaped roots, driving multi-turn model conversations
//! ([`agent`]) through [`resilience`]-wrapped provider calls, and reporting
//! progress on an [`events`] channel.

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod expr;
pub mod resilience;
pub mod resolver;
pub mod scheduler;
pub mod template;
pub mod tools;
pub mod value;
pub mod workflow;

pub use config::OrchestratorConfig;
pub use context::ExecutionContext;
pub use error::{Error, Result};
pub use resolver::VariableResolver;
pub use scheduler::WorkflowExecutor;
pub use tools::{Tool, ToolOutput, ToolRegistry};
pub use value::Value;
pub use workflow::{ExecutionResult, Step, StepKind, StepResult, StepStatus, Workflow};
