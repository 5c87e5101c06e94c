// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workflow data model (§3): the immutable tree delivered by the YAML
//! parser, plus the mutable `StepResult`/`StepStatus` pair the scheduler
//! writes into the Execution Context as it dispatches each step.

use crate::value::Value;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// A parsed workflow. Read-only for the duration of a run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Workflow {
    pub version: String,
    #[serde(default)]
    pub metadata: WorkflowMetadata,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputSpec>,
    #[serde(default)]
    pub agents: BTreeMap<String, Agent>,
    pub workflow: WorkflowBody,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct WorkflowMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputSpec {
    #[serde(default)]
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkflowBody {
    #[serde(default)]
    pub state: BTreeMap<String, Value>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

/// A named model-provider configuration an `agent` step dispatches
/// against.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Agent {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// A single executable unit in the workflow.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(flatten)]
    pub kind: StepKind,
    #[serde(default)]
    pub with: BTreeMap<String, Value>,
    pub outputs: Option<Value>,
    pub skip_if: Option<String>,
    pub condition: Option<String>,
    #[serde(default)]
    pub updates: BTreeMap<String, Value>,
    pub timeout_seconds: Option<u64>,
}

/// Exactly one of these is present on a `Step`, selected by the `kind` tag
/// the YAML grammar attaches (out of scope here; see §6 for the contract).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    Agent { agent: String },
    Uses { uses: String },
    Run { run: String, runtime: Option<String> },
    Container { container: String, command: Option<Vec<String>> },
    While { r#while: String, steps: Vec<Step> },
}

/// Execution status for a step (§3 Invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Skipped,
    Failed,
}

/// Per-step execution record, created `Pending` at dispatch and mutated to
/// a terminal status on completion.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_duration", deserialize_with = "deserialize_duration")]
    pub duration: Duration,
    pub response: String,
    pub output: Value,
    pub error: Option<String>,
    pub token_usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl StepResult {
    pub fn pending(step_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Running,
            start_time,
            end_time: None,
            duration: Duration::default(),
            response: String::new(),
            output: Value::map(),
            error: None,
            token_usage: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, StepStatus::Completed | StepStatus::Skipped | StepStatus::Failed)
    }
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// The final, produced record of a completed (or failed) run (§6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecutionResult {
    pub workflow_file: Option<String>,
    pub run_id: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(serialize_with = "serialize_duration", deserialize_with = "deserialize_duration")]
    pub duration: Duration,
    pub steps_total: usize,
    pub step_results: Vec<StepResult>,
    pub inputs: Value,
    pub outputs: Value,
    pub final_state: Value,
    pub error: Option<String>,
    pub token_usage: Option<TokenUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_kind_tag_roundtrips() {
        let yaml = r#"
id: greet
kind: agent
agent: greeter
with:
  name: world
"#;
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.id, "greet");
        assert!(matches!(step.kind, StepKind::Agent { agent } if agent == "greeter"));
    }

    #[test]
    fn test_step_result_starts_running_with_empty_output() {
        let result = StepResult::pending("s1", Utc::now());
        assert_eq!(result.status, StepStatus::Running);
        assert!(!result.is_terminal());
    }
}
