// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution Context (C5): the mutable spine of a run. Owns inputs,
//! mutable state, per-step results, the current step index, and
//! cancellation; forms a parent/child tree for nested `while`/`uses`
//! scopes (§9: explicit parent pointer, not cyclic references).

use crate::resolver::{nested_get, VariableResolver};
use crate::value::Value;
use crate::workflow::{StepResult, StepStatus, Workflow};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Cancellation is a flag shared by reference-counted handle between a
/// context and every child/grandchild it spawns (§9).
#[derive(Clone, Default)]
struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct ExecutionContext {
    pub run_id: String,
    workflow: Arc<Workflow>,
    inputs: RwLock<BTreeMap<String, Value>>,
    state: Arc<RwLock<BTreeMap<String, Value>>>,
    step_results: Mutex<BTreeMap<String, StepResult>>,
    current_step_index: AtomicUsize,
    total_steps: usize,
    start_time: DateTime<Utc>,
    environment: BTreeMap<String, String>,
    metadata: BTreeMap<String, Value>,
    cancellation: Cancellation,
    parent: Option<Arc<ExecutionContext>>,
}

impl ExecutionContext {
    pub fn new(run_id: impl Into<String>, workflow: Arc<Workflow>, inputs: BTreeMap<String, Value>, total_steps: usize) -> Self {
        let metadata = [
            ("name".to_string(), Value::from(workflow.metadata.name.clone().unwrap_or_default())),
            ("description".to_string(), Value::from(workflow.metadata.description.clone().unwrap_or_default())),
        ]
        .into_iter()
        .collect();

        Self {
            run_id: run_id.into(),
            state: Arc::new(RwLock::new(workflow.workflow.state.clone())),
            workflow,
            inputs: RwLock::new(inputs),
            step_results: Mutex::new(BTreeMap::new()),
            current_step_index: AtomicUsize::new(0),
            total_steps,
            start_time: Utc::now(),
            environment: std::env::vars().collect(),
            metadata,
            cancellation: Cancellation::default(),
            parent: None,
        }
    }

    /// Builds a child context over a nested step list (a `while` body). The
    /// child's `step_results` start empty and its `current_step_index`
    /// starts at zero; it shares `state` with its parent outright (the same
    /// `Arc<RwLock<_>>`, not a shadowing copy) since a `while` loop is still
    /// the same workflow run — `updates` applied inside the loop body must
    /// be visible at the top level once the loop exits (§8 "while-loop
    /// counter"). `inputs` still shadow-and-read-through, since nothing
    /// inside a loop body is expected to call `set_input`. Cancellation is
    /// shared by reference.
    pub fn new_child(self: &Arc<Self>, total_steps: usize) -> Arc<Self> {
        Arc::new(Self {
            run_id: self.run_id.clone(),
            workflow: self.workflow.clone(),
            inputs: RwLock::new(BTreeMap::new()),
            state: self.state.clone(),
            step_results: Mutex::new(BTreeMap::new()),
            current_step_index: AtomicUsize::new(0),
            total_steps,
            start_time: self.start_time,
            environment: self.environment.clone(),
            metadata: self.metadata.clone(),
            cancellation: self.cancellation.clone(),
            parent: Some(self.clone()),
        })
    }

    pub fn get_input(&self, key: &str) -> Option<Value> {
        if let Some(v) = self.inputs.read().get(key).cloned() {
            return Some(v);
        }
        self.parent.as_ref().and_then(|p| p.get_input(key))
    }

    pub fn set_input(&self, key: impl Into<String>, value: Value) {
        self.inputs.write().insert(key.into(), value);
    }

    fn all_inputs(&self) -> BTreeMap<String, Value> {
        let mut merged = self.parent.as_ref().map(|p| p.all_inputs()).unwrap_or_default();
        merged.extend(self.inputs.read().clone());
        merged
    }

    pub fn get_state(&self, key: &str) -> Option<Value> {
        if let Some(v) = self.state.read().get(key).cloned() {
            return Some(v);
        }
        self.parent.as_ref().and_then(|p| p.get_state(key))
    }

    fn all_state(&self) -> BTreeMap<String, Value> {
        let mut merged = self.parent.as_ref().map(|p| p.all_state()).unwrap_or_default();
        merged.extend(self.state.read().clone());
        merged
    }

    /// Bulk upsert: merges `updates` into `state`, overwriting matching
    /// keys.
    pub fn update_state(&self, updates: BTreeMap<String, Value>) {
        self.state.write().extend(updates);
    }

    pub fn get_step_result(&self, step_id: &str) -> Option<StepResult> {
        if let Some(r) = self.step_results.lock().get(step_id).cloned() {
            return Some(r);
        }
        self.parent.as_ref().and_then(|p| p.get_step_result(step_id))
    }

    pub fn set_step_result(&self, result: StepResult) {
        self.step_results.lock().insert(result.step_id.clone(), result);
    }

    pub fn any_step_failed(&self) -> bool {
        self.step_results.lock().values().any(|r| r.status == StepStatus::Failed)
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index.load(Ordering::SeqCst)
    }

    pub fn increment_current_step(&self) {
        self.current_step_index.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_current_step_index(&self, index: usize) {
        self.current_step_index.store(index, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Assembles an `ExecutionResult` from the known step results plus
    /// rendered workflow outputs (the caller supplies already-rendered
    /// outputs since rendering needs the scheduler's template plumbing).
    pub fn get_execution_summary(
        &self,
        status: &str,
        outputs: Value,
        error: Option<String>,
    ) -> crate::workflow::ExecutionResult {
        let step_results: Vec<StepResult> = self.step_results.lock().values().cloned().collect();
        let end_time = Utc::now();
        crate::workflow::ExecutionResult {
            workflow_file: None,
            run_id: self.run_id.clone(),
            status: status.to_string(),
            start_time: self.start_time,
            end_time,
            duration: (end_time - self.start_time).to_std().unwrap_or_default(),
            steps_total: self.total_steps,
            step_results,
            inputs: Value::Map(self.all_inputs()),
            outputs,
            final_state: Value::Map(self.all_state()),
            error,
            token_usage: None,
        }
    }
}

impl VariableResolver for ExecutionContext {
    fn resolve(&self, path: &[String]) -> Result<Value, crate::error::Error> {
        use crate::error::Error;

        let root = path.first().map(String::as_str).ok_or_else(|| Error::Scope { scope: String::new() })?;

        match root {
            "inputs" => {
                if path.len() == 1 {
                    return Ok(Value::Map(self.all_inputs()));
                }
                let key = &path[1];
                let value = self.get_input(key).ok_or_else(|| Error::not_found(format!("inputs.{key}")))?;
                Ok(nested_get(&value, &path[2..]))
            }
            "state" => {
                if path.len() == 1 {
                    return Ok(Value::Map(self.all_state()));
                }
                let key = &path[1];
                let value = self.get_state(key).ok_or_else(|| Error::not_found(format!("state.{key}")))?;
                Ok(nested_get(&value, &path[2..]))
            }
            "steps" => {
                let step_id = path.get(1).ok_or_else(|| Error::not_found("steps"))?;
                let result = self.get_step_result(step_id).ok_or_else(|| Error::not_found(format!("steps.{step_id}")))?;
                Ok(nested_get(&result.output, &path[2..]))
            }
            "metadata" => {
                if path.len() == 1 {
                    return Ok(Value::Map(self.metadata.clone()));
                }
                let key = &path[1];
                let value = self.metadata.get(key).cloned().ok_or_else(|| Error::not_found(format!("metadata.{key}")))?;
                Ok(nested_get(&value, &path[2..]))
            }
            "env" => {
                let key = match path.get(1) {
                    Some(k) => k,
                    None => return Ok(Value::Map(self.environment.iter().map(|(k, v)| (k.clone(), Value::from(v.clone()))).collect())),
                };
                let value = self.environment.get(key).cloned().unwrap_or_default();
                Ok(Value::String(value))
            }
            "workflow" => {
                let field = path.get(1).map(String::as_str).ok_or_else(|| Error::not_found("workflow"))?;
                let value = match field {
                    "run_id" => Value::String(self.run_id.clone()),
                    "start_time" => Value::String(self.start_time.to_rfc3339()),
                    "step_index" => Value::Number((self.current_step_index() + 1) as f64),
                    "total_steps" => Value::Number(self.total_steps as f64),
                    "completed_at" => Value::String(Utc::now().to_rfc3339()),
                    other => return Err(Error::not_found(format!("workflow.{other}"))),
                };
                Ok(nested_get(&value, &path[2..]))
            }
            other => Err(Error::Scope { scope: other.to_string() }),
        }
    }

    fn is_cancelled(&self) -> bool {
        ExecutionContext::is_cancelled(self)
    }

    fn any_step_failed(&self) -> bool {
        ExecutionContext::any_step_failed(self)
    }
}

impl crate::resilience::CancellationToken for ExecutionContext {
    fn is_cancelled(&self) -> bool {
        ExecutionContext::is_cancelled(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{StepStatus, WorkflowBody, WorkflowMetadata};
    use std::time::Duration;

    fn blank_workflow() -> Arc<Workflow> {
        Arc::new(Workflow {
            version: "1".to_string(),
            metadata: WorkflowMetadata::default(),
            inputs: BTreeMap::new(),
            agents: BTreeMap::new(),
            workflow: WorkflowBody { state: BTreeMap::new(), steps: Vec::new(), outputs: BTreeMap::new() },
        })
    }

    #[test]
    fn test_set_and_resolve_input() {
        let ctx = ExecutionContext::new("run-1", blank_workflow(), BTreeMap::new(), 1);
        ctx.set_input("count", Value::Number(3.0));
        let resolved = ctx.resolve(&["inputs".to_string(), "count".to_string()]).unwrap();
        assert_eq!(resolved, Value::Number(3.0));
    }

    #[test]
    fn test_missing_input_is_not_found() {
        let ctx = ExecutionContext::new("run-1", blank_workflow(), BTreeMap::new(), 1);
        let result = ctx.resolve(&["inputs".to_string(), "missing".to_string()]);
        assert!(matches!(result, Err(crate::error::Error::NotFound { .. })));
    }

    #[test]
    fn test_child_reads_through_to_parent_state() {
        let ctx = Arc::new(ExecutionContext::new("run-1", blank_workflow(), BTreeMap::new(), 1));
        ctx.update_state([("counter".to_string(), Value::Number(0.0))].into_iter().collect());
        let child = ctx.new_child(2);
        assert_eq!(child.get_state("counter"), Some(Value::Number(0.0)));
    }

    #[test]
    fn test_cancellation_shared_with_child() {
        let ctx = Arc::new(ExecutionContext::new("run-1", blank_workflow(), BTreeMap::new(), 1));
        let child = ctx.new_child(1);
        ctx.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_step_result_round_trip() {
        let ctx = ExecutionContext::new("run-1", blank_workflow(), BTreeMap::new(), 1);
        let mut result = StepResult::pending("s1", Utc::now());
        result.status = StepStatus::Completed;
        result.duration = Duration::from_millis(10);
        ctx.set_step_result(result);
        assert!(ctx.get_step_result("s1").is_some());
        assert!(!ctx.any_step_failed());
    }
}
