// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step Scheduler (C9): strict sequential, definition-order dispatch. No
//! DAG, no `depends_on`, no concurrent step fan-out — a deliberate
//! simplification of the teacher's `WorkflowExecutor` (§4.9 Non-goals).

use crate::context::ExecutionContext;
use crate::error::Error;
use crate::events::{Event, EventSender};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
use crate::resolver::VariableResolver;
use crate::tools::{Tool, ToolRegistry};
use crate::value::Value;
use crate::workflow::{Step, StepKind, StepResult, StepStatus, Workflow};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lacquer_providers::LLMProvider;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Drives a single workflow (or, recursively via a `uses` step, a tree of
/// them) against a fixed set of registered providers and tools. Cheap to
/// clone: every field is an `Arc`-backed handle, mirroring the teacher's
/// `WorkflowExecutor` sharing pattern so a child workflow's executor is
/// just `self.clone()` with a different `workflow`.
#[derive(Clone)]
pub struct WorkflowExecutor {
    workflow: Arc<Workflow>,
    config: Arc<crate::config::OrchestratorConfig>,
    providers: Arc<DashMap<String, Arc<dyn LLMProvider>>>,
    breakers: Arc<DashMap<String, Arc<CircuitBreaker>>>,
    tools: Arc<ToolRegistry>,
    events: EventSender,
}

/// What `execute_step` accomplished, short of a fatal `Error`.
enum StepOutcome {
    Completed,
    Skipped,
}

impl WorkflowExecutor {
    /// Builds an executor for `workflow`, returning the receiving half of
    /// its event channel so the caller can attach a sink (§4.10).
    pub fn new(workflow: Workflow, config: crate::config::OrchestratorConfig) -> (Self, tokio::sync::mpsc::Receiver<Event>) {
        let (events, receiver) = crate::events::channel(config.event_channel_capacity);
        let executor = Self {
            workflow: Arc::new(workflow),
            config: Arc::new(config),
            providers: Arc::new(DashMap::new()),
            breakers: Arc::new(DashMap::new()),
            tools: Arc::new(ToolRegistry::new()),
            events,
        };
        (executor, receiver)
    }

    pub fn with_provider(self, name: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    pub fn with_tool(self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    fn breaker_for(&self, provider: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(provider) {
            return existing.clone();
        }
        self.breakers
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.default_circuit_breaker.clone())))
            .clone()
    }

    async fn emit(&self, event: Event) {
        let _ = self.events.send(event).await;
    }

    /// Entry point (§4.9): runs every top-level step in order, then renders
    /// `workflow.outputs` against the final context.
    ///
    /// A cancelled run returns `Err(Error::Cancelled)` directly, emitting
    /// neither `WorkflowCompleted` nor `WorkflowFailed` — the caller is
    /// expected to have requested the cancellation and already knows why
    /// (§9).
    pub async fn execute(&self, inputs: BTreeMap<String, Value>) -> Result<crate::workflow::ExecutionResult, Error> {
        let run_id = Uuid::new_v4().to_string();
        let total_steps = self.workflow.workflow.steps.len();
        let ctx = Arc::new(ExecutionContext::new(run_id.clone(), self.workflow.clone(), inputs, total_steps));

        self.emit(Event::workflow_started(run_id.clone())).await;

        if let Err(e) = self.execute_steps(&ctx, &self.workflow.workflow.steps).await {
            return Ok(ctx.get_execution_summary("failed", Value::map(), Some(e.to_string())));
        }

        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut outputs = BTreeMap::new();
        for (name, template) in &self.workflow.workflow.outputs {
            match crate::template::render(template, ctx.as_ref()) {
                Ok(rendered) => {
                    outputs.insert(name.clone(), rendered);
                }
                Err(e) => {
                    self.emit(Event::workflow_failed(run_id.clone(), e.to_string())).await;
                    return Ok(ctx.get_execution_summary("failed", Value::map(), Some(e.to_string())));
                }
            }
        }

        self.emit(Event::workflow_completed(run_id.clone())).await;
        Ok(ctx.get_execution_summary("completed", Value::Map(outputs), None))
    }

    /// Runs `steps` against `ctx` in definition order. Stops (without
    /// marking anything failed) the moment `ctx.is_cancelled()` becomes
    /// true; stops and propagates the first step error, having already
    /// emitted `StepFailed`/`WorkflowFailed` for it.
    async fn execute_steps(&self, ctx: &Arc<ExecutionContext>, steps: &[Step]) -> Result<(), Error> {
        for (i, step) in steps.iter().enumerate() {
            if ctx.is_cancelled() {
                return Ok(());
            }
            ctx.set_current_step_index(i);

            let started = Instant::now();
            match self.execute_step(ctx, step).await {
                Ok(StepOutcome::Skipped) => continue,
                Ok(StepOutcome::Completed) => {
                    self.emit(Event::step_completed(ctx.run_id.clone(), step.id.clone(), started.elapsed())).await;
                }
                Err(e) => {
                    self.mark_failed(ctx, step, &e);
                    self.emit(Event::step_failed(ctx.run_id.clone(), step.id.clone(), e.to_string())).await;
                    self.emit(Event::workflow_failed(ctx.run_id.clone(), e.to_string())).await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Dispatches one step under a panic guard: the body runs on its own
    /// task so a panic surfaces as a `JoinError` instead of taking the
    /// whole run down, mirroring the teacher's per-step `tokio::spawn`
    /// isolation boundary.
    async fn execute_step(&self, ctx: &Arc<ExecutionContext>, step: &Step) -> Result<StepOutcome, Error> {
        let executor = self.clone();
        let ctx = ctx.clone();
        let step = step.clone();

        let span = tracing::info_span!("step", step.id = %step.id, step.kind = step_kind_name(&step.kind));
        let handle = tokio::spawn(async move {
            use tracing::Instrument;
            executor.execute_step_body(&ctx, &step).instrument(span).await
        });

        match handle.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => Err(Error::runtime("step panicked")),
            Err(join_err) => Err(Error::runtime(join_err.to_string())),
        }
    }

    async fn execute_step_body(&self, ctx: &Arc<ExecutionContext>, step: &Step) -> Result<StepOutcome, Error> {
        let start_time = Utc::now();

        if let Some(skip_if) = &step.skip_if {
            if crate::template::render(skip_if, ctx.as_ref())?.to_bool() {
                self.mark_skipped(ctx, step, start_time);
                return Ok(StepOutcome::Skipped);
            }
        } else if let Some(condition) = &step.condition {
            if !crate::template::render(condition, ctx.as_ref())?.to_bool() {
                self.mark_skipped(ctx, step, start_time);
                return Ok(StepOutcome::Skipped);
            }
        }

        self.emit(Event::step_started(ctx.run_id.clone(), step.id.clone(), ctx.current_step_index())).await;

        let (output, response) = self.dispatch_step(ctx, step).await?;

        // Open Question resolution (see DESIGN.md): commit the output and
        // flip the step to Completed before rendering `updates`, so an
        // update expression referencing `steps.<this step>.output` sees
        // its own step's freshly produced value.
        let end_time = Utc::now();
        let mut result = StepResult::pending(step.id.clone(), start_time);
        result.status = StepStatus::Completed;
        result.end_time = Some(end_time);
        result.duration = (end_time - start_time).to_std().unwrap_or_default();
        result.response = response;
        result.output = output;
        ctx.set_step_result(result);

        let mut rendered_updates = BTreeMap::new();
        for (key, template_value) in &step.updates {
            let rendered = match render_value_recursive(template_value, ctx.as_ref()) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(step.id = %step.id, key = %key, error = %e, "update render failed, keeping raw value");
                    template_value.clone()
                }
            };
            rendered_updates.insert(key.clone(), rendered);
        }
        ctx.update_state(rendered_updates);

        Ok(StepOutcome::Completed)
    }

    fn mark_skipped(&self, ctx: &Arc<ExecutionContext>, step: &Step, start_time: DateTime<Utc>) {
        let mut result = StepResult::pending(step.id.clone(), start_time);
        result.status = StepStatus::Skipped;
        result.end_time = Some(Utc::now());
        ctx.set_step_result(result);
    }

    fn mark_failed(&self, ctx: &Arc<ExecutionContext>, step: &Step, err: &Error) {
        let mut result = ctx.get_step_result(&step.id).unwrap_or_else(|| StepResult::pending(step.id.clone(), Utc::now()));
        result.status = StepStatus::Failed;
        result.error = Some(err.to_string());
        result.end_time = Some(Utc::now());
        ctx.set_step_result(result);
    }

    async fn dispatch_step(&self, ctx: &Arc<ExecutionContext>, step: &Step) -> Result<(Value, String), Error> {
        match &step.kind {
            StepKind::Agent { agent } => self.execute_agent_step(ctx, step, agent).await,
            StepKind::Uses { uses } => self.execute_uses_step(ctx, step, uses).await,
            StepKind::Run { run, runtime } => self.execute_run_step(ctx, step, run, runtime.as_deref()).await,
            StepKind::Container { container, command } => self.execute_container_step(ctx, step, container, command.as_deref()).await,
            StepKind::While { r#while, steps } => self.execute_while_step(ctx, r#while, steps).await,
        }
    }

    async fn execute_agent_step(&self, ctx: &Arc<ExecutionContext>, step: &Step, agent_name: &str) -> Result<(Value, String), Error> {
        let agent_def = self
            .workflow
            .agents
            .get(agent_name)
            .cloned()
            .ok_or_else(|| Error::UnknownAgent { name: agent_name.to_string() })?;

        let provider = self
            .providers
            .get(&agent_def.provider)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::runtime(format!("provider '{}' is not registered", agent_def.provider)))?;

        let prompt_template = step
            .with
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidStepConfig { step_id: step.id.clone(), reason: "agent step requires a 'prompt' in `with`".to_string() })?;

        let rendered_prompt = crate::template::render_to_string(prompt_template, ctx.as_ref())?;
        let initial_prompt = match &step.outputs {
            Some(schema) => crate::agent::with_output_schema_directive(&rendered_prompt, schema),
            None => rendered_prompt,
        };

        let system_prompt = match &agent_def.system_prompt {
            Some(tpl) => Some(crate::template::render_to_string(tpl, ctx.as_ref())?),
            None => None,
        };

        let breaker = self.breaker_for(&agent_def.provider);
        let conversation = crate::agent::AgentConversation {
            provider,
            tools: &self.tools,
            retry_policy: &self.config.default_retry,
            breaker: breaker.as_ref(),
            timeout: step
                .timeout_seconds
                .map(std::time::Duration::from_secs)
                .unwrap_or(self.config.default_timeout),
            max_turns: self.config.max_conversation_turns,
            events: self.events.clone(),
            run_id: ctx.run_id.clone(),
            step_id: step.id.clone(),
        };

        let request = crate::agent::AgentRequest {
            model: agent_def.model,
            system_prompt,
            temperature: agent_def.temperature.map(|t| t as f32),
            max_tokens: agent_def.max_tokens,
            allowed_tools: agent_def.tools,
            initial_prompt,
        };

        let response_text = conversation.run(ctx.as_ref(), request).await?;
        let output = crate::agent::parse_output(&response_text, step.outputs.is_some());
        Ok((output, response_text))
    }

    /// Loads a sibling workflow file and recursively executes it through
    /// this same scheduler (§4.9 "uses"). The YAML grammar itself is out of
    /// scope (§6); this only needs the shape `serde_yaml` already knows how
    /// to deserialize into [`Workflow`].
    async fn execute_uses_step(&self, ctx: &Arc<ExecutionContext>, step: &Step, path: &str) -> Result<(Value, String), Error> {
        let rendered_with = render_value_recursive(&Value::Map(step.with.clone()), ctx.as_ref())?;
        let inputs = rendered_with.as_map().cloned().unwrap_or_default();

        let content = std::fs::read_to_string(path)?;
        let child_workflow: Workflow = serde_yaml::from_str(&content)?;

        let child_executor = WorkflowExecutor { workflow: Arc::new(child_workflow), ..self.clone() };
        let result = child_executor.execute(inputs).await?;

        let mut output = BTreeMap::new();
        output.insert("outputs".to_string(), result.outputs.clone());
        let response = result.outputs.to_text();
        Ok((Value::Map(output), response))
    }

    /// Runs an inline script through an external interpreter (`runtime`,
    /// default `bash`), handing it the rendered `with` map as a JSON object
    /// on stdin and reading a JSON `{"outputs": ...}` object back from
    /// stdout. The interpreter's own semantics are out of scope (§4.9
    /// Non-goals); only the JSON handshake is this engine's contract.
    async fn execute_run_step(&self, ctx: &Arc<ExecutionContext>, step: &Step, script_template: &str, runtime: Option<&str>) -> Result<(Value, String), Error> {
        let script = crate::template::render_to_string(script_template, ctx.as_ref())?;
        let rendered_with = render_value_recursive(&Value::Map(step.with.clone()), ctx.as_ref())?;
        let stdin_payload = serde_json::to_vec(&serde_json::json!({ "inputs": serde_json::Value::from(rendered_with) }))?;

        let mut child = tokio::process::Command::new(runtime.unwrap_or("bash"))
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            use tokio::io::AsyncWriteExt;
            stdin.write_all(&stdin_payload).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::runtime(format!(
                "step '{}' script exited with {}: {}",
                step.id,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        Ok((wrap_external_stdout(&stdout), stdout))
    }

    /// Invokes an external container runtime (`docker run --rm ...`),
    /// passing the rendered `with` map through `LACQUER_INPUTS` as the spec
    /// names it (§4.9). The container image's own contract for reading that
    /// variable and emitting JSON on stdout is out of scope here.
    async fn execute_container_step(&self, ctx: &Arc<ExecutionContext>, step: &Step, image: &str, command: Option<&[String]>) -> Result<(Value, String), Error> {
        let rendered_with = render_value_recursive(&Value::Map(step.with.clone()), ctx.as_ref())?;
        let inputs_json = serde_json::to_string(&serde_json::json!({ "inputs": serde_json::Value::from(rendered_with) }))?;

        let mut cmd = tokio::process::Command::new("docker");
        cmd.arg("run").arg("--rm").arg("-e").arg(format!("LACQUER_INPUTS={inputs_json}")).arg(image);
        if let Some(extra) = command {
            cmd.args(extra);
        }

        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(Error::runtime(format!(
                "step '{}' container '{}' exited with {}: {}",
                step.id,
                image,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        Ok((wrap_external_stdout(&stdout), stdout))
    }

    /// While-loop protocol (§4.9): a single child context is created once
    /// and reused across every iteration, so `updates` applied in one
    /// iteration are visible to the condition check and the body in the
    /// next. Iteration count is tracked locally rather than read back off
    /// `child.current_step_index`, since that field is overwritten on every
    /// `execute_steps` call to reflect position-within-body, not loop count
    /// (an added Open Question resolution; see DESIGN.md).
    async fn execute_while_step(&self, ctx: &Arc<ExecutionContext>, condition: &str, body: &[Step]) -> Result<(Value, String), Error> {
        let child = ctx.new_child(body.len());
        let mut iterations: usize = 0;

        loop {
            if child.is_cancelled() {
                break;
            }
            if !crate::template::render(condition, child.as_ref())?.to_bool() {
                break;
            }
            self.execute_steps(&child, body).await?;
            iterations += 1;
            if child.is_cancelled() {
                break;
            }
        }

        let mut steps_map = BTreeMap::new();
        for sub in body {
            if let Some(result) = child.get_step_result(&sub.id) {
                steps_map.insert(sub.id.clone(), result.output.clone());
            }
        }

        let mut output = BTreeMap::new();
        output.insert("steps".to_string(), Value::Map(steps_map));
        output.insert("iterations".to_string(), Value::Number(iterations as f64));
        let output_value = Value::Map(output);
        let response = output_value.to_text();
        Ok((output_value, response))
    }
}

fn step_kind_name(kind: &StepKind) -> &'static str {
    match kind {
        StepKind::Agent { .. } => "agent",
        StepKind::Uses { .. } => "uses",
        StepKind::Run { .. } => "run",
        StepKind::Container { .. } => "container",
        StepKind::While { .. } => "while",
    }
}

/// An external process's stdout is expected to be a JSON object; if it
/// carries an `outputs` key that value is used verbatim, otherwise the
/// whole parsed document becomes `outputs`. Anything unparseable yields an
/// empty map rather than failing the step outright.
fn wrap_external_stdout(stdout: &str) -> Value {
    let mut output = BTreeMap::new();
    let outputs = match serde_json::from_str::<serde_json::Value>(stdout.trim()) {
        Ok(serde_json::Value::Object(mut map)) if map.contains_key("outputs") => Value::from(map.remove("outputs").unwrap()),
        Ok(other) => Value::from(other),
        Err(_) => Value::map(),
    };
    output.insert("outputs".to_string(), outputs);
    Value::Map(output)
}

/// Recursively renders every string leaf of `value` through the Template
/// Engine, rebuilding lists/maps and passing everything else through
/// unchanged. Used for a step's `with` map and its `updates` values, both
/// of which may nest templated strings inside lists/maps (§4.9).
fn render_value_recursive(value: &Value, resolver: &dyn VariableResolver) -> Result<Value, Error> {
    match value {
        Value::String(s) => crate::template::render(s, resolver),
        Value::List(items) => {
            let rendered: Result<Vec<Value>, Error> = items.iter().map(|v| render_value_recursive(v, resolver)).collect();
            Ok(Value::List(rendered?))
        }
        Value::Map(m) => {
            let mut rendered = BTreeMap::new();
            for (k, v) in m {
                rendered.insert(k.clone(), render_value_recursive(v, resolver)?);
            }
            Ok(Value::Map(rendered))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::workflow::{Agent, WorkflowBody, WorkflowMetadata};
    use async_trait::async_trait;
    use lacquer_providers::{CompletionRequest, CompletionResponse, ContentBlock, ProviderError};

    struct EchoProvider;

    #[async_trait]
    impl LLMProvider for EchoProvider {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: vec![ContentBlock::Text { text: format!("echo:{}", request.model) }],
                model: request.model,
                tokens_used: None,
                stop_reason: None,
                metadata: Default::default(),
            })
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn workflow_with_steps(steps: Vec<Step>, outputs: BTreeMap<String, String>) -> Workflow {
        Workflow {
            version: "1".to_string(),
            metadata: WorkflowMetadata::default(),
            inputs: BTreeMap::new(),
            agents: [(
                "assistant".to_string(),
                Agent { provider: "echo".to_string(), model: "test-model".to_string(), system_prompt: None, temperature: None, max_tokens: None, tools: Vec::new() },
            )]
            .into_iter()
            .collect(),
            workflow: WorkflowBody { state: BTreeMap::new(), steps, outputs },
        }
    }

    fn with_field(step: &mut Step, key: &str, value: Value) {
        step.with.insert(key.to_string(), value);
    }

    fn bare_step(id: &str, kind: StepKind) -> Step {
        Step { id: id.to_string(), kind, with: BTreeMap::new(), outputs: None, skip_if: None, condition: None, updates: BTreeMap::new(), timeout_seconds: None }
    }

    #[tokio::test]
    async fn test_agent_step_runs_and_commits_output() {
        let mut step = bare_step("greet", StepKind::Agent { agent: "assistant".to_string() });
        with_field(&mut step, "prompt", Value::from("say hi"));

        let workflow = workflow_with_steps(vec![step], [("greeting".to_string(), "${{ steps.greet.output }}".to_string())].into_iter().collect());
        let (executor, mut rx) = WorkflowExecutor::new(workflow, OrchestratorConfig::default());
        let executor = executor.with_provider("echo", Arc::new(EchoProvider));

        let result = executor.execute(BTreeMap::new()).await.unwrap();
        assert_eq!(result.status, "completed");
        assert_eq!(result.outputs.get("greeting"), Some(&Value::String("echo:test-model".to_string())));

        let mut saw_started = false;
        while let Ok(event) = rx.try_recv() {
            if event.kind == crate::events::EventKind::WorkflowStarted {
                saw_started = true;
            }
        }
        assert!(saw_started);
    }

    #[tokio::test]
    async fn test_skip_if_marks_step_skipped_without_running() {
        let mut step = bare_step("maybe", StepKind::Agent { agent: "assistant".to_string() });
        step.skip_if = Some("true".to_string());
        with_field(&mut step, "prompt", Value::from("unused"));

        let workflow = workflow_with_steps(vec![step], BTreeMap::new());
        let (executor, _rx) = WorkflowExecutor::new(workflow, OrchestratorConfig::default());

        let result = executor.execute(BTreeMap::new()).await.unwrap();
        assert_eq!(result.status, "completed");
        assert_eq!(result.step_results[0].status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn test_unknown_agent_fails_the_workflow() {
        let step = bare_step("oops", StepKind::Agent { agent: "nobody".to_string() });
        let workflow = workflow_with_steps(vec![step], BTreeMap::new());
        let (executor, _rx) = WorkflowExecutor::new(workflow, OrchestratorConfig::default());

        let result = executor.execute(BTreeMap::new()).await.unwrap();
        assert_eq!(result.status, "failed");
        assert!(result.error.unwrap().contains("unknown agent"));
    }

    #[tokio::test]
    async fn test_while_loop_increments_state_counter_until_condition_false() {
        let mut increment = bare_step("bump", StepKind::Agent { agent: "assistant".to_string() });
        with_field(&mut increment, "prompt", Value::from("bump"));
        increment.updates.insert("counter".to_string(), Value::String("${{ state.counter + 1 }}".to_string()));

        let while_step = bare_step("loop", StepKind::While { r#while: "state.counter < 3".to_string(), steps: vec![increment] });

        let mut workflow = workflow_with_steps(vec![while_step], [("iterations".to_string(), "${{ steps.loop.iterations }}".to_string())].into_iter().collect());
        workflow.workflow.state.insert("counter".to_string(), Value::Number(0.0));

        let (executor, _rx) = WorkflowExecutor::new(workflow, OrchestratorConfig::default());
        let executor = executor.with_provider("echo", Arc::new(EchoProvider));

        let result = executor.execute(BTreeMap::new()).await.unwrap();
        assert_eq!(result.status, "completed");
        assert_eq!(result.outputs.get("iterations"), Some(&Value::Number(3.0)));
        assert_eq!(result.final_state.get("counter"), Some(&Value::Number(3.0)));
    }

    #[tokio::test]
    async fn test_condition_false_skips_step() {
        let mut step = bare_step("conditional", StepKind::Agent { agent: "assistant".to_string() });
        step.condition = Some("${{ 1 == 2 }}".to_string());
        with_field(&mut step, "prompt", Value::from("unused"));

        let workflow = workflow_with_steps(vec![step], BTreeMap::new());
        let (executor, _rx) = WorkflowExecutor::new(workflow, OrchestratorConfig::default());

        let result = executor.execute(BTreeMap::new()).await.unwrap();
        assert_eq!(result.step_results[0].status, StepStatus::Skipped);
    }
}
