// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress-Event Stream & Sink (C10): a uniformly typed event channel fed
//! by the scheduler and conversation loop, consumed by a terminal
//! dashboard (or a plain-log fallback for non-interactive environments).

use chrono::{DateTime, Utc};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub step_id: Option<String>,
    pub step_index: Option<usize>,
    pub action_id: Option<String>,
    pub text: Option<String>,
    pub duration: Option<Duration>,
    pub attempt: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowFailed,
    StepStarted,
    StepCompleted,
    StepFailed,
    StepRetrying,
    StepProgress,
    StepActionStarted,
    StepActionCompleted,
    StepActionFailed,
}

impl Event {
    fn new(kind: EventKind, run_id: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            run_id: run_id.into(),
            step_id: None,
            step_index: None,
            action_id: None,
            text: None,
            duration: None,
            attempt: None,
            error: None,
        }
    }

    pub fn workflow_started(run_id: impl Into<String>) -> Self {
        Self::new(EventKind::WorkflowStarted, run_id)
    }

    pub fn workflow_completed(run_id: impl Into<String>) -> Self {
        Self::new(EventKind::WorkflowCompleted, run_id)
    }

    pub fn workflow_failed(run_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::new(EventKind::WorkflowFailed, run_id) }
    }

    pub fn step_started(run_id: impl Into<String>, step_id: impl Into<String>, step_index: usize) -> Self {
        Self {
            step_id: Some(step_id.into()),
            step_index: Some(step_index),
            ..Self::new(EventKind::StepStarted, run_id)
        }
    }

    pub fn step_completed(run_id: impl Into<String>, step_id: impl Into<String>, duration: Duration) -> Self {
        Self {
            step_id: Some(step_id.into()),
            duration: Some(duration),
            ..Self::new(EventKind::StepCompleted, run_id)
        }
    }

    pub fn step_failed(run_id: impl Into<String>, step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: Some(step_id.into()),
            error: Some(error.into()),
            ..Self::new(EventKind::StepFailed, run_id)
        }
    }

    pub fn step_retrying(run_id: impl Into<String>, step_id: impl Into<String>, attempt: usize) -> Self {
        Self {
            step_id: Some(step_id.into()),
            attempt: Some(attempt),
            ..Self::new(EventKind::StepRetrying, run_id)
        }
    }

    pub fn step_progress(run_id: impl Into<String>, step_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            step_id: Some(step_id.into()),
            text: Some(text.into()),
            ..Self::new(EventKind::StepProgress, run_id)
        }
    }

    pub fn action_started(run_id: impl Into<String>, step_id: impl Into<String>, action_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            step_id: Some(step_id.into()),
            action_id: Some(action_id.into()),
            text: Some(text.into()),
            ..Self::new(EventKind::StepActionStarted, run_id)
        }
    }

    pub fn action_completed(run_id: impl Into<String>, step_id: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            step_id: Some(step_id.into()),
            action_id: Some(action_id.into()),
            ..Self::new(EventKind::StepActionCompleted, run_id)
        }
    }

    pub fn action_failed(run_id: impl Into<String>, step_id: impl Into<String>, action_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: Some(step_id.into()),
            action_id: Some(action_id.into()),
            error: Some(error.into()),
            ..Self::new(EventKind::StepActionFailed, run_id)
        }
    }
}

/// Many-producer / one-consumer: the scheduler and conversation loop both
/// hold a clone of the sender. Bounded so an unresponsive sink cannot
/// stall producers for unbounded time (§9).
pub type EventSender = mpsc::Sender<Event>;

pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    mpsc::channel(capacity)
}

struct ActionState {
    text: String,
    failed: bool,
    completed: bool,
}

struct StepDisplay {
    bar: ProgressBar,
    actions: Vec<ActionState>,
}

/// Terminal dashboard sink: one spinner per step, grouped under a single
/// `MultiProgress`, with nested action lines rendered into the spinner's
/// message as they start/complete.
pub struct TerminalSink {
    multi: MultiProgress,
    steps: HashMap<String, StepDisplay>,
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalSink {
    pub fn new() -> Self {
        Self { multi: MultiProgress::new(), steps: HashMap::new() }
    }

    /// Drains the event stream until the channel closes, driving the
    /// dashboard. Runs on a single consuming task so bar updates are
    /// serialized even though producers may be concurrent (§4.10).
    pub async fn run(mut self, mut receiver: mpsc::Receiver<Event>) {
        while let Some(event) = receiver.recv().await {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: Event) {
        match event.kind {
            EventKind::StepStarted => {
                let step_id = event.step_id.clone().unwrap_or_default();
                let label = format!(
                    "Running step {} ({}/?)",
                    step_id,
                    event.step_index.map(|i| i + 1).unwrap_or(0)
                );
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
                bar.set_message(label);
                bar.enable_steady_tick(Duration::from_millis(100));
                self.steps.insert(step_id, StepDisplay { bar, actions: Vec::new() });
            }
            EventKind::StepProgress => {
                if let Some(step_id) = &event.step_id {
                    if let Some(display) = self.steps.get(step_id) {
                        if let Some(text) = &event.text {
                            display.bar.set_message(text.clone());
                        }
                    }
                }
            }
            EventKind::StepActionStarted => {
                if let Some(step_id) = &event.step_id {
                    if let Some(display) = self.steps.get_mut(step_id) {
                        for action in display.actions.iter_mut() {
                            if !action.completed && !action.failed {
                                action.completed = true;
                            }
                        }
                        display.actions.push(ActionState {
                            text: event.text.clone().unwrap_or_default(),
                            failed: false,
                            completed: false,
                        });
                        render_actions(&display.bar, &display.actions);
                    }
                }
            }
            EventKind::StepActionCompleted => {
                self.mark_last_action(&event, false);
            }
            EventKind::StepActionFailed => {
                self.mark_last_action(&event, true);
            }
            EventKind::StepRetrying => {
                if let Some(step_id) = &event.step_id {
                    if let Some(display) = self.steps.get(step_id) {
                        display.bar.set_message(format!("retrying (attempt {})", event.attempt.unwrap_or(0)));
                    }
                }
            }
            EventKind::StepCompleted => {
                if let Some(step_id) = &event.step_id {
                    if let Some(display) = self.steps.remove(step_id) {
                        display.bar.finish_with_message(format!("\u{2713} {step_id}"));
                    }
                }
            }
            EventKind::StepFailed => {
                if let Some(step_id) = &event.step_id {
                    if let Some(display) = self.steps.remove(step_id) {
                        let error = event.error.clone().unwrap_or_default();
                        display.bar.finish_with_message(format!("\u{2717} {step_id}: {error}"));
                    }
                }
            }
            EventKind::WorkflowStarted | EventKind::WorkflowCompleted | EventKind::WorkflowFailed => {}
        }
    }

    fn mark_last_action(&mut self, event: &Event, failed: bool) {
        if let Some(step_id) = &event.step_id {
            if let Some(display) = self.steps.get_mut(step_id) {
                if let Some(action) = display.actions.last_mut() {
                    action.completed = true;
                    action.failed = failed;
                }
                render_actions(&display.bar, &display.actions);
            }
        }
    }
}

/// Wraps multi-line action text at a width ceiling (at least 20 columns
/// after indentation) and writes the joined lines as the bar's message.
fn render_actions(bar: &ProgressBar, actions: &[ActionState]) {
    const WIDTH: usize = 60;
    const INDENT: &str = "  ";
    let lines: Vec<String> = actions
        .iter()
        .map(|a| {
            let icon = if a.failed { "\u{2717}" } else if a.completed { "\u{2713}" } else { "\u{25cf}" };
            let wrapped = wrap_text(&a.text, WIDTH.saturating_sub(INDENT.len()).max(20));
            format!("{INDENT}{icon} {wrapped}")
        })
        .collect();
    bar.set_message(lines.join("\n"));
}

fn wrap_text(text: &str, width: usize) -> String {
    if text.len() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut line_len = 0;
    for word in text.split_whitespace() {
        if line_len + word.len() + 1 > width && line_len > 0 {
            out.push('\n');
            line_len = 0;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        out.push_str(word);
        line_len += word.len();
    }
    out
}

/// Non-interactive fallback for environments without a TTY: emits one
/// `tracing::info!` line per terminal event instead of driving `indicatif`.
pub async fn run_plain_log_sink(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match event.kind {
            EventKind::WorkflowStarted => tracing::info!(run_id = %event.run_id, "workflow started"),
            EventKind::WorkflowCompleted => tracing::info!(run_id = %event.run_id, "workflow completed"),
            EventKind::WorkflowFailed => tracing::error!(run_id = %event.run_id, error = ?event.error, "workflow failed"),
            EventKind::StepStarted => tracing::info!(run_id = %event.run_id, step_id = ?event.step_id, "step started"),
            EventKind::StepCompleted => tracing::info!(run_id = %event.run_id, step_id = ?event.step_id, "step completed"),
            EventKind::StepFailed => tracing::error!(run_id = %event.run_id, step_id = ?event.step_id, error = ?event.error, "step failed"),
            EventKind::StepRetrying => tracing::warn!(run_id = %event.run_id, step_id = ?event.step_id, attempt = ?event.attempt, "retrying step"),
            EventKind::StepProgress => tracing::debug!(run_id = %event.run_id, step_id = ?event.step_id, text = ?event.text, "step progress"),
            EventKind::StepActionStarted => tracing::debug!(run_id = %event.run_id, step_id = ?event.step_id, action_id = ?event.action_id, "action started"),
            EventKind::StepActionCompleted => tracing::debug!(run_id = %event.run_id, step_id = ?event.step_id, action_id = ?event.action_id, "action completed"),
            EventKind::StepActionFailed => tracing::warn!(run_id = %event.run_id, step_id = ?event.step_id, action_id = ?event.action_id, error = ?event.error, "action failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (tx, mut rx) = channel(8);
        tx.send(Event::workflow_started("run-1")).await.unwrap();
        tx.send(Event::step_started("run-1", "s1", 0)).await.unwrap();
        drop(tx);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::WorkflowStarted);
        assert_eq!(second.kind, EventKind::StepStarted);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_wrap_text_respects_width() {
        let wrapped = wrap_text("one two three four five six seven eight", 10);
        assert!(wrapped.lines().all(|l| l.len() <= 10 || !l.contains(' ')));
    }
}
