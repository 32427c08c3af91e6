//! Sequential task-chaining engine.
//!
//! # State machine
//!
//! ```text
//! NotStarted ──step(None)──▶ Awaiting(0) ──step(Some(item))──▶ Awaiting(1) ... ──▶ Completed
//! ```
//!
//! Every transition is written to a `CheckpointSink` before `step` returns:
//!
//! 1. `"<orchestration> RUNNING"` once, on the first step.
//! 2. `"<task> RUNNING"` before a task is handed out.
//! 3. `"<task> COMPLETED"` with the task's `ProcessingItem` once its result is fed back.
//! 4. `"<orchestration> COMPLETED"` with the orchestration-level posts after the last task.
//!
//! `Orchestration` does no I/O besides the sink: a host feeds it task results
//! and decides how tasks actually run. `OrchestrationEngine` is the blocking
//! host used by the CLI: it runs each task through a `TaskRunner` and stops at
//! the first failure, leaving the log at the last checkpoint written.
//!
//! If a checkpoint write fails, the phase stays at the last durable transition
//! and the same `step` call can be retried.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::checkpoint::CheckpointSink;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::item::ProcessingItem;
use crate::paths;
use crate::runner::TaskRunner;
use crate::state::{OrchestratorState, TaskStatus};

// ---------------------------------------------------------------------------
// Payload and post keys
// ---------------------------------------------------------------------------

pub const PAYLOAD_INGESTION_MODE_KEY: &str = "ingestionMode";
pub const PAYLOAD_REQUEST_ID_KEY: &str = "requestId";
pub const PAYLOAD_BASE_NAME_KEY: &str = "baseName";
pub const PAYLOAD_INPUT_FILE_PATHS_KEY: &str = "inputFilePaths";

/// Post key a task uses to hand file paths to a downstream task.
pub const POST_INPUT_FILE_PATHS_KEY: &str = "inputFilePaths";
/// Post key a task uses to tell the orchestration which source files it consumed.
pub const POST_SOURCE_PROCESSED_FILE_PATHS_KEY: &str = "sourceProcessedFilePaths";

pub const FULL_INGESTION_MODE: &str = "full";
pub const INCREMENTAL_INGESTION_MODE: &str = "incremental";

// ---------------------------------------------------------------------------
// OrchestrationDef / Trigger
// ---------------------------------------------------------------------------

/// What to run: the orchestration's own name, its base, and the fixed task list.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationDef {
    pub name: String,
    pub base: String,
    pub tasks: Vec<String>,
}

impl OrchestrationDef {
    pub fn new<I, S>(name: impl Into<String>, base: impl Into<String>, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            base: base.into(),
            tasks: tasks.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from config, optionally overriding the base. Fails on names that
    /// cannot appear in a status line and on bases without a log layout.
    pub fn from_config(config: &Config, base: Option<&str>) -> Result<Self> {
        let base = base.unwrap_or(&config.orchestration.base);
        config.log_layout(base)?;
        let def = Self::new(
            config.orchestration.name.clone(),
            base,
            config.orchestration.tasks.iter().cloned(),
        );
        def.validate()?;
        Ok(def)
    }

    pub fn validate(&self) -> Result<()> {
        paths::validate_task_name(&self.name)?;
        for task in &self.tasks {
            paths::validate_task_name(task)?;
        }
        Ok(())
    }
}

/// How a run was started: its mode, its job id, and any extra payload fields
/// every task should receive.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub mode: String,
    pub job_id: String,
    pub input: Map<String, Value>,
}

impl Trigger {
    pub fn new(mode: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            job_id: job_id.into(),
            input: Map::new(),
        }
    }

    pub fn with_request_id(self, request_id: impl Into<String>) -> Self {
        self.with_input(PAYLOAD_REQUEST_ID_KEY, Value::String(request_id.into()))
    }

    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.input.insert(key.into(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// Orchestration (step machine)
// ---------------------------------------------------------------------------

/// What the host must do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Run `task` with `payload` and feed the resulting item to `step`.
    AwaitTask { task: String, payload: Value },
    /// The run is over; all items in task order.
    Complete(Vec<ProcessingItem>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    /// Orchestration RUNNING is durable; task `i` has not been handed out yet.
    Ready(usize),
    /// Task `i` RUNNING is durable; waiting for its result.
    Awaiting(usize),
    Completed,
}

impl Phase {
    fn label(&self) -> String {
        match self {
            Phase::NotStarted => "NOT_STARTED".to_string(),
            Phase::Ready(i) => format!("READY({i})"),
            Phase::Awaiting(i) => format!("RUNNING({i})"),
            Phase::Completed => "COMPLETED".to_string(),
        }
    }
}

pub struct Orchestration {
    def: OrchestrationDef,
    state: OrchestratorState,
    base_payload: Map<String, Value>,
    results: Vec<ProcessingItem>,
    phase: Phase,
    clock: Arc<dyn Clock>,
}

impl Orchestration {
    pub fn new(def: OrchestrationDef, trigger: Trigger, clock: Arc<dyn Clock>) -> Self {
        let state = OrchestratorState::new(
            clock.timestamp(),
            def.base.clone(),
            trigger.mode.clone(),
            "",
            trigger.job_id.clone(),
        );

        let mut base_payload = trigger.input;
        base_payload.insert(
            PAYLOAD_INGESTION_MODE_KEY.to_string(),
            Value::String(trigger.mode),
        );
        base_payload.insert(
            PAYLOAD_BASE_NAME_KEY.to_string(),
            Value::String(def.base.clone()),
        );
        base_payload.insert(
            PAYLOAD_INPUT_FILE_PATHS_KEY.to_string(),
            Value::Array(Vec::new()),
        );

        Self {
            def,
            state,
            base_payload,
            results: Vec::new(),
            phase: Phase::NotStarted,
            clock,
        }
    }

    pub fn definition(&self) -> &OrchestrationDef {
        &self.def
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    /// Items of the tasks completed so far, in task order.
    pub fn results(&self) -> &[ProcessingItem] {
        &self.results
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// The task whose result is awaited, if any.
    pub fn current_task(&self) -> Option<&str> {
        match self.phase {
            Phase::Awaiting(i) => self.def.tasks.get(i).map(String::as_str),
            _ => None,
        }
    }

    /// Advance the run.
    ///
    /// Pass `None` to start (or to retry after a failed checkpoint write) and
    /// `Some(item)` to deliver the result of the awaited task.
    pub fn step(
        &mut self,
        sink: &dyn CheckpointSink,
        result: Option<ProcessingItem>,
    ) -> Result<Step> {
        match (self.phase, result) {
            (Phase::NotStarted, None) => {
                let name = self.def.name.clone();
                self.checkpoint(sink, &name, TaskStatus::Running, None)?;
                self.phase = Phase::Ready(0);
                self.begin_task(sink, 0)
            }
            (Phase::Ready(i), None) => self.begin_task(sink, i),
            (Phase::Awaiting(i), Some(item)) => {
                let task = self.def.tasks[i].clone();
                self.checkpoint(sink, &task, TaskStatus::Completed, Some(item.clone()))?;
                self.results.push(item);
                self.phase = Phase::Ready(i + 1);
                self.begin_task(sink, i + 1)
            }
            (Phase::Awaiting(i), None) => Err(self.invalid(
                Phase::Awaiting(i),
                "a task result is required while a task is running",
            )),
            (Phase::Completed, _) => Err(self.invalid(Phase::Completed, "the run is already complete")),
            (phase, Some(_)) => Err(self.invalid(phase, "no task is awaiting a result")),
        }
    }

    /// Payload for `task`: the base payload with its file list replaced by the
    /// posts addressed to `task` by name.
    pub fn payload_for(&self, task: &str) -> Value {
        let mut payload = self.base_payload.clone();
        let inputs =
            ProcessingItem::extract_posts_for(&self.results, task, POST_INPUT_FILE_PATHS_KEY);
        payload.insert(
            PAYLOAD_INPUT_FILE_PATHS_KEY.to_string(),
            Value::Array(inputs),
        );
        Value::Object(payload)
    }

    fn begin_task(&mut self, sink: &dyn CheckpointSink, index: usize) -> Result<Step> {
        let Some(task) = self.def.tasks.get(index).cloned() else {
            return self.finish(sink);
        };
        let payload = self.payload_for(&task);
        debug!(
            task = %task,
            inputs = payload[PAYLOAD_INPUT_FILE_PATHS_KEY].as_array().map_or(0, Vec::len),
            "routing posts"
        );
        self.checkpoint(sink, &task, TaskStatus::Running, None)?;
        self.phase = Phase::Awaiting(index);
        Ok(Step::AwaitTask { task, payload })
    }

    fn finish(&mut self, sink: &dyn CheckpointSink) -> Result<Step> {
        let name = self.def.name.clone();
        let processed = ProcessingItem::extract_posts_for(
            &self.results,
            &name,
            POST_SOURCE_PROCESSED_FILE_PATHS_KEY,
        );
        let mut bundle = Map::new();
        bundle.insert(
            POST_SOURCE_PROCESSED_FILE_PATHS_KEY.to_string(),
            Value::Array(processed),
        );
        self.state.posts.clear();
        self.state.posts.insert(name.clone(), Value::Object(bundle));

        self.checkpoint(sink, &name, TaskStatus::Completed, None)?;
        self.phase = Phase::Completed;
        Ok(Step::Complete(self.results.clone()))
    }

    fn checkpoint(
        &mut self,
        sink: &dyn CheckpointSink,
        name: &str,
        status: TaskStatus,
        item: Option<ProcessingItem>,
    ) -> Result<()> {
        self.state
            .update_state(self.clock.timestamp(), name, status, item);
        sink.record(&self.state)
    }

    fn invalid(&self, from: Phase, reason: &str) -> IngestError {
        IngestError::InvalidTransition {
            from: from.label(),
            to: "next step".to_string(),
            reason: reason.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// OrchestrationEngine (blocking host)
// ---------------------------------------------------------------------------

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub items: Vec<ProcessingItem>,
    pub final_state: OrchestratorState,
}

impl RunOutcome {
    /// Each item serialized on its own, in task order.
    pub fn to_json_items(&self) -> Result<Vec<String>> {
        self.items.iter().map(ProcessingItem::to_json).collect()
    }
}

pub struct OrchestrationEngine<'a> {
    runner: &'a dyn TaskRunner,
    sink: &'a dyn CheckpointSink,
    clock: Arc<dyn Clock>,
}

impl<'a> OrchestrationEngine<'a> {
    pub fn new(
        runner: &'a dyn TaskRunner,
        sink: &'a dyn CheckpointSink,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            runner,
            sink,
            clock,
        }
    }

    /// Run every task in order. The first task failure aborts the run and is
    /// returned unchanged; no retry happens here.
    pub fn run(&self, def: &OrchestrationDef, trigger: Trigger) -> Result<RunOutcome> {
        def.validate()?;
        info!(
            orchestration = %def.name,
            base = %def.base,
            mode = %trigger.mode,
            job_id = %trigger.job_id,
            tasks = def.tasks.len(),
            "orchestration started"
        );

        let mut orchestration = Orchestration::new(def.clone(), trigger, self.clock.clone());
        let mut step = orchestration.step(self.sink, None)?;
        loop {
            match step {
                Step::AwaitTask { task, payload } => {
                    let item = self.runner.run(&task, &payload).map_err(|e| {
                        error!(
                            task = %task,
                            job_id = %orchestration.state().job_id,
                            error = %e,
                            "task failed"
                        );
                        e
                    })?;
                    step = orchestration.step(self.sink, Some(item))?;
                }
                Step::Complete(items) => {
                    info!(
                        orchestration = %def.name,
                        job_id = %orchestration.state().job_id,
                        items = items.len(),
                        "orchestration completed"
                    );
                    return Ok(RunOutcome {
                        items,
                        final_state: orchestration.state().clone(),
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
