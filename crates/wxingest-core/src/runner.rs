//! Task invocation.
//!
//! The engine only ever sees a task through `TaskRunner::run`: a name and a
//! JSON payload go in, a `ProcessingItem` comes out. Two runners ship here:
//!
//! - `TaskRegistry` maps names to in-process closures. Embedders and tests use it.
//! - `CommandTaskRunner` spawns the command configured for the task.
//!
//! # Command protocol
//! - stdin:  the payload as a JSON object.
//! - stdout: one `ProcessingItem` as JSON.
//! - stderr: passed through for task logging.
//! - exit status non-zero: the task failed; stdout is kept for the error message.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::TaskCommand;
use crate::error::{IngestError, Result};
use crate::item::ProcessingItem;

pub trait TaskRunner {
    /// Execute `task` with `payload`. Any fault inside the task surfaces as
    /// `IngestError::TaskExecution`.
    fn run(&self, task: &str, payload: &Value) -> Result<ProcessingItem>;
}

// ---------------------------------------------------------------------------
// TaskRegistry
// ---------------------------------------------------------------------------

type TaskFn = Box<dyn Fn(&Value) -> Result<ProcessingItem> + Send + Sync>;

/// In-process tasks keyed by name.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskFn>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, name: impl Into<String>, task: F) -> Self
    where
        F: Fn(&Value) -> Result<ProcessingItem> + Send + Sync + 'static,
    {
        self.tasks.insert(name.into(), Box::new(task));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }
}

impl TaskRunner for TaskRegistry {
    fn run(&self, task: &str, payload: &Value) -> Result<ProcessingItem> {
        let f = self
            .tasks
            .get(task)
            .ok_or_else(|| IngestError::TaskNotConfigured(task.to_string()))?;
        let item = f(payload).map_err(|e| match e {
            IngestError::TaskExecution { .. } => e,
            other => IngestError::task_failed(task, other.to_string()),
        })?;
        check_step_name(task, &item);
        Ok(item)
    }
}

// ---------------------------------------------------------------------------
// CommandTaskRunner
// ---------------------------------------------------------------------------

/// Runs each task as a subprocess in the project root.
pub struct CommandTaskRunner {
    root: PathBuf,
    commands: BTreeMap<String, TaskCommand>,
}

impl CommandTaskRunner {
    pub fn new(root: impl Into<PathBuf>, commands: BTreeMap<String, TaskCommand>) -> Self {
        Self {
            root: root.into(),
            commands,
        }
    }

    /// Resolve the program for a task. Names containing a path separator are
    /// taken relative to the root; bare names are looked up on `PATH`.
    fn resolve_program(&self, task: &str, command: &str) -> Result<PathBuf> {
        let path = Path::new(command);
        if path.components().count() > 1 || path.is_absolute() {
            let resolved = if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.root.join(path)
            };
            if !resolved.exists() {
                return Err(IngestError::task_failed(
                    task,
                    format!("command not found: {}", resolved.display()),
                ));
            }
            return Ok(resolved);
        }
        which::which(command)
            .map_err(|e| IngestError::task_failed(task, format!("command '{command}': {e}")))
    }
}

impl TaskRunner for CommandTaskRunner {
    fn run(&self, task: &str, payload: &Value) -> Result<ProcessingItem> {
        let spec = self
            .commands
            .get(task)
            .ok_or_else(|| IngestError::TaskNotConfigured(task.to_string()))?;
        let program = self.resolve_program(task, &spec.command)?;
        let stdin_json = serde_json::to_string(payload)?;

        let mut cmd = Command::new(&program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .env("WXINGEST_ROOT", &self.root)
            .env("WXINGEST_TASK", task)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            // stderr flows through so task log lines reach the terminal
            .stderr(Stdio::inherit());

        debug!(task, program = %program.display(), "spawning task");
        let mut child = cmd
            .spawn()
            .map_err(|e| IngestError::task_failed(task, format!("failed to spawn: {e}")))?;

        // The payload is fed from a second thread while stdout drains here;
        // either pipe can fill before the other side is read.
        let stdin = child.stdin.take();
        let (output, written) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || feed_stdin(stdin, stdin_json.as_bytes()));
            let output = child.wait_with_output();
            (output, writer.join())
        });

        let output = output.map_err(|e| IngestError::task_failed(task, e.to_string()))?;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(IngestError::task_failed(
                    task,
                    format!("failed to write stdin: {e}"),
                ))
            }
            Err(_) => return Err(IngestError::task_failed(task, "stdin writer panicked")),
        }
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let hint: String = stdout.chars().take(500).collect();
            return Err(IngestError::task_failed(
                task,
                format!("exited with {}: {}", output.status, hint.trim()),
            ));
        }

        let item = ProcessingItem::from_json(stdout.trim())
            .map_err(|e| IngestError::task_failed(task, format!("invalid task output: {e}")))?;
        check_step_name(task, &item);
        Ok(item)
    }
}

/// Write the payload and close the pipe. A task may exit without reading it.
fn feed_stdin(stdin: Option<ChildStdin>, payload: &[u8]) -> std::io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(payload) {
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn check_step_name(task: &str, item: &ProcessingItem) {
    if item.step_name() != task {
        warn!(
            task,
            step_name = item.step_name(),
            "task returned a processing item for a different step"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
