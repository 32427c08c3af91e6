use crate::error::{IngestError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Defaults for the weather pipeline
// ---------------------------------------------------------------------------

pub const DEFAULT_ORCHESTRATION_NAME: &str = "orchestrate_ingestion";
pub const DEFAULT_BASE: &str = "WEATHER";
pub const TASK_PREPARE_INGESTION: &str = "task_prepare_ingestion";
pub const TASK_NORMALIZE_METRICS: &str = "task_normalize_metrics_and_load_to_filesystem";
pub const TASK_COMPUTE_METRICS: &str = "task_compute_metrics_and_load_to_database";

const DEFAULT_LOG_FOLDER: &str = "logs/orchestrator/weather";
const DEFAULT_LOG_FILENAME: &str = "orchestrator_log_{date}.json";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// OrchestrationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Consumer name tasks use to post results to the orchestration itself.
    #[serde(default = "default_orchestration_name")]
    pub name: String,
    /// Base used when a run does not name one.
    #[serde(default = "default_base")]
    pub base: String,
    /// Ordered task list, fixed for the lifetime of a run.
    #[serde(default = "default_task_list")]
    pub tasks: Vec<String>,
}

fn default_orchestration_name() -> String {
    DEFAULT_ORCHESTRATION_NAME.to_string()
}

fn default_base() -> String {
    DEFAULT_BASE.to_string()
}

fn default_task_list() -> Vec<String> {
    vec![
        TASK_PREPARE_INGESTION.to_string(),
        TASK_NORMALIZE_METRICS.to_string(),
        TASK_COMPUTE_METRICS.to_string(),
    ]
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            name: default_orchestration_name(),
            base: default_base(),
            tasks: default_task_list(),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskCommand
// ---------------------------------------------------------------------------

/// External command implementing a task. It receives the payload as JSON on
/// stdin and prints a `ProcessingItem` as JSON on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCommand {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl TaskCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// LogLayout
// ---------------------------------------------------------------------------

/// Where checkpoints of one base are written: a partition folder plus a
/// filename pattern containing `{date}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLayout {
    pub folder: PathBuf,
    pub filename: String,
}

impl LogLayout {
    pub fn new(folder: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            filename: filename.into(),
        }
    }

    pub fn file_path(&self, date_stamp: &str) -> PathBuf {
        self.folder
            .join(paths::log_file_name(&self.filename, date_stamp))
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskCommand>,
    #[serde(default)]
    pub logs: BTreeMap<String, LogLayout>,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        let orchestration = OrchestrationConfig::default();
        let tasks = orchestration
            .tasks
            .iter()
            .map(|name| (name.clone(), TaskCommand::new(format!("./tasks/{name}"))))
            .collect();
        let mut logs = BTreeMap::new();
        logs.insert(
            DEFAULT_BASE.to_string(),
            LogLayout::new(DEFAULT_LOG_FOLDER, DEFAULT_LOG_FILENAME),
        );
        Self {
            version: 1,
            orchestration,
            tasks,
            logs,
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(IngestError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Write the default config unless one exists. Returns true if written.
    pub fn write_default(root: &Path) -> Result<bool> {
        let data = serde_yaml::to_string(&Self::default())?;
        crate::io::write_if_missing(&paths::config_path(root), data.as_bytes())
    }

    pub fn log_layout(&self, base: &str) -> Result<&LogLayout> {
        self.logs
            .get(base)
            .ok_or_else(|| IngestError::UnknownBase(base.to_string()))
    }

    pub fn task_command(&self, task: &str) -> Result<&TaskCommand> {
        self.tasks
            .get(task)
            .ok_or_else(|| IngestError::TaskNotConfigured(task.to_string()))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        if paths::validate_task_name(&self.orchestration.name).is_err() {
            error(format!(
                "orchestration name '{}' is not a valid task name",
                self.orchestration.name
            ));
        }

        for task in &self.orchestration.tasks {
            if paths::validate_task_name(task).is_err() {
                error(format!("task name '{task}' is not valid (no whitespace allowed)"));
            }
            if !self.tasks.contains_key(task) {
                error(format!("task '{task}' has no command in tasks"));
            }
        }

        for (name, task) in &self.tasks {
            if task.command.trim().is_empty() {
                error(format!("task '{name}' has an empty command"));
            }
        }

        if !self.logs.contains_key(&self.orchestration.base) {
            error(format!(
                "default base '{}' has no entry in logs",
                self.orchestration.base
            ));
        }

        let mut seen = HashSet::new();
        for task in &self.orchestration.tasks {
            if !seen.insert(task.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "task '{task}' appears more than once; posts addressed to it are delivered to every occurrence"
                    ),
                });
            }
        }

        for (base, layout) in &self.logs {
            if !layout.filename.contains(paths::DATE_PLACEHOLDER) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "log filename for base '{base}' has no {} placeholder; every run appends to one file",
                        paths::DATE_PLACEHOLDER
                    ),
                });
            }
        }

        for name in self.tasks.keys() {
            if !self.orchestration.tasks.contains(name) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("task '{name}' is configured but not in the task list"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
