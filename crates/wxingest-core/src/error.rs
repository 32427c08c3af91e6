use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("not initialized: run 'wxingest init'")]
    NotInitialized,

    #[error("task '{task}' failed: {reason}")]
    TaskExecution { task: String, reason: String },

    #[error("task not configured: {0}")]
    TaskNotConfigured(String),

    #[error("invalid task name '{0}': must be non-empty and contain no whitespace")]
    InvalidTaskName(String),

    #[error("no log layout configured for base: {0}")]
    UnknownBase(String),

    #[error("state log not found: {}", .0.display())]
    LogNotFound(PathBuf),

    #[error("corrupt state log {}: {source}", path.display())]
    CorruptLog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IngestError {
    pub fn task_failed(task: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TaskExecution {
            task: task.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
