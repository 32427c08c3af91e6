use crate::error::{IngestError, Result};
use crate::item::{null_as_default, Posts, ProcessingItem};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

/// The transition a checkpoint records for a task or for the orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RUNNING" => Ok(TaskStatus::Running),
            "COMPLETED" => Ok(TaskStatus::Completed),
            other => Err(IngestError::InvalidTransition {
                from: String::new(),
                to: other.to_string(),
                reason: "status must be RUNNING or COMPLETED".to_string(),
            }),
        }
    }
}

/// The status string stored in the log: `"<name> <RUNNING|COMPLETED>"`.
pub fn status_line(name: &str, status: TaskStatus) -> String {
    format!("{name} {status}")
}

// ---------------------------------------------------------------------------
// OrchestratorState
// ---------------------------------------------------------------------------

/// The run record persisted at every checkpoint.
///
/// `state_processing_items` holds at most the latest `ProcessingItem`; the
/// history of a run lives in the state log, one entry per checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorState {
    pub execution_time: f64,
    pub base: String,
    pub mode: String,
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state_processing_items: Vec<ProcessingItem>,
    pub job_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub posts: Posts,
}

impl OrchestratorState {
    pub fn new(
        execution_time: f64,
        base: impl Into<String>,
        mode: impl Into<String>,
        status: impl Into<String>,
        job_id: impl Into<String>,
    ) -> Self {
        Self {
            execution_time,
            base: base.into(),
            mode: mode.into(),
            status: status.into(),
            state_processing_items: Vec::new(),
            job_id: job_id.into(),
            posts: Posts::new(),
        }
    }

    /// Record a transition. A provided item replaces the previous one.
    pub fn update_state(
        &mut self,
        execution_time: f64,
        task: &str,
        status: TaskStatus,
        processing_item: Option<ProcessingItem>,
    ) {
        self.execution_time = execution_time;
        self.status = status_line(task, status);
        if let Some(item) = processing_item {
            self.state_processing_items = vec![item];
        }
    }

    /// Split `status` back into its name and transition. `None` before the
    /// first update or when the log holds a status this build cannot parse.
    pub fn status_parts(&self) -> Option<(&str, TaskStatus)> {
        let (name, status) = self.status.rsplit_once(' ')?;
        let status = status.parse().ok()?;
        Some((name, status))
    }

    pub fn latest_item(&self) -> Option<&ProcessingItem> {
        self.state_processing_items.last()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrchestratorState(jobId={})", self.job_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn sample_state() -> OrchestratorState {
        OrchestratorState::new(0.0, "WEATHER", "full", "", "job-1")
    }

    #[test]
    fn new_state_has_empty_status_and_items() {
        let state = sample_state();
        assert_eq!(state.status, "");
        assert!(state.state_processing_items.is_empty());
        assert!(state.posts.is_empty());
        assert_eq!(state.status_parts(), None);
    }

    #[test]
    fn update_state_formats_status() {
        let mut state = sample_state();
        state.update_state(10.0, "prepare", TaskStatus::Running, None);
        assert_eq!(state.execution_time, 10.0);
        assert_eq!(state.status, "prepare RUNNING");
        assert_eq!(state.status_parts(), Some(("prepare", TaskStatus::Running)));
    }

    #[test]
    fn update_state_replaces_items_instead_of_appending() {
        let mut state = sample_state();
        state.update_state(
            1.0,
            "prepare",
            TaskStatus::Completed,
            Some(ProcessingItem::with_start_time("prepare", 0.5)),
        );
        state.update_state(
            2.0,
            "normalize",
            TaskStatus::Completed,
            Some(ProcessingItem::with_start_time("normalize", 1.5)),
        );
        assert_eq!(state.state_processing_items.len(), 1);
        assert_eq!(state.latest_item().unwrap().step_name(), "normalize");
    }

    #[test]
    fn update_state_without_item_keeps_previous_item() {
        let mut state = sample_state();
        state.update_state(
            1.0,
            "prepare",
            TaskStatus::Completed,
            Some(ProcessingItem::with_start_time("prepare", 0.5)),
        );
        state.update_state(2.0, "normalize", TaskStatus::Running, None);
        assert_eq!(state.latest_item().unwrap().step_name(), "prepare");
        assert_eq!(state.status, "normalize RUNNING");
    }

    #[test]
    fn status_parts_splits_on_last_space() {
        let mut state = sample_state();
        state.status = "some odd name COMPLETED".to_string();
        assert_eq!(
            state.status_parts(),
            Some(("some odd name", TaskStatus::Completed))
        );
        state.status = "prepare PAUSED".to_string();
        assert_eq!(state.status_parts(), None);
    }

    #[test]
    fn any_name_without_whitespace_roundtrips_through_status() {
        let mut state = sample_state();
        for name in ["station/météo", "-dash-first", "タスク.v2"] {
            crate::paths::validate_task_name(name).unwrap();
            state.update_state(1.0, name, TaskStatus::Running, None);
            assert_eq!(state.status_parts(), Some((name, TaskStatus::Running)));
        }
    }

    #[test]
    fn serializes_log_entry_shape() {
        let mut state = sample_state();
        state.update_state(
            3.5,
            "prepare",
            TaskStatus::Completed,
            Some(ProcessingItem::with_start_time("prepare", 1.0)),
        );
        let value: Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "executionTime": 3.5,
                "base": "WEATHER",
                "mode": "full",
                "status": "prepare COMPLETED",
                "stateProcessingItems": [{
                    "stepName": "prepare",
                    "startTime": 1.0,
                    "endTime": null,
                    "inputs": [],
                    "outputs": [],
                    "posts": {}
                }],
                "jobId": "job-1",
                "posts": {}
            })
        );
    }

    #[test]
    fn roundtrip_with_nested_items_and_posts() {
        let mut item = ProcessingItem::with_start_time("prepare", 1.25);
        item.add_inputs(["raw/a.csv", "raw/b.csv"]);
        item.post("normalize", "inputFilePaths", json!(["raw/a.csv"]));
        let mut state = sample_state();
        state.update_state(7.75, "prepare", TaskStatus::Completed, Some(item));
        state.posts.insert(
            "orchestrate".to_string(),
            json!({"sourceProcessedFilePaths": ["raw/a.csv"], "meta": {"n": [1, 2.5, "x"]}}),
        );

        let back = OrchestratorState::from_json(&state.to_json().unwrap()).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn from_json_accepts_null_items_and_posts() {
        let state = OrchestratorState::from_json(
            r#"{"executionTime": 0, "base": "B", "mode": "m", "status": "",
                "stateProcessingItems": null, "jobId": "j", "posts": null}"#,
        )
        .unwrap();
        assert!(state.state_processing_items.is_empty());
        assert!(state.posts.is_empty());
    }

    #[test]
    fn display_names_the_job() {
        assert_eq!(sample_state().to_string(), "OrchestratorState(jobId=job-1)");
    }
}
