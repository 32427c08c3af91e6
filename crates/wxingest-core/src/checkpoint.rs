//! Checkpoint emission.
//!
//! The engine hands every state transition to a `CheckpointSink`. The
//! production sink, `PartitionedLog`, picks the partition folder from the
//! state's `base`, the file from the clock's current date, and appends there.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::config::LogLayout;
use crate::error::{IngestError, Result};
use crate::state::OrchestratorState;
use crate::state_log::StateLog;
use crate::store::LogStore;

pub trait CheckpointSink {
    /// Durably record `state`. Returning means the checkpoint is persisted.
    fn record(&self, state: &OrchestratorState) -> Result<()>;
}

/// State log partitioned by base and dated by the run clock.
pub struct PartitionedLog<S> {
    log: StateLog<S>,
    layouts: BTreeMap<String, LogLayout>,
    clock: Arc<dyn Clock>,
}

impl<S: LogStore> PartitionedLog<S> {
    pub fn new(store: S, layouts: BTreeMap<String, LogLayout>, clock: Arc<dyn Clock>) -> Self {
        Self {
            log: StateLog::new(store),
            layouts,
            clock,
        }
    }

    pub fn state_log(&self) -> &StateLog<S> {
        &self.log
    }

    pub fn partition_folder(&self, base: &str) -> Result<&Path> {
        self.layout(base).map(|layout| layout.folder.as_path())
    }

    /// The file a checkpoint for `base` would be appended to right now.
    pub fn log_path(&self, base: &str) -> Result<PathBuf> {
        Ok(self.layout(base)?.file_path(&self.clock.date_stamp()))
    }

    pub fn latest(&self, base: &str) -> Result<Option<OrchestratorState>> {
        self.log.latest(self.partition_folder(base)?)
    }

    pub fn latest_with_status(&self, base: &str, status: &str) -> Result<Option<OrchestratorState>> {
        self.log.latest_with_status(self.partition_folder(base)?, status)
    }

    pub fn latest_for_job(&self, base: &str, job_id: &str) -> Result<Option<OrchestratorState>> {
        self.log.latest_for_job(self.partition_folder(base)?, job_id)
    }

    fn layout(&self, base: &str) -> Result<&LogLayout> {
        self.layouts
            .get(base)
            .ok_or_else(|| IngestError::UnknownBase(base.to_string()))
    }
}

impl<S: LogStore> CheckpointSink for PartitionedLog<S> {
    fn record(&self, state: &OrchestratorState) -> Result<()> {
        let folder = self.partition_folder(&state.base)?;
        self.log.store().ensure_folder(folder)?;
        let path = self.log_path(&state.base)?;
        self.log.append(state, &path)?;
        info!(
            base = %state.base,
            job_id = %state.job_id,
            status = %state.status,
            "checkpoint"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::state::TaskStatus;
    use crate::store::LocalLogStore;
    use chrono::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<ManualClock>, PartitionedLog<LocalLogStore>) {
        let dir = TempDir::new().unwrap();
        // 2021-11-19T23:00:00Z
        let clock = Arc::new(ManualClock::at_epoch(1_637_362_800));
        let mut layouts = BTreeMap::new();
        layouts.insert(
            "WEATHER".to_string(),
            LogLayout::new("logs/weather", "orchestrator_log_{date}.json"),
        );
        let sink = PartitionedLog::new(LocalLogStore::new(dir.path()), layouts, clock.clone());
        (dir, clock, sink)
    }

    #[test]
    fn record_appends_to_dated_file_in_base_folder() {
        let (dir, _clock, sink) = setup();
        let mut state = OrchestratorState::new(0.0, "WEATHER", "full", "", "job-1");
        state.update_state(1.0, "orchestrate", TaskStatus::Running, None);
        sink.record(&state).unwrap();
        state.update_state(2.0, "prepare", TaskStatus::Running, None);
        sink.record(&state).unwrap();

        let file = dir
            .path()
            .join("logs/weather/orchestrator_log_20211119.json");
        assert!(file.exists());
        let entries = sink.state_log().entries(&sink.log_path("WEATHER").unwrap()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(sink.latest("WEATHER").unwrap().unwrap().status, "prepare RUNNING");
    }

    #[test]
    fn record_rolls_over_to_a_new_file_at_midnight() {
        let (dir, clock, sink) = setup();
        let mut state = OrchestratorState::new(0.0, "WEATHER", "full", "", "job-1");
        state.update_state(1.0, "prepare", TaskStatus::Running, None);
        sink.record(&state).unwrap();

        clock.advance(Duration::hours(2));
        state.update_state(2.0, "prepare", TaskStatus::Completed, None);
        sink.record(&state).unwrap();

        let folder = dir.path().join("logs/weather");
        assert!(folder.join("orchestrator_log_20211119.json").exists());
        assert!(folder.join("orchestrator_log_20211120.json").exists());
        assert_eq!(
            sink.latest("WEATHER").unwrap().unwrap().status,
            "prepare COMPLETED"
        );
        assert_eq!(
            sink.latest_with_status("WEATHER", "prepare RUNNING")
                .unwrap()
                .unwrap()
                .execution_time,
            1.0
        );
        assert_eq!(
            sink.latest_for_job("WEATHER", "job-1").unwrap().unwrap().execution_time,
            2.0
        );
    }

    #[test]
    fn record_for_unknown_base_fails() {
        let (_dir, _clock, sink) = setup();
        let state = OrchestratorState::new(0.0, "ELSEWHERE", "full", "", "job-1");
        assert!(matches!(
            sink.record(&state),
            Err(IngestError::UnknownBase(_))
        ));
    }

    #[test]
    fn queries_on_a_cold_start_return_none() {
        let (_dir, _clock, sink) = setup();
        assert!(sink.latest("WEATHER").unwrap().is_none());
        assert!(sink
            .latest_with_status("WEATHER", "prepare RUNNING")
            .unwrap()
            .is_none());
    }
}
