//! Append-only log of `OrchestratorState` checkpoints.
//!
//! # Layout
//!
//! ```text
//! <partition folder>/            one folder per base
//!   orchestrator_log_20211118.json   [ entry, entry, ... ]   oldest first
//!   orchestrator_log_20211119.json   [ entry, entry, ... ]
//! ```
//!
//! File names embed the date as `YYYYMMDD`, so lexicographic order equals
//! chronological order and "most recent file" is simply the greatest name.
//!
//! `append` is a read-modify-write of the whole file. It is only correct with
//! a single writer per `(base, date)` file; the scheduler running the
//! orchestrations guarantees that.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::state::OrchestratorState;
use crate::store::LogStore;

pub struct StateLog<S> {
    store: S,
}

impl<S: LogStore> StateLog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append one checkpoint to the log file at `log_path`, creating it if needed.
    pub fn append(&self, state: &OrchestratorState, log_path: &Path) -> Result<()> {
        let entry = serde_json::to_value(state)?;
        let mut entries = if self.store.exists(log_path)? {
            self.store.read_all(log_path)?
        } else {
            Vec::new()
        };
        entries.push(entry);
        self.store.write_all(log_path, &entries)?;
        debug!(
            path = %log_path.display(),
            status = %state.status,
            job_id = %state.job_id,
            entries = entries.len(),
            "checkpoint appended"
        );
        Ok(())
    }

    /// Every checkpoint in one log file, oldest first. A missing file is empty.
    pub fn entries(&self, log_path: &Path) -> Result<Vec<OrchestratorState>> {
        let Some(raw) = self.read_entries(log_path)? else {
            return Ok(Vec::new());
        };
        raw.into_iter()
            .map(|value| decode(log_path, value))
            .collect()
    }

    /// The last checkpoint of the most recent log file in `folder`.
    ///
    /// `None` when the folder is missing or holds no entries.
    pub fn latest(&self, folder: &Path) -> Result<Option<OrchestratorState>> {
        let Some(files) = self.log_files_newest_first(folder)? else {
            return Ok(None);
        };
        let Some(newest) = files.first() else {
            return Ok(None);
        };
        let path = folder.join(newest);
        let Some(mut raw) = self.read_entries(&path)? else {
            return Ok(None);
        };
        match raw.pop() {
            Some(value) => decode(&path, value).map(Some),
            None => Ok(None),
        }
    }

    /// The last checkpoint whose status equals `status` exactly.
    ///
    /// Files are searched newest first and the search stops at the first file
    /// holding any match; older files are not consulted once a match is found.
    pub fn latest_with_status(
        &self,
        folder: &Path,
        status: &str,
    ) -> Result<Option<OrchestratorState>> {
        self.find_last(folder, |entry| {
            entry.get("status").and_then(Value::as_str) == Some(status)
        })
    }

    /// The last checkpoint recorded for run `job_id`, searching newest file first.
    pub fn latest_for_job(&self, folder: &Path, job_id: &str) -> Result<Option<OrchestratorState>> {
        self.find_last(folder, |entry| {
            entry.get("jobId").and_then(Value::as_str) == Some(job_id)
        })
    }

    fn find_last<F>(&self, folder: &Path, matches: F) -> Result<Option<OrchestratorState>>
    where
        F: Fn(&Value) -> bool,
    {
        let Some(files) = self.log_files_newest_first(folder)? else {
            return Ok(None);
        };
        for name in files {
            let path = folder.join(&name);
            let Some(raw) = self.read_entries(&path)? else {
                continue;
            };
            if let Some(value) = raw.into_iter().rev().find(|entry| matches(entry)) {
                return decode(&path, value).map(Some);
            }
        }
        Ok(None)
    }

    fn log_files_newest_first(&self, folder: &Path) -> Result<Option<Vec<String>>> {
        match self.store.list(folder) {
            Ok(mut files) => {
                files.sort_by(|a, b| b.cmp(a));
                Ok(Some(files))
            }
            Err(IngestError::LogNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read_entries(&self, path: &Path) -> Result<Option<Vec<Value>>> {
        match self.store.read_all(path) {
            Ok(entries) => Ok(Some(entries)),
            Err(IngestError::LogNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn decode(path: &Path, value: Value) -> Result<OrchestratorState> {
    serde_json::from_value(value).map_err(|source| IngestError::CorruptLog {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
