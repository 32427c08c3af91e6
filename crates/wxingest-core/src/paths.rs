use crate::error::{IngestError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const WXINGEST_DIR: &str = ".wxingest";
pub const CONFIG_FILE: &str = ".wxingest/config.yaml";

/// Placeholder in a log filename pattern, replaced by the `YYYYMMDD` date.
pub const DATE_PLACEHOLDER: &str = "{date}";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn wxingest_dir(root: &Path) -> PathBuf {
    root.join(WXINGEST_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Expand a log filename pattern for the given date stamp.
pub fn log_file_name(pattern: &str, date_stamp: &str) -> String {
    pattern.replace(DATE_PLACEHOLDER, date_stamp)
}

// ---------------------------------------------------------------------------
// Task name validation
// ---------------------------------------------------------------------------

static TASK_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn task_name_re() -> &'static Regex {
    TASK_NAME_RE
        .get_or_init(|| Regex::new(r"^\S+$").expect("valid task name regex"))
}

/// Task and orchestration names end up in `"<name> <STATUS>"` strings, so they
/// must not contain whitespace.
pub fn validate_task_name(name: &str) -> Result<()> {
    if !task_name_re().is_match(name) {
        return Err(IngestError::InvalidTaskName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
