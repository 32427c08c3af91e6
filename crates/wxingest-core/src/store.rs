//! Storage behind the state log.
//!
//! A `LogStore` knows how to list log files in a folder and read or rewrite a
//! whole log file as a JSON array of entries. Entries stay untyped here so a
//! query can filter on `status` before paying for full deserialization.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{IngestError, Result};
use crate::io;

pub trait LogStore: Send + Sync {
    fn exists(&self, path: &Path) -> Result<bool>;

    /// File names directly under `folder`, sorted ascending.
    /// A missing folder is `IngestError::LogNotFound`.
    fn list(&self, folder: &Path) -> Result<Vec<String>>;

    /// All entries of the log at `path`. A missing file is
    /// `IngestError::LogNotFound`; unparsable content is `IngestError::CorruptLog`.
    fn read_all(&self, path: &Path) -> Result<Vec<Value>>;

    fn write_all(&self, path: &Path, entries: &[Value]) -> Result<()>;

    fn ensure_folder(&self, folder: &Path) -> Result<()>;
}

// ---------------------------------------------------------------------------
// LocalLogStore
// ---------------------------------------------------------------------------

/// Log files on the local filesystem. Relative paths resolve against `root`.
#[derive(Debug, Clone)]
pub struct LocalLogStore {
    root: PathBuf,
}

impl LocalLogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl LogStore for LocalLogStore {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve(path).exists())
    }

    fn list(&self, folder: &Path) -> Result<Vec<String>> {
        let dir = self.resolve(folder);
        if !dir.is_dir() {
            return Err(IngestError::LogNotFound(folder.to_path_buf()));
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            // Skip leftovers of interrupted atomic writes.
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    fn read_all(&self, path: &Path) -> Result<Vec<Value>> {
        let file = self.resolve(path);
        let data = match std::fs::read_to_string(&file) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestError::LogNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data).map_err(|source| IngestError::CorruptLog {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_all(&self, path: &Path, entries: &[Value]) -> Result<()> {
        let data = serde_json::to_vec(entries)?;
        io::atomic_write(&self.resolve(path), &data)
    }

    fn ensure_folder(&self, folder: &Path) -> Result<()> {
        io::ensure_dir(&self.resolve(folder))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalLogStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalLogStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn write_then_read_all() {
        let (_dir, store) = store();
        let path = Path::new("logs/log_20211119.json");
        store.write_all(path, &[json!({"a": 1}), json!({"a": 2})]).unwrap();
        assert!(store.exists(path).unwrap());
        assert_eq!(
            store.read_all(path).unwrap(),
            vec![json!({"a": 1}), json!({"a": 2})]
        );
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.read_all(Path::new("nope.json")),
            Err(IngestError::LogNotFound(_))
        ));
    }

    #[test]
    fn read_garbage_is_corrupt_not_missing() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        assert!(matches!(
            store.read_all(Path::new("bad.json")),
            Err(IngestError::CorruptLog { .. })
        ));
    }

    #[test]
    fn list_sorts_and_skips_dirs_and_hidden_files() {
        let (dir, store) = store();
        let logs = dir.path().join("logs");
        std::fs::create_dir_all(logs.join("nested")).unwrap();
        for name in ["log_20211120.json", "log_20211118.json", ".tmpAbc123"] {
            std::fs::write(logs.join(name), "[]").unwrap();
        }
        assert_eq!(
            store.list(Path::new("logs")).unwrap(),
            vec!["log_20211118.json", "log_20211120.json"]
        );
    }

    #[test]
    fn list_missing_folder_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.list(Path::new("missing")),
            Err(IngestError::LogNotFound(_))
        ));
    }

    #[test]
    fn absolute_paths_bypass_root() {
        let (_dir, store) = store();
        let other = TempDir::new().unwrap();
        let path = other.path().join("abs.json");
        store.write_all(&path, &[json!(1)]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn ensure_folder_is_idempotent() {
        let (dir, store) = store();
        store.ensure_folder(Path::new("a/b")).unwrap();
        store.ensure_folder(Path::new("a/b")).unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }
}
