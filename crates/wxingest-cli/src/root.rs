use std::path::{Path, PathBuf};
use wxingest_core::paths::WXINGEST_DIR;

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `WXINGEST_ROOT` env var (passed in as `explicit`)
/// 2. Nearest ancestor of `cwd` (inclusive) containing `.wxingest/`
/// 3. `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_project_root(&cwd).unwrap_or(cwd)
}

fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(WXINGEST_DIR).is_dir())
        .map(Path::to_path_buf)
}
