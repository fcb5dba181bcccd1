use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BacklogError {
    #[error("No tasks found under {0}")]
    NotFound(PathBuf),
}

/// Conventional backlog locations under a project root, in lookup order.
const CONVENTIONAL_DIRS: [&str; 3] = ["backlog", "workmesh", "."];

/// Resolve the backlog directory (the one holding `tasks/`) for an explicit root.
///
/// Passing the `tasks` directory itself resolves to its parent. Otherwise a
/// configured `root_dir` (relative to `root`) wins, then the conventional
/// layouts are tried in order.
pub fn resolve_backlog_dir(root: &Path, root_dir: Option<&str>) -> Result<PathBuf, BacklogError> {
    if is_named(root, "tasks") && root.is_dir() {
        return Ok(root.parent().unwrap_or(root).to_path_buf());
    }

    let configured = root_dir.map(str::trim).filter(|value| !value.is_empty());
    configured
        .into_iter()
        .chain(CONVENTIONAL_DIRS)
        .map(|dir| match dir {
            "." => root.to_path_buf(),
            dir => root.join(dir),
        })
        .find(|candidate| candidate.join("tasks").is_dir())
        .ok_or_else(|| BacklogError::NotFound(root.to_path_buf()))
}

/// Walk up from `start` until a directory holding a backlog is found.
pub fn locate_backlog_dir(start: &Path, root_dir: Option<&str>) -> Result<PathBuf, BacklogError> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .find_map(|candidate| resolve_backlog_dir(candidate, root_dir).ok())
        .ok_or(BacklogError::NotFound(start))
}

fn is_named(path: &Path, name: &str) -> bool {
    path.file_name()
        .map(|segment| segment.to_string_lossy().eq_ignore_ascii_case(name))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn canon(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }

    #[test]
    fn prefers_backlog_over_root_tasks() {
        let temp = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(temp.path().join("backlog").join("tasks")).expect("backlog");
        std::fs::create_dir_all(temp.path().join("tasks")).expect("tasks");

        let backlog_dir = resolve_backlog_dir(temp.path(), None).expect("resolve");
        assert_eq!(backlog_dir, temp.path().join("backlog"));
    }

    #[test]
    fn configured_root_dir_wins() {
        let temp = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(temp.path().join("backlog").join("tasks")).expect("backlog");
        std::fs::create_dir_all(temp.path().join("planning").join("tasks")).expect("planning");

        let backlog_dir = resolve_backlog_dir(temp.path(), Some("planning")).expect("resolve");
        assert_eq!(backlog_dir, temp.path().join("planning"));
    }

    #[test]
    fn explicit_tasks_dir_resolves_to_parent() {
        let temp = TempDir::new().expect("tempdir");
        let tasks_dir = temp.path().join("workmesh").join("tasks");
        std::fs::create_dir_all(&tasks_dir).expect("tasks");

        let backlog_dir = resolve_backlog_dir(&tasks_dir, None).expect("resolve");
        assert_eq!(backlog_dir, temp.path().join("workmesh"));
    }

    #[test]
    fn locate_walks_up_from_child() {
        let temp = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(temp.path().join("tasks")).expect("tasks");
        let deep = temp.path().join("src").join("pkg");
        std::fs::create_dir_all(&deep).expect("deep");

        let located = locate_backlog_dir(&deep, None).expect("locate");
        assert_eq!(canon(&located), canon(temp.path()));
    }

    #[test]
    fn resolve_errors_when_missing() {
        let temp = TempDir::new().expect("tempdir");
        let err = resolve_backlog_dir(temp.path(), None);
        assert!(matches!(err, Err(BacklogError::NotFound(_))));
    }
}
