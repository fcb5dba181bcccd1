use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backlog::BacklogError;
use crate::duration::{parse_duration, Duration, FormatError, WorkCalendar};
use crate::task::{load_tasks, Task};

pub const DEFAULT_ESTIMATED_KEY: &str = "estimatedtime";
pub const DEFAULT_ACTUAL_KEY: &str = "totalactivetime";
pub const DEFAULT_VELOCITY_KEY: &str = "velocity";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backlog(#[from] BacklogError),
    #[error("Task store IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Task {task_id}: invalid {attribute} value: {source}")]
pub struct AttributeFormatError {
    pub task_id: String,
    pub attribute: String,
    #[source]
    pub source: FormatError,
}

/// One work item as seen by the forecast: an id plus string attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: String,
    pub attributes: BTreeMap<String, String>,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Attribute value, or `None` when absent or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Parse a duration attribute. Absent attributes are `Ok(None)`; malformed
    /// ones are errors carrying the task id.
    pub fn duration(
        &self,
        key: &str,
        calendar: &WorkCalendar,
    ) -> Result<Option<Duration>, AttributeFormatError> {
        let Some(text) = self.get(key) else {
            return Ok(None);
        };
        parse_duration(text, calendar)
            .map(Some)
            .map_err(|source| AttributeFormatError {
                task_id: self.id.clone(),
                attribute: key.to_string(),
                source,
            })
    }
}

impl From<Task> for TaskRecord {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            attributes: task.attributes,
        }
    }
}

/// Names of the task attributes the forecast reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeKeys {
    pub estimated: String,
    pub actual: String,
    pub velocity: String,
}

impl Default for AttributeKeys {
    fn default() -> Self {
        Self {
            estimated: DEFAULT_ESTIMATED_KEY.to_string(),
            actual: DEFAULT_ACTUAL_KEY.to_string(),
            velocity: DEFAULT_VELOCITY_KEY.to_string(),
        }
    }
}

/// Completed and pending records taken from one read of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacklogSnapshot {
    pub completed: Vec<TaskRecord>,
    pub pending: Vec<TaskRecord>,
}

pub trait TaskStore {
    fn load_completed(&self) -> Result<Vec<TaskRecord>, StoreError>;
    fn load_pending(&self) -> Result<Vec<TaskRecord>, StoreError>;

    /// Both record sets. Stores backed by mutable media override this to read once.
    fn load_snapshot(&self) -> Result<BacklogSnapshot, StoreError> {
        Ok(BacklogSnapshot {
            completed: self.load_completed()?,
            pending: self.load_pending()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Completed,
    Pending,
    Ignored,
}

pub fn classify_status(status: &str) -> TaskState {
    match status.trim().to_lowercase().as_str() {
        "done" | "completed" | "complete" => TaskState::Completed,
        "deleted" | "cancelled" | "canceled" | "archived" => TaskState::Ignored,
        _ => TaskState::Pending,
    }
}

/// Tasks stored as markdown files with front matter under `<backlog>/tasks`.
#[derive(Debug, Clone)]
pub struct BacklogStore {
    backlog_dir: PathBuf,
}

impl BacklogStore {
    pub fn open(backlog_dir: &Path) -> Result<Self, StoreError> {
        if !backlog_dir.join("tasks").is_dir() {
            return Err(BacklogError::NotFound(backlog_dir.to_path_buf()).into());
        }
        Ok(Self {
            backlog_dir: backlog_dir.to_path_buf(),
        })
    }

    pub fn backlog_dir(&self) -> &Path {
        &self.backlog_dir
    }

    fn scan(&self) -> Result<BacklogSnapshot, StoreError> {
        let mut snapshot = BacklogSnapshot::default();
        for task in load_tasks(&self.backlog_dir)? {
            match classify_status(&task.status) {
                TaskState::Completed => snapshot.completed.push(task.into()),
                TaskState::Pending => snapshot.pending.push(task.into()),
                TaskState::Ignored => {}
            }
        }
        Ok(snapshot)
    }
}

impl TaskStore for BacklogStore {
    fn load_completed(&self) -> Result<Vec<TaskRecord>, StoreError> {
        Ok(self.scan()?.completed)
    }

    fn load_pending(&self) -> Result<Vec<TaskRecord>, StoreError> {
        Ok(self.scan()?.pending)
    }

    fn load_snapshot(&self) -> Result<BacklogSnapshot, StoreError> {
        self.scan()
    }
}

/// In-memory store, handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub completed: Vec<TaskRecord>,
    pub pending: Vec<TaskRecord>,
}

impl MemoryStore {
    pub fn new(completed: Vec<TaskRecord>, pending: Vec<TaskRecord>) -> Self {
        Self { completed, pending }
    }
}

impl TaskStore for MemoryStore {
    fn load_completed(&self) -> Result<Vec<TaskRecord>, StoreError> {
        Ok(self.completed.clone())
    }

    fn load_pending(&self) -> Result<Vec<TaskRecord>, StoreError> {
        Ok(self.pending.clone())
    }
}
