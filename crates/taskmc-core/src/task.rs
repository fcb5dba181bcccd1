use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_yaml::Value;
use thiserror::Error;

/// A task file from a backlog's `tasks/` directory.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub status: String,
    /// Every other scalar front matter key, stringified.
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum TaskParseError {
    #[error("Missing front matter delimiter")]
    MissingFrontMatter,
    #[error("Missing closing --- for front matter")]
    MissingFrontMatterEnd,
    #[error("Invalid task file: {0}")]
    Invalid(String),
}

const KNOWN_KEYS: [&str; 3] = ["id", "title", "status"];

/// The YAML between the leading `---` and the next `---` line.
pub fn split_front_matter(text: &str) -> Result<String, TaskParseError> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() || lines[0].trim() != "---" {
        return Err(TaskParseError::MissingFrontMatter);
    }
    let end_idx = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| line.trim() == "---")
        .map(|(idx, _)| idx)
        .ok_or(TaskParseError::MissingFrontMatterEnd)?;
    Ok(lines[1..end_idx].join("\n"))
}

pub fn parse_task_text(text: &str, path: Option<&Path>) -> Result<Task, TaskParseError> {
    let front = split_front_matter(text)?;
    let data = parse_front_matter(&front);

    let id = scalar(&data, "id")
        .or_else(|| path.map(id_from_filename))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| TaskParseError::Invalid("task has no id".to_string()))?;
    let status = scalar(&data, "status").unwrap_or_default();

    let mut attributes = BTreeMap::new();
    for (key, value) in &data {
        if KNOWN_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(text) = value_to_string(value) {
            attributes.insert(key.clone(), text.trim().to_string());
        }
    }

    Ok(Task {
        id,
        status,
        attributes,
    })
}

pub fn parse_task_file(path: &Path) -> Result<Task, TaskParseError> {
    let text =
        fs::read_to_string(path).map_err(|err| TaskParseError::Invalid(err.to_string()))?;
    parse_task_text(&text, Some(path))
}

/// Load every parseable `*.md` task under `<backlog_dir>/tasks`, in file name order.
///
/// A directory that cannot be listed is an error; individual files that fail
/// to parse are skipped.
pub fn load_tasks(backlog_dir: &Path) -> Result<Vec<Task>, std::io::Error> {
    let tasks_dir = backlog_dir.join("tasks");
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(&tasks_dir)? {
        let path = entry?.path();
        if path.extension().map(|ext| ext == "md").unwrap_or(false) {
            entries.push(path);
        }
    }
    entries.sort();

    let mut tasks = Vec::new();
    for path in entries {
        match parse_task_file(&path) {
            Ok(task) => tasks.push(task),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "skipping task file");
            }
        }
    }
    Ok(tasks)
}

fn scalar(data: &HashMap<String, Value>, key: &str) -> Option<String> {
    data.get(key)
        .and_then(value_to_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_front_matter(front: &str) -> HashMap<String, Value> {
    if let Ok(Value::Mapping(map)) = serde_yaml::from_str::<Value>(front) {
        let data: HashMap<String, Value> = map
            .into_iter()
            .filter_map(|(key, value)| value_to_string(&key).map(|key| (key, value)))
            .collect();
        if !data.is_empty() {
            return data;
        }
    }
    parse_front_matter_loose(front)
}

// Hand-edited files are not always valid YAML (e.g. unquoted `estimatedtime: 2h: rough`);
// fall back to one `key: value` pair per line.
fn parse_front_matter_loose(front: &str) -> HashMap<String, Value> {
    let mut data = HashMap::new();
    for line in front.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || line.starts_with([' ', '\t']) {
            continue;
        }
        let Some((key, rest)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = rest.trim().trim_matches(|c| c == '"' || c == '\'');
        data.insert(key.to_string(), Value::String(value.to_string()));
    }
    data
}

fn id_from_filename(path: &Path) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let file_name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let re = PATTERN.get_or_init(|| Regex::new(r"(?i)(task-\d+)").expect("regex"));
    re.captures(file_name)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| file_name.to_string())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(val) => Some(val.clone()),
        Value::Number(num) => Some(num.to_string()),
        Value::Bool(val) => Some(val.to_string()),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
        Value::Tagged(tagged) => value_to_string(&tagged.value),
    }
}
