#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::error::TaskdeckError;
use crate::task::model::Task;

/// Persistence for the whole task collection. Read once at startup,
/// overwritten wholesale after every mutation.
pub trait TaskStore {
    fn load(&self) -> anyhow::Result<Vec<Task>>;
    fn save(&mut self, tasks: &[Task]) -> anyhow::Result<()>;
}

/// Stores the collection as a JSON array in `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    key: String,
}

impl JsonFileStore {
    pub fn new(dir: PathBuf, key: &str) -> anyhow::Result<Self> {
        validate_key(key)?;
        Ok(Self {
            dir,
            key: key.to_owned(),
        })
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create data dir {}", self.dir.display()))
    }
}

impl TaskStore for JsonFileStore {
    fn load(&self) -> anyhow::Result<Vec<Task>> {
        let path = self.path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data =
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(decode_tasks(&data, &path))
    }

    fn save(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        self.ensure_dir()?;
        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(tasks)?;
        std::fs::write(&tmp, &data).map_err(|source| TaskdeckError::IoPath {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to rename {} -> {}", tmp.display(), path.display()))?;
        tracing::debug!(path = %path.display(), count = tasks.len(), "saved tasks");
        Ok(())
    }
}

/// Decodes a stored collection. Unparseable documents yield an empty list;
/// individual records that fail to decode are skipped.
fn decode_tasks(data: &[u8], path: &Path) -> Vec<Task> {
    let records: Vec<serde_json::Value> = match serde_json::from_slice(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "task store unreadable, starting empty");
            return Vec::new();
        }
    };

    let mut tasks: Vec<Task> = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        let task: Task = match serde_json::from_value(record) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "skipping undecodable task record");
                continue;
            }
        };
        if tasks.iter().any(|t| t.id == task.id) {
            tracing::warn!(id = %task.id, "skipping duplicate task id");
            continue;
        }
        tasks.push(task);
    }
    tasks
}

fn validate_key(key: &str) -> anyhow::Result<()> {
    if key.trim().is_empty() {
        anyhow::bail!("storage key is required");
    }
    if key.contains('/') || key.contains('\\') {
        anyhow::bail!("invalid storage key '{key}': must not contain path separators");
    }
    if key.contains("..") {
        anyhow::bail!("invalid storage key '{key}': must not contain '..'");
    }
    Ok(())
}

/// In-process store, mostly for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tasks: Vec<Task>,
    saves: usize,
    fail_saves: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn saves(&self) -> usize {
        self.saves
    }

    /// Makes every following `save` fail, as a full or read-only disk would.
    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }
}

impl TaskStore for MemoryStore {
    fn load(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self.tasks.clone())
    }

    fn save(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        if self.fail_saves {
            anyhow::bail!("storage unavailable");
        }
        self.tasks = tasks.to_vec();
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::model::Priority;
    use time::macros::date;

    fn sample(id: &str) -> Task {
        Task {
            id: id.to_owned(),
            title: format!("task {id}"),
            description: "desc".to_owned(),
            due_date: date!(2025 - 02 - 01),
            priority: Priority::Medium,
            completed: false,
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("data"), "tasks").unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonFileStore::new(dir.path().to_path_buf(), "tasks").unwrap();
        let tasks = vec![sample("a"), sample("b")];
        store.save(&tasks).unwrap();
        assert!(dir.path().join("tasks.json").exists());
        assert!(!dir.path().join("tasks.json.tmp").exists());
        assert_eq!(store.load().unwrap(), tasks);
    }

    #[test]
    fn garbage_document_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("tasks.json"), b"{not json").unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf(), "tasks").unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn bad_records_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = r#"[
            {"id":"a","title":"ok","description":"","dueDate":"2025-01-01","priority":"low","completed":false},
            {"id":"b","title":"bad","dueDate":"2025-01-01","priority":"urgent"},
            {"id":"c","title":"legacy","description":"","dueDate":"2025-01-03T00:00:00.000Z","priority":"high","completed":true},
            {"id":"a","title":"dup","dueDate":"2025-01-01","priority":"low"}
        ]"#;
        std::fs::write(dir.path().join("tasks.json"), raw).unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf(), "tasks").unwrap();
        let tasks = store.load().unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(tasks[1].due_date, date!(2025 - 01 - 03));
    }

    #[test]
    fn keys_with_separators_are_rejected() {
        assert!(JsonFileStore::new(PathBuf::from("/tmp"), "../x").is_err());
        assert!(JsonFileStore::new(PathBuf::from("/tmp"), "a/b").is_err());
        assert!(JsonFileStore::new(PathBuf::from("/tmp"), " ").is_err());
    }
}
