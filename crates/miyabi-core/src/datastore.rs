use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::gateway::{Change, PersistenceGateway};
use crate::task::Task;

/// Synchronous local backing store: the whole collection as JSON Lines,
/// rewritten atomically after every mutation.
#[derive(Debug)]
pub struct LocalStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
}

impl LocalStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened local store"
        );

        Ok(Self {
            data_dir,
            tasks_path,
        })
    }
}

impl PersistenceGateway for LocalStore {
    #[tracing::instrument(skip(self))]
    fn load(&mut self) -> anyhow::Result<Vec<Task>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self, tasks, _change))]
    fn persist(&mut self, tasks: &[Task], _change: &Change<'_>) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks).context("failed to save tasks.data")
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::LocalStore;
    use crate::gateway::{Change, PersistenceGateway};
    use crate::task::{Priority, Repeat, Task};

    #[test]
    fn save_and_reload_round_trip() {
        let temp = tempdir().expect("tempdir");
        let mut store = LocalStore::open(temp.path()).expect("open");

        let tasks = vec![
            Task::new(1, "first".to_string(), Priority::High, Repeat::None, None),
            Task::new(2, "second".to_string(), Priority::None, Repeat::Daily, None),
        ];
        store
            .persist(&tasks, &Change::Created(&tasks[1]))
            .expect("persist");

        let mut reopened = LocalStore::open(temp.path()).expect("reopen");
        let loaded = reopened.load().expect("load");
        assert_eq!(loaded, tasks);
    }

    #[test]
    fn empty_store_loads_no_tasks() {
        let temp = tempdir().expect("tempdir");
        let mut store = LocalStore::open(temp.path()).expect("open");
        assert!(store.load().expect("load").is_empty());
    }
}
