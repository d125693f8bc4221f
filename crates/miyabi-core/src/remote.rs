use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::gateway::{Change, PersistenceGateway, PushCallback, Unsubscribe};
use crate::task::{Priority, Repeat, Task};

/// Per-field update for a document store. `None` leaves a field untouched;
/// `reminder: Some(None)` clears the reminder.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub reminder: Option<Option<NaiveDateTime>>,
    pub notified: Option<bool>,
    pub repeat: Option<Repeat>,
    pub focus_time: Option<u64>,
}

impl TaskPatch {
    /// Patch carrying every field of `task`, for callers that track whole
    /// documents rather than diffs.
    pub fn from_task(task: &Task) -> Self {
        Self {
            text: Some(task.text.clone()),
            priority: Some(task.priority),
            completed: Some(task.completed),
            reminder: Some(task.reminder),
            notified: Some(task.notified),
            repeat: Some(task.repeat),
            focus_time: Some(task.focus_time),
        }
    }

    fn apply(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text = text.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(reminder) = self.reminder {
            task.reminder = reminder;
        }
        if let Some(notified) = self.notified {
            task.notified = notified;
        }
        if let Some(repeat) = self.repeat {
            task.repeat = repeat;
        }
        if let Some(focus_time) = self.focus_time {
            task.focus_time = focus_time;
        }
    }
}

/// Asynchronous document store the remote gateway talks to. Tracks documents
/// keyed by task id, not a single blob; updates arrive back as full
/// snapshots through the subscription, never as deltas.
pub trait DocumentBackend {
    fn fetch_all(&mut self) -> anyhow::Result<Vec<Task>>;
    fn create(&mut self, task: &Task) -> anyhow::Result<()>;
    fn patch(&mut self, id: u64, fields: &TaskPatch) -> anyhow::Result<()>;
    fn delete(&mut self, id: u64) -> anyhow::Result<()>;
    fn subscribe(&mut self, callback: PushCallback) -> Option<Unsubscribe>;
}

/// Gateway over a document store: one call per affected document, no bulk
/// saves. Writes are fire-and-forget from the store's perspective; ordering
/// changes are a local-array concept and are not persisted here.
pub struct RemoteStore<B: DocumentBackend> {
    backend: B,
}

impl<B: DocumentBackend> RemoteStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

impl<B: DocumentBackend> PersistenceGateway for RemoteStore<B> {
    fn load(&mut self) -> anyhow::Result<Vec<Task>> {
        self.backend.fetch_all().context("failed to fetch documents")
    }

    #[instrument(skip(self, _tasks, change))]
    fn persist(&mut self, _tasks: &[Task], change: &Change<'_>) -> anyhow::Result<()> {
        match change {
            Change::Created(task) => self.backend.create(task),
            Change::Updated(task) => self.backend.patch(task.id, &TaskPatch::from_task(task)),
            Change::Removed(id) => self.backend.delete(*id),
            // The document store has no bulk delete; one call per document.
            Change::Cleared(ids) => {
                for id in ids.iter() {
                    self.backend.delete(*id)?;
                }
                Ok(())
            }
            Change::Reordered => {
                debug!("reorder not persisted remotely; document order is id-based");
                Ok(())
            }
        }
    }

    fn subscribe(&mut self, callback: PushCallback) -> Option<Unsubscribe> {
        self.backend.subscribe(callback)
    }
}

/// In-memory document store: the reference implementation of the backend
/// contract, and the double that tests drive push updates through.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    documents: BTreeMap<u64, Task>,
    listeners: BTreeMap<u64, PushCallback>,
    next_listener: u64,
}

impl MemoryBackend {
    /// Documents in id order, the way `fetch_all` reports them.
    pub fn snapshot(&self) -> Vec<Task> {
        let inner = self.lock();
        inner.documents.values().cloned().collect()
    }

    /// Deliver the current documents to every subscriber, the way a remote
    /// store pushes a changed collection.
    pub fn push_snapshot(&self) {
        let mut inner = self.lock();
        let snapshot: Vec<Task> = inner.documents.values().cloned().collect();
        for listener in inner.listeners.values_mut() {
            listener(snapshot.clone());
        }
    }

    /// Write a document directly, bypassing the gateway; stands in for
    /// another writer on the remote end.
    pub fn upsert_remote(&self, task: Task) {
        self.lock().documents.insert(task.id, task);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("memory backend lock poisoned; continuing with inner state");
                poisoned.into_inner()
            }
        }
    }
}

impl DocumentBackend for MemoryBackend {
    fn fetch_all(&mut self) -> anyhow::Result<Vec<Task>> {
        Ok(self.snapshot())
    }

    fn create(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut inner = self.lock();
        if inner.documents.contains_key(&task.id) {
            return Err(anyhow!("document {} already exists", task.id));
        }
        inner.documents.insert(task.id, task.clone());
        Ok(())
    }

    fn patch(&mut self, id: u64, fields: &TaskPatch) -> anyhow::Result<()> {
        let mut inner = self.lock();
        let task = inner
            .documents
            .get_mut(&id)
            .ok_or_else(|| anyhow!("no document {id}"))?;
        fields.apply(task);
        Ok(())
    }

    fn delete(&mut self, id: u64) -> anyhow::Result<()> {
        self.lock().documents.remove(&id);
        Ok(())
    }

    fn subscribe(&mut self, callback: PushCallback) -> Option<Unsubscribe> {
        let mut inner = self.lock();
        let token = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.insert(token, callback);
        let backend = self.clone();
        Some(Box::new(move || {
            backend.lock().listeners.remove(&token);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentBackend, MemoryBackend, RemoteStore, TaskPatch};
    use crate::gateway::{Change, PersistenceGateway};
    use crate::task::{Priority, Repeat, Task};

    fn sample(id: u64, text: &str) -> Task {
        Task::new(id, text.to_string(), Priority::None, Repeat::None, None)
    }

    #[test]
    fn created_and_updated_documents_round_trip() {
        let backend = MemoryBackend::default();
        let mut gateway = RemoteStore::new(backend.clone());

        let task = sample(1, "remote me");
        gateway
            .persist(&[task.clone()], &Change::Created(&task))
            .expect("create");

        let mut updated = task.clone();
        updated.completed = true;
        gateway
            .persist(&[updated.clone()], &Change::Updated(&updated))
            .expect("patch");

        let docs = backend.snapshot();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].completed);
    }

    #[test]
    fn clearing_deletes_one_document_per_id() {
        let backend = MemoryBackend::default();
        let mut gateway = RemoteStore::new(backend.clone());

        for id in 1..=3 {
            let task = sample(id, "bulk");
            gateway
                .persist(&[], &Change::Created(&task))
                .expect("create");
        }

        gateway
            .persist(&[], &Change::Cleared(&[1, 3]))
            .expect("clear");
        let remaining: Vec<u64> = backend.snapshot().iter().map(|t| t.id).collect();
        assert_eq!(remaining, [2]);
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let mut backend = MemoryBackend::default();
        backend.create(&sample(1, "first")).expect("create");
        assert!(backend.create(&sample(1, "second")).is_err());
    }

    #[test]
    fn patch_clears_reminder_with_nested_option() {
        let mut backend = MemoryBackend::default();
        let mut task = sample(1, "dated");
        task.reminder = crate::datetime::parse_reminder("2024-06-01T09:00").ok();
        backend.create(&task).expect("create");

        let patch = TaskPatch {
            reminder: Some(None),
            ..TaskPatch::default()
        };
        backend.patch(1, &patch).expect("patch");
        assert!(backend.snapshot()[0].reminder.is_none());
    }

    #[test]
    fn subscription_receives_full_snapshots() {
        let mut backend = MemoryBackend::default();
        backend.create(&sample(1, "pushed")).expect("create");

        let received = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = received.clone();
        let unsubscribe = backend
            .subscribe(Box::new(move |tasks| {
                sink.lock().expect("sink lock").push(tasks);
            }))
            .expect("subscribe");

        backend.push_snapshot();
        {
            let snapshots = received.lock().expect("sink lock");
            assert_eq!(snapshots.len(), 1);
            assert_eq!(snapshots[0].len(), 1);
        }

        unsubscribe();
        backend.push_snapshot();
        assert_eq!(received.lock().expect("sink lock").len(), 1);
    }
}
