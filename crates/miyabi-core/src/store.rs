use chrono::NaiveDateTime;
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::focus::FocusTracker;
use crate::gateway::{Change, PersistenceGateway, PushCallback, Unsubscribe};
use crate::recurrence;
use crate::task::{Priority, Repeat, Task};

/// Owns the ordered task collection and every mutation on it.
///
/// All operations are synchronous against memory and write through the
/// injected gateway afterwards. A gateway failure never rolls the mutation
/// back: memory stays authoritative and the failure is parked as a one-shot
/// alert for the caller to surface.
pub struct TaskStore {
    tasks: Vec<Task>,
    gateway: Box<dyn PersistenceGateway>,
    focus: FocusTracker,
    alert: Option<String>,
}

impl TaskStore {
    #[instrument(skip(gateway, focus))]
    pub fn open(
        mut gateway: Box<dyn PersistenceGateway>,
        focus: FocusTracker,
    ) -> anyhow::Result<Self> {
        let tasks = gateway.load()?;
        info!(count = tasks.len(), "loaded tasks");
        Ok(Self {
            tasks,
            gateway,
            focus,
            alert: None,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn focus(&self) -> &FocusTracker {
        &self.focus
    }

    /// One-shot persistence failure message, if the last write failed.
    pub fn take_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    /// Forward a push subscription request to the gateway.
    pub fn subscribe(&mut self, callback: PushCallback) -> Option<Unsubscribe> {
        self.gateway.subscribe(callback)
    }

    fn next_id(&self) -> u64 {
        self.tasks.iter().map(|task| task.id).max().unwrap_or(0) + 1
    }

    fn index_of(&self, id: u64) -> Result<usize, StoreError> {
        self.tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| {
                warn!(id, "operation referenced an unknown task id");
                StoreError::NotFound(id)
            })
    }

    fn write_through(
        gateway: &mut Box<dyn PersistenceGateway>,
        alert: &mut Option<String>,
        tasks: &[Task],
        change: &Change<'_>,
    ) {
        if let Err(err) = gateway.persist(tasks, change) {
            warn!(error = %err, "persistence failed; in-memory state remains authoritative");
            *alert = Some(format!("failed to save tasks: {err:#}"));
        }
    }

    #[instrument(skip(self, text))]
    pub fn add(
        &mut self,
        text: &str,
        priority: Priority,
        repeat: Repeat,
        reminder: Option<NaiveDateTime>,
    ) -> Result<u64, StoreError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(StoreError::empty_text());
        }

        let id = self.next_id();
        self.tasks.push(Task::new(
            id,
            trimmed.to_string(),
            priority,
            repeat,
            reminder,
        ));
        info!(id, "task added");

        let created = &self.tasks[self.tasks.len() - 1];
        Self::write_through(
            &mut self.gateway,
            &mut self.alert,
            &self.tasks,
            &Change::Created(created),
        );
        Ok(id)
    }

    /// Flip `completed`. Completing a repeating task enqueues its successor
    /// before the toggle is persisted, so both mutations are observed
    /// together. Completing the focus target ends the focus session first.
    #[instrument(skip(self))]
    pub fn toggle(&mut self, id: u64, now: NaiveDateTime) -> Result<(), StoreError> {
        let idx = self.index_of(id)?;
        let was_completed = self.tasks[idx].completed;
        self.tasks[idx].completed = !was_completed;
        info!(id, completed = !was_completed, "task toggled");

        let mut successor = None;
        if !was_completed {
            if self.focus.active_task() == Some(id) {
                if let Some((_, elapsed)) = self.focus.finish(now) {
                    self.tasks[idx].focus_time += elapsed;
                }
            }
            if let Some(mut next) = recurrence::next_occurrence(&self.tasks[idx], now) {
                next.id = self.next_id();
                successor = Some(next);
            }
        }

        if let Some(next) = successor {
            self.tasks.push(next);
            let created = &self.tasks[self.tasks.len() - 1];
            Self::write_through(
                &mut self.gateway,
                &mut self.alert,
                &self.tasks,
                &Change::Created(created),
            );
        }

        Self::write_through(
            &mut self.gateway,
            &mut self.alert,
            &self.tasks,
            &Change::Updated(&self.tasks[idx]),
        );
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn remove(&mut self, id: u64) -> Result<Task, StoreError> {
        let idx = self.index_of(id)?;
        if self.focus.active_task() == Some(id) {
            self.focus.abandon();
        }
        let removed = self.tasks.remove(idx);
        info!(id, "task removed");

        Self::write_through(
            &mut self.gateway,
            &mut self.alert,
            &self.tasks,
            &Change::Removed(id),
        );
        Ok(removed)
    }

    #[instrument(skip(self))]
    pub fn clear_completed(&mut self) -> usize {
        let cleared: Vec<u64> = self
            .tasks
            .iter()
            .filter(|task| task.completed)
            .map(|task| task.id)
            .collect();
        if cleared.is_empty() {
            return 0;
        }

        self.tasks.retain(|task| !task.completed);
        info!(count = cleared.len(), "completed tasks cleared");

        Self::write_through(
            &mut self.gateway,
            &mut self.alert,
            &self.tasks,
            &Change::Cleared(&cleared),
        );
        cleared.len()
    }

    #[instrument(skip(self, new_text))]
    pub fn update_text(&mut self, id: u64, new_text: &str) -> Result<(), StoreError> {
        let trimmed = new_text.trim();
        if trimmed.is_empty() {
            return Err(StoreError::empty_text());
        }

        let idx = self.index_of(id)?;
        self.tasks[idx].text = trimmed.to_string();
        debug!(id, "task text updated");

        Self::write_through(
            &mut self.gateway,
            &mut self.alert,
            &self.tasks,
            &Change::Updated(&self.tasks[idx]),
        );
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn update_priority(&mut self, id: u64, priority: Priority) -> Result<(), StoreError> {
        let idx = self.index_of(id)?;
        if self.tasks[idx].priority == priority {
            return Ok(());
        }

        self.tasks[idx].priority = priority;
        debug!(id, %priority, "task priority updated");

        Self::write_through(
            &mut self.gateway,
            &mut self.alert,
            &self.tasks,
            &Change::Updated(&self.tasks[idx]),
        );
        Ok(())
    }

    /// Set the reminder. A changed value re-arms the notification by
    /// resetting `notified`.
    #[instrument(skip(self))]
    pub fn update_reminder(
        &mut self,
        id: u64,
        reminder: Option<NaiveDateTime>,
    ) -> Result<(), StoreError> {
        let idx = self.index_of(id)?;
        if self.tasks[idx].reminder == reminder {
            return Ok(());
        }

        self.tasks[idx].reminder = reminder;
        self.tasks[idx].notified = false;
        debug!(id, "task reminder updated");

        Self::write_through(
            &mut self.gateway,
            &mut self.alert,
            &self.tasks,
            &Change::Updated(&self.tasks[idx]),
        );
        Ok(())
    }

    /// Move the dragged task into the target's slot, shifting the tasks in
    /// between. Only meaningful among non-completed tasks; callers keep
    /// completed ids out.
    #[instrument(skip(self))]
    pub fn reorder(&mut self, dragged_id: u64, target_id: u64) -> Result<(), StoreError> {
        if dragged_id == target_id {
            return Ok(());
        }

        let dragged_idx = self.index_of(dragged_id)?;
        let target_idx = self.index_of(target_id)?;

        let moved = self.tasks.remove(dragged_idx);
        self.tasks.insert(target_idx, moved);
        debug!(dragged_id, target_id, "tasks reordered");

        Self::write_through(
            &mut self.gateway,
            &mut self.alert,
            &self.tasks,
            &Change::Reordered,
        );
        Ok(())
    }

    /// Idempotent: marking an already-notified task is a no-op.
    #[instrument(skip(self))]
    pub fn mark_notified(&mut self, id: u64) -> Result<(), StoreError> {
        let idx = self.index_of(id)?;
        if self.tasks[idx].notified {
            return Ok(());
        }

        self.tasks[idx].notified = true;
        debug!(id, "task marked notified");

        Self::write_through(
            &mut self.gateway,
            &mut self.alert,
            &self.tasks,
            &Change::Updated(&self.tasks[idx]),
        );
        Ok(())
    }

    /// Adopt externally produced tasks (bulk import). Each gets a fresh id
    /// and a disarmed notification; existing tasks are untouched. Returns the
    /// number adopted.
    #[instrument(skip(self, incoming))]
    pub fn import(&mut self, incoming: Vec<Task>) -> usize {
        let mut adopted = 0_usize;
        for mut task in incoming {
            task.id = self.next_id();
            task.notified = false;
            self.tasks.push(task);
            let created = &self.tasks[self.tasks.len() - 1];
            Self::write_through(
                &mut self.gateway,
                &mut self.alert,
                &self.tasks,
                &Change::Created(created),
            );
            adopted += 1;
        }
        info!(adopted, "tasks imported");
        adopted
    }

    /// Full state replacement from a remote push. Not written back: the
    /// snapshot came from the backend. The focus session is dropped if its
    /// target vanished.
    #[instrument(skip(self, tasks))]
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        debug!(count = tasks.len(), "replacing state from push update");
        self.tasks = tasks;
        if let Some(id) = self.focus.active_task() {
            if self.get(id).is_none() {
                self.focus.abandon();
            }
        }
    }

    #[instrument(skip(self))]
    pub fn start_focus(&mut self, id: u64, now: NaiveDateTime) -> Result<(), StoreError> {
        let _ = self.index_of(id)?;
        if let Some((previous, elapsed)) = self.focus.begin(id, now) {
            self.credit_focus_time(previous, elapsed);
        }
        Ok(())
    }

    /// End the active focus session, crediting elapsed seconds to its target.
    /// No-op when nothing is focused.
    #[instrument(skip(self))]
    pub fn end_focus(&mut self, now: NaiveDateTime) -> Option<(u64, u64)> {
        let (id, elapsed) = self.focus.finish(now)?;
        self.credit_focus_time(id, elapsed);
        Some((id, elapsed))
    }

    fn credit_focus_time(&mut self, id: u64, elapsed: u64) {
        let Ok(idx) = self.index_of(id) else {
            warn!(id, "focus target no longer exists; elapsed time dropped");
            return;
        };

        self.tasks[idx].focus_time += elapsed;
        Self::write_through(
            &mut self.gateway,
            &mut self.alert,
            &self.tasks,
            &Change::Updated(&self.tasks[idx]),
        );
    }
}
