use chrono::NaiveDateTime;
use tracing::debug;

use crate::datetime;
use crate::task::{Repeat, Task};

/// Derive the successor of a repeating task at the moment it is completed.
///
/// The reminder advances by one repeat period preserving time-of-day; a task
/// with no reminder falls back to advancing the current wall-clock time, so a
/// bare "daily" task completed today resurfaces tomorrow. Returns `None` only
/// when the task does not repeat.
///
/// The successor's id is a placeholder; the store assigns a fresh one when it
/// appends the task.
pub fn next_occurrence(task: &Task, now: NaiveDateTime) -> Option<Task> {
    if task.repeat == Repeat::None {
        return None;
    }

    let base = task.reminder.unwrap_or(now);
    let reminder = datetime::advance(base, task.repeat)
        .or_else(|| datetime::advance(now, task.repeat))?;

    debug!(
        from = %task.id,
        repeat = %task.repeat,
        next = %datetime::format_reminder(reminder),
        "computed next occurrence"
    );

    Some(Task::new(
        0,
        task.text.clone(),
        task.priority,
        task.repeat,
        Some(reminder),
    ))
}
