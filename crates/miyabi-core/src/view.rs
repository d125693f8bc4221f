use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use tracing::trace;

use crate::task::{Priority, Task};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Active => !task.completed,
            Self::Completed => task.completed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" | "done" => Ok(Self::Completed),
            other => Err(anyhow!("unknown status filter: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriorityFilter {
    #[default]
    All,
    Exactly(Priority),
}

impl PriorityFilter {
    fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Exactly(priority) => task.priority == priority,
        }
    }
}

impl FromStr for PriorityFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        Ok(Self::Exactly(s.parse()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Priority,
    Date,
}

impl SortKey {
    fn initial_direction(self) -> Direction {
        match self {
            // High-priority work surfaces first.
            Self::Priority => Direction::Descending,
            // Soonest reminder first.
            Self::Date => Direction::Ascending,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Priority => "priority",
            Self::Date => "date",
        };
        write!(f, "{label}")
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority" => Ok(Self::Priority),
            "date" => Ok(Self::Date),
            other => Err(anyhow!("unknown sort mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Active sort mode, if any. Applying the same key twice in a row flips the
/// direction; switching keys resets to that key's initial direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortState {
    active: Option<(SortKey, Direction)>,
}

impl SortState {
    pub fn toggle(&mut self, key: SortKey) {
        self.active = Some(match self.active {
            Some((current, direction)) if current == key => (key, direction.flipped()),
            _ => (key, key.initial_direction()),
        });
    }

    pub fn active(&self) -> Option<(SortKey, Direction)> {
        self.active
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewQuery {
    /// Case-insensitive substring on the task text.
    pub search: String,
    pub status: StatusFilter,
    pub priority: PriorityFilter,
    pub sort: SortState,
}

#[derive(Debug)]
pub struct View<'a> {
    /// Display order: expired, then active, then completed.
    pub rows: Vec<&'a Task>,
    /// Non-completed tasks in the filtered set.
    pub active_count: usize,
}

/// Derive the displayed sequence from the store state. Pure: never mutates
/// tasks, and identical inputs yield an identical sequence.
pub fn build_view<'a>(tasks: &'a [Task], query: &ViewQuery, now: NaiveDateTime) -> View<'a> {
    let needle = query.search.trim().to_lowercase();

    let mut expired: Vec<&Task> = Vec::new();
    let mut active: Vec<&Task> = Vec::new();
    let mut completed: Vec<&Task> = Vec::new();
    let mut active_count = 0_usize;

    for task in tasks {
        if !needle.is_empty() && !task.text.to_lowercase().contains(&needle) {
            continue;
        }
        if !query.status.matches(task) || !query.priority.matches(task) {
            continue;
        }

        if task.completed {
            completed.push(task);
        } else {
            active_count += 1;
            if task.is_expired(now) {
                expired.push(task);
            } else {
                active.push(task);
            }
        }
    }

    // Most overdue first.
    expired.sort_by_key(|task| (task.reminder, task.id));

    match query.sort.active() {
        Some((SortKey::Priority, direction)) => {
            active.sort_by(|a, b| {
                let by_score = a.priority.score().cmp(&b.priority.score());
                let ordered = match direction {
                    Direction::Ascending => by_score,
                    Direction::Descending => by_score.reverse(),
                };
                ordered.then(a.id.cmp(&b.id))
            });
        }
        Some((SortKey::Date, direction)) => {
            // Undated tasks sort last in either direction: absent reminders
            // count as +infinity ascending and -infinity descending.
            active.sort_by(|a, b| {
                let ordered = match direction {
                    Direction::Ascending => a
                        .reminder
                        .unwrap_or(NaiveDateTime::MAX)
                        .cmp(&b.reminder.unwrap_or(NaiveDateTime::MAX)),
                    Direction::Descending => b
                        .reminder
                        .unwrap_or(NaiveDateTime::MIN)
                        .cmp(&a.reminder.unwrap_or(NaiveDateTime::MIN)),
                };
                ordered.then(a.id.cmp(&b.id))
            });
        }
        // Store order is the display order.
        None => {}
    }

    // Most recently created first, independent of sort mode.
    completed.sort_by(|a, b| b.id.cmp(&a.id));

    trace!(
        expired = expired.len(),
        active = active.len(),
        completed = completed.len(),
        "view derived"
    );

    let mut rows = expired;
    rows.append(&mut active);
    rows.append(&mut completed);

    View { rows, active_count }
}
