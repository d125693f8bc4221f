use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::datetime;

/// At most one task is the focus target at a time. Elapsed seconds are
/// credited to the target when the session ends, never while it runs.
#[derive(Debug, Default)]
pub struct FocusTracker {
    active: Option<FocusSession>,
}

#[derive(Debug, Clone)]
pub struct FocusSession {
    pub task_id: u64,
    pub started_at: NaiveDateTime,
}

impl FocusTracker {
    pub fn active(&self) -> Option<&FocusSession> {
        self.active.as_ref()
    }

    pub fn active_task(&self) -> Option<u64> {
        self.active.as_ref().map(|session| session.task_id)
    }

    /// Begin timing `task_id`. If another task is already focused its session
    /// ends first; the return value is that ended `(task_id, seconds)`.
    pub fn begin(&mut self, task_id: u64, now: NaiveDateTime) -> Option<(u64, u64)> {
        let ended = match self.active_task() {
            Some(current) if current != task_id => self.finish(now),
            Some(_) => return None,
            None => None,
        };

        debug!(task_id, "focus session started");
        self.active = Some(FocusSession {
            task_id,
            started_at: now,
        });
        ended
    }

    /// End the active session, returning `(task_id, elapsed_seconds)`.
    /// No-op when no session is active.
    pub fn finish(&mut self, now: NaiveDateTime) -> Option<(u64, u64)> {
        let session = self.active.take()?;
        let elapsed = (now - session.started_at).num_seconds().max(0) as u64;
        debug!(task_id = session.task_id, elapsed, "focus session ended");
        Some((session.task_id, elapsed))
    }

    /// Drop the session without crediting time. Used when the target task
    /// disappeared out from under us (remote replacement, deletion).
    pub fn abandon(&mut self) {
        if let Some(session) = self.active.take() {
            warn!(task_id = session.task_id, "focus target gone; session dropped");
        }
    }

    /// Restore session state persisted by a previous invocation. A missing or
    /// empty file means no active session.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let (id_part, started_part) = trimmed
            .split_once('\t')
            .with_context(|| format!("malformed focus session in {}", path.display()))?;
        let task_id: u64 = id_part
            .parse()
            .with_context(|| format!("malformed focus task id in {}", path.display()))?;
        let started_at = datetime::parse_reminder(started_part)
            .with_context(|| format!("malformed focus start in {}", path.display()))?;

        Ok(Self {
            active: Some(FocusSession {
                task_id,
                started_at,
            }),
        })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let payload = match &self.active {
            Some(session) => format!(
                "{}\t{}",
                session.task_id,
                session.started_at.format("%Y-%m-%dT%H:%M:%S")
            ),
            None => String::new(),
        };
        fs::write(path, payload).with_context(|| format!("failed writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::FocusTracker;
    use crate::datetime::parse_reminder;

    #[test]
    fn begin_hands_off_between_tasks() {
        let mut tracker = FocusTracker::default();
        let start = parse_reminder("2024-06-01T10:00:00").expect("parse");
        let later = parse_reminder("2024-06-01T10:05:00").expect("parse");

        assert!(tracker.begin(1, start).is_none());
        let ended = tracker.begin(2, later).expect("previous session ends");
        assert_eq!(ended, (1, 300));
        assert_eq!(tracker.active_task(), Some(2));
    }

    #[test]
    fn begin_same_task_keeps_original_start() {
        let mut tracker = FocusTracker::default();
        let start = parse_reminder("2024-06-01T10:00:00").expect("parse");
        let later = parse_reminder("2024-06-01T10:05:00").expect("parse");
        let end = parse_reminder("2024-06-01T10:10:00").expect("parse");

        tracker.begin(1, start);
        assert!(tracker.begin(1, later).is_none());
        let ended = tracker.finish(end).expect("session ends");
        assert_eq!(ended, (1, 600));
    }

    #[test]
    fn finish_is_idempotent_when_inactive() {
        let mut tracker = FocusTracker::default();
        let now = parse_reminder("2024-06-01T10:00:00").expect("parse");
        assert!(tracker.finish(now).is_none());
        assert!(tracker.finish(now).is_none());
    }

    #[test]
    fn session_round_trips_through_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("focus.data");
        let start = parse_reminder("2024-06-01T10:00:00").expect("parse");

        let mut tracker = FocusTracker::default();
        tracker.begin(7, start);
        tracker.save(&path).expect("save");

        let restored = FocusTracker::load(&path).expect("load");
        assert_eq!(restored.active_task(), Some(7));

        tracker.finish(start);
        tracker.save(&path).expect("save empty");
        let cleared = FocusTracker::load(&path).expect("load empty");
        assert!(cleared.active_task().is_none());
    }
}
