use std::thread;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, info, instrument, warn};

use crate::datetime;
use crate::notify::Notifier;
use crate::store::TaskStore;

/// Default cadence between reminder polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polls reminder timestamps against wall-clock time and fires the notify
/// side effect once per task.
///
/// Each task moves dormant (no reminder) -> armed (reminder set, not yet
/// notified) -> fired (`notified`). Re-arming happens only through
/// `update_reminder`; a fired task never fires again, no matter how often it
/// is polled.
pub struct ReminderScheduler {
    interval: Duration,
}

impl ReminderScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// One polling pass. Returns how many notifications fired.
    #[instrument(skip(self, store, notifier))]
    pub fn check(&self, store: &mut TaskStore, notifier: &dyn Notifier, now: NaiveDateTime) -> usize {
        let due: Vec<(u64, String)> = store
            .tasks()
            .iter()
            .filter(|task| {
                !task.completed && !task.notified && task.reminder.is_some_and(|at| at <= now)
            })
            .map(|task| (task.id, task.text.clone()))
            .collect();

        for (id, text) in &due {
            info!(id, "reminder due");
            notifier.notify(text);
            if let Err(err) = store.mark_notified(*id) {
                warn!(id, error = %err, "task vanished before it could be marked notified");
            }
        }

        due.len()
    }

    /// Blocking poll loop; runs until the process ends. `before_tick` runs at
    /// the top of every pass, giving the caller a slot to apply remote push
    /// updates or surface alerts.
    pub fn run<F>(&self, store: &mut TaskStore, notifier: &dyn Notifier, mut before_tick: F)
    where
        F: FnMut(&mut TaskStore),
    {
        info!(interval_secs = self.interval.as_secs(), "reminder scheduler running");
        loop {
            before_tick(store);
            let fired = self.check(store, notifier, datetime::now_local());
            if fired > 0 {
                debug!(fired, "notifications fired this pass");
            }
            thread::sleep(self.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::ReminderScheduler;
    use crate::datetime::parse_reminder;
    use crate::focus::FocusTracker;
    use crate::notify::Notifier;
    use crate::remote::{MemoryBackend, RemoteStore};
    use crate::store::TaskStore;
    use crate::task::{Priority, Repeat};

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: &str) {
            self.messages
                .lock()
                .expect("notifier lock")
                .push(message.to_string());
        }
    }

    fn store() -> TaskStore {
        let gateway = RemoteStore::new(MemoryBackend::default());
        TaskStore::open(Box::new(gateway), FocusTracker::default()).expect("open store")
    }

    #[test]
    fn due_reminder_fires_exactly_once() {
        let mut store = store();
        let reminder = parse_reminder("2024-06-01T11:59:59").expect("parse");
        let id = store
            .add("stand up", Priority::None, Repeat::None, Some(reminder))
            .expect("add");

        let scheduler = ReminderScheduler::new(Duration::from_secs(5));
        let notifier = RecordingNotifier::default();

        let now = parse_reminder("2024-06-01T12:00:00").expect("parse");
        assert_eq!(scheduler.check(&mut store, &notifier, now), 1);
        assert!(store.get(id).expect("task").notified);

        let later = parse_reminder("2024-06-01T12:00:05").expect("parse");
        assert_eq!(scheduler.check(&mut store, &notifier, later), 0);
        assert_eq!(
            notifier.messages.lock().expect("notifier lock").as_slice(),
            ["stand up"]
        );
    }

    #[test]
    fn future_and_completed_tasks_stay_quiet() {
        let mut store = store();
        let future = parse_reminder("2024-06-02T09:00").expect("parse");
        store
            .add("tomorrow", Priority::None, Repeat::None, Some(future))
            .expect("add");

        let past = parse_reminder("2024-06-01T09:00").expect("parse");
        let done = store
            .add("already done", Priority::None, Repeat::None, Some(past))
            .expect("add");
        let now = parse_reminder("2024-06-01T12:00").expect("parse");
        store.toggle(done, now).expect("toggle");

        let scheduler = ReminderScheduler::new(Duration::from_secs(5));
        let notifier = RecordingNotifier::default();
        assert_eq!(scheduler.check(&mut store, &notifier, now), 0);
        assert!(notifier.messages.lock().expect("notifier lock").is_empty());
    }

    #[test]
    fn changed_reminder_rearms_the_task() {
        let mut store = store();
        let first = parse_reminder("2024-06-01T11:00").expect("parse");
        let id = store
            .add("rearm me", Priority::None, Repeat::None, Some(first))
            .expect("add");

        let scheduler = ReminderScheduler::new(Duration::from_secs(5));
        let notifier = RecordingNotifier::default();
        let now = parse_reminder("2024-06-01T12:00").expect("parse");
        assert_eq!(scheduler.check(&mut store, &notifier, now), 1);

        let second = parse_reminder("2024-06-01T12:30").expect("parse");
        store.update_reminder(id, Some(second)).expect("update");
        assert!(!store.get(id).expect("task").notified);

        let later = parse_reminder("2024-06-01T13:00").expect("parse");
        assert_eq!(scheduler.check(&mut store, &notifier, later), 1);
        assert_eq!(notifier.messages.lock().expect("notifier lock").len(), 2);
    }
}
