use std::io::{self, Write};

use tracing::debug;

/// Notification side effect invoked by the reminder scheduler. Surfacing is
/// best-effort; implementations swallow their own failures.
pub trait Notifier {
    fn notify(&self, message: &str);
}

/// The in-app toast and audible tone, rendered for a terminal: a banner line
/// plus the bell character.
pub struct TerminalNotifier {
    bell: bool,
}

impl TerminalNotifier {
    pub fn new(bell: bool) -> Self {
        Self { bell }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str) {
        let mut out = io::stdout().lock();
        if self.bell {
            let _ = out.write_all(b"\x07");
        }
        let _ = writeln!(out, "Reminder: {message}");
        let _ = out.flush();
    }
}

/// Desktop notification via the freedesktop notification daemon. Absent
/// daemon or denied permission is not an error.
#[cfg(target_os = "linux")]
pub struct DesktopNotifier;

#[cfg(target_os = "linux")]
impl Notifier for DesktopNotifier {
    fn notify(&self, message: &str) {
        let result = notify_rust::Notification::new()
            .summary("miyabi")
            .body(message)
            .show();
        if let Err(err) = result {
            debug!(error = %err, "desktop notification unavailable; skipped");
        }
    }
}

/// Fans a notification out to every configured surface, mirroring the
/// toast + sound + OS-notification trio of the app.
pub struct CompositeNotifier {
    sinks: Vec<Box<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    /// Terminal banner + bell everywhere, plus the desktop daemon where one
    /// exists.
    pub fn with_default_sinks() -> Self {
        let mut sinks: Vec<Box<dyn Notifier>> = vec![Box::new(TerminalNotifier::new(true))];
        #[cfg(target_os = "linux")]
        sinks.push(Box::new(DesktopNotifier));
        debug!(sinks = sinks.len(), "notifier sinks configured");
        Self::new(sinks)
    }
}

impl Notifier for CompositeNotifier {
    fn notify(&self, message: &str) {
        for sink in &self.sinks {
            sink.notify(message);
        }
    }
}
