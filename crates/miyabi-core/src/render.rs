use std::io::{self, IsTerminal, Write};

use chrono::NaiveDateTime;
use unicode_width::UnicodeWidthStr;

use crate::datetime::format_reminder;
use crate::view::View;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: Option<bool>) -> Self {
        let color = color.unwrap_or_else(|| io::stdout().is_terminal());
        Self { color }
    }

    #[tracing::instrument(skip(self, view, now))]
    pub fn print_view(&mut self, view: &View<'_>, now: NaiveDateTime) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if view.rows.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = [
            "ID".to_string(),
            "Task".to_string(),
            "Pri".to_string(),
            "Reminder".to_string(),
            "Repeat".to_string(),
            "Focus".to_string(),
        ];

        let mut rows = Vec::with_capacity(view.rows.len());
        for task in &view.rows {
            let reminder = task
                .reminder
                .map(format_reminder)
                .unwrap_or_else(|| "-".to_string());
            let repeat = if task.repeat == crate::task::Repeat::None {
                "-".to_string()
            } else {
                task.repeat.to_string()
            };
            rows.push([
                task.id.to_string(),
                task.text.clone(),
                task.priority.to_string(),
                reminder,
                repeat,
                format_focus(task.focus_time),
            ]);
        }

        let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
        for row in &rows {
            for (idx, cell) in row.iter().enumerate() {
                widths[idx] = widths[idx].max(cell.width());
            }
        }

        let header_line: Vec<String> = headers
            .iter()
            .enumerate()
            .map(|(idx, h)| pad(h, widths[idx]))
            .collect();
        writeln!(out, "{}", header_line.join("  "))?;

        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(out, "{}", rule.join("  "))?;

        for (task, row) in view.rows.iter().zip(&rows) {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(idx, cell)| pad(cell, widths[idx]))
                .collect();
            let mut line = cells.join("  ");
            if task.completed {
                line = self.paint(&line, "2");
            } else if task.is_expired(now) {
                line = self.paint(&line, "31");
            }
            writeln!(out, "{line}")?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "{} task(s) remaining.",
            view.active_count
        )?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

fn pad(text: &str, width: usize) -> String {
    let missing = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(missing))
}

fn format_focus(seconds: u64) -> String {
    if seconds == 0 {
        return "-".to_string();
    }
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m");
    }
    format!("{}h{:02}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::format_focus;

    #[test]
    fn focus_durations_render_compactly() {
        assert_eq!(format_focus(0), "-");
        assert_eq!(format_focus(45), "45s");
        assert_eq!(format_focus(150), "2m");
        assert_eq!(format_focus(3720), "1h02m");
    }
}
