use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::datetime::{format_reminder, parse_reminder};
use crate::task::Task;

pub const CSV_HEADER: &str = "id,text,priority,completed,reminder,notified,focus_time";

const FIELD_COUNT: usize = 7;

/// Tabular interchange text for the given tasks: header row plus one
/// comma-separated row per task, double-quote escaped.
pub fn export_csv(tasks: &[Task]) -> String {
    let mut out = String::with_capacity(64 * (tasks.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');

    for task in tasks {
        let fields = [
            task.id.to_string(),
            task.text.clone(),
            task.priority.to_string(),
            task.completed.to_string(),
            task.reminder.map(format_reminder).unwrap_or_default(),
            task.notified.to_string(),
            task.focus_time.to_string(),
        ];
        let row: Vec<String> = fields.iter().map(|field| escape_field(field)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

fn escape_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') || raw.contains('\r') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[derive(Debug, Default)]
pub struct ParsedImport {
    /// Tasks ready for `TaskStore::import`; ids are placeholders.
    pub tasks: Vec<Task>,
    pub skipped: usize,
}

/// Parse interchange text. Malformed rows are skipped individually and
/// counted; a leading header row is recognized and dropped. Never fails as a
/// whole: a fully malformed input just yields zero tasks.
pub fn parse_csv(input: &str) -> ParsedImport {
    let mut parsed = ParsedImport::default();

    for (idx, record) in split_records(input).into_iter().enumerate() {
        if idx == 0 && record.first().map(String::as_str) == Some("id") {
            continue;
        }
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }

        match record_to_task(&record) {
            Some(task) => parsed.tasks.push(task),
            None => {
                warn!(row = idx + 1, "skipping malformed import row");
                parsed.skipped += 1;
            }
        }
    }

    debug!(
        imported = parsed.tasks.len(),
        skipped = parsed.skipped,
        "parsed interchange text"
    );
    parsed
}

fn record_to_task(record: &[String]) -> Option<Task> {
    if record.len() != FIELD_COUNT {
        return None;
    }

    let text = record[1].trim();
    if text.is_empty() {
        return None;
    }

    let priority = record[2].parse().ok()?;
    let completed: bool = record[3].trim().parse().ok()?;
    let reminder = match record[4].trim() {
        "" => None,
        raw => Some(parse_reminder(raw).ok()?),
    };
    let focus_time: u64 = record[6].trim().parse().ok()?;

    // Fresh id and a disarmed notification are assigned on adoption; the
    // exported id and notified flag are deliberately ignored.
    let mut task = Task::new(
        0,
        text.to_string(),
        priority,
        crate::task::Repeat::None,
        reminder,
    );
    task.completed = completed;
    task.focus_time = focus_time;
    Some(task)
}

/// Split CSV text into records, honoring quoted fields with doubled quotes
/// and embedded separators or newlines.
fn split_records(input: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}

/// Event-creation deep link with a fixed one-hour window. Times are floating
/// local times, matching the reminder's lack of timezone.
pub fn calendar_url(text: &str, reminder: NaiveDateTime) -> String {
    let start = reminder.format("%Y%m%dT%H%M%S");
    let end = (reminder + chrono::Duration::hours(1)).format("%Y%m%dT%H%M%S");
    format!(
        "https://www.google.com/calendar/render?action=TEMPLATE&text={}&dates={start}/{end}",
        urlencoding::encode(text)
    )
}

#[cfg(test)]
mod tests {
    use super::{calendar_url, export_csv, parse_csv, split_records};
    use crate::datetime::parse_reminder;
    use crate::task::{Priority, Repeat, Task};

    #[test]
    fn quoting_survives_commas_quotes_and_newlines() {
        let mut task = Task::new(
            1,
            "say \"hi\", then\nleave".to_string(),
            Priority::Low,
            Repeat::None,
            None,
        );
        task.focus_time = 12;

        let csv = export_csv(&[task.clone()]);
        let parsed = parse_csv(&csv);
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.tasks.len(), 1);
        assert_eq!(parsed.tasks[0].text, task.text);
        assert_eq!(parsed.tasks[0].focus_time, 12);
    }

    #[test]
    fn round_trip_preserves_content_fields() {
        let mut dated = Task::new(
            3,
            "dated".to_string(),
            Priority::High,
            Repeat::None,
            Some(parse_reminder("2024-04-01T08:30").expect("parse")),
        );
        dated.completed = true;
        dated.notified = true;
        let plain = Task::new(4, "plain".to_string(), Priority::None, Repeat::None, None);

        let csv = export_csv(&[dated.clone(), plain.clone()]);
        let parsed = parse_csv(&csv);
        assert_eq!(parsed.tasks.len(), 2);

        assert_eq!(parsed.tasks[0].text, dated.text);
        assert_eq!(parsed.tasks[0].priority, dated.priority);
        assert_eq!(parsed.tasks[0].completed, dated.completed);
        assert_eq!(parsed.tasks[0].reminder, dated.reminder);
        // The notified flag is reset on import.
        assert!(!parsed.tasks[0].notified);

        assert_eq!(parsed.tasks[1].text, plain.text);
        assert!(parsed.tasks[1].reminder.is_none());
    }

    #[test]
    fn malformed_rows_are_skipped_individually() {
        let input = "id,text,priority,completed,reminder,notified,focus_time\n\
                     1,good,low,false,,false,0\n\
                     2,,low,false,,false,0\n\
                     3,bad-bool,low,maybe,,false,0\n\
                     4,bad-priority,urgent,false,,false,0\n\
                     short,row\n\
                     5,also good,high,true,2024-04-01T08:30,true,90\n";

        let parsed = parse_csv(input);
        assert_eq!(parsed.tasks.len(), 2);
        assert_eq!(parsed.skipped, 4);
        assert_eq!(parsed.tasks[1].text, "also good");
        assert_eq!(parsed.tasks[1].focus_time, 90);
    }

    #[test]
    fn split_handles_crlf_and_trailing_newline() {
        let records = split_records("a,b\r\nc,\"d,e\"\r\n");
        assert_eq!(records, vec![vec!["a", "b"], vec!["c", "d,e"]]);
    }

    #[test]
    fn calendar_link_spans_one_hour() {
        let reminder = parse_reminder("2024-04-01T08:30").expect("parse");
        let url = calendar_url("tea time & cake", reminder);
        assert!(url.starts_with("https://www.google.com/calendar/render?action=TEMPLATE"));
        assert!(url.contains("dates=20240401T083000/20240401T093000"));
        assert!(url.contains("text=tea%20time%20%26%20cake"));
    }
}
