use anyhow::anyhow;
use chrono::{Days, Months, NaiveDateTime};

use crate::task::Repeat;

/// Canonical reminder format, matching `datetime-local` style input.
pub const REMINDER_FORMAT: &str = "%Y-%m-%dT%H:%M";

const PARSE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

pub fn now_local() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub fn parse_reminder(raw: &str) -> anyhow::Result<NaiveDateTime> {
    let trimmed = raw.trim();
    for format in PARSE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }

    // Date-only input means the start of that day.
    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight);
        }
    }

    Err(anyhow!("unrecognized date-time: {trimmed}"))
}

pub fn format_reminder(reminder: NaiveDateTime) -> String {
    reminder.format(REMINDER_FORMAT).to_string()
}

/// Advance a timestamp by one unit of the repeat period, preserving
/// time-of-day. Calendar months and years clamp the way chrono's calendar
/// arithmetic does (Jan 31 + 1 month = Feb 28/29).
///
/// Returns `None` for `Repeat::None` and on arithmetic overflow.
pub fn advance(base: NaiveDateTime, repeat: Repeat) -> Option<NaiveDateTime> {
    match repeat {
        Repeat::None => None,
        Repeat::Daily => base.checked_add_days(Days::new(1)),
        Repeat::Weekly => base.checked_add_days(Days::new(7)),
        Repeat::Monthly => base.checked_add_months(Months::new(1)),
        Repeat::Yearly => base.checked_add_months(Months::new(12)),
    }
}
