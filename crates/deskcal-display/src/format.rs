//! Start time rendering.

use chrono::{DateTime, NaiveDate};
use chrono_tz::America::Los_Angeles;
use tracing::debug;

/// Formats an entry start for display.
///
/// Timed events carry an RFC 3339 timestamp and render as a local clock
/// time; all-day events carry a bare date. Anything unparseable is shown
/// as received rather than dropped.
pub fn format_start(start: &str) -> String {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(start) {
        return timestamp
            .with_timezone(&Los_Angeles)
            .format("%-I:%M %p")
            .to_string();
    }

    if let Ok(date) = NaiveDate::parse_from_str(start, "%Y-%m-%d") {
        return format!("{} (all day)", date.format("%b %-d"));
    }

    debug!(start, "unparseable start time");
    start.to_string()
}
