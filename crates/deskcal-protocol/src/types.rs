//! Message types exchanged between the plugin and the display client.

use serde::{Deserialize, Serialize};

/// A calendar entry in wire form.
///
/// This is the projection of an upstream event down to the two fields the
/// display needs: a title and a start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    /// Event title.
    pub summary: String,
    /// Event start time.
    pub start: EntryStart,
}

impl CalendarEntry {
    /// Creates a new calendar entry.
    pub fn new(summary: impl Into<String>, date_time: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            start: EntryStart {
                date_time: date_time.into(),
            },
        }
    }
}

/// Start time of a calendar entry.
///
/// `date_time` holds either an RFC 3339 timestamp or, for all-day events,
/// the bare `YYYY-MM-DD` date the upstream API reports instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStart {
    /// Start time as reported upstream.
    #[serde(rename = "dateTime")]
    pub date_time: String,
}

/// Messages sent from the plugin to the display client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum PluginMessage {
    /// Authentication completed; payload is a confirmation string.
    AuthSuccess(String),

    /// Upcoming calendar entries, in start-time ascending order.
    /// An empty list means no upcoming events, not an error.
    CalendarEntries(Vec<CalendarEntry>),

    /// A display-facing error message.
    Error(String),
}

impl PluginMessage {
    /// Creates an authSuccess message.
    pub fn auth_success(message: impl Into<String>) -> Self {
        Self::AuthSuccess(message.into())
    }

    /// Creates a calendarEntries message.
    pub fn entries(entries: Vec<CalendarEntry>) -> Self {
        Self::CalendarEntries(entries)
    }

    /// Creates an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Returns true if this is an error message.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Requests sent from the display client to the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DisplayRequest {
    /// Request a resource from the plugin.
    Get {
        /// The resource being requested.
        request: GetTarget,
    },
}

impl DisplayRequest {
    /// Creates a `get calendar` request.
    pub fn get_calendar() -> Self {
        Self::Get {
            request: GetTarget::Calendar,
        }
    }
}

/// Resources the display client can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GetTarget {
    /// The upcoming calendar entries.
    Calendar,
}
