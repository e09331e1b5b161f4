//! Display state.
//!
//! Holds what the screen shows: the latest entries, or the latest error.
//! Each incoming message replaces the relevant part of the state wholesale;
//! there is no merging of old and new entries.

use deskcal_protocol::{CalendarEntry, PluginMessage};

/// What the display should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Waiting for the first message.
    Waiting,
    /// No upcoming events.
    Empty,
    /// Upcoming events, in the order received.
    Entries(Vec<CalendarEntry>),
    /// The plugin reported an error.
    Error(String),
}

/// Display state driven by bus messages.
#[derive(Debug, Default)]
pub struct DisplayModel {
    entries: Option<Vec<CalendarEntry>>,
    error: Option<String>,
}

impl DisplayModel {
    /// Creates a model in the waiting state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one bus message to the state.
    ///
    /// A fresh entries message clears any displayed error; an error message
    /// replaces whatever was shown before. authSuccess carries no calendar
    /// data and leaves the state untouched.
    pub fn apply(&mut self, message: PluginMessage) {
        match message {
            PluginMessage::CalendarEntries(entries) => {
                self.entries = Some(entries);
                self.error = None;
            }
            PluginMessage::Error(message) => {
                self.error = Some(message);
            }
            PluginMessage::AuthSuccess(_) => {}
        }
    }

    /// Returns what to render.
    ///
    /// An error wins over stale entries; an empty entries list is shown as
    /// an explicit empty state rather than nothing.
    pub fn view(&self) -> View {
        if let Some(error) = &self.error {
            return View::Error(error.clone());
        }
        match &self.entries {
            Some(entries) if entries.is_empty() => View::Empty,
            Some(entries) => View::Entries(entries.clone()),
            None => View::Waiting,
        }
    }
}
