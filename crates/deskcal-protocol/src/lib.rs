//! Bus framing and message types for the deskcal plugin.
//!
//! This crate defines the wire contract between the plugin backend and the
//! display client. Messages travel over a local socket as length-prefixed
//! JSON:
//! - 4 bytes: message length (u32, big-endian)
//! - N bytes: JSON payload
//!
//! Each direction has its own closed message enum so every handler can match
//! exhaustively at the boundary:
//! - [`PluginMessage`] — plugin to display (`authSuccess`, `calendarEntries`,
//!   `error`)
//! - [`DisplayRequest`] — display to plugin (`get` with `request: calendar`)
//!
//! # Example
//!
//! ```rust
//! use deskcal_protocol::{DisplayRequest, encode_message, decode_message};
//!
//! let request = DisplayRequest::get_calendar();
//! let bytes = encode_message(&request).unwrap();
//! let decoded: DisplayRequest = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{FrameReader, FrameWriter, decode_message, encode_message};
pub use types::{CalendarEntry, DisplayRequest, EntryStart, GetTarget, PluginMessage};

/// Maximum message size (1 MB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;
