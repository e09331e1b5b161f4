//! Terminal display client for the deskcal plugin.
//!
//! Connects to the plugin's message bus, requests the upcoming calendar
//! entries, and renders whatever the plugin publishes.

pub mod error;
pub mod format;
pub mod model;
pub mod socket;

pub use error::{DisplayError, DisplayResult};
pub use model::{DisplayModel, View};
pub use socket::BusClient;
