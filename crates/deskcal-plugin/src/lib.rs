//! Plugin backend: Google Calendar over OAuth for a companion display.
//!
//! The backend walks the user through a one-time OAuth consent flow via a
//! local HTTP endpoint, fetches the next few upcoming events from the
//! Google Calendar API, and publishes them to connected display clients
//! over a Unix socket message bus.

pub mod auth;
pub mod bus;
pub mod calendar;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod oauth;
pub mod settings;

pub use auth::{AuthManager, SharedAuthManager};
pub use bus::{BusConfig, BusHandle, BusServer, default_socket_path};
pub use calendar::{CalendarClient, MAX_UPCOMING};
pub use error::{PluginError, PluginResult};
pub use fetcher::CalendarFetcher;
pub use http::{CALLBACK_PATH, CALLBACK_PORT, CallbackServer};
pub use oauth::{AuthClient, TokenPair};
pub use settings::{CredentialSource, CredentialSubmission, Credentials, Settings, SettingsStore};
