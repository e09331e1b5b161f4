//! Fetch-and-publish pipeline.
//!
//! Ties the auth manager, the Calendar API client, and the bus together:
//! every display request for calendar data funnels through
//! [`CalendarFetcher::fetch_and_publish`], which reports its outcome on the
//! bus rather than to the caller.

use chrono::Utc;
use tracing::{debug, error};

use crate::auth::SharedAuthManager;
use crate::bus::BusHandle;
use crate::calendar::CalendarClient;
use crate::error::PluginError;

/// Fetches upcoming events and publishes the result to the bus.
pub struct CalendarFetcher {
    auth: SharedAuthManager,
    bus: BusHandle,
    api: CalendarClient,
}

impl CalendarFetcher {
    /// Creates a new fetcher.
    pub fn new(auth: SharedAuthManager, bus: BusHandle, api: CalendarClient) -> Self {
        Self { auth, bus, api }
    }

    /// Fetches upcoming events and publishes them.
    ///
    /// Without an access token, publishes an error message and makes no API
    /// call. On a successful fetch publishes the entries, an empty list
    /// included. On an API failure logs the error and publishes an error
    /// message; the held token is kept so a later request can succeed.
    pub async fn fetch_and_publish(&self) {
        let access_token = {
            let auth = self.auth.read().await;
            auth.access_token().map(str::to_owned)
        };

        let Some(access_token) = access_token else {
            debug!("fetch requested before authentication");
            self.bus.send_error(PluginError::NoAccessToken.to_string());
            return;
        };

        match self.api.list_upcoming(&access_token, Utc::now()).await {
            Ok(entries) => {
                debug!(count = entries.len(), "publishing calendar entries");
                self.bus.send_entries(entries);
            }
            Err(e) => {
                error!(error = %e, "calendar fetch failed");
                self.bus
                    .send_error(format!("Error fetching calendar events: {}", e));
            }
        }
    }
}
