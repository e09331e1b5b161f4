//! Google Calendar API client.
//!
//! A thin HTTP client for the single `events.list` call the plugin needs:
//! the next few events on the primary calendar, recurring events expanded,
//! ordered by start time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use deskcal_protocol::CalendarEntry;

use crate::error::{PluginError, PluginResult};

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// The calendar the plugin reads from.
const PRIMARY_CALENDAR: &str = "primary";

/// How many upcoming events to request.
pub const MAX_UPCOMING: usize = 3;

/// Google Calendar API client.
#[derive(Debug)]
pub struct CalendarClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CalendarClient {
    /// Creates a new Calendar API client.
    pub fn new(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            http_client,
            base_url: CALENDAR_API_BASE.to_string(),
        }
    }

    /// Overrides the API base URL. Used by tests.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Lists the next [`MAX_UPCOMING`] events from the primary calendar.
    ///
    /// Events are requested from `time_min` onward, with recurring events
    /// expanded into single instances and ordered by start time ascending.
    /// Each event is projected down to the wire form; for all-day events the
    /// `date` field substitutes for the missing `dateTime`.
    pub async fn list_upcoming(
        &self,
        access_token: &str,
        time_min: DateTime<Utc>,
    ) -> PluginResult<Vec<CalendarEntry>> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(PRIMARY_CALENDAR)
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", time_min.to_rfc3339()),
                ("maxResults", MAX_UPCOMING.to_string()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PluginError::network("request timeout")
                } else if e.is_connect() {
                    PluginError::network(format!("connection failed: {}", e))
                } else {
                    PluginError::network(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PluginError::api("access token expired or invalid"));
        }

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(PluginError::api("access denied to calendar"));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PluginError::api("rate limit exceeded"));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PluginError::api(format!("({}) {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PluginError::network(format!("failed to read response: {}", e)))?;

        let list: EventListResponse = serde_json::from_str(&body)
            .map_err(|e| PluginError::api(format!("failed to parse response: {}", e)))?;

        let entries: Vec<CalendarEntry> = list
            .items
            .into_iter()
            .filter_map(convert_event)
            .collect();

        debug!("fetched {} upcoming events", entries.len());
        Ok(entries)
    }
}

/// Projects an API event down to the wire form.
///
/// Returns None for events without any start information.
fn convert_event(event: ApiEvent) -> Option<CalendarEntry> {
    let summary = event.summary.unwrap_or_default();
    let start = event.start?;

    // Timed events carry dateTime; all-day events carry only date.
    let date_time = match (start.date_time, start.date) {
        (Some(dt), _) => dt,
        (None, Some(date)) => date,
        (None, None) => {
            warn!("skipping event without a start time");
            return None;
        }
    };

    Some(CalendarEntry::new(summary, date_time))
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    summary: Option<String>,
    start: Option<ApiEventTime>,
}

/// Event time from the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: String) -> CalendarClient {
        CalendarClient::new(Duration::from_secs(5)).with_base_url(base_url)
    }

    #[test]
    fn convert_timed_event() {
        let event: ApiEvent = serde_json::from_str(
            r#"{"summary":"Standup","start":{"dateTime":"2024-01-01T09:00:00Z"}}"#,
        )
        .unwrap();
        let entry = convert_event(event).unwrap();
        assert_eq!(entry.summary, "Standup");
        assert_eq!(entry.start.date_time, "2024-01-01T09:00:00Z");
    }

    #[test]
    fn convert_all_day_event_uses_date_fallback() {
        let event: ApiEvent =
            serde_json::from_str(r#"{"summary":"Holiday","start":{"date":"2024-01-02"}}"#).unwrap();
        let entry = convert_event(event).unwrap();
        assert_eq!(entry.start.date_time, "2024-01-02");
    }

    #[test]
    fn convert_event_without_start_is_skipped() {
        let event: ApiEvent = serde_json::from_str(r#"{"summary":"Broken"}"#).unwrap();
        assert!(convert_event(event).is_none());
    }

    #[tokio::test]
    async fn list_upcoming_maps_in_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/calendars/primary/events")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("maxResults".into(), "3".into()),
                mockito::Matcher::UrlEncoded("singleEvents".into(), "true".into()),
                mockito::Matcher::UrlEncoded("orderBy".into(), "startTime".into()),
            ]))
            .match_header("authorization", "Bearer at-1")
            .with_status(200)
            .with_body(
                r#"{"items":[
                    {"summary":"A","start":{"dateTime":"2024-01-01T09:00:00Z"}},
                    {"summary":"B","start":{"date":"2024-01-02"}}
                ]}"#,
            )
            .create_async()
            .await;

        let client = test_client(server.url());
        let entries = client.list_upcoming("at-1", Utc::now()).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].summary, "A");
        assert_eq!(entries[0].start.date_time, "2024-01-01T09:00:00Z");
        assert_eq!(entries[1].summary, "B");
        assert_eq!(entries[1].start.date_time, "2024-01-02");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn list_upcoming_empty_is_ok() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"items":[]}"#)
            .create_async()
            .await;

        let client = test_client(server.url());
        let entries = client.list_upcoming("at-1", Utc::now()).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn list_upcoming_expired_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let client = test_client(server.url());
        let result = client.list_upcoming("stale", Utc::now()).await;

        match result {
            Err(PluginError::Api { message }) => {
                assert!(message.contains("expired or invalid"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn list_upcoming_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .with_body("backend exploded")
            .create_async()
            .await;

        let client = test_client(server.url());
        let result = client.list_upcoming("at-1", Utc::now()).await;

        match result {
            Err(PluginError::Api { message }) => {
                assert!(message.contains("backend exploded"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }
}
