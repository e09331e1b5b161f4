//! OAuth 2.0 authorization-code flow for the Google Calendar API.
//!
//! This is the plain web-application flow with a fixed redirect URI: the
//! consent URL is handed to the user, Google redirects the browser to the
//! local callback endpoint, and the authorization code is exchanged once
//! for a token pair. Offline access is requested so a refresh token is
//! issued, although no silent refresh is performed.

use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::{PluginError, PluginResult};
use crate::settings::Credentials;

/// Google OAuth endpoints.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth scope for read-only calendar access.
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// The token pair produced by a successful code exchange.
///
/// Held only in memory for the life of the process; restarting loses it and
/// requires re-authentication.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Bearer credential for API calls.
    pub access_token: String,
    /// Long-lived credential for silent refresh. Unused in the current flow.
    pub refresh_token: Option<String>,
}

/// OAuth client bound to a set of credentials.
///
/// Pure construction; no network call happens until [`exchange_code`].
///
/// [`exchange_code`]: AuthClient::exchange_code
#[derive(Debug)]
pub struct AuthClient {
    credentials: Credentials,
    token_url: String,
    http_client: reqwest::Client,
}

impl AuthClient {
    /// Creates a new OAuth client with the given credentials.
    pub fn new(credentials: Credentials, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            credentials,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            http_client,
        }
    }

    /// Overrides the token endpoint URL. Used by tests.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Returns the redirect URI the client was built with.
    pub fn redirect_uri(&self) -> &str {
        &self.credentials.redirect_uri
    }

    /// Builds the consent URL the user must open in a browser.
    ///
    /// Requests offline access so a refresh token is issued alongside the
    /// access token, and the read-only calendar scope.
    pub fn login_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(&self.credentials.redirect_uri),
            urlencoding::encode(CALENDAR_READONLY_SCOPE),
        )
    }

    /// Exchanges an authorization code for a token pair.
    ///
    /// # Errors
    ///
    /// Returns a network error if the request cannot be sent, and a token
    /// exchange error if the endpoint rejects the code (invalid code,
    /// revoked consent). No retry is attempted.
    pub async fn exchange_code(&self, code: &str) -> PluginResult<TokenPair> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| PluginError::network(format!("token exchange request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PluginError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(PluginError::token_exchange(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| PluginError::token_exchange(format!("invalid token response: {}", e)))?;

        info!("successfully exchanged authorization code for tokens");
        Ok(TokenPair {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
        })
    }
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    expires_in: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}
