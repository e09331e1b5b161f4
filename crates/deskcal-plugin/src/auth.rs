//! Authentication state machine.
//!
//! The plugin moves through three states: unconfigured (no usable
//! credentials), awaiting consent (credentials loaded, consent URL
//! available, no token yet), and authenticated (access token held in
//! memory). Transitions are explicit and guarded; a calendar fetch outside
//! the authenticated state is rejected rather than attempted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::bus::BusHandle;
use crate::error::{PluginError, PluginResult};
use crate::oauth::{AuthClient, TokenPair};
use crate::settings::{CredentialSource, Credentials, Settings, SettingsStore};

/// Message published to the bus when authentication completes.
const AUTH_SUCCESS_BUS_MESSAGE: &str =
    "Authentication successful! You can now access your calendar.";

/// Confirmation returned to the browser after the callback succeeds.
const AUTH_SUCCESS_HTTP_MESSAGE: &str =
    "Authentication successful! You can close this window.";

/// Fatal message when the credential prompt is left incomplete.
const INCOMPLETE_CREDENTIALS_MESSAGE: &str =
    "Please fill out all the fields! Restart the application to try again.";

/// Shared, lockable authentication manager.
pub type SharedAuthManager = Arc<RwLock<AuthManager>>;

/// Where the plugin stands in the OAuth flow.
enum AuthState {
    /// No usable credentials.
    Unconfigured,
    /// Credentials loaded; waiting for the user to grant consent.
    AwaitingConsent { client: AuthClient },
    /// Consent granted and code exchanged; token held in memory only.
    Authenticated { client: AuthClient, token: TokenPair },
}

impl AuthState {
    fn name(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::AwaitingConsent { .. } => "awaiting consent",
            Self::Authenticated { .. } => "authenticated",
        }
    }
}

/// Drives the OAuth flow and owns the resulting token.
pub struct AuthManager {
    state: AuthState,
    bus: BusHandle,
    http_timeout: Duration,
}

impl AuthManager {
    /// Creates a manager with no credentials configured.
    pub fn new(bus: BusHandle, http_timeout: Duration) -> Self {
        Self {
            state: AuthState::Unconfigured,
            bus,
            http_timeout,
        }
    }

    /// Loads credentials from the settings store, prompting the user through
    /// `source` when the store has none.
    ///
    /// On success the manager moves to awaiting consent. An incomplete
    /// submission from the prompt is fatal; the process should exit and the
    /// user try again.
    pub fn load_or_request_credentials(
        &mut self,
        store: &SettingsStore,
        source: &dyn CredentialSource,
    ) -> PluginResult<()> {
        store.load()?;

        let credentials = match store.get().and_then(|s| s.credentials()) {
            Some(credentials) => {
                info!("using saved credentials");
                credentials
            }
            None => {
                info!("no saved credentials, prompting");
                let submission = source.collect()?;
                let credentials = submission
                    .into_credentials()
                    .ok_or_else(|| PluginError::config(INCOMPLETE_CREDENTIALS_MESSAGE))?;
                store.set(Settings::from(credentials.clone()))?;
                credentials
            }
        };

        self.configure(credentials);
        Ok(())
    }

    /// Installs credentials directly, moving to awaiting consent.
    ///
    /// Replacing credentials drops any held token.
    pub fn configure(&mut self, credentials: Credentials) {
        if matches!(self.state, AuthState::Authenticated { .. }) {
            warn!("replacing credentials drops the current session");
        }
        let client = AuthClient::new(credentials, self.http_timeout);
        self.state = AuthState::AwaitingConsent { client };
        info!("credentials configured, awaiting consent");
    }

    /// Returns the consent URL the user must visit.
    ///
    /// Available once credentials are configured; also while authenticated,
    /// to allow re-consent.
    pub fn login_url(&self) -> PluginResult<String> {
        match &self.state {
            AuthState::AwaitingConsent { client } | AuthState::Authenticated { client, .. } => {
                Ok(client.login_url())
            }
            AuthState::Unconfigured => {
                Err(PluginError::invalid_state("build login URL", "unconfigured"))
            }
        }
    }

    /// Returns the access token if authenticated.
    pub fn access_token(&self) -> Option<&str> {
        match &self.state {
            AuthState::Authenticated { token, .. } => Some(&token.access_token),
            _ => None,
        }
    }

    /// Returns true if an access token is held.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated { .. })
    }

    /// Returns the name of the current state, for logging.
    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    /// Handles the OAuth redirect callback.
    ///
    /// A missing code fails before any token endpoint call; the error goes
    /// back to the HTTP caller only. On a successful exchange the token is
    /// stored, an authSuccess message is published to the bus, and the
    /// confirmation text for the browser is returned.
    pub async fn handle_callback(&mut self, code: Option<&str>) -> PluginResult<&'static str> {
        let code = code.ok_or(PluginError::MissingCode)?;

        let client = match std::mem::replace(&mut self.state, AuthState::Unconfigured) {
            AuthState::AwaitingConsent { client } | AuthState::Authenticated { client, .. } => {
                client
            }
            AuthState::Unconfigured => {
                return Err(PluginError::invalid_state("exchange code", "unconfigured"));
            }
        };

        match client.exchange_code(code).await {
            Ok(token) => {
                self.state = AuthState::Authenticated { client, token };
                info!("authentication complete");
                self.bus.send_auth_success(AUTH_SUCCESS_BUS_MESSAGE);
                Ok(AUTH_SUCCESS_HTTP_MESSAGE)
            }
            Err(e) => {
                error!(error = %e, "code exchange failed");
                self.state = AuthState::AwaitingConsent { client };
                Err(e)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn set_token_url_for_tests(&mut self, url: String) {
        self.state = match std::mem::replace(&mut self.state, AuthState::Unconfigured) {
            AuthState::AwaitingConsent { client } => AuthState::AwaitingConsent {
                client: client.with_token_url(url),
            },
            AuthState::Authenticated { client, token } => AuthState::Authenticated {
                client: client.with_token_url(url),
                token,
            },
            AuthState::Unconfigured => AuthState::Unconfigured,
        };
    }

    /// Refreshes the access token using the stored refresh token.
    ///
    /// Not implemented; an expired token surfaces as a fetch error and the
    /// user re-authenticates through the consent URL.
    pub async fn refresh_access_token(&mut self) -> PluginResult<()> {
        Err(PluginError::invalid_state(
            "refresh token",
            "refresh not supported",
        ))
    }
}
