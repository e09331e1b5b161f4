//! Persisted plugin settings and credential collection.
//!
//! The host runtime persists three values for the plugin: the OAuth client
//! id, the client secret, and the redirect URI. This module provides the
//! file-backed store for them and the seam through which missing credentials
//! are collected from the user.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PluginError, PluginResult};

/// OAuth 2.0 client credentials, complete and ready to build an auth client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
    /// The redirect URI registered for the client.
    pub redirect_uri: String,
}

impl Credentials {
    /// Default redirect URI suggestion, matching the callback endpoint.
    pub const DEFAULT_REDIRECT_URI: &'static str = "http://localhost:8889/callback/googlecal";

    /// Creates new credentials.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Validates that the credentials appear to be correctly formatted.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        if self.redirect_uri.is_empty() {
            return Err("redirect_uri is required");
        }
        Ok(())
    }
}

/// Settings as persisted on disk.
///
/// Fields are optional because the first run starts with nothing saved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// The OAuth 2.0 client ID, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// The OAuth 2.0 client secret, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// The redirect URI, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

impl Settings {
    /// Returns complete credentials if both client id and secret are present.
    ///
    /// A missing redirect URI falls back to the default suggestion.
    pub fn credentials(&self) -> Option<Credentials> {
        let client_id = self.client_id.as_deref().filter(|s| !s.is_empty())?;
        let client_secret = self.client_secret.as_deref().filter(|s| !s.is_empty())?;
        let redirect_uri = self
            .redirect_uri
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(Credentials::DEFAULT_REDIRECT_URI);
        Some(Credentials::new(client_id, client_secret, redirect_uri))
    }
}

impl From<Credentials> for Settings {
    fn from(credentials: Credentials) -> Self {
        Self {
            client_id: Some(credentials.client_id),
            client_secret: Some(credentials.client_secret),
            redirect_uri: Some(credentials.redirect_uri),
        }
    }
}

/// File-backed settings store.
///
/// Settings are stored as JSON; writes go through a temp file rename and
/// get restrictive permissions since the file holds the client secret.
#[derive(Debug)]
pub struct SettingsStore {
    /// Path to the settings file.
    path: PathBuf,

    /// In-memory cache of the current settings.
    settings: RwLock<Option<Settings>>,
}

impl SettingsStore {
    /// Creates a new settings store at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: RwLock::new(None),
        }
    }

    /// Returns the default settings path,
    /// `~/.local/share/deskcal/settings.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".local").join("share"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deskcal")
            .join("settings.json")
    }

    /// Loads settings from disk into memory.
    ///
    /// Returns Ok(true) if settings were loaded, Ok(false) if no file exists.
    pub fn load(&self) -> PluginResult<bool> {
        if !self.path.exists() {
            debug!("no settings file at {:?}", self.path);
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| PluginError::config(format!("failed to read settings file: {}", e)))?;

        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| PluginError::config(format!("failed to parse settings file: {}", e)))?;

        info!("loaded settings from {:?}", self.path);
        *self.settings.write().unwrap() = Some(settings);
        Ok(true)
    }

    /// Saves the current settings to disk.
    pub fn save(&self) -> PluginResult<()> {
        let settings = self.settings.read().unwrap();
        let settings = settings
            .as_ref()
            .ok_or_else(|| PluginError::config("no settings to save"))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PluginError::config(format!("failed to create settings directory: {}", e))
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| PluginError::config(format!("failed to serialize settings: {}", e)))?;

        fs::write(&temp_path, &content)
            .map_err(|e| PluginError::config(format!("failed to write settings file: {}", e)))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| PluginError::config(format!("failed to rename settings file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        debug!("saved settings to {:?}", self.path);
        Ok(())
    }

    /// Returns a clone of the current settings, if any.
    pub fn get(&self) -> Option<Settings> {
        self.settings.read().unwrap().clone()
    }

    /// Sets new settings and saves them to disk.
    pub fn set(&self, settings: Settings) -> PluginResult<()> {
        *self.settings.write().unwrap() = Some(settings);
        self.save()
    }

    /// Returns the settings file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// What the user submitted when prompted for credentials.
///
/// Unlike [`Credentials`] this may be incomplete; an incomplete submission
/// is a fatal configuration error.
#[derive(Debug, Clone, Default)]
pub struct CredentialSubmission {
    /// Submitted client ID, possibly empty.
    pub client_id: String,
    /// Submitted client secret, possibly empty.
    pub client_secret: String,
    /// Submitted redirect URI; empty means use the default suggestion.
    pub redirect_uri: String,
}

impl CredentialSubmission {
    /// Returns true if client id and secret were both filled out.
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Converts the submission into credentials, applying the redirect
    /// default. Returns None if the submission is incomplete.
    pub fn into_credentials(self) -> Option<Credentials> {
        if !self.is_complete() {
            return None;
        }
        let redirect_uri = if self.redirect_uri.is_empty() {
            Credentials::DEFAULT_REDIRECT_URI.to_string()
        } else {
            self.redirect_uri
        };
        Some(Credentials::new(
            self.client_id,
            self.client_secret,
            redirect_uri,
        ))
    }
}

/// Seam for collecting credentials from the user.
///
/// The binary prompts on stdin; tests substitute a canned submission.
pub trait CredentialSource {
    /// Asks the user for client id, client secret, and redirect URI.
    fn collect(&self) -> PluginResult<CredentialSubmission>;
}
