//! Plugin error types.

use std::io;
use thiserror::Error;

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors that can occur in the plugin backend.
#[derive(Debug, Error)]
pub enum PluginError {
    /// IO error (socket, file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (framing, encoding, etc.).
    #[error("Protocol error: {0}")]
    Protocol(#[from] deskcal_protocol::ProtocolError),

    /// Missing or incomplete configuration. Fatal to the startup flow;
    /// the user has to re-enter credentials and restart.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The OAuth redirect arrived without a `code` query parameter.
    #[error("No authorization code provided!")]
    MissingCode,

    /// The token endpoint rejected the authorization code.
    #[error("token exchange failed: {message}")]
    TokenExchange { message: String },

    /// Network error talking to an upstream endpoint.
    #[error("network error: {message}")]
    Network { message: String },

    /// The Calendar API returned an error.
    #[error("API error: {message}")]
    Api { message: String },

    /// A calendar fetch was attempted before authentication completed.
    #[error("No access token available. Please authenticate first.")]
    NoAccessToken,

    /// An operation was attempted in a state that does not allow it.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Bus socket path already in use.
    #[error("Socket path already in use: {path}")]
    SocketInUse { path: String },

    /// Bus socket path parent directory does not exist.
    #[error("Socket path parent directory does not exist: {path}")]
    SocketPathInvalid { path: String },
}

impl PluginError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a token exchange error.
    pub fn token_exchange(message: impl Into<String>) -> Self {
        Self::TokenExchange {
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(operation: &'static str, state: &'static str) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Creates a socket in use error.
    pub fn socket_in_use(path: impl Into<String>) -> Self {
        Self::SocketInUse { path: path.into() }
    }

    /// Creates a socket path invalid error.
    pub fn socket_path_invalid(path: impl Into<String>) -> Self {
        Self::SocketPathInvalid { path: path.into() }
    }
}
