//! Display client error types.

use std::io;
use thiserror::Error;

/// Result type for display operations.
pub type DisplayResult<T> = Result<T, DisplayError>;

/// Errors that can occur in the display client.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// IO error on the bus socket.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (framing, encoding).
    #[error("Protocol error: {0}")]
    Protocol(#[from] deskcal_protocol::ProtocolError),

    /// Could not connect to the plugin.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The plugin closed the connection.
    #[error("Connection closed by plugin")]
    ConnectionClosed,
}

impl DisplayError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }
}
