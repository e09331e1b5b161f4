//! Bus socket client.
//!
//! Connects to the plugin's Unix socket, sends the initial calendar
//! request, and yields framed messages until the plugin disconnects.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

use deskcal_protocol::{DisplayRequest, MAX_MESSAGE_SIZE, PluginMessage, ProtocolError};

use crate::error::{DisplayError, DisplayResult};

/// Connection to the plugin's message bus.
pub struct BusClient {
    stream: UnixStream,
}

impl BusClient {
    /// Connects to the plugin at the given socket path.
    pub async fn connect(socket_path: &Path, timeout: Duration) -> DisplayResult<Self> {
        let stream = tokio::time::timeout(timeout, UnixStream::connect(socket_path))
            .await
            .map_err(|_| {
                DisplayError::connection(format!(
                    "connection timed out after {}s",
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                DisplayError::connection(format!(
                    "failed to connect to {}: {}",
                    socket_path.display(),
                    e
                ))
            })?;

        debug!(path = %socket_path.display(), "connected to plugin");
        Ok(Self { stream })
    }

    /// Sends a request to the plugin.
    pub async fn send(&mut self, request: &DisplayRequest) -> DisplayResult<()> {
        let data = deskcal_protocol::encode_message(request)?;
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Asks the plugin for the current calendar entries.
    pub async fn request_calendar(&mut self) -> DisplayResult<()> {
        debug!("requesting calendar entries");
        self.send(&DisplayRequest::get_calendar()).await
    }

    /// Reads the next message from the plugin.
    ///
    /// Returns `Ok(None)` when the plugin closes the connection cleanly.
    pub async fn next_message(&mut self) -> DisplayResult<Option<PluginMessage>> {
        let mut len_buf = [0u8; 4];
        match self.stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_MESSAGE_SIZE as usize {
            return Err(ProtocolError::MessageTooLarge {
                size: len as u32,
                max: MAX_MESSAGE_SIZE,
            }
            .into());
        }

        if len == 0 {
            return Err(ProtocolError::EmptyMessage.into());
        }

        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).await?;

        let message = serde_json::from_slice(&payload).map_err(ProtocolError::from)?;
        Ok(Some(message))
    }
}

/// Returns the default plugin socket path.
pub fn default_socket_path() -> PathBuf {
    deskcal_plugin::default_socket_path()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskcal_protocol::CalendarEntry;
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn connect_and_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            // Read the initial request
            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).await.unwrap();
            let mut payload = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            stream.read_exact(&mut payload).await.unwrap();
            let request: DisplayRequest = serde_json::from_slice(&payload).unwrap();
            assert_eq!(request, DisplayRequest::get_calendar());

            // Answer with entries
            let message =
                PluginMessage::entries(vec![CalendarEntry::new("A", "2024-01-01T09:00:00Z")]);
            let data = deskcal_protocol::encode_message(&message).unwrap();
            stream.write_all(&data).await.unwrap();
        });

        let mut client = BusClient::connect(&path, Duration::from_secs(5))
            .await
            .unwrap();
        client.request_calendar().await.unwrap();

        let message = client.next_message().await.unwrap().unwrap();
        match message {
            PluginMessage::CalendarEntries(entries) => assert_eq!(entries[0].summary, "A"),
            other => panic!("expected entries, got {:?}", other),
        }

        // Server closes; the client sees a clean EOF
        server.await.unwrap();
        assert!(client.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn connect_to_missing_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sock");

        let result = BusClient::connect(&path, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(DisplayError::Connection { .. })));
    }
}
