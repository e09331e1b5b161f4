//! Message bus between the plugin and the display client.
//!
//! Outbound messages fan out through a broadcast channel; a Unix socket
//! server forwards them to every connected display as framed JSON and
//! dispatches inbound display requests. Components hold an explicit
//! [`BusHandle`] instead of reaching for a global host singleton, so tests
//! can subscribe and assert on what was emitted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Semaphore, broadcast};
use tracing::{debug, error, info, warn};

use deskcal_protocol::{
    CalendarEntry, DisplayRequest, GetTarget, MAX_MESSAGE_SIZE, PluginMessage, ProtocolError,
};

use crate::error::{PluginError, PluginResult};
use crate::fetcher::CalendarFetcher;

/// Broadcast channel capacity for outbound messages.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Sending half of the message bus.
///
/// Cheap to clone; each component gets its own.
#[derive(Debug, Clone)]
pub struct BusHandle {
    tx: broadcast::Sender<PluginMessage>,
}

impl BusHandle {
    /// Creates a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribes to outbound messages.
    pub fn subscribe(&self) -> broadcast::Receiver<PluginMessage> {
        self.tx.subscribe()
    }

    /// Publishes a message to all connected displays.
    ///
    /// Sending with no display connected is not an error; the message is
    /// simply dropped.
    pub fn send(&self, message: PluginMessage) {
        match self.tx.send(message) {
            Ok(receivers) => debug!(receivers, "published bus message"),
            Err(_) => debug!("no display connected, message dropped"),
        }
    }

    /// Publishes an authSuccess message.
    pub fn send_auth_success(&self, message: impl Into<String>) {
        self.send(PluginMessage::auth_success(message));
    }

    /// Publishes a calendarEntries message.
    pub fn send_entries(&self, entries: Vec<CalendarEntry>) {
        self.send(PluginMessage::entries(entries));
    }

    /// Publishes an error message.
    pub fn send_error(&self, message: impl Into<String>) {
        self.send(PluginMessage::error(message));
    }
}

impl Default for BusHandle {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// Bus server configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Path to the Unix socket.
    pub socket_path: PathBuf,

    /// Write timeout per outbound message.
    pub write_timeout: Duration,

    /// Maximum concurrent display connections.
    pub max_connections: usize,

    /// Whether to remove a stale socket on startup.
    pub cleanup_stale_socket: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            write_timeout: Duration::from_secs(10),
            max_connections: 8,
            cleanup_stale_socket: true,
        }
    }
}

impl BusConfig {
    /// Creates a new bus configuration with the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    /// Builder: set cleanup stale socket.
    pub fn with_cleanup_stale_socket(mut self, cleanup: bool) -> Self {
        self.cleanup_stale_socket = cleanup;
        self
    }
}

/// Returns the default bus socket path.
///
/// Uses `$XDG_RUNTIME_DIR/deskcal.sock` if available,
/// otherwise falls back to `/tmp/deskcal-$UID.sock`.
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("deskcal.sock")
    } else {
        #[cfg(unix)]
        let uid = unsafe { libc::getuid() };
        #[cfg(not(unix))]
        let uid = 0;
        PathBuf::from(format!("/tmp/deskcal-{}.sock", uid))
    }
}

/// Unix socket server carrying the bus to display clients.
pub struct BusServer {
    config: BusConfig,
    listener: UnixListener,
    connection_semaphore: Arc<Semaphore>,
}

impl BusServer {
    /// Creates a new bus server, binding the socket path from the
    /// configuration.
    pub async fn new(config: BusConfig) -> PluginResult<Self> {
        let socket_path = &config.socket_path;

        if let Some(parent) = socket_path.parent()
            && !parent.exists()
        {
            return Err(PluginError::socket_path_invalid(
                parent.to_string_lossy().to_string(),
            ));
        }

        if config.cleanup_stale_socket && socket_path.exists() {
            // Try to connect to see if it's a live socket
            match UnixStream::connect(socket_path).await {
                Ok(_) => {
                    return Err(PluginError::socket_in_use(
                        socket_path.to_string_lossy().to_string(),
                    ));
                }
                Err(_) => {
                    info!(path = %socket_path.display(), "Removing stale socket");
                    std::fs::remove_file(socket_path)?;
                }
            }
        } else if socket_path.exists() {
            return Err(PluginError::socket_in_use(
                socket_path.to_string_lossy().to_string(),
            ));
        }

        let listener = UnixListener::bind(socket_path)?;
        info!(path = %socket_path.display(), "Bus server listening");

        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));

        Ok(Self {
            config,
            listener,
            connection_semaphore,
        })
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Runs the accept loop, serving each display connection until it
    /// disconnects.
    pub async fn run(&self, bus: BusHandle, fetcher: Arc<CalendarFetcher>) -> PluginResult<()> {
        loop {
            let permit = self
                .connection_semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore should not be closed");

            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("Display client connected");
                    let rx = bus.subscribe();
                    let fetcher = fetcher.clone();
                    let write_timeout = self.config.write_timeout;
                    tokio::spawn(async move {
                        let _permit = permit;
                        serve_display(stream, rx, fetcher, write_timeout).await;
                        debug!("Display client disconnected");
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    // Continue accepting despite errors
                }
            }
        }
    }
}

impl Drop for BusServer {
    fn drop(&mut self) {
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!(
                    path = %self.config.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }
    }
}

/// Serves one display connection: forwards bus messages out and dispatches
/// inbound requests until either side closes.
async fn serve_display(
    stream: UnixStream,
    mut rx: broadcast::Receiver<PluginMessage>,
    fetcher: Arc<CalendarFetcher>,
    write_timeout: Duration,
) {
    let (mut reader, mut writer) = stream.into_split();

    // The writer half runs separately so a slow display request can never
    // stall outbound messages.
    let writer_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    let write = write_framed(&mut writer, &message);
                    match tokio::time::timeout(write_timeout, write).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            debug!(error = %e, "display write failed");
                            break;
                        }
                        Err(_) => {
                            warn!("display write timed out");
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "display fell behind, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    loop {
        match read_framed::<DisplayRequest, _>(&mut reader).await {
            Ok(Some(DisplayRequest::Get {
                request: GetTarget::Calendar,
            })) => {
                debug!("display requested calendar entries");
                fetcher.fetch_and_publish().await;
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "error reading display request");
                break;
            }
        }
    }

    writer_task.abort();
}

/// Writes one framed message to an async stream.
pub(crate) async fn write_framed<T, W>(writer: &mut W, message: &T) -> PluginResult<()>
where
    T: serde::Serialize,
    W: AsyncWrite + Unpin,
{
    let data = deskcal_protocol::encode_message(message)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one framed message from an async stream.
///
/// Returns `Ok(None)` on a clean EOF before any bytes.
pub(crate) async fn read_framed<T, R>(reader: &mut R) -> PluginResult<Option<T>>
where
    T: serde::de::DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
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
    reader.read_exact(&mut payload).await?;

    let message =
        serde_json::from_slice(&payload).map_err(deskcal_protocol::ProtocolError::from)?;
    Ok(Some(message))
}
