//! Local HTTP endpoint for the OAuth flow.
//!
//! Two routes on a plain TCP listener: `GET /auth` redirects the browser to
//! the Google consent page, and `GET /callback/googlecal` receives the
//! redirect back, hands the authorization code to the auth manager, and
//! triggers the first calendar fetch. Requests are small and one-shot, so
//! the request line is parsed by hand rather than through an HTTP framework.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::auth::SharedAuthManager;
use crate::error::PluginResult;
use crate::fetcher::CalendarFetcher;

/// Default port for the callback endpoint, matching the registered
/// redirect URI.
pub const CALLBACK_PORT: u16 = 8889;

/// Path of the OAuth redirect callback.
pub const CALLBACK_PATH: &str = "/callback/googlecal";

/// Path that redirects the browser to the consent page.
pub const AUTH_PATH: &str = "/auth";

/// Cap on the request head we are willing to read.
const MAX_REQUEST_BYTES: usize = 8 * 1024;

/// HTTP server for the OAuth consent and callback routes.
pub struct CallbackServer {
    listener: TcpListener,
    auth: SharedAuthManager,
    fetcher: Arc<CalendarFetcher>,
}

impl CallbackServer {
    /// Binds the server on localhost at the given port.
    pub async fn bind(
        port: u16,
        auth: SharedAuthManager,
        fetcher: Arc<CalendarFetcher>,
    ) -> PluginResult<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        info!(addr = %listener.local_addr()?, "Callback server listening");
        Ok(Self {
            listener,
            auth,
            fetcher,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> PluginResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop.
    pub async fn run(&self) -> PluginResult<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(%addr, "HTTP connection accepted");
                    let auth = self.auth.clone();
                    let fetcher = self.fetcher.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, auth, fetcher).await {
                            warn!(error = %e, "error handling HTTP request");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Reads one request, routes it, and writes the response.
async fn handle_connection(
    mut stream: TcpStream,
    auth: SharedAuthManager,
    fetcher: Arc<CalendarFetcher>,
) -> PluginResult<()> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);

    let response = match parse_request_line(&request) {
        Some(("GET", path)) => route(path, &auth, &fetcher).await,
        Some((method, _)) => {
            debug!(method, "rejecting non-GET request");
            Response::method_not_allowed()
        }
        None => Response::bad_request("malformed request"),
    };

    stream.write_all(response.render().as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Dispatches a GET request by path.
async fn route(path: &str, auth: &SharedAuthManager, fetcher: &CalendarFetcher) -> Response {
    let (path, query) = split_query(path);

    match path {
        AUTH_PATH => match auth.read().await.login_url() {
            Ok(url) => {
                info!("redirecting browser to consent page");
                Response::redirect(url)
            }
            Err(e) => {
                warn!(error = %e, "consent requested without credentials");
                Response::server_error(e.to_string())
            }
        },
        CALLBACK_PATH => {
            let code = query_param(query, "code");
            handle_callback(code.as_deref(), auth, fetcher).await
        }
        _ => Response::not_found(),
    }
}

/// Handles the OAuth redirect callback.
///
/// A missing code is reported to the browser only; a failed exchange is
/// logged and reported to the browser. On success the auth manager has
/// already published authSuccess, and exactly one fetch runs before the
/// browser gets its confirmation, so connected displays see authSuccess
/// followed by the first calendarEntries.
async fn handle_callback(
    code: Option<&str>,
    auth: &SharedAuthManager,
    fetcher: &CalendarFetcher,
) -> Response {
    let result = auth.write().await.handle_callback(code).await;

    match result {
        Ok(confirmation) => {
            fetcher.fetch_and_publish().await;
            Response::ok(confirmation)
        }
        Err(e @ crate::error::PluginError::MissingCode) => Response::bad_request(e.to_string()),
        Err(e) => {
            error!(error = %e, "callback handling failed");
            Response::server_error(format!("Error exchanging code for tokens: {}", e))
        }
    }
}

/// Splits a request target into path and query string.
fn split_query(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

/// Extracts the first value for `name` from a query string,
/// percent-decoded.
fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == name && !value.is_empty() {
            urlencoding::decode(value).ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

/// Parses the method and target out of the request line.
fn parse_request_line(request: &str) -> Option<(&str, &str)> {
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    Some((method, target))
}

/// Minimal HTTP response.
struct Response {
    status: &'static str,
    location: Option<String>,
    body: String,
}

impl Response {
    fn ok(body: impl Into<String>) -> Self {
        Self {
            status: "200 OK",
            location: None,
            body: body.into(),
        }
    }

    fn redirect(location: String) -> Self {
        Self {
            status: "302 Found",
            location: Some(location),
            body: String::new(),
        }
    }

    fn bad_request(body: impl Into<String>) -> Self {
        Self {
            status: "400 Bad Request",
            location: None,
            body: body.into(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: "404 Not Found",
            location: None,
            body: "Not found".into(),
        }
    }

    fn method_not_allowed() -> Self {
        Self {
            status: "405 Method Not Allowed",
            location: None,
            body: "Method not allowed".into(),
        }
    }

    fn server_error(body: impl Into<String>) -> Self {
        Self {
            status: "500 Internal Server Error",
            location: None,
            body: body.into(),
        }
    }

    fn render(&self) -> String {
        let mut response = format!("HTTP/1.1 {}\r\n", self.status);
        if let Some(location) = &self.location {
            response.push_str(&format!("Location: {}\r\n", location));
        }
        response.push_str(&format!(
            "Content-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.body.len(),
            self.body
        ));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthManager;
    use crate::bus::BusHandle;
    use crate::calendar::CalendarClient;
    use crate::settings::Credentials;
    use deskcal_protocol::PluginMessage;
    use std::time::Duration;
    use tokio::sync::RwLock;

    #[test]
    fn query_param_extraction() {
        assert_eq!(query_param("code=abc&scope=x", "code").as_deref(), Some("abc"));
        assert_eq!(query_param("scope=x", "code"), None);
        assert_eq!(query_param("code=", "code"), None);
        assert_eq!(query_param("", "code"), None);
        assert_eq!(
            query_param("code=a%2Fb", "code").as_deref(),
            Some("a/b")
        );
    }

    #[test]
    fn request_line_parsing() {
        assert_eq!(
            parse_request_line("GET /auth HTTP/1.1\r\nHost: x\r\n\r\n"),
            Some(("GET", "/auth"))
        );
        assert_eq!(parse_request_line(""), None);
    }

    struct Harness {
        addr: SocketAddr,
        bus: BusHandle,
        auth: SharedAuthManager,
        _server_task: tokio::task::JoinHandle<()>,
    }

    /// Spins up a callback server wired to mockito-backed token and API
    /// endpoints.
    async fn harness(token_url: String, api_url: String, configure: bool) -> Harness {
        let bus = BusHandle::default();
        let mut manager = AuthManager::new(bus.clone(), Duration::from_secs(5));
        if configure {
            manager.configure(Credentials::new(
                "id",
                "secret",
                Credentials::DEFAULT_REDIRECT_URI,
            ));
            manager.set_token_url_for_tests(token_url);
        }
        let auth: SharedAuthManager = Arc::new(RwLock::new(manager));

        let api = CalendarClient::new(Duration::from_secs(5)).with_base_url(api_url);
        let fetcher = Arc::new(CalendarFetcher::new(auth.clone(), bus.clone(), api));

        // Port 0 keeps tests independent of the fixed callback port
        let server = CallbackServer::bind(0, auth.clone(), fetcher).await.unwrap();
        let addr = server.local_addr().unwrap();
        let server_task = tokio::spawn(async move {
            let _ = server.run().await;
        });

        Harness {
            addr,
            bus,
            auth,
            _server_task: server_task,
        }
    }

    /// Sends one GET request and returns the raw response.
    async fn get(addr: SocketAddr, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn auth_route_redirects_to_consent_page() {
        let h = harness(String::new(), String::new(), true).await;
        let response = get(h.addr, "/auth").await;

        assert!(response.starts_with("HTTP/1.1 302"));
        assert!(response.contains("Location: https://accounts.google.com/o/oauth2/v2/auth"));
        assert!(response.contains("client_id=id"));
    }

    #[tokio::test]
    async fn auth_route_unconfigured_reports_error() {
        let h = harness(String::new(), String::new(), false).await;
        let response = get(h.addr, "/auth").await;

        assert!(response.starts_with("HTTP/1.1 500"));
        assert!(response.contains("unconfigured"));
    }

    #[tokio::test]
    async fn callback_without_code_is_rejected_locally() {
        let mut token_server = mockito::Server::new_async().await;
        let token_mock = token_server
            .mock("POST", "/token")
            .expect(0)
            .create_async()
            .await;

        let h = harness(
            format!("{}/token", token_server.url()),
            String::new(),
            true,
        )
        .await;
        let response = get(h.addr, "/callback/googlecal?error=access_denied").await;

        assert!(response.starts_with("HTTP/1.1 400"));
        assert!(response.contains("No authorization code provided!"));
        // The token endpoint was never called
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn callback_success_publishes_in_order_and_confirms() {
        let mut token_server = mockito::Server::new_async().await;
        token_server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"at-1"}"#)
            .create_async()
            .await;

        let mut api_server = mockito::Server::new_async().await;
        api_server
            .mock("GET", "/calendars/primary/events")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"items":[{"summary":"Standup","start":{"dateTime":"2024-01-01T09:00:00Z"}}]}"#)
            .create_async()
            .await;

        let h = harness(
            format!("{}/token", token_server.url()),
            api_server.url(),
            true,
        )
        .await;
        let mut rx = h.bus.subscribe();

        let response = get(h.addr, "/callback/googlecal?code=auth-code").await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("Authentication successful! You can close this window."));
        assert!(h.auth.read().await.is_authenticated());

        // authSuccess first, then the initial entries
        assert_eq!(
            rx.recv().await.unwrap(),
            PluginMessage::auth_success(
                "Authentication successful! You can now access your calendar."
            )
        );
        match rx.recv().await.unwrap() {
            PluginMessage::CalendarEntries(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].summary, "Standup");
            }
            other => panic!("expected entries, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn callback_exchange_failure_reports_to_browser() {
        let mut token_server = mockito::Server::new_async().await;
        token_server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let h = harness(
            format!("{}/token", token_server.url()),
            String::new(),
            true,
        )
        .await;
        let mut rx = h.bus.subscribe();

        let response = get(h.addr, "/callback/googlecal?code=bad-code").await;

        assert!(response.starts_with("HTTP/1.1 500"));
        assert!(response.contains("Error exchanging code for tokens:"));
        assert!(!h.auth.read().await.is_authenticated());
        // Nothing was published for a failed exchange
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let h = harness(String::new(), String::new(), true).await;
        let response = get(h.addr, "/nope").await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn post_is_rejected() {
        let h = harness(String::new(), String::new(), true).await;

        let mut stream = TcpStream::connect(h.addr).await.unwrap();
        stream
            .write_all(b"POST /auth HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 405"));
    }
}
