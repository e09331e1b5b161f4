//! deskcal plugin entry point.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::RwLock;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use deskcal_plugin::auth::{AuthManager, SharedAuthManager};
use deskcal_plugin::bus::{BusConfig, BusHandle, BusServer, default_socket_path};
use deskcal_plugin::calendar::CalendarClient;
use deskcal_plugin::error::PluginResult;
use deskcal_plugin::fetcher::CalendarFetcher;
use deskcal_plugin::http::{CALLBACK_PORT, CallbackServer};
use deskcal_plugin::settings::{CredentialSource, CredentialSubmission, SettingsStore};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "deskcal-plugin", about = "Google Calendar plugin backend", version)]
struct Cli {
    /// Bus socket path (defaults to the runtime directory)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Settings file path
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Port for the OAuth callback endpoint
    #[arg(long, default_value_t = CALLBACK_PORT)]
    port: u16,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.debug {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("deskcal_plugin=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> PluginResult<()> {
    let settings_path = cli
        .settings
        .unwrap_or_else(SettingsStore::default_path);
    let socket_path = cli.socket.unwrap_or_else(default_socket_path);

    let bus = BusHandle::default();

    // Load credentials, prompting on first run
    let store = SettingsStore::new(settings_path);
    let mut manager = AuthManager::new(bus.clone(), HTTP_TIMEOUT);
    manager.load_or_request_credentials(&store, &StdinPrompt)?;
    let auth: SharedAuthManager = Arc::new(RwLock::new(manager));

    let api = CalendarClient::new(HTTP_TIMEOUT);
    let fetcher = Arc::new(CalendarFetcher::new(auth.clone(), bus.clone(), api));

    let callback_server = CallbackServer::bind(cli.port, auth.clone(), fetcher.clone()).await?;
    let bus_server = BusServer::new(BusConfig::new(socket_path)).await?;

    info!(
        "open http://localhost:{}/auth in a browser to authenticate",
        cli.port
    );

    tokio::select! {
        result = callback_server.run() => {
            if let Err(e) = &result {
                error!(error = %e, "callback server exited");
            }
            result
        }
        result = bus_server.run(bus, fetcher) => {
            if let Err(e) = &result {
                error!(error = %e, "bus server exited");
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}

/// Prompts for OAuth credentials on stdin.
struct StdinPrompt;

impl CredentialSource for StdinPrompt {
    fn collect(&self) -> PluginResult<CredentialSubmission> {
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();

        let mut ask = |prompt: &str| -> PluginResult<String> {
            print!("{}: ", prompt);
            io::stdout().flush()?;
            let line = lines.next().transpose()?.unwrap_or_default();
            Ok(line.trim().to_string())
        };

        Ok(CredentialSubmission {
            client_id: ask("Google OAuth client ID")?,
            client_secret: ask("Google OAuth client secret")?,
            redirect_uri: ask("Redirect URI (blank for default)")?,
        })
    }
}
