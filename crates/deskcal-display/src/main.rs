//! deskcal display entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

use deskcal_display::error::DisplayResult;
use deskcal_display::format::format_start;
use deskcal_display::model::{DisplayModel, View};
use deskcal_display::socket::{BusClient, default_socket_path};

#[derive(Parser, Debug)]
#[command(name = "deskcal", about = "Upcoming calendar events at a glance", version)]
struct Cli {
    /// Bus socket path (defaults to the runtime directory)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()))
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

async fn run(cli: Cli) -> DisplayResult<()> {
    let socket_path = cli.socket.unwrap_or_else(default_socket_path);

    let mut client = BusClient::connect(&socket_path, Duration::from_secs(5)).await?;
    client.request_calendar().await?;

    let mut model = DisplayModel::new();
    render(&model.view());

    // Enter refreshes, Ctrl-C quits
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            message = client.next_message() => {
                match message? {
                    Some(message) => {
                        debug!(?message, "received bus message");
                        model.apply(message);
                        render(&model.view());
                    }
                    None => {
                        info!("plugin disconnected");
                        return Ok(());
                    }
                }
            }
            line = stdin_lines.next_line(), if stdin_open => {
                match line? {
                    Some(_) => client.request_calendar().await?,
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                return Ok(());
            }
        }
    }
}

fn render(view: &View) {
    // Clear the terminal and repaint
    print!("\x1B[2J\x1B[H");
    println!("Upcoming events");
    println!("---------------");

    match view {
        View::Waiting => println!("Waiting for calendar data..."),
        View::Empty => println!("No upcoming events."),
        View::Entries(entries) => {
            for entry in entries {
                println!("{:>16}  {}", format_start(&entry.start.date_time), entry.summary);
            }
        }
        View::Error(message) => println!("Error: {}", message),
    }

    println!();
    println!("[Enter] refresh  [Ctrl-C] quit");
}
