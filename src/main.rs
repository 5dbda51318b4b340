//! Chatter - multi-user terminal chat in one binary
//!
//! Run with `--serve` to act as the relay server; run without it to
//! open the chat client. Several clients pointed at one server form a
//! shared channel where everyone sees every message in the same order.
//!
//! # Usage
//!
//! ```bash
//! # Start the relay server
//! chatter --serve
//!
//! # Join as a client
//! chatter -H chat.example.com -u alice -c ff0000
//!
//! # Mutual TLS on both sides
//! chatter --serve --tls --cert-file ./server.pem --ca-file ./rootCA.pem
//! chatter --tls --cert-file ./client.pem --ca-file ./rootCA.pem
//!
//! # Enable debug logging
//! RUST_LOG=chatterd=debug chatter --serve
//! ```
//!
//! # Signal Handling
//!
//! In server mode, SIGTERM/SIGINT trigger a graceful shutdown.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatter_protocol::HexColor;
use chatter_tui::UiOptions;
use chatterd::router::spawn_router;
use chatterd::server::ChatServer;
use chatterd::tls::TlsSettings;

/// Chatter - terminal chat over TCP, optionally with mutual TLS
#[derive(Parser, Debug)]
#[command(name = "chatter", version, about)]
struct Args {
    /// Host to serve on or connect to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// TCP port
    #[arg(short = 'P', long, default_value_t = 8080)]
    port: u16,

    /// Username shown to other peers
    #[arg(short = 'u', long, default_value = "Anonymous")]
    username: String,

    /// Display color as six hex digits, e.g. ff0000
    #[arg(short = 'c', long, default_value = "000000")]
    color: String,

    /// Run as the relay server instead of the client
    #[arg(short = 's', long)]
    serve: bool,

    /// Enable mutual TLS
    #[arg(long)]
    tls: bool,

    /// PEM file with this side's certificate chain and private key
    #[arg(long, default_value = "./client.pem")]
    cert_file: PathBuf,

    /// PEM file with the root CA used to verify the remote peer
    #[arg(long, default_value = "./rootCA.pem")]
    ca_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.serve {
        run_server(args).await
    } else {
        run_client(args).await
    }
}

// ============================================================================
// Server Mode
// ============================================================================

async fn run_server(args: Args) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chatter=info".parse()?)
                .add_directive("chatterd=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %args.host,
        port = args.port,
        tls = args.tls,
        "Chatter server starting"
    );

    let tls_config = if args.tls {
        let settings = TlsSettings::new(&args.cert_file, &args.ca_file);
        Some(
            settings
                .server_config()
                .context("Failed to build server TLS configuration")?,
        )
    } else {
        None
    };

    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let router = spawn_router(cancel_token.clone());
    info!("Message router started");

    let server = ChatServer::bind(&args.host, args.port, tls_config, router, cancel_token)
        .await
        .context("Failed to start server")?;

    server.run().await;

    info!("Chatter server stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

// ============================================================================
// Client Mode
// ============================================================================

async fn run_client(args: Args) -> Result<()> {
    // TUI apps cannot log to stderr because it writes to the same
    // terminal, interfering with the alternate screen buffer.
    init_file_logging();

    let color: HexColor = args
        .color
        .parse()
        .context("invalid --color: expected exactly 6 hex digits, e.g. ff0000")?;

    let tls_config = if args.tls {
        let settings = TlsSettings::new(&args.cert_file, &args.ca_file);
        Some(
            settings
                .client_config()
                .context("Failed to build client TLS configuration")?,
        )
    } else {
        None
    };

    info!(
        host = %args.host,
        port = args.port,
        username = %args.username,
        "Chatter client starting"
    );

    chatter_tui::run(UiOptions {
        host: args.host,
        port: args.port,
        tls: tls_config,
        username: args.username,
        color,
    })
    .await
    .map_err(Into::into)
}

/// Returns the log directory, following the XDG base directory convention:
/// `$XDG_STATE_HOME/chatter` if set, else `$HOME/.local/state/chatter`.
fn get_log_dir() -> Option<PathBuf> {
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg_state).join("chatter"));
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local/state/chatter"))
}

/// Opens the client log file, warning on stderr before the TUI takes
/// over the terminal if anything fails.
fn create_log_file() -> Option<std::fs::File> {
    let log_dir = get_log_dir()?;

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory {log_dir:?}: {e}");
        return None;
    }

    let log_path = log_dir.join("tui.log");

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {log_path:?}: {e}");
            None
        }
    }
}

/// Initializes tracing to a file, or disables logging if none can be
/// opened.
fn init_file_logging() {
    if let Some(file) = create_log_file() {
        let writer = Mutex::new(file);

        let filter = EnvFilter::from_default_env().add_directive(
            "chatter=info".parse().unwrap_or_else(|_| {
                tracing_subscriber::filter::Directive::from(tracing::Level::INFO)
            }),
        );

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("off"))
            .init();
    }
}
