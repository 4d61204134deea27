//! Origin gateway.
//!
//! A thin forwarding layer in front of one internal HTTP origin.
//!
//! ```text
//!     Client ──▶ /api/*    ──┐                        ┌──▶ {origin}/api/*
//!                            ├─▶ mount ─▶ retry loop ─┤
//!     Client ──▶ /ai-api/* ──┘   lookup   + deadline  └──▶ {origin}/ai/*
//!
//!     Origin answer ─▶ header filter ─▶ stream (media) | buffer (rest) ─▶ Client
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use origin_gateway::lifecycle::{signals, startup, Shutdown};
use origin_gateway::observability::{logging, metrics};
use origin_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "origin-gateway")]
#[command(about = "Forwards API traffic to a single internal origin", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:3000
    #[arg(short, long)]
    bind: Option<String>,

    /// Origin base URL; overrides BACKEND_URL
    #[arg(long)]
    backend_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = startup::Overrides {
        bind_address: cli.bind,
        backend_url: cli.backend_url,
    };
    let config = startup::resolve_config(cli.config.as_deref(), &overrides, |key| {
        std::env::var(key).ok()
    })?;

    logging::init(&config.observability);
    tracing::info!("origin-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin = %config.origin.base_url,
        max_attempts = config.retries.max_attempts,
        attempt_timeout_ms = config.timeouts.attempt_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let server = GatewayServer::new(config)?;

    // Bind last: traffic only once everything else is ready.
    let listener = TcpListener::bind(&server.config().listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let token = shutdown.token();
    tokio::spawn(async move {
        signals::forward_to(&shutdown).await;
    });

    server.run(listener, token).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
