//! HTTP edge gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ panic guard → trace → deadline → request IDs → CORS → body limit
//!                          │
//!                          ▼
//!                 ┌─────────────────┐      ┌──────────────┐
//!                 │ routing table   │─────▶│ session auth │──▶ role gate
//!                 └─────────────────┘      └──────────────┘        │
//!                                                                  ▼
//!                                             rate gate ──▶ forwarder ──▶ Backend
//!                                                                          Service
//!     Client Response ◀── security headers ◀── relayed response ◀──────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::config::{load_config, load_default};
use edge_gateway::lifecycle::wait_for_shutdown_signal;
use edge_gateway::observability::{logging::init_logging, metrics::init_metrics};
use edge_gateway::{GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "Session-aware HTTP edge gateway", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults plus environment when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_default()?,
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability);
    tracing::info!("edge-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        routes = config.routes.len(),
        session_backend = ?config.session.backend,
        rate_limit_enabled = config.rate_limit.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(config).await?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
