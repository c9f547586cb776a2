//! Sampler gateway.
//!
//! Serialises access to interactive sampling services: one request at a time
//! per gate, everybody else is told to come back later.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │               SAMPLER GATEWAY                │
//!   GET /inmt_sampler?..   │  ┌─────────┐   ┌─────────┐   ┌───────────┐  │
//!  ────────────────────────┼─▶│  http   │──▶│ routing │──▶│   gate    │  │
//!                          │  │ server  │   │  table  │   │ try_enter │  │
//!                          │  └─────────┘   └─────────┘   └─────┬─────┘  │
//!                          │                          busy ◀────┤        │
//!                          │                                    ▼        │
//!   raw upstream body      │  ┌─────────┐               ┌───────────┐    │
//!  ◀───────────────────────┼──│response │◀──────────────│ upstream  │◀───┼── Sampler
//!                          │  │ policy  │               │  client   │    │
//!                          │  └─────────┘               └───────────┘    │
//!                          │                                             │
//!   POST /load_file        │  ┌──────────────────────┐                   │
//!  ────────────────────────┼─▶│ upload → transcode   │                   │
//!                          │  └──────────────────────┘                   │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use sampler_gateway::config::{load_config, watcher::ConfigWatcher, GatewayConfig};
use sampler_gateway::lifecycle::{signals, Shutdown};
use sampler_gateway::observability::{logging, metrics};
use sampler_gateway::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "sampler-gateway", version)]
#[command(about = "Serialized HTTP gateway in front of interactive sampling services")]
struct Args {
    /// TOML configuration file. Built-in routes are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Reload the configuration file when it changes.
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!("sampler-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        gates = config.gates.len(),
        legacy_status = config.responses.legacy_status,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), rx)
        }
        _ => {
            let (_, rx) = mpsc::unbounded_channel();
            (None, rx)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
