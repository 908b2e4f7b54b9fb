//! Valve Engine
//!
//! A request-processing container built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ Engine pipeline ──▶ Host pipeline
//!                                                              │
//!                                                              ▼
//!                     Wrapper pipeline ◀── Context pipeline (listeners,
//!                          │                reserved paths, pause gate)
//!                          ▼
//!                     filter chain ──▶ handler
//!
//!     Cross-cutting: config (TOML + hot reload), logging, metrics,
//!                    native library probe, graceful shutdown
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use valve_engine::builtin::system_registry;
use valve_engine::config::{load_config, watcher::ConfigWatcher, EngineConfig};
use valve_engine::container::Deployer;
use valve_engine::observability::{logging, metrics};
use valve_engine::{native, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "valve-engine")]
#[command(about = "Request-processing container", long_about = None)]
struct Cli {
    /// TOML configuration file. Without one the built-in demo tree is served.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if cli.check {
        println!("configuration ok");
        return Ok(());
    }

    logging::init(&config.observability);
    tracing::info!("valve-engine v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        hosts = config.hosts.len(),
        "Configuration loaded"
    );

    native::status(config.native.enabled);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let deployer = Arc::new(Deployer::new(system_registry()));
    let engine = {
        let deployer = deployer.clone();
        let initial = config.clone();
        tokio::task::spawn_blocking(move || deployer.deploy(&initial)).await??
    };

    // Hot reload; the watcher handle must outlive the server
    let (updates, _watcher) = match &cli.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (rx, Some(watcher.run()?))
        }
        None => (tokio::sync::mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown.clone().trigger_on_ctrl_c());

    let server = HttpServer::new(&config, engine.clone(), deployer);
    server.run(listener, updates, shutdown.subscribe()).await?;

    tokio::task::spawn_blocking(move || engine.stop()).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
