//! Filter gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                    FILTER GATEWAY                    │
//!                         │                                                      │
//!     Client Request      │  ┌─────────┐    ┌─────────┐    ┌──────────────────┐  │
//!     ────────────────────┼─▶│  http   │───▶│ routing │───▶│ FilteringHandler │  │
//!                         │  │ server  │    │ Router  │    │  (cache lookup)  │  │
//!                         │  └─────────┘    └─────────┘    └────────┬─────────┘  │
//!                         │                                         │            │
//!                         │   config watcher / admin refresh        ▼            │
//!                         │        │                       ┌──────────────────┐  │
//!                         │        ▼                       │  RouteFilter-    │  │
//!                         │  ┌──────────┐   ┌───────────┐  │  ChainCache      │  │
//!                         │  │ Refresh  │──▶│ Refresher │─▶│  (snapshot swap) │  │
//!                         │  │   Bus    │   └───────────┘  └──────────────────┘  │
//!                         │  └──────────┘                                        │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use filter_gateway::admin::setup_admin_router;
use filter_gateway::config::{load_config, ConfigWatcher, GatewayConfig};
use filter_gateway::http::{AppState, HttpServer};
use filter_gateway::lifecycle::{shutdown, signals, Gateway, Shutdown};
use filter_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "filter-gateway", version, about = "Route-keyed filter chain gateway")]
struct Args {
    /// Path to the TOML configuration file. Watched for changes.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "filter-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (gateway, dispatcher) = Gateway::bootstrap(config.clone())?;
    let shutdown = Shutdown::new();
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown.subscribe()));

    let routes = gateway.publish_refresh()?;
    tracing::info!(routes, "Initial topology refresh queued");

    // Held for the process lifetime; dropping it stops watching.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            let gateway = gateway.clone();
            let mut shutdown_rx = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(revision) = updates.recv() => {
                            if let Err(e) = gateway.apply_config(revision) {
                                tracing::error!(error = %e, "Config reload failed");
                            }
                        }
                        _ = shutdown_rx.recv() => break,
                        else => break,
                    }
                }
            });
            Some(handle)
        }
        None => None,
    };

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        let app = setup_admin_router(AppState::new(gateway.clone()));
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(admin_listener, app)
                .with_graceful_shutdown(shutdown::wait(shutdown_rx))
                .await
            {
                tracing::error!(error = %e, "Admin API server failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(gateway.clone());
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::wait_for_signal().await;
    shutdown.trigger();

    server_task.await??;
    let _ = dispatcher_task.await;
    gateway.cache().clear();

    tracing::info!("Shutdown complete");
    Ok(())
}
