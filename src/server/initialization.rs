// src/server/initialization.rs

//! Handles server initialization: configuration checks, registry setup and
//! binding the listener.

use super::context::ServerContext;
use super::relay::RelayApp;
use crate::config::Config;
use crate::core::{Application, ClientRegistry};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::info;

/// Initializes the server with the built-in relay application.
pub async fn setup(config: Config) -> Result<ServerContext> {
    let app = Arc::new(RelayApp::new(config.relay.mode));
    setup_with_app(config, app).await
}

/// Initializes the server with a caller-provided application.
pub async fn setup_with_app(config: Config, app: Arc<dyn Application>) -> Result<ServerContext> {
    config.validate()?;
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let options = config.registry_options()?;
    let registry = Arc::new(ClientRegistry::new(options, app));
    info!("Client registry initialized.");

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    info!(
        "PeerHub server listening on {}",
        listener.local_addr().context("Listener has no local address")?
    );

    Ok(ServerContext {
        config,
        registry,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
    })
}

fn log_startup_info(config: &Config) {
    info!("Starting PeerHub version {}", env!("CARGO_PKG_VERSION"));
    if config.max_clients > 0 {
        info!("Max clients: {}", config.max_clients);
    } else {
        info!("Max clients: unbounded");
    }
    info!(
        "Transmission buffer: {} bytes inline, {} bytes header margin ({} bytes inline payload).",
        config.tx.inline_capacity,
        config.tx.header_margin,
        config.tx.inline_capacity.saturating_sub(config.tx.header_margin)
    );
    info!("Relay mode: {:?}", config.relay.mode);
}
