// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;

mod connection_loop;
mod context;
mod heartbeat;
mod initialization;
mod metrics_server;
mod relay;
mod spawner;

pub use context::ServerContext;
pub use heartbeat::{HeartbeatTask, heartbeat_payload};
pub use initialization::{setup, setup_with_app};
pub use relay::RelayApp;

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // 1. Initialize the registry and bind the listener.
    let server_context = setup(config).await?;

    // 2. Spawn background tasks and run until shutdown.
    serve(server_context).await
}

/// Spawns the background tasks and runs the accept loop until shutdown.
pub async fn serve(mut server_context: ServerContext) -> Result<()> {
    spawner::spawn_all(&mut server_context).await?;
    connection_loop::run(server_context).await
}
