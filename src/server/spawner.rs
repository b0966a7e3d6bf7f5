// src/server/spawner.rs

//! Spawns all of the server's long-running background tasks.

use super::context::ServerContext;
use super::heartbeat::HeartbeatTask;
use super::metrics_server;
use anyhow::Result;
use std::time::Duration;
use tracing::info;

/// Spawns all background tasks into the context's JoinSet.
pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let registry = &ctx.registry;
    let shutdown_tx = &ctx.shutdown_tx;
    let background_tasks = &mut ctx.background_tasks;

    // --- Metrics Server ---
    if ctx.config.metrics.enabled {
        let metrics_registry = registry.clone();
        let port = ctx.config.metrics.port;
        let shutdown_rx_metrics = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            metrics_server::run_metrics_server(metrics_registry, port, shutdown_rx_metrics).await;
            Ok(())
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    // --- Heartbeat ---
    if ctx.config.relay.heartbeat_interval_secs > 0 {
        let task = HeartbeatTask::new(
            registry.clone(),
            Duration::from_secs(ctx.config.relay.heartbeat_interval_secs),
        );
        let shutdown_rx_heartbeat = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            task.run(shutdown_rx_heartbeat).await;
            Ok(())
        });
    }

    info!("All background tasks have been spawned.");
    Ok(())
}
