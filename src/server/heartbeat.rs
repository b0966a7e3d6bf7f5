// src/server/heartbeat.rs

//! A background task that periodically broadcasts a heartbeat to all clients.

use crate::core::{ClientRegistry, PeerHubError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct Heartbeat {
    #[serde(rename = "type")]
    kind: &'static str,
    clients: usize,
    ts: i64,
}

/// Encodes the heartbeat frame for the current registry state.
pub fn heartbeat_payload(registry: &ClientRegistry) -> Result<Vec<u8>, PeerHubError> {
    let heartbeat = Heartbeat {
        kind: "heartbeat",
        clients: registry.count(),
        ts: chrono::Utc::now().timestamp(),
    };
    Ok(serde_json::to_vec(&heartbeat)?)
}

/// The background task struct for the heartbeat broadcaster.
pub struct HeartbeatTask {
    registry: Arc<ClientRegistry>,
    interval: Duration,
}

impl HeartbeatTask {
    pub fn new(registry: Arc<ClientRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// The main run loop. Clients that are still busy with a previous message
    /// simply miss a beat.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Heartbeat task started ({:?} interval).", self.interval);
        let mut interval = tokio::time::interval(self.interval);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match heartbeat_payload(&self.registry)
                        .and_then(|payload| self.registry.broadcast_all(&payload))
                    {
                        Ok(scheduled) => debug!("Heartbeat scheduled for {} clients.", scheduled),
                        Err(e) => warn!("Heartbeat broadcast failed: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Heartbeat task shutting down.");
                    return;
                }
            }
        }
    }
}
