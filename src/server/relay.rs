// src/server/relay.rs

//! The built-in application: relays every inbound frame according to `RelayMode`.

use crate::config::RelayMode;
use crate::core::{Application, Client, ClientRegistry, PeerHubError};
use tracing::{debug, warn};

/// Relays inbound frames back to the sender or out to the other clients.
///
/// Sends refused with `Busy` are dropped, never retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayApp {
    mode: RelayMode,
}

impl RelayApp {
    pub fn new(mode: RelayMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RelayMode {
        self.mode
    }
}

impl Application for RelayApp {
    fn on_receive(&self, registry: &ClientRegistry, client: &Client, data: &[u8]) {
        let result = match self.mode {
            RelayMode::Echo => registry.send_to_client(client, data).map(|_| 1),
            RelayMode::Broadcast => registry.broadcast_except(client.id(), data),
            RelayMode::BroadcastAll => registry.broadcast_all(data),
        };

        match result {
            Ok(scheduled) => debug!(
                "Relayed {} bytes from {} to {} client(s).",
                data.len(),
                client.id(),
                scheduled
            ),
            Err(PeerHubError::Busy) => {
                debug!("Client {} is busy, echo dropped.", client.id())
            }
            Err(e) => warn!("Failed to relay frame from {}: {}", client.id(), e),
        }
    }

    fn on_connect(&self, registry: &ClientRegistry, client: &Client) {
        debug!(
            "Client {} joined ({} connected).",
            client.id(),
            registry.count()
        );
    }

    fn on_disconnect(&self, registry: &ClientRegistry, client: &Client) {
        debug!(
            "Client {} left after {}s ({} connected).",
            client.id(),
            (chrono::Utc::now() - client.connect_time()).num_seconds(),
            registry.count()
        );
    }
}
