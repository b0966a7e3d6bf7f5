// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use crate::core::{ClientId, ClientRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// An RAII guard that unregisters the client when a connection handler's scope
/// is exited, however it exits.
pub struct ConnectionGuard {
    registry: Arc<ClientRegistry>,
    client_id: ClientId,
    addr: SocketAddr,
}

impl ConnectionGuard {
    pub(crate) fn new(registry: Arc<ClientRegistry>, client_id: ClientId, addr: SocketAddr) -> Self {
        Self {
            registry,
            client_id,
            addr,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!(
            "ConnectionGuard dropping, cleaning up resources for connection {}",
            self.addr
        );

        // Unregister is idempotent: the application may already have removed
        // the client through `disconnect`.
        if !self.registry.unregister(&self.client_id) {
            debug!(
                "Client {} ({}) was already unregistered upon cleanup.",
                self.client_id, self.addr
            );
        }
    }
}
