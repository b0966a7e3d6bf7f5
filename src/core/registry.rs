// src/core/registry.rs

//! The authoritative, capacity-bounded collection of live clients.
//!
//! One `parking_lot::Mutex` guards the whole client map, including every
//! client's transmission buffer. Only state transitions happen under it:
//! inserting and removing clients, choosing a buffer, copying payload bytes and
//! flipping the pending flag. Transport calls and application hooks always run
//! after the guard has been dropped.

use crate::core::buffer::{BufferLayout, StorageKind, TxBuffer};
use crate::core::client::{Client, ClientId};
use crate::core::errors::PeerHubError;
use crate::core::hooks::{Application, Connection};
use crate::core::metrics;
use crate::core::stats::{StatsSnapshot, StatsState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Construction parameters for a [`ClientRegistry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryOptions {
    /// Maximum number of live clients. `0` means unbounded.
    pub max_clients: usize,
    /// Sizes of the per-client transmission buffers.
    pub layout: BufferLayout,
}

/// Everything the registry keeps for one live client.
pub(crate) struct ClientSlot {
    pub(crate) client: Client,
    pub(crate) connection: Arc<dyn Connection>,
    pub(crate) tx: TxBuffer,
}

/// The client registry. Create one per server and share it behind an `Arc`.
pub struct ClientRegistry {
    pub(crate) clients: Mutex<HashMap<ClientId, ClientSlot>>,
    max_clients: usize,
    layout: BufferLayout,
    app: Arc<dyn Application>,
    pub(crate) stats: StatsState,
}

impl ClientRegistry {
    pub fn new(options: RegistryOptions, app: Arc<dyn Application>) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_clients: options.max_clients,
            layout: options.layout,
            app,
            stats: StatsState::new(),
        }
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    pub fn buffer_layout(&self) -> BufferLayout {
        self.layout
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Registers a newly accepted connection.
    ///
    /// Fails with `CapacityExceeded` when `max_clients` is non-zero and already
    /// reached; the count is left unchanged in that case. On success the
    /// application's `on_connect` hook runs after the lock has been released.
    pub fn register(&self, connection: Arc<dyn Connection>) -> Result<Client, PeerHubError> {
        // Allocate the inline region before taking the lock.
        let tx = TxBuffer::new(self.layout);

        let client = {
            let mut clients = self.clients.lock();
            if self.max_clients > 0 && clients.len() >= self.max_clients {
                drop(clients);
                self.stats.increment_rejected_connections();
                metrics::CONNECTIONS_REJECTED_TOTAL.inc();
                warn!(
                    "Rejecting connection from {:?}: max number of clients ({}) reached.",
                    connection.peer_addr(),
                    self.max_clients
                );
                return Err(PeerHubError::CapacityExceeded {
                    max: self.max_clients,
                });
            }

            let client = Client::new(ClientId::generate(), connection.peer_addr());
            clients.insert(
                client.id().clone(),
                ClientSlot {
                    client: client.clone(),
                    connection,
                    tx,
                },
            );
            client
        };

        self.stats.increment_total_connections();
        metrics::CONNECTIONS_RECEIVED_TOTAL.inc();
        metrics::CONNECTED_CLIENTS.inc();
        info!(
            "Client {} registered (peer: {:?}).",
            client.id(),
            client.peer_addr()
        );

        self.app.on_connect(self, &client);
        Ok(client)
    }

    /// Removes a client. Any pending message is discarded and a heap-backed
    /// buffer is freed. Returns `false` if the client was already gone, which
    /// is not an error: close notifications may race with application teardown.
    pub fn unregister(&self, id: &ClientId) -> bool {
        self.remove(id).is_some()
    }

    /// Unregisters a client and asks its transport to close the connection.
    pub fn disconnect(&self, id: &ClientId) -> bool {
        match self.remove(id) {
            Some(connection) => {
                connection.close();
                true
            }
            None => false,
        }
    }

    fn remove(&self, id: &ClientId) -> Option<Arc<dyn Connection>> {
        let removed = self.clients.lock().remove(id);
        let Some(mut slot) = removed else {
            debug!("Client {} was not registered upon cleanup.", id);
            return None;
        };

        if slot.tx.is_pending() {
            debug!("Discarding pending message for client {} on unregister.", id);
        }
        slot.tx.release();
        metrics::CONNECTED_CLIENTS.dec();
        info!("Client {} unregistered.", id);

        self.app.on_disconnect(self, &slot.client);
        Some(slot.connection)
    }

    /// The number of live clients.
    pub fn count(&self) -> usize {
        self.clients.lock().len()
    }

    /// A point-in-time copy of all live clients. The lock is not held once this
    /// returns, so a client in the snapshot may be unregistered concurrently;
    /// every operation on it re-validates its id.
    pub fn snapshot(&self) -> Vec<Client> {
        self.clients
            .lock()
            .values()
            .map(|slot| slot.client.clone())
            .collect()
    }

    pub fn get(&self, id: &ClientId) -> Option<Client> {
        self.clients.lock().get(id).map(|slot| slot.client.clone())
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.lock().contains_key(id)
    }

    /// Whether the client has a message waiting for `on_writable`.
    /// `None` if the client is not registered.
    pub fn is_pending(&self, id: &ClientId) -> Option<bool> {
        self.clients.lock().get(id).map(|slot| slot.tx.is_pending())
    }

    /// The storage backing the client's pending message.
    pub fn pending_storage(&self, id: &ClientId) -> Option<StorageKind> {
        self.clients
            .lock()
            .get(id)
            .and_then(|slot| slot.tx.storage_kind())
    }

    /// A copy of the client's pending payload, for diagnostics.
    pub fn pending_payload(&self, id: &ClientId) -> Option<Vec<u8>> {
        self.clients
            .lock()
            .get(id)
            .and_then(|slot| slot.tx.pending_payload().map(<[u8]>::to_vec))
    }

    /// Forwards inbound bytes, unmodified, to the application's receive hook.
    pub fn on_receive(&self, id: &ClientId, data: &[u8]) -> Result<(), PeerHubError> {
        let client = self
            .get(id)
            .ok_or_else(|| PeerHubError::NotRegistered(id.clone()))?;
        self.app.on_receive(self, &client, data);
        Ok(())
    }
}
