// src/core/scheduler.rs

//! The per-client transmission state machine.
//!
//! A client is either idle or has exactly one message pending. `enqueue` moves
//! it from idle to pending and arms a writable notification; `on_writable`
//! hands the message to the transport and moves it back to idle. A second
//! `enqueue` while pending is refused with `Busy`, which keeps successive sends
//! to one client in order without any queue.

use crate::core::buffer::StorageKind;
use crate::core::client::{Client, ClientId};
use crate::core::errors::PeerHubError;
use crate::core::metrics;
use crate::core::registry::ClientRegistry;
use tracing::{debug, warn};

impl ClientRegistry {
    /// Schedules `payload` for the client and returns the storage it was copied to.
    ///
    /// On `AllocationFailure` the message is dropped and the client stays idle.
    pub fn enqueue(&self, id: &ClientId, payload: &[u8]) -> Result<StorageKind, PeerHubError> {
        if payload.is_empty() {
            return Err(PeerHubError::InvalidArgument(
                "payload must not be empty".into(),
            ));
        }

        let (storage, connection) = {
            let mut clients = self.clients.lock();
            let slot = clients
                .get_mut(id)
                .ok_or_else(|| PeerHubError::NotRegistered(id.clone()))?;

            if slot.tx.is_pending() {
                drop(clients);
                self.stats.increment_busy_drops();
                metrics::SEND_BUSY_TOTAL.inc();
                debug!("Client {} is busy, dropping {} bytes.", id, payload.len());
                return Err(PeerHubError::Busy);
            }

            let storage = slot.tx.load(payload).inspect_err(|e| {
                warn!("Dropping {} bytes for client {}: {}", payload.len(), id, e);
            })?;
            (storage, slot.connection.clone())
        };

        self.stats.increment_messages_scheduled();
        if storage == StorageKind::Heap {
            self.stats.increment_heap_allocations();
            metrics::TX_HEAP_ALLOCATIONS_TOTAL.inc();
            debug!(
                "Client {}: {} bytes exceed the inline limit, using a heap buffer.",
                id,
                payload.len()
            );
        }

        connection.request_writable();
        Ok(storage)
    }

    /// The application-level "send to client": `enqueue` addressed by handle.
    pub fn send_to_client(&self, client: &Client, payload: &[u8]) -> Result<StorageKind, PeerHubError> {
        self.enqueue(client.id(), payload)
    }

    /// Called by the transport when the client's channel can accept bytes.
    ///
    /// Returns `Ok(false)` for a stale or duplicate notification (nothing
    /// pending, or the client is gone). Otherwise the pending message is passed
    /// to the transport's write primitive with the lock released, the heap
    /// buffer (if any) is freed and the client becomes idle again, even when
    /// the write itself failed. Never enqueues a follow-up message.
    pub fn on_writable(&self, id: &ClientId) -> Result<bool, PeerHubError> {
        let (mut frame, connection) = {
            let mut clients = self.clients.lock();
            let Some(slot) = clients.get_mut(id) else {
                debug!("Ignoring writable notification for unknown client {}.", id);
                return Ok(false);
            };
            let Some(frame) = slot.tx.begin_flush() else {
                return Ok(false);
            };
            (frame, slot.connection.clone())
        };

        let len = frame.payload_len();
        let result = connection.write_frame(&mut frame.as_tx_frame());

        {
            let mut clients = self.clients.lock();
            if let Some(slot) = clients.get_mut(id) {
                slot.tx.finish_flush(frame);
            }
            // Otherwise the client was unregistered mid-write and the frame is dropped here.
        }

        match result {
            Ok(()) => {
                self.stats.record_flush(len);
                metrics::MESSAGES_SENT_TOTAL.inc();
                metrics::BYTES_SENT_TOTAL.inc_by(len as f64);
                Ok(true)
            }
            Err(e) => {
                warn!("Write to client {} failed: {}", id, e);
                Err(e)
            }
        }
    }
}
