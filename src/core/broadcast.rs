// src/core/broadcast.rs

//! Fan-out of one payload to every registered client.
//!
//! Broadcasts go through the same `enqueue` path as unicast sends, so the
//! busy rule applies per client: a client that still has a message pending is
//! skipped and not retried. A broadcast is therefore not guaranteed to reach
//! every connected peer.

use crate::core::client::ClientId;
use crate::core::errors::PeerHubError;
use crate::core::registry::ClientRegistry;
use tracing::{debug, warn};

impl ClientRegistry {
    /// Schedules `payload` for every registered client.
    /// Returns the number of clients a send was scheduled for.
    pub fn broadcast_all(&self, payload: &[u8]) -> Result<usize, PeerHubError> {
        self.dispatch(payload, None)
    }

    /// Like [`broadcast_all`](Self::broadcast_all), skipping `excluded`.
    /// An `excluded` id that is not registered simply excludes nobody.
    pub fn broadcast_except(
        &self,
        excluded: &ClientId,
        payload: &[u8],
    ) -> Result<usize, PeerHubError> {
        self.dispatch(payload, Some(excluded))
    }

    fn dispatch(&self, payload: &[u8], excluded: Option<&ClientId>) -> Result<usize, PeerHubError> {
        if payload.is_empty() {
            return Err(PeerHubError::InvalidArgument(
                "broadcast payload must not be empty".into(),
            ));
        }

        let mut scheduled = 0;
        let mut skipped = 0;
        for client in self.snapshot() {
            if excluded == Some(client.id()) {
                continue;
            }
            match self.enqueue(client.id(), payload) {
                Ok(_) => scheduled += 1,
                // Busy clients and clients that left since the snapshot are skipped.
                Err(PeerHubError::Busy) | Err(PeerHubError::NotRegistered(_)) => skipped += 1,
                Err(e) => {
                    warn!("Broadcast to client {} failed: {}", client.id(), e);
                    skipped += 1;
                }
            }
        }

        debug!(
            "Broadcast of {} bytes scheduled for {} clients ({} skipped).",
            payload.len(),
            scheduled,
            skipped
        );
        Ok(scheduled)
    }
}
