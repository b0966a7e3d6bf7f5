// src/connection/transport.rs

//! The TCP side of the `Connection` capability.
//!
//! The core hands each outbound message over as a frame whose first
//! `header_margin` bytes are free. `TcpConnection` writes a 4-byte big-endian
//! length prefix into the tail of that margin and copies prefix and payload
//! into an outbox that the connection's writer task flushes to the socket.

use crate::config::FRAME_HEADER_LEN;
use crate::core::{Connection, PeerHubError, TxFrame};
use bytes::BytesMut;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Notify, broadcast};

/// Transport state shared between the registry and one connection's tasks.
pub struct TcpConnection {
    addr: SocketAddr,
    /// Capacity the outbox and the writer's scratch buffer are kept at.
    outbox_capacity: usize,
    /// Armed by `request_writable`; awaited by the writer task.
    writable: Notify,
    /// Bytes copied by `write_frame`, waiting for the writer task.
    outbox: Mutex<BytesMut>,
    /// Signals the connection's tasks to stop.
    kill_tx: broadcast::Sender<()>,
}

impl TcpConnection {
    pub fn new(addr: SocketAddr, outbox_capacity: usize) -> Arc<Self> {
        let (kill_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            addr,
            outbox_capacity,
            writable: Notify::new(),
            outbox: Mutex::new(BytesMut::with_capacity(outbox_capacity)),
            kill_tx,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) async fn writable(&self) {
        self.writable.notified().await;
    }

    /// Swaps the outbox with `scratch`, leaving the copied bytes in `scratch`.
    /// Both buffers keep their capacity, so steady-state flushing does not allocate.
    pub fn take_outbox(&self, scratch: &mut BytesMut) {
        std::mem::swap(&mut *self.outbox.lock(), scratch);
    }

    /// Empties a flushed scratch buffer. One grown past the nominal capacity by
    /// a heap-path message is replaced, so the allocation does not outlive it.
    pub fn recycle_scratch(&self, scratch: &mut BytesMut) {
        scratch.clear();
        if scratch.capacity() > self.outbox_capacity {
            *scratch = BytesMut::with_capacity(self.outbox_capacity);
        }
    }

    pub(crate) fn subscribe_kill(&self) -> broadcast::Receiver<()> {
        self.kill_tx.subscribe()
    }

    pub(crate) fn kill(&self) {
        // No receivers means the tasks are already gone.
        let _ = self.kill_tx.send(());
    }
}

impl Connection for TcpConnection {
    fn request_writable(&self) {
        self.writable.notify_one();
    }

    fn write_frame(&self, frame: &mut TxFrame<'_>) -> Result<(), PeerHubError> {
        let len = frame.payload_len();
        let prefix = u32::try_from(len).map_err(|_| PeerHubError::FrameTooLarge {
            len,
            max: u32::MAX as usize,
        })?;

        let margin = frame.margin_mut();
        let start = margin.len().checked_sub(FRAME_HEADER_LEN).ok_or_else(|| {
            PeerHubError::Internal("header margin is smaller than the frame header".into())
        })?;
        margin[start..].copy_from_slice(&prefix.to_be_bytes());

        let wire = frame.wire_bytes(FRAME_HEADER_LEN).ok_or_else(|| {
            PeerHubError::Internal("header margin is smaller than the frame header".into())
        })?;
        self.outbox.lock().extend_from_slice(wire);
        Ok(())
    }

    fn close(&self) {
        self.kill();
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.addr)
    }
}
