// src/core/hooks.rs

//! The two capability interfaces that connect the core to the outside world:
//! the transport that owns the sockets, and the application that consumes data.

use crate::core::buffer::TxFrame;
use crate::core::client::Client;
use crate::core::errors::PeerHubError;
use crate::core::registry::ClientRegistry;
use std::net::SocketAddr;

/// Implemented by the transport for each accepted connection and handed to
/// [`ClientRegistry::register`].
///
/// The transport must call `on_writable` only while the client is registered,
/// and must call `unregister` exactly once when the connection closes.
pub trait Connection: Send + Sync + 'static {
    /// Arms a one-shot "writable" notification. When the channel can take bytes,
    /// the transport answers with [`ClientRegistry::on_writable`].
    fn request_writable(&self);

    /// The byte-level write primitive. Called from `on_writable` without the
    /// registry lock held. It must not block; the frame is only valid for the
    /// duration of the call.
    fn write_frame(&self, frame: &mut TxFrame<'_>) -> Result<(), PeerHubError>;

    /// Asks the transport to tear the connection down.
    fn close(&self) {}

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Implemented by the application. Hooks run without the registry lock held,
/// so they may freely call back into the registry.
pub trait Application: Send + Sync + 'static {
    /// Inbound data for `client`. `data` is only valid for the duration of the call.
    fn on_receive(&self, registry: &ClientRegistry, client: &Client, data: &[u8]);

    /// Called after a client has been registered.
    fn on_connect(&self, _registry: &ClientRegistry, _client: &Client) {}

    /// Called after a client has been removed, before its record is dropped.
    fn on_disconnect(&self, _registry: &ClientRegistry, _client: &Client) {}
}
