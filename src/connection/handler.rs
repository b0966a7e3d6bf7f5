// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::guard::ConnectionGuard;
use super::transport::TcpConnection;
use crate::config::FRAME_HEADER_LEN;
use crate::core::{Client, ClientId, ClientRegistry, PeerHubError};
use bytes::BytesMut;
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::broadcast;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, warn};

/// Manages the full lifecycle of a client connection: a read loop that forwards
/// frames to the registry, and a writer task that answers writable notifications.
pub struct ConnectionHandler {
    framed: FramedRead<OwnedReadHalf, LengthDelimitedCodec>,
    write_half: Option<OwnedWriteHalf>,
    addr: SocketAddr,
    registry: Arc<ClientRegistry>,
    connection: Arc<TcpConnection>,
    client: Client,
    kill_rx: broadcast::Receiver<()>,
    writer_kill_rx: Option<broadcast::Receiver<()>>,
    global_shutdown_rx: broadcast::Receiver<()>,
}

impl ConnectionHandler {
    /// Registers an accepted socket with the registry.
    ///
    /// Fails with `CapacityExceeded` when the registry is full; the caller is
    /// expected to drop the socket, which closes it.
    pub fn accept(
        socket: TcpStream,
        addr: SocketAddr,
        registry: Arc<ClientRegistry>,
        max_frame_size: usize,
        global_shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<Self, PeerHubError> {
        let connection = TcpConnection::new(addr, registry.buffer_layout().inline_capacity());
        // Subscribe before registering so a disconnect issued from the
        // application's connect hook is not lost.
        let kill_rx = connection.subscribe_kill();
        let writer_kill_rx = connection.subscribe_kill();

        let client = registry.register(connection.clone())?;

        if let Err(e) = socket.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
        }
        let (read_half, write_half) = socket.into_split();
        let codec = LengthDelimitedCodec::builder()
            .length_field_length(FRAME_HEADER_LEN)
            .max_frame_length(max_frame_size)
            .new_codec();

        Ok(Self {
            framed: FramedRead::new(read_half, codec),
            write_half: Some(write_half),
            addr,
            registry,
            connection,
            client,
            kill_rx,
            writer_kill_rx: Some(writer_kill_rx),
            global_shutdown_rx,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Runs the connection until the peer closes it, it is killed, or the server shuts down.
    pub async fn run(mut self) -> Result<(), PeerHubError> {
        // Declared first so it drops last: the client is unregistered only after
        // the writer task has stopped calling `on_writable`.
        let _guard = ConnectionGuard::new(self.registry.clone(), self.client.id().clone(), self.addr);

        let (Some(write_half), Some(writer_kill_rx)) =
            (self.write_half.take(), self.writer_kill_rx.take())
        else {
            return Err(PeerHubError::Internal(
                "connection handler started twice".into(),
            ));
        };

        let registry = self.registry.clone();
        let connection = self.connection.clone();
        let client_id = self.client.id().clone();
        // Declared after the guard so it drops first: if this future is aborted,
        // the writer is aborted before the client is unregistered.
        let writer = AbortOnDropHandle::new(tokio::spawn(async move {
            let result =
                run_writer(&registry, &connection, &client_id, write_half, writer_kill_rx).await;
            if result.is_err() {
                // Make the read loop stop as well.
                connection.kill();
            }
            result
        }));

        let result = self.read_loop().await;

        self.connection.kill();
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Writer for {} stopped with error: {}", self.addr, e),
            Err(e) if e.is_panic() => error!("Writer task for {} panicked: {:?}", self.addr, e),
            Err(_) => {}
        }
        result
    }

    async fn read_loop(&mut self) -> Result<(), PeerHubError> {
        loop {
            tokio::select! {
                // Prioritize shutdown signals over other events.
                biased;
                _ = self.global_shutdown_rx.recv() => {
                    info!("Connection handler for {} received GLOBAL shutdown signal.", self.addr);
                    return Ok(());
                }
                _ = self.kill_rx.recv() => {
                    info!("Connection handler for {} received kill signal.", self.addr);
                    return Ok(());
                }
                result = self.framed.next() => {
                    match result {
                        Some(Ok(frame)) => {
                            debug!("Client {}: received {} bytes", self.client.id(), frame.len());
                            if let Err(e) = self.registry.on_receive(self.client.id(), &frame) {
                                debug!("Dropping connection {}: {}", self.addr, e);
                                return Ok(());
                            }
                        }
                        Some(Err(e)) => {
                            if is_normal_disconnect(&e) {
                                debug!("Connection from {} closed by peer: {}", self.addr, e);
                                return Ok(());
                            }
                            warn!("Connection error for {}: {}", self.addr, e);
                            return Err(e.into());
                        }
                        None => {
                            debug!("Connection from {} closed by peer.", self.addr);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// Answers writable notifications for one client until killed.
async fn run_writer(
    registry: &ClientRegistry,
    connection: &TcpConnection,
    client_id: &ClientId,
    mut socket: OwnedWriteHalf,
    mut kill_rx: broadcast::Receiver<()>,
) -> Result<(), PeerHubError> {
    let mut scratch = BytesMut::with_capacity(registry.buffer_layout().inline_capacity());
    loop {
        tokio::select! {
            biased;
            _ = kill_rx.recv() => break,
            _ = connection.writable() => {}
        }

        if !registry.on_writable(client_id)? {
            continue;
        }

        connection.take_outbox(&mut scratch);
        tokio::select! {
            biased;
            _ = kill_rx.recv() => break,
            res = socket.write_all(&scratch) => res?,
        }
        connection.recycle_scratch(&mut scratch);
    }

    let _ = socket.shutdown().await;
    Ok(())
}

/// Helper function to check for non-critical disconnection errors.
fn is_normal_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    )
}
