// tests/integration/test_helpers.rs

//! Test helpers and utilities shared by the test suites.

#![allow(dead_code)]

use parking_lot::Mutex;
use peerhub::core::{
    Application, Client, ClientId, ClientRegistry, Connection, PeerHubError, RegistryOptions,
    TxFrame,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

/// Sets up minimal tracing for tests (ignores the error if already initialized).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
}

/// One frame handed to `MockConnection::write_frame`.
#[derive(Debug, Clone)]
pub struct WrittenFrame {
    pub header_margin: usize,
    pub payload: Vec<u8>,
}

/// A `Connection` that records everything the registry asks of it.
#[derive(Default)]
pub struct MockConnection {
    pub writable_requests: AtomicUsize,
    pub closed: AtomicBool,
    pub fail_writes: AtomicBool,
    frames: Mutex<Vec<WrittenFrame>>,
    addr: Option<SocketAddr>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_addr(addr: SocketAddr) -> Arc<Self> {
        Arc::new(Self {
            addr: Some(addr),
            ..Self::default()
        })
    }

    pub fn frames(&self) -> Vec<WrittenFrame> {
        self.frames.lock().clone()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.frames.lock().iter().map(|f| f.payload.clone()).collect()
    }

    pub fn writable_requests(&self) -> usize {
        self.writable_requests.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    fn request_writable(&self) {
        self.writable_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn write_frame(&self, frame: &mut TxFrame<'_>) -> Result<(), PeerHubError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "mock write failure").into());
        }
        // The margin must be writable in place.
        frame.margin_mut().fill(0xAB);
        self.frames.lock().push(WrittenFrame {
            header_margin: frame.header_margin(),
            payload: frame.payload().to_vec(),
        });
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.addr
    }
}

/// An `Application` that records every hook invocation.
#[derive(Default)]
pub struct RecordingApp {
    received: Mutex<Vec<(ClientId, Vec<u8>)>>,
    connected: Mutex<Vec<(ClientId, usize)>>,
    disconnected: Mutex<Vec<(ClientId, usize)>>,
}

impl RecordingApp {
    pub fn received(&self) -> Vec<(ClientId, Vec<u8>)> {
        self.received.lock().clone()
    }

    /// Connected ids with the registry count observed inside the hook.
    pub fn connected(&self) -> Vec<(ClientId, usize)> {
        self.connected.lock().clone()
    }

    /// Disconnected ids with the registry count observed inside the hook.
    pub fn disconnected(&self) -> Vec<(ClientId, usize)> {
        self.disconnected.lock().clone()
    }
}

impl Application for RecordingApp {
    fn on_receive(&self, _registry: &ClientRegistry, client: &Client, data: &[u8]) {
        self.received.lock().push((client.id().clone(), data.to_vec()));
    }

    fn on_connect(&self, registry: &ClientRegistry, client: &Client) {
        self.connected
            .lock()
            .push((client.id().clone(), registry.count()));
    }

    fn on_disconnect(&self, registry: &ClientRegistry, client: &Client) {
        self.disconnected
            .lock()
            .push((client.id().clone(), registry.count()));
    }
}

/// TestContext provides a registry wired to a `RecordingApp`.
pub struct TestContext {
    pub registry: Arc<ClientRegistry>,
    pub app: Arc<RecordingApp>,
}

impl TestContext {
    /// Creates a new test context with an unbounded registry and the default layout.
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    pub fn with_max_clients(max_clients: usize) -> Self {
        Self::with_options(RegistryOptions {
            max_clients,
            ..RegistryOptions::default()
        })
    }

    pub fn with_options(options: RegistryOptions) -> Self {
        init_tracing();
        let app = Arc::new(RecordingApp::default());
        let registry = Arc::new(ClientRegistry::new(options, app.clone()));
        Self { registry, app }
    }

    /// Registers a new mock connection.
    pub fn connect(&self) -> (Client, Arc<MockConnection>) {
        let connection = MockConnection::new();
        let client = self
            .registry
            .register(connection.clone())
            .expect("registration should succeed");
        (client, connection)
    }

    /// Answers a writable notification and returns the last frame written.
    pub fn flush(&self, client: &Client, connection: &MockConnection) -> Option<Vec<u8>> {
        let written = self
            .registry
            .on_writable(client.id())
            .expect("on_writable should succeed");
        if !written {
            return None;
        }
        connection.payloads().pop()
    }
}
