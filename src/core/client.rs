// src/core/client.rs

//! Contains the `Client` record and the generator for process-unique client ids.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque data attached to a client by the application. The core never looks inside.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Process-wide sequence shared by every registry, so ids stay unique even when
/// several servers run in the same process.
static NEXT_CLIENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// The identity of a registered client.
///
/// Formatted as `<unix seconds>-<sequence>`, both zero padded, so ids sort in
/// registration order and never repeat for the lifetime of the process.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Arc<str>);

impl ClientId {
    /// Generates a fresh id. The sequence is taken with a single atomic
    /// `fetch_add`, so concurrent registrations never observe the same value.
    pub fn generate() -> Self {
        let seq = NEXT_CLIENT_SEQ.fetch_add(1, Ordering::Relaxed);
        let secs = Utc::now().timestamp().max(0) as u64;
        Self(Arc::from(format!("{secs:010}-{seq:010}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

struct ClientInner {
    id: ClientId,
    connect_time: DateTime<Utc>,
    peer_addr: Option<SocketAddr>,
    user_data: RwLock<Option<UserData>>,
}

/// A cheap, cloneable handle to one connected peer.
///
/// The handle carries only the immutable identity fields and the application's
/// user data. Transmission state lives inside the registry, so holding a handle
/// after the client was unregistered is safe: every send re-validates the id.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub(crate) fn new(id: ClientId, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                id,
                connect_time: Utc::now(),
                peer_addr,
                user_data: RwLock::new(None),
            }),
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.inner.id
    }

    /// The time at which the client was registered.
    pub fn connect_time(&self) -> DateTime<Utc> {
        self.inner.connect_time
    }

    /// The remote address reported by the transport, if it has one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    pub fn user_data(&self) -> Option<UserData> {
        self.inner.user_data.read().clone()
    }

    /// Replaces the user data and returns the previous value.
    pub fn set_user_data(&self, data: Option<UserData>) -> Option<UserData> {
        std::mem::replace(&mut *self.inner.user_data.write(), data)
    }

    /// Convenience accessor that downcasts the user data to a concrete type.
    pub fn user_data_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.user_data().and_then(|data| data.downcast::<T>().ok())
    }

    /// True if both handles refer to the same registration.
    pub fn same_as(&self, other: &Client) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.inner.id)
            .field("connect_time", &self.inner.connect_time)
            .field("peer_addr", &self.inner.peer_addr)
            .finish_non_exhaustive()
    }
}
