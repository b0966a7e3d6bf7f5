// src/core/mod.rs

//! The connection registry and message dispatch core.
//!
//! The transport calls into the [`ClientRegistry`] on connect, receive, writable
//! and close; the application calls it to send to one client or broadcast.

pub mod broadcast;
pub mod buffer;
pub mod client;
pub mod errors;
pub mod hooks;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod stats;

pub use buffer::{BufferLayout, StorageKind, TxFrame};
pub use client::{Client, ClientId, UserData};
pub use errors::PeerHubError;
pub use hooks::{Application, Connection};
pub use registry::{ClientRegistry, RegistryOptions};
pub use stats::StatsSnapshot;
