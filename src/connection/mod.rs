// src/connection/mod.rs

//! The TCP transport adapter: owns the sockets, calls into the registry on
//! connect, receive, writable and close, and performs the byte-level writes.
//!
//! Frames on the wire are a 4-byte big-endian length followed by the payload.

mod guard;
mod handler;
mod transport;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
pub use transport::TcpConnection;
