// tests/integration/mod.rs

//! Integration tests for PeerHub
//!
//! These tests run the server end-to-end over real TCP sockets, verifying
//! registration, relaying, capacity limits and shutdown.

pub mod test_helpers;
