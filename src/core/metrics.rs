// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, TextEncoder, register_counter, register_gauge};

lazy_static! {
    // --- Gauges ---
    /// The number of clients currently registered.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("peerhub_connected_clients", "Number of currently registered clients.").unwrap();

    // --- Counters ---
    /// The total number of connections accepted since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("peerhub_connections_received_total", "Total number of connections received.").unwrap();
    /// The total number of connections refused because the registry was full.
    pub static ref CONNECTIONS_REJECTED_TOTAL: Counter =
        register_counter!("peerhub_connections_rejected_total", "Total number of connections rejected at capacity.").unwrap();
    /// The total number of messages handed to the transport.
    pub static ref MESSAGES_SENT_TOTAL: Counter =
        register_counter!("peerhub_messages_sent_total", "Total number of messages flushed to clients.").unwrap();
    /// The total number of payload bytes handed to the transport.
    pub static ref BYTES_SENT_TOTAL: Counter =
        register_counter!("peerhub_bytes_sent_total", "Total number of payload bytes flushed to clients.").unwrap();
    /// Sends dropped because the client still had a message pending.
    pub static ref SEND_BUSY_TOTAL: Counter =
        register_counter!("peerhub_send_busy_total", "Total number of sends rejected because the client was busy.").unwrap();
    /// Sends that did not fit the inline buffer.
    pub static ref TX_HEAP_ALLOCATIONS_TOTAL: Counter =
        register_counter!("peerhub_tx_heap_allocations_total", "Total number of heap-backed transmission buffers.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_else(|e| format!("# failed to encode metrics: {e}\n"))
}
