// src/core/stats.rs

//! Contains the per-registry counters used for monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one registry. All updates are relaxed atomics, so they never
/// take the registry lock.
#[derive(Debug)]
pub struct StatsState {
    /// Connections accepted by `register`.
    total_connections: AtomicU64,
    /// Connections refused because the registry was full.
    rejected_connections: AtomicU64,
    /// Messages accepted by `enqueue`.
    messages_scheduled: AtomicU64,
    /// Messages handed to the transport by `on_writable`.
    messages_flushed: AtomicU64,
    /// Payload bytes handed to the transport.
    bytes_flushed: AtomicU64,
    /// Sends refused with `Busy`.
    busy_drops: AtomicU64,
    /// Sends that needed a heap-backed buffer.
    heap_allocations: AtomicU64,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time copy of [`StatsState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_connections: u64,
    pub rejected_connections: u64,
    pub messages_scheduled: u64,
    pub messages_flushed: u64,
    pub bytes_flushed: u64,
    pub busy_drops: u64,
    pub heap_allocations: u64,
}

impl StatsState {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            messages_scheduled: AtomicU64::new(0),
            messages_flushed: AtomicU64::new(0),
            bytes_flushed: AtomicU64::new(0),
            busy_drops: AtomicU64::new(0),
            heap_allocations: AtomicU64::new(0),
        }
    }

    pub fn increment_total_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected_connections(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_messages_scheduled(&self) {
        self.messages_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one flushed message of `bytes` payload bytes.
    pub fn record_flush(&self, bytes: usize) {
        self.messages_flushed.fetch_add(1, Ordering::Relaxed);
        self.bytes_flushed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn increment_busy_drops(&self) {
        self.busy_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_heap_allocations(&self) {
        self.heap_allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            messages_scheduled: self.messages_scheduled.load(Ordering::Relaxed),
            messages_flushed: self.messages_flushed.load(Ordering::Relaxed),
            bytes_flushed: self.bytes_flushed.load(Ordering::Relaxed),
            busy_drops: self.busy_drops.load(Ordering::Relaxed),
            heap_allocations: self.heap_allocations.load(Ordering::Relaxed),
        }
    }
}
