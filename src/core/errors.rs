// src/core/errors.rs

//! Defines the primary error type for the registry, the scheduler and the transport.

use crate::core::client::ClientId;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing every failure the core can report.
///
/// All of these are returned synchronously from the operation that produced them.
/// `Busy` and `AllocationFailure` are recoverable by retrying later;
/// `CapacityExceeded` is surfaced to the transport, which is expected to close
/// the underlying connection.
#[derive(Error, Debug)]
pub enum PeerHubError {
    #[error("max number of clients reached ({max})")]
    CapacityExceeded { max: usize },

    #[error("a previous send to this client has not been flushed yet")]
    Busy,

    #[error("could not allocate a transmission buffer for {0} bytes")]
    AllocationFailure(usize),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("client '{0}' is not registered")]
    NotRegistered(ClientId),

    #[error("frame of {len} bytes exceeds the limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl PeerHubError {
    /// True for the errors a caller may resolve by trying again later.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PeerHubError::Busy | PeerHubError::AllocationFailure(_))
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for PeerHubError {
    fn clone(&self) -> Self {
        match self {
            PeerHubError::CapacityExceeded { max } => PeerHubError::CapacityExceeded { max: *max },
            PeerHubError::Busy => PeerHubError::Busy,
            PeerHubError::AllocationFailure(len) => PeerHubError::AllocationFailure(*len),
            PeerHubError::InvalidArgument(s) => PeerHubError::InvalidArgument(s.clone()),
            PeerHubError::NotRegistered(id) => PeerHubError::NotRegistered(id.clone()),
            PeerHubError::FrameTooLarge { len, max } => PeerHubError::FrameTooLarge {
                len: *len,
                max: *max,
            },
            PeerHubError::Io(e) => PeerHubError::Io(Arc::clone(e)),
            PeerHubError::Internal(s) => PeerHubError::Internal(s.clone()),
        }
    }
}

impl PartialEq for PeerHubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PeerHubError::CapacityExceeded { max: a }, PeerHubError::CapacityExceeded { max: b }) => {
                a == b
            }
            (PeerHubError::AllocationFailure(a), PeerHubError::AllocationFailure(b)) => a == b,
            (PeerHubError::InvalidArgument(a), PeerHubError::InvalidArgument(b)) => a == b,
            (PeerHubError::NotRegistered(a), PeerHubError::NotRegistered(b)) => a == b,
            (
                PeerHubError::FrameTooLarge { len: l1, max: m1 },
                PeerHubError::FrameTooLarge { len: l2, max: m2 },
            ) => l1 == l2 && m1 == m2,
            (PeerHubError::Io(e1), PeerHubError::Io(e2)) => e1.to_string() == e2.to_string(),
            (PeerHubError::Internal(a), PeerHubError::Internal(b)) => a == b,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl From<std::io::Error> for PeerHubError {
    fn from(e: std::io::Error) -> Self {
        PeerHubError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for PeerHubError {
    fn from(e: serde_json::Error) -> Self {
        PeerHubError::Internal(format!("JSON serialization error: {e}"))
    }
}
