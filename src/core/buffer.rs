// src/core/buffer.rs

//! The transmission buffer strategy.
//!
//! Every client owns one inline region of `inline_capacity` bytes, allocated once
//! at registration. The first `header_margin` bytes of any frame are reserved for
//! the transport (it writes its framing header there, in place). A payload that
//! fits in `inline_capacity - header_margin` is copied into the inline region;
//! anything larger gets a heap region of exactly `header_margin + len` bytes that
//! lives only until the transport has consumed it.

use crate::core::errors::PeerHubError;

/// Default number of bytes reserved in front of every payload.
pub const DEFAULT_HEADER_MARGIN: usize = 16;
/// Largest payload that is sent from the inline region with the default layout.
pub const DEFAULT_INLINE_PAYLOAD: usize = 4096;
/// Default size of the per-client inline region.
pub const DEFAULT_INLINE_CAPACITY: usize = DEFAULT_HEADER_MARGIN + DEFAULT_INLINE_PAYLOAD;

/// The sizes shared by every client buffer of one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    inline_capacity: usize,
    header_margin: usize,
    /// Largest payload a heap region is obtained for. `None` means no limit.
    heap_limit: Option<usize>,
}

impl Default for BufferLayout {
    fn default() -> Self {
        Self {
            inline_capacity: DEFAULT_INLINE_CAPACITY,
            header_margin: DEFAULT_HEADER_MARGIN,
            heap_limit: None,
        }
    }
}

impl BufferLayout {
    /// Creates a layout. The inline region must leave room for at least one
    /// payload byte after the header margin.
    pub fn new(inline_capacity: usize, header_margin: usize) -> Result<Self, PeerHubError> {
        if inline_capacity <= header_margin {
            return Err(PeerHubError::InvalidArgument(format!(
                "inline capacity ({inline_capacity}) must be larger than the header margin ({header_margin})"
            )));
        }
        Ok(Self {
            inline_capacity,
            header_margin,
            heap_limit: None,
        })
    }

    /// Caps the size of heap-backed payloads. Larger sends fail with
    /// `AllocationFailure` and leave the client idle.
    pub fn with_heap_limit(mut self, limit: Option<usize>) -> Self {
        self.heap_limit = limit;
        self
    }

    pub fn heap_limit(&self) -> Option<usize> {
        self.heap_limit
    }

    pub fn inline_capacity(&self) -> usize {
        self.inline_capacity
    }

    pub fn header_margin(&self) -> usize {
        self.header_margin
    }

    /// The largest payload that is served without allocating.
    pub fn inline_payload_limit(&self) -> usize {
        self.inline_capacity - self.header_margin
    }

    /// Chooses the storage for a payload of `payload_len` bytes.
    pub fn select(&self, payload_len: usize) -> StorageKind {
        if payload_len <= self.inline_payload_limit() {
            StorageKind::Inline
        } else {
            StorageKind::Heap
        }
    }
}

/// Which storage backs a pending message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Inline,
    Heap,
}

/// A mutable view of one outbound message: the header margin followed by the payload.
pub struct TxFrame<'a> {
    buf: &'a mut [u8],
    header_margin: usize,
}

impl<'a> TxFrame<'a> {
    pub fn header_margin(&self) -> usize {
        self.header_margin
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[self.header_margin..]
    }

    pub fn payload_len(&self) -> usize {
        self.buf.len() - self.header_margin
    }

    /// The reserved region in front of the payload.
    pub fn margin_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.header_margin]
    }

    /// Returns the last `header_len` bytes of the margin followed by the payload,
    /// after the transport has filled them in with `margin_mut`.
    /// `None` if the margin is smaller than `header_len`.
    pub fn wire_bytes(&self, header_len: usize) -> Option<&[u8]> {
        let start = self.header_margin.checked_sub(header_len)?;
        Some(&self.buf[start..])
    }
}

enum FrameStorage {
    Inline(Box<[u8]>),
    Heap(Vec<u8>),
}

/// A message taken out of a client's buffer so the transport can consume it
/// without the registry lock held.
///
/// Dropping a heap-backed frame frees its allocation. An inline frame carries
/// the client's inline region and is handed back with [`TxBuffer::finish_flush`].
pub struct PendingFrame {
    storage: FrameStorage,
    header_margin: usize,
    len: usize,
}

impl PendingFrame {
    pub fn storage_kind(&self) -> StorageKind {
        match self.storage {
            FrameStorage::Inline(_) => StorageKind::Inline,
            FrameStorage::Heap(_) => StorageKind::Heap,
        }
    }

    pub fn payload_len(&self) -> usize {
        self.len
    }

    pub fn as_tx_frame(&mut self) -> TxFrame<'_> {
        let end = self.header_margin + self.len;
        let buf = match &mut self.storage {
            FrameStorage::Inline(region) => &mut region[..end],
            FrameStorage::Heap(region) => &mut region[..end],
        };
        TxFrame {
            buf,
            header_margin: self.header_margin,
        }
    }
}

enum TxState {
    Idle,
    Loaded { heap: Option<Vec<u8>>, len: usize },
    InFlight,
}

/// The single transmission slot of a client.
///
/// `is_pending` is true from a successful [`load`](Self::load) until the
/// matching [`finish_flush`](Self::finish_flush) (or [`release`](Self::release)).
pub struct TxBuffer {
    layout: BufferLayout,
    inline: Box<[u8]>,
    state: TxState,
}

impl TxBuffer {
    pub fn new(layout: BufferLayout) -> Self {
        Self {
            layout,
            inline: vec![0u8; layout.inline_capacity()].into_boxed_slice(),
            state: TxState::Idle,
        }
    }

    pub fn layout(&self) -> BufferLayout {
        self.layout
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self.state, TxState::Idle)
    }

    /// The storage backing the pending message, if any.
    pub fn storage_kind(&self) -> Option<StorageKind> {
        match &self.state {
            TxState::Idle => None,
            TxState::Loaded { heap: None, .. } => Some(StorageKind::Inline),
            TxState::Loaded { heap: Some(_), .. } => Some(StorageKind::Heap),
            TxState::InFlight => None,
        }
    }

    /// The payload waiting to be flushed. `None` when idle or while in flight.
    pub fn pending_payload(&self) -> Option<&[u8]> {
        let margin = self.layout.header_margin();
        match &self.state {
            TxState::Loaded { heap: None, len } => Some(&self.inline[margin..margin + len]),
            TxState::Loaded {
                heap: Some(region), ..
            } => Some(&region[margin..]),
            _ => None,
        }
    }

    /// Copies `payload` into the storage chosen by the layout.
    pub fn load(&mut self, payload: &[u8]) -> Result<StorageKind, PeerHubError> {
        if self.is_pending() {
            return Err(PeerHubError::Busy);
        }
        if payload.is_empty() {
            return Err(PeerHubError::InvalidArgument("payload is empty".into()));
        }

        let margin = self.layout.header_margin();
        let len = payload.len();
        match self.layout.select(len) {
            StorageKind::Inline => {
                self.inline[margin..margin + len].copy_from_slice(payload);
                self.state = TxState::Loaded { heap: None, len };
                Ok(StorageKind::Inline)
            }
            StorageKind::Heap => {
                if self.layout.heap_limit.is_some_and(|limit| len > limit) {
                    return Err(PeerHubError::AllocationFailure(len));
                }
                let total = margin
                    .checked_add(len)
                    .ok_or(PeerHubError::AllocationFailure(len))?;
                let mut region = Vec::new();
                region
                    .try_reserve_exact(total)
                    .map_err(|_| PeerHubError::AllocationFailure(len))?;
                region.resize(margin, 0);
                region.extend_from_slice(payload);
                self.state = TxState::Loaded {
                    heap: Some(region),
                    len,
                };
                Ok(StorageKind::Heap)
            }
        }
    }

    /// Moves the pending message out for the transport. The buffer stays pending
    /// until [`finish_flush`](Self::finish_flush) is called.
    pub fn begin_flush(&mut self) -> Option<PendingFrame> {
        let (heap, len) = match std::mem::replace(&mut self.state, TxState::InFlight) {
            TxState::Loaded { heap, len } => (heap, len),
            other => {
                self.state = other;
                return None;
            }
        };

        let storage = match heap {
            Some(region) => FrameStorage::Heap(region),
            None => FrameStorage::Inline(std::mem::take(&mut self.inline)),
        };
        Some(PendingFrame {
            storage,
            header_margin: self.layout.header_margin(),
            len,
        })
    }

    /// Takes back a frame returned by [`begin_flush`](Self::begin_flush) and
    /// clears the pending state. A heap region is freed here.
    pub fn finish_flush(&mut self, frame: PendingFrame) {
        if let FrameStorage::Inline(region) = frame.storage {
            self.inline = region;
        }
        self.state = TxState::Idle;
    }

    /// Discards any pending message and frees a heap region, if one is held.
    /// Only used while the owning client is being removed.
    pub fn release(&mut self) {
        self.state = TxState::Idle;
    }
}
