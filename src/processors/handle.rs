// cropkit/src/processors/handle.rs
//! Display handles: exclusively owned views over normalized image bytes.
//!
//! A handle is allocated once per accepted upload and released exactly once
//! when it is dropped. Every handle reports to the [`HandleLedger`] it was
//! allocated from, so a batch being replaced (or the controller being torn
//! down) can be checked for leaks.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    next_id: AtomicU64,
    allocated: AtomicUsize,
    released: AtomicUsize,
}

/// Shared bookkeeping for allocated display handles.
#[derive(Debug, Clone, Default)]
pub struct HandleLedger {
    counters: Arc<Counters>,
}

impl HandleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self, bytes: Vec<u8>, media_type: impl Into<String>) -> DisplayHandle {
        let id = self.counters.next_id.fetch_add(1, Ordering::Relaxed);
        self.counters.allocated.fetch_add(1, Ordering::AcqRel);

        let handle = DisplayHandle {
            id,
            media_type: media_type.into(),
            bytes,
            ledger: self.clone(),
        };
        log::debug!(
            "Allocated display handle #{} ({} bytes, {})",
            id,
            handle.bytes.len(),
            handle.media_type
        );
        handle
    }

    pub fn allocated(&self) -> usize {
        self.counters.allocated.load(Ordering::Acquire)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::Acquire)
    }

    /// Handles allocated but not yet released.
    pub fn live(&self) -> usize {
        // Released first: a handle is always counted as allocated before it can be released.
        let released = self.released();
        self.allocated().saturating_sub(released)
    }
}

/// Decodable bytes for one normalized image. Not `Clone`: release happens
/// on drop and only once.
pub struct DisplayHandle {
    id: u64,
    media_type: String,
    bytes: Vec<u8>,
    ledger: HandleLedger,
}

impl DisplayHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayHandle")
            .field("id", &self.id)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        self.ledger.counters.released.fetch_add(1, Ordering::AcqRel);
        log::debug!("Released display handle #{}", self.id);
    }
}
