//! Single-slot holder for the most recent encoded frame.
//!
//! The detection pipeline is the only writer; every streaming connection is
//! a reader. Publication replaces the whole slot (an `Arc` swap under a
//! short write lock), never mutates bytes in place, so a reader's snapshot
//! is always one complete frame, never a mix of two.

use std::sync::{Arc, RwLock};

/// Shared latest-JPEG slot. Cheap to clone; clones share the slot.
///
/// Empty until the first successful pipeline cycle; readers must tolerate
/// a zero-length snapshot.
#[derive(Clone)]
pub struct FrameBuffer {
    slot: Arc<RwLock<Arc<[u8]>>>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(Arc::from(&[][..]))),
        }
    }

    /// Replace the slot with a freshly encoded frame.
    pub fn publish(&self, jpeg: Vec<u8>) {
        let frame: Arc<[u8]> = Arc::from(jpeg.into_boxed_slice());
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = frame;
    }

    /// Take a snapshot of the current frame. The returned bytes are
    /// immutable and unaffected by later publishes.
    pub fn snapshot(&self) -> Arc<[u8]> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
