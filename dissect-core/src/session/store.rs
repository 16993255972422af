//! Append-only frame store.
//!
//! Slots are appended under the write lock, so indices follow push order.
//! The visible length only counts pushes that have been committed, so it
//! never runs ahead of the push calls that returned.
//! A slot's frame is published exactly once, by the pool worker that decoded
//! it. Readers that get there first park on a store-wide condvar until the
//! publisher wakes them.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::frame::{Frame, FrameState};

/// One position in the store.
#[derive(Debug)]
pub(crate) struct FrameSlot {
    index: u32,
    state: AtomicU8,
    frame: OnceLock<Arc<Frame>>,
}

impl FrameSlot {
    fn new(index: u32) -> Self {
        Self {
            index,
            state: AtomicU8::new(FrameState::Queued as u8),
            frame: OnceLock::new(),
        }
    }

    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn state(&self) -> FrameState {
        FrameState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_decoding(&self) {
        self.state
            .store(FrameState::Decoding as u8, Ordering::Release);
    }

    /// The decoded frame, if already published.
    pub(crate) fn get(&self) -> Option<&Arc<Frame>> {
        self.frame.get()
    }
}

#[derive(Debug, Default)]
pub(crate) struct FrameStore {
    slots: RwLock<Vec<Arc<FrameSlot>>>,
    /// Committed pushes; never exceeds `slots.len()`
    committed: AtomicU32,
    /// Guards the publish/wait handshake only.
    lock: Mutex<()>,
    published: Condvar,
}

impl FrameStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a slot and return it. Its index is the number of slots
    /// before the call. It stays out of [`Self::len`] until committed.
    pub(crate) fn append(&self) -> Arc<FrameSlot> {
        let mut slots = self.slots.write();
        let slot = Arc::new(FrameSlot::new(slots.len() as u32));
        slots.push(Arc::clone(&slot));
        slot
    }

    /// Count one more push as finished. Called once per [`Self::append`],
    /// after the slot has been handed to the pool.
    pub(crate) fn commit(&self) {
        self.committed.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn len(&self) -> u32 {
        self.committed.load(Ordering::Acquire)
    }

    pub(crate) fn slot(&self, index: u32) -> Option<Arc<FrameSlot>> {
        self.slots.read().get(index as usize).cloned()
    }

    /// Slots for `start..end`, with `end` clipped to [`Self::len`].
    pub(crate) fn range(&self, start: u32, end: u32) -> Vec<Arc<FrameSlot>> {
        let end = end.min(self.len()) as usize;
        let slots = self.slots.read();
        let end = end.min(slots.len());
        let start = (start as usize).min(end);
        slots[start..end].to_vec()
    }

    /// Publish the decoded frame of `slot` and wake every waiter.
    pub(crate) fn publish(&self, slot: &FrameSlot, frame: Arc<Frame>) {
        let state = if frame.error().is_some() {
            FrameState::Failed
        } else {
            FrameState::Complete
        };
        // Only the decoding worker publishes, so the cell is always empty here
        let _ = slot.frame.set(frame);
        slot.state.store(state as u8, Ordering::Release);

        let _guard = self.lock.lock();
        self.published.notify_all();
    }

    /// Block until `slot` is published.
    pub(crate) fn wait(&self, slot: &FrameSlot) -> Arc<Frame> {
        if let Some(frame) = slot.get() {
            return Arc::clone(frame);
        }

        let mut guard = self.lock.lock();
        loop {
            if let Some(frame) = slot.get() {
                return Arc::clone(frame);
            }
            self.published.wait(&mut guard);
        }
    }
}
