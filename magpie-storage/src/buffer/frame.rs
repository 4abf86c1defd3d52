use crate::buffer::page::{FrameId, Page};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// FrameHeader is the in-memory header of one buffer pool slot. It
/// carries the metadata that does not belong on the page itself: the pin
/// count, the dirty flag and the reader/writer latch protecting the page
/// bytes.
///
/// The latch lives inside an `Arc<RwLock<Page>>` so page guards can hold
/// an owned latch guard independent of the pool's lifetime.
pub struct FrameHeader {
    frame_id: FrameId,
    pin_count: AtomicU32,
    dirty: AtomicBool,
    page: Arc<RwLock<Page>>,
}

impl FrameHeader {
    #[inline]
    pub fn new(frame_id: FrameId) -> Self {
        FrameHeader {
            frame_id,
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
            page: Arc::new(RwLock::new(Page::new())),
        }
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value.
    /// The caller must hold the pool mutex and check the count is
    /// positive first.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let prev = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "unpin of unpinned frame");
        prev - 1
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    #[inline]
    pub fn page(&self) -> &Arc<RwLock<Page>> {
        &self.page
    }

    /// Resets the frame for reuse: zeroed page, clean, unpinned.
    /// Only valid while no guard is outstanding on the frame.
    #[inline]
    pub fn reset(&self) {
        self.page.write().zero();
        self.dirty.store(false, Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
    }
}
