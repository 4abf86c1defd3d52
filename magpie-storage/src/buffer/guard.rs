use crate::buffer::frame::FrameHeader;
use crate::buffer::page::{Page, PageId};
use crate::buffer::pool::BufferPool;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;
use std::sync::Arc;

type ReadLatch = ArcRwLockReadGuard<RawRwLock, Page>;
type WriteLatch = ArcRwLockWriteGuard<RawRwLock, Page>;

/// Scoped shared access to a pinned page.
///
/// Dropping the guard releases the latch first, then unpins the page in
/// the pool. Guards are move-only; an early [`release`](Self::release)
/// is idempotent.
pub struct ReadPageGuard {
    inner: Option<GuardInner<ReadLatch>>,
}

/// Scoped exclusive access to a pinned page.
///
/// Mutable access through [`page_mut`](Self::page_mut) marks the page
/// dirty, so the pool writes it back before the frame is reused.
pub struct WritePageGuard {
    inner: Option<GuardInner<WriteLatch>>,
}

struct GuardInner<L> {
    page_id: PageId,
    frame: Arc<FrameHeader>,
    pool: Arc<BufferPool>,
    latch: L,
    dirty: bool,
}

impl<L> GuardInner<L> {
    /// Latch release must precede the unpin so a waiter that gets the
    /// frame next observes a fully released slot.
    fn finish(self) {
        let GuardInner {
            page_id,
            frame,
            pool,
            latch,
            dirty,
        } = self;
        drop(latch);
        drop(frame);
        let _ = pool.unpin_page(page_id, dirty);
    }
}

impl ReadPageGuard {
    pub(crate) fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        pool: Arc<BufferPool>,
        latch: ReadLatch,
    ) -> Self {
        ReadPageGuard {
            inner: Some(GuardInner {
                page_id,
                frame,
                pool,
                latch,
                dirty: false,
            }),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.inner.as_ref().expect("released guard").page_id
    }

    #[inline]
    pub fn page(&self) -> &Page {
        &self.inner.as_ref().expect("released guard").latch
    }

    /// Releases the latch and unpins immediately. Safe to call more
    /// than once.
    pub fn release(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.finish();
        }
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl WritePageGuard {
    pub(crate) fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        pool: Arc<BufferPool>,
        latch: WriteLatch,
        dirty: bool,
    ) -> Self {
        WritePageGuard {
            inner: Some(GuardInner {
                page_id,
                frame,
                pool,
                latch,
                dirty,
            }),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.inner.as_ref().expect("released guard").page_id
    }

    #[inline]
    pub fn page(&self) -> &Page {
        &self.inner.as_ref().expect("released guard").latch
    }

    /// Returns the page for mutation and marks the guard dirty.
    #[inline]
    pub fn page_mut(&mut self) -> &mut Page {
        let inner = self.inner.as_mut().expect("released guard");
        inner.dirty = true;
        &mut inner.latch
    }

    /// Releases the latch and unpins immediately. Safe to call more
    /// than once.
    pub fn release(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.finish();
        }
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.release();
    }
}
