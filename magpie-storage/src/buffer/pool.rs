use crate::buffer::frame::FrameHeader;
use crate::buffer::guard::{ReadPageGuard, WritePageGuard};
use crate::buffer::page::{FrameId, PageId, INVALID_PAGE_ID};
use crate::buffer::replacer::LruKReplacer;
use crate::error::{Error, Result};
use crate::io::{DiskManager, DiskScheduler};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// BufferPool mediates access to an unbounded page space through a
/// fixed set of frames.
///
/// A single mutex serializes the bookkeeping (`page_table`, free list,
/// replacer interaction). Page latches are separate and are only
/// acquired after the mutex is released, except on victim frames, which
/// by construction have no outstanding guards.
pub struct BufferPool {
    pool_size: usize,
    frames: Vec<Arc<FrameHeader>>,
    replacer: LruKReplacer,
    disk: Arc<DiskManager>,
    scheduler: DiskScheduler,
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    /// Page resident in each frame, `INVALID_PAGE_ID` when none.
    frame_pages: Vec<PageId>,
}

impl BufferPool {
    pub fn new(pool_size: usize, replacer_k: usize, disk: Arc<DiskManager>) -> Arc<Self> {
        let frames = (0..pool_size).map(|i| Arc::new(FrameHeader::new(i))).collect();
        let scheduler = DiskScheduler::new(Arc::clone(&disk));
        Arc::new(BufferPool {
            pool_size,
            frames,
            replacer: LruKReplacer::new(pool_size, replacer_k),
            disk,
            scheduler,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::with_capacity(pool_size),
                free_list: (0..pool_size).collect(),
                frame_pages: vec![INVALID_PAGE_ID; pool_size],
            }),
        })
    }

    #[inline]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of frames currently holding no page.
    pub fn free_frame_count(&self) -> usize {
        self.inner.lock().free_list.len()
    }

    /// Allocates a fresh page id and returns it together with a write
    /// guard on its zeroed frame.
    pub fn new_page(self: &Arc<Self>) -> Result<(PageId, WritePageGuard)> {
        let mut inner = self.inner.lock();
        let frame_id = self.acquire_victim(&mut inner)?;
        let page_id = self.disk.allocate_page();
        self.install(&mut inner, page_id, frame_id);
        drop(inner);

        let frame = Arc::clone(&self.frames[frame_id]);
        let mut latch = frame.page().write_arc();
        latch.zero();
        // The zeroed image has no copy on disk yet.
        let guard = WritePageGuard::new(page_id, frame, Arc::clone(self), latch, true);
        Ok((page_id, guard))
    }

    /// Pins `page_id` and returns a shared guard, reading the page from
    /// disk if it is not resident.
    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> Result<ReadPageGuard> {
        let frame = self.fetch_frame(page_id)?;
        let latch = frame.page().read_arc();
        Ok(ReadPageGuard::new(page_id, frame, Arc::clone(self), latch))
    }

    /// Pins `page_id` and returns an exclusive guard, reading the page
    /// from disk if it is not resident.
    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> Result<WritePageGuard> {
        let frame = self.fetch_frame(page_id)?;
        let latch = frame.page().write_arc();
        Ok(WritePageGuard::new(page_id, frame, Arc::clone(self), latch, false))
    }

    fn fetch_frame(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        let mut inner = self.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.frames[frame_id];
            frame.pin();
            self.replacer.record_access(frame_id)?;
            self.replacer.set_evictable(frame_id, false)?;
            return Ok(Arc::clone(frame));
        }

        let frame_id = self.acquire_victim(&mut inner)?;
        // Fill the frame from disk before it becomes visible in the
        // page table. The pool mutex is held across the read, which
        // keeps the contract simple at the cost of serializing misses.
        {
            let frame = &self.frames[frame_id];
            let data = self.scheduler.read_page(page_id)?;
            frame.page().write().copy_from(&data);
            frame.set_dirty(false);
        }
        self.install(&mut inner, page_id, frame_id);
        Ok(Arc::clone(&self.frames[frame_id]))
    }

    /// Picks a frame for reuse: free list first, else an eviction
    /// victim. Dirty victims are written back before the frame is
    /// handed out.
    fn acquire_victim(&self, inner: &mut MutexGuard<'_, PoolInner>) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }
        let frame_id = self.replacer.evict().ok_or(Error::NoFreeFrame)?;
        let old_page_id = inner.frame_pages[frame_id];
        debug_assert_ne!(old_page_id, INVALID_PAGE_ID);
        let frame = &self.frames[frame_id];
        debug_assert_eq!(frame.pin_count(), 0);
        if frame.is_dirty() {
            let data = frame.page().read().clone();
            self.scheduler.write_page(old_page_id, data)?;
            frame.set_dirty(false);
        }
        log::trace!("evict page {old_page_id} from frame {frame_id}");
        inner.page_table.remove(&old_page_id);
        inner.frame_pages[frame_id] = INVALID_PAGE_ID;
        Ok(frame_id)
    }

    fn install(&self, inner: &mut MutexGuard<'_, PoolInner>, page_id: PageId, frame_id: FrameId) {
        inner.page_table.insert(page_id, frame_id);
        inner.frame_pages[frame_id] = page_id;
        let frame = &self.frames[frame_id];
        frame.pin();
        self.replacer
            .record_access(frame_id)
            .expect("frame id within pool");
        self.replacer
            .set_evictable(frame_id, false)
            .expect("frame id within pool");
    }

    /// Drops one pin on `page_id`, OR-merging `is_dirty` into the frame.
    /// The frame becomes evictable when the pin count reaches zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let inner = self.inner.lock();
        let &frame_id = inner.page_table.get(&page_id).ok_or(Error::PageNotInBuffer)?;
        let frame = &self.frames[frame_id];
        if frame.pin_count() == 0 {
            return Err(Error::PageAlreadyUnpinned);
        }
        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            self.replacer.set_evictable(frame_id, true)?;
        }
        Ok(())
    }

    /// Writes `page_id` back to disk and clears its dirty flag.
    ///
    /// The frame is pinned for the duration so the flush can take the
    /// shared latch without the pool mutex held. Must not be called by
    /// a thread holding a write guard on the same page.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame = {
            let inner = self.inner.lock();
            let &frame_id = inner.page_table.get(&page_id).ok_or(Error::PageNotInBuffer)?;
            let frame = &self.frames[frame_id];
            frame.pin();
            self.replacer.set_evictable(frame_id, false)?;
            Arc::clone(frame)
        };
        let data = frame.page().read().clone();
        let res = self.scheduler.write_page(page_id, data);
        if res.is_ok() {
            frame.set_dirty(false);
        }
        let unpinned = self.unpin_page(page_id, false);
        res.and(unpinned)
    }

    /// Flushes every resident page.
    pub fn flush_all(&self) -> Result<()> {
        let pages: Vec<PageId> = {
            let inner = self.inner.lock();
            inner.page_table.keys().copied().collect()
        };
        for page_id in pages {
            match self.flush_page(page_id) {
                Ok(()) | Err(Error::PageNotInBuffer) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Removes `page_id` from the pool and deallocates it. Fails with
    /// [`Error::PagePinned`] when any pin is outstanding; deleting a
    /// non-resident page succeeds trivially.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            self.disk.deallocate_page(page_id);
            return Ok(());
        };
        let frame = &self.frames[frame_id];
        if frame.pin_count() > 0 {
            return Err(Error::PagePinned);
        }
        self.replacer.remove(frame_id);
        inner.page_table.remove(&page_id);
        inner.frame_pages[frame_id] = INVALID_PAGE_ID;
        frame.reset();
        inner.free_list.push_back(frame_id);
        self.disk.deallocate_page(page_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::page::PAGE_SIZE;
    use tempfile::TempDir;

    fn pool(pool_size: usize) -> (TempDir, Arc<BufferPool>) {
        let dir = TempDir::new().unwrap();
        let disk = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
        (dir, BufferPool::new(pool_size, 2, disk))
    }

    #[test]
    fn test_new_page_and_round_trip() {
        let (_dir, pool) = pool(4);
        let (page_id, mut guard) = pool.new_page().unwrap();
        guard.page_mut().data_mut()[0..4].copy_from_slice(b"data");
        drop(guard);

        let guard = pool.fetch_page_read(page_id).unwrap();
        assert_eq!(&guard.page().data()[0..4], b"data");
    }

    #[test]
    fn test_pinned_pages_never_evicted() {
        let (_dir, pool) = pool(2);
        let (id_a, guard_a) = pool.new_page().unwrap();
        let (_id_b, guard_b) = pool.new_page().unwrap();
        // Both frames pinned: the pool is exhausted.
        assert!(matches!(pool.new_page(), Err(Error::NoFreeFrame)));
        drop(guard_b);
        // One unpinned frame frees up exactly one slot.
        let (_id_c, guard_c) = pool.new_page().unwrap();
        drop(guard_c);
        drop(guard_a);
        // Page A is still intact after all the churn.
        let guard = pool.fetch_page_read(id_a).unwrap();
        assert_eq!(guard.page().data()[0], 0);
    }

    #[test]
    fn test_dirty_victim_written_back() {
        let (_dir, pool) = pool(1);
        let (id_a, mut guard) = pool.new_page().unwrap();
        guard.page_mut().data_mut()[PAGE_SIZE - 1] = 0xAB;
        drop(guard);

        // Evict page A by filling the only frame with another page.
        let (_id_b, guard_b) = pool.new_page().unwrap();
        drop(guard_b);

        let guard = pool.fetch_page_read(id_a).unwrap();
        assert_eq!(guard.page().data()[PAGE_SIZE - 1], 0xAB);
    }

    #[test]
    fn test_unpin_errors() {
        let (_dir, pool) = pool(2);
        let (page_id, guard) = pool.new_page().unwrap();
        drop(guard);
        assert!(matches!(
            pool.unpin_page(page_id, false),
            Err(Error::PageAlreadyUnpinned)
        ));
        assert!(matches!(
            pool.unpin_page(9999, false),
            Err(Error::PageNotInBuffer)
        ));
    }

    #[test]
    fn test_delete_page() {
        let (_dir, pool) = pool(2);
        let (page_id, guard) = pool.new_page().unwrap();
        assert!(matches!(pool.delete_page(page_id), Err(Error::PagePinned)));
        drop(guard);
        pool.delete_page(page_id).unwrap();
        assert_eq!(pool.free_frame_count(), 2);
        // Deleting a non-resident page succeeds.
        pool.delete_page(page_id).unwrap();
    }

    #[test]
    fn test_flush_all() {
        let (_dir, pool) = pool(4);
        let mut ids = vec![];
        for i in 0..3u8 {
            let (page_id, mut guard) = pool.new_page().unwrap();
            guard.page_mut().data_mut()[0] = i;
            drop(guard);
            ids.push(page_id);
        }
        pool.flush_all().unwrap();
        for (i, page_id) in ids.iter().enumerate() {
            let guard = pool.fetch_page_read(*page_id).unwrap();
            assert_eq!(guard.page().data()[0], i as u8);
        }
    }
}
