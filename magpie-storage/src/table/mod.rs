pub mod iter;
pub mod mvcc;
pub mod page;
pub mod tuple;

#[cfg(test)]
mod tests;

pub use iter::TableIter;
pub use page::{TablePage, TablePageMut};
pub use tuple::{Rid, Tuple, TupleMeta};

use crate::buffer::guard::{ReadPageGuard, WritePageGuard};
use crate::buffer::page::{PageId, INVALID_PAGE_ID};
use crate::buffer::pool::BufferPool;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;

/// TableHeap is an ordered chain of slotted table pages. The heap owns
/// page allocation and hands out record ids; it knows nothing about
/// versioning — MVCC lives above it in the transaction manager and the
/// executors.
pub struct TableHeap {
    pool: Arc<BufferPool>,
    first_page_id: PageId,
    /// Guards `last_page_id` and serializes inserts, so page chaining
    /// cannot interleave.
    inner: Mutex<HeapInner>,
}

struct HeapInner {
    last_page_id: PageId,
}

impl TableHeap {
    /// Creates a heap with one empty page.
    pub fn new(pool: Arc<BufferPool>) -> Result<Self> {
        let (first_page_id, mut guard) = pool.new_page()?;
        TablePageMut::new(guard.page_mut()).init();
        drop(guard);
        Ok(TableHeap {
            pool,
            first_page_id,
            inner: Mutex::new(HeapInner {
                last_page_id: first_page_id,
            }),
        })
    }

    #[inline]
    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    #[inline]
    pub fn last_page_id(&self) -> PageId {
        self.inner.lock().last_page_id
    }

    #[inline]
    pub(crate) fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Appends a tuple to the heap, chaining a new page when the last
    /// one is full.
    ///
    /// A tuple too large for an empty page is unstorable and fatal.
    pub fn insert_tuple(&self, meta: TupleMeta, tuple: &Tuple) -> Result<Rid> {
        let mut inner = self.inner.lock();
        let mut guard = self.pool.fetch_page_write(inner.last_page_id)?;
        loop {
            let page = TablePage::new(guard.page());
            if page.next_tuple_offset(tuple).is_some() {
                break;
            }
            assert!(
                page.num_tuples() != 0,
                "tuple of {} bytes cannot fit in an empty page",
                tuple.len()
            );

            let (next_page_id, mut next_guard) = self.pool.new_page()?;
            TablePageMut::new(next_guard.page_mut()).init();
            TablePageMut::new(guard.page_mut()).set_next_page_id(next_page_id);
            inner.last_page_id = next_page_id;
            guard = next_guard;
        }
        let last_page_id = inner.last_page_id;
        let slot = TablePageMut::new(guard.page_mut())
            .insert_tuple(meta, tuple)
            .expect("free space verified above");
        drop(inner);
        Ok(Rid::new(last_page_id, slot))
    }

    pub fn get_tuple(&self, rid: Rid) -> Result<(TupleMeta, Tuple)> {
        let guard = self.pool.fetch_page_read(rid.page_id)?;
        TablePage::new(guard.page()).get_tuple(rid.slot)
    }

    pub fn get_tuple_meta(&self, rid: Rid) -> Result<TupleMeta> {
        let guard = self.pool.fetch_page_read(rid.page_id)?;
        TablePage::new(guard.page()).get_tuple_meta(rid.slot)
    }

    pub fn update_tuple_meta(&self, meta: TupleMeta, rid: Rid) -> Result<()> {
        let mut guard = self.pool.fetch_page_write(rid.page_id)?;
        TablePageMut::new(guard.page_mut()).update_tuple_meta(meta, rid.slot)
    }

    /// Rewrites a tuple in place under the page's exclusive latch.
    ///
    /// When `check` is given it is evaluated against the current
    /// `(meta, tuple)` under the latch; a rejection leaves the page
    /// untouched and returns `Ok(false)`.
    pub fn update_tuple_in_place(
        &self,
        meta: TupleMeta,
        tuple: &Tuple,
        rid: Rid,
        check: Option<&dyn Fn(&TupleMeta, &Tuple, Rid) -> bool>,
    ) -> Result<bool> {
        let mut guard = self.pool.fetch_page_write(rid.page_id)?;
        if let Some(check) = check {
            let (old_meta, old_tuple) = TablePage::new(guard.page()).get_tuple(rid.slot)?;
            if !check(&old_meta, &old_tuple, rid) {
                return Ok(false);
            }
        }
        TablePageMut::new(guard.page_mut()).update_tuple_in_place(meta, tuple, rid.slot)?;
        Ok(true)
    }

    /// Takes the exclusive latch on the page holding `rid`, for callers
    /// that need the conflict check and the write under one latch.
    pub fn acquire_table_page_write(&self, rid: Rid) -> Result<WritePageGuard> {
        self.pool.fetch_page_write(rid.page_id)
    }

    /// Shared-latch counterpart of
    /// [`acquire_table_page_write`](Self::acquire_table_page_write).
    pub fn acquire_table_page_read(&self, rid: Rid) -> Result<ReadPageGuard> {
        self.pool.fetch_page_read(rid.page_id)
    }

    /// Forward iterator with a stable end: the stop sentinel is the
    /// `(last page, tuple count)` pair captured now, so tuples inserted
    /// after creation are not visited.
    pub fn iter(self: &Arc<Self>) -> Result<TableIter> {
        let last_page_id = self.inner.lock().last_page_id;
        let guard = self.pool.fetch_page_read(last_page_id)?;
        let num_tuples = TablePage::new(guard.page()).num_tuples();
        drop(guard);
        TableIter::new(
            Arc::clone(self),
            Rid::new(self.first_page_id, 0),
            Rid::new(last_page_id, num_tuples),
        )
    }

    /// Forward iterator without a stop sentinel; visits tuples inserted
    /// while iterating.
    pub fn eager_iter(self: &Arc<Self>) -> Result<TableIter> {
        TableIter::new(
            Arc::clone(self),
            Rid::new(self.first_page_id, 0),
            Rid::new(INVALID_PAGE_ID, 0),
        )
    }
}
