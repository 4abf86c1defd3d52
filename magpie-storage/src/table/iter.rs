use crate::buffer::page::INVALID_PAGE_ID;
use crate::error::Result;
use crate::table::page::TablePage;
use crate::table::tuple::{Rid, Tuple, TupleMeta};
use crate::table::TableHeap;
use std::sync::Arc;

/// Forward cursor over a table heap: pages in chain order, slots in
/// ascending order.
///
/// `stop_at` freezes the end of the scan at iterator creation; an
/// invalid stop page makes the iterator eager (it chases the chain as
/// it grows).
pub struct TableIter {
    heap: Arc<TableHeap>,
    rid: Rid,
    stop_at: Rid,
}

impl TableIter {
    pub(crate) fn new(heap: Arc<TableHeap>, start: Rid, stop_at: Rid) -> Result<Self> {
        let mut iter = TableIter {
            heap,
            rid: start,
            stop_at,
        };
        if start.page_id != INVALID_PAGE_ID {
            let guard = iter.heap.pool().fetch_page_read(start.page_id)?;
            let page = TablePage::new(guard.page());
            if start.slot >= page.num_tuples() {
                iter.rid = Rid::new(INVALID_PAGE_ID, 0);
            }
        }
        Ok(iter)
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.rid.page_id == INVALID_PAGE_ID
    }

    #[inline]
    pub fn rid(&self) -> Rid {
        self.rid
    }

    /// Yields the record under the cursor and advances, or `None` at
    /// the end of the scan.
    pub fn next(&mut self) -> Result<Option<(TupleMeta, Tuple, Rid)>> {
        if self.is_end() {
            return Ok(None);
        }
        let rid = self.rid;
        let (meta, tuple) = self.heap.get_tuple(rid)?;
        self.advance()?;
        Ok(Some((meta, tuple, rid)))
    }

    fn advance(&mut self) -> Result<()> {
        let guard = self.heap.pool().fetch_page_read(self.rid.page_id)?;
        let page = TablePage::new(guard.page());
        let next_slot = self.rid.slot + 1;

        if self.stop_at.page_id != INVALID_PAGE_ID {
            debug_assert!(
                self.rid.page_id < self.stop_at.page_id
                    || (self.rid.page_id == self.stop_at.page_id
                        && next_slot <= self.stop_at.slot),
                "iterate out of bound"
            );
        }

        self.rid = Rid::new(self.rid.page_id, next_slot);
        if self.rid == self.stop_at {
            self.rid = Rid::new(INVALID_PAGE_ID, 0);
        } else if next_slot >= page.num_tuples() {
            // Move to the first slot of the next page; an invalid next
            // page ends the scan.
            self.rid = Rid::new(page.next_page_id(), 0);
        }
        Ok(())
    }
}
