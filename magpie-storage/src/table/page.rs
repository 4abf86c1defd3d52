use crate::buffer::page::{Page, PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::error::{Error, Result};
use crate::table::tuple::{Tuple, TupleMeta};

/// Slotted-page layout.
///
/// ```text
/// | next_page_id (4) | num_tuples (2) | num_deleted (2) | slot 0 | slot 1 | ... free ... | payload 1 | payload 0 |
/// ```
///
/// Slot descriptors grow upward from the header, payloads grow downward
/// from the page end. A slot is `offset (2) | len (2) | meta (16)`; the
/// meta block is `ts (8) | deleted flag (1) | capacity (2) | pad (5)`,
/// where capacity remembers the payload room reserved at insert so
/// shrinking in-place updates stay reversible.
const OFFSET_NEXT_PAGE: usize = 0;
const OFFSET_NUM_TUPLES: usize = 4;
const OFFSET_NUM_DELETED: usize = 6;
const HEADER_SIZE: usize = 8;

const SLOT_SIZE: usize = 20;
const SLOT_META_TS: usize = 4;
const SLOT_META_DELETED: usize = 12;
const SLOT_META_CAPACITY: usize = 13;

#[inline]
fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(data[at..at + 2].try_into().unwrap())
}

#[inline]
fn write_u16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(data[at..at + 4].try_into().unwrap())
}

#[inline]
fn write_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn read_i64(data: &[u8], at: usize) -> i64 {
    i64::from_le_bytes(data[at..at + 8].try_into().unwrap())
}

#[inline]
fn write_i64(data: &mut [u8], at: usize, value: i64) {
    data[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn slot_at(slot: u16) -> usize {
    HEADER_SIZE + slot as usize * SLOT_SIZE
}

/// Read-only view of a page interpreted as a table page.
pub struct TablePage<'a> {
    page: &'a Page,
}

impl<'a> TablePage<'a> {
    #[inline]
    pub fn new(page: &'a Page) -> Self {
        TablePage { page }
    }

    #[inline]
    pub fn next_page_id(&self) -> PageId {
        read_u32(self.page.data(), OFFSET_NEXT_PAGE)
    }

    #[inline]
    pub fn num_tuples(&self) -> u16 {
        read_u16(self.page.data(), OFFSET_NUM_TUPLES)
    }

    #[inline]
    pub fn num_deleted_tuples(&self) -> u16 {
        read_u16(self.page.data(), OFFSET_NUM_DELETED)
    }

    pub fn get_tuple_meta(&self, slot: u16) -> Result<TupleMeta> {
        if slot >= self.num_tuples() {
            return Err(Error::TupleNotFound);
        }
        let at = slot_at(slot);
        let data = self.page.data();
        Ok(TupleMeta {
            ts: read_i64(data, at + SLOT_META_TS),
            is_deleted: data[at + SLOT_META_DELETED] != 0,
        })
    }

    pub fn get_tuple(&self, slot: u16) -> Result<(TupleMeta, Tuple)> {
        let meta = self.get_tuple_meta(slot)?;
        let at = slot_at(slot);
        let data = self.page.data();
        let offset = read_u16(data, at) as usize;
        let len = read_u16(data, at + 2) as usize;
        let tuple = Tuple::from_bytes(data[offset..offset + len].to_vec());
        Ok((meta, tuple))
    }

    #[inline]
    fn payload_capacity(&self, slot: u16) -> u16 {
        read_u16(self.page.data(), slot_at(slot) + SLOT_META_CAPACITY)
    }

    /// Returns the payload offset a new tuple would occupy, or `None`
    /// when the page cannot fit it.
    pub fn next_tuple_offset(&self, tuple: &Tuple) -> Option<u16> {
        let n = self.num_tuples();
        let payload_start = if n == 0 {
            PAGE_SIZE
        } else {
            read_u16(self.page.data(), slot_at(n - 1)) as usize
        };
        let offset = payload_start.checked_sub(tuple.len())?;
        let slots_end = HEADER_SIZE + (n as usize + 1) * SLOT_SIZE;
        if offset < slots_end {
            return None;
        }
        Some(offset as u16)
    }
}

/// Mutable view of a page interpreted as a table page.
pub struct TablePageMut<'a> {
    page: &'a mut Page,
}

impl<'a> TablePageMut<'a> {
    #[inline]
    pub fn new(page: &'a mut Page) -> Self {
        TablePageMut { page }
    }

    #[inline]
    pub fn as_read(&self) -> TablePage<'_> {
        TablePage { page: self.page }
    }

    /// Initializes an empty table page with no successor.
    pub fn init(&mut self) {
        let data = self.page.data_mut();
        write_u32(data, OFFSET_NEXT_PAGE, INVALID_PAGE_ID);
        write_u16(data, OFFSET_NUM_TUPLES, 0);
        write_u16(data, OFFSET_NUM_DELETED, 0);
    }

    #[inline]
    pub fn set_next_page_id(&mut self, next_page_id: PageId) {
        write_u32(self.page.data_mut(), OFFSET_NEXT_PAGE, next_page_id);
    }

    /// Appends a tuple, returning its slot number, or `None` when the
    /// page is full.
    pub fn insert_tuple(&mut self, meta: TupleMeta, tuple: &Tuple) -> Option<u16> {
        let offset = self.as_read().next_tuple_offset(tuple)?;
        let slot = self.as_read().num_tuples();
        let at = slot_at(slot);
        let data = self.page.data_mut();
        write_u16(data, at, offset);
        write_u16(data, at + 2, tuple.len() as u16);
        write_i64(data, at + SLOT_META_TS, meta.ts);
        data[at + SLOT_META_DELETED] = u8::from(meta.is_deleted);
        write_u16(data, at + SLOT_META_CAPACITY, tuple.len() as u16);
        data[offset as usize..offset as usize + tuple.len()].copy_from_slice(tuple.data());
        write_u16(data, OFFSET_NUM_TUPLES, slot + 1);
        if meta.is_deleted {
            let deleted = read_u16(data, OFFSET_NUM_DELETED);
            write_u16(data, OFFSET_NUM_DELETED, deleted + 1);
        }
        Some(slot)
    }

    /// Overwrites the meta of an existing slot, maintaining the deleted
    /// count.
    pub fn update_tuple_meta(&mut self, meta: TupleMeta, slot: u16) -> Result<()> {
        let old = self.as_read().get_tuple_meta(slot)?;
        let at = slot_at(slot);
        let data = self.page.data_mut();
        write_i64(data, at + SLOT_META_TS, meta.ts);
        data[at + SLOT_META_DELETED] = u8::from(meta.is_deleted);
        if meta.is_deleted != old.is_deleted {
            let deleted = read_u16(data, OFFSET_NUM_DELETED);
            let deleted = if meta.is_deleted { deleted + 1 } else { deleted - 1 };
            write_u16(data, OFFSET_NUM_DELETED, deleted);
        }
        Ok(())
    }

    /// Rewrites the payload of an existing slot in place. The slot
    /// offset is preserved; the new payload must fit in the capacity
    /// reserved at insert.
    pub fn update_tuple_in_place(&mut self, meta: TupleMeta, tuple: &Tuple, slot: u16) -> Result<()> {
        let read = self.as_read();
        if slot >= read.num_tuples() {
            return Err(Error::TupleNotFound);
        }
        if tuple.len() > read.payload_capacity(slot) as usize {
            return Err(Error::InsufficientFreeSpaceForInplaceUpdate);
        }
        self.update_tuple_meta(meta, slot)?;
        let at = slot_at(slot);
        let data = self.page.data_mut();
        let offset = read_u16(data, at) as usize;
        write_u16(data, at + 2, tuple.len() as u16);
        data[offset..offset + tuple.len()].copy_from_slice(tuple.data());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magpie_catalog::{Column, Schema};
    use magpie_datatype::{TypeId, Value};

    fn schema() -> Schema {
        Schema::new(vec![Column::new("v", TypeId::Integer)])
    }

    fn int_tuple(v: i32) -> Tuple {
        Tuple::from_values(&schema(), &[Value::from(v)])
    }

    #[test]
    fn test_insert_and_get() {
        let mut page = Page::new();
        let mut tp = TablePageMut::new(&mut page);
        tp.init();
        let meta = TupleMeta::new(3, false);
        let slot = tp.insert_tuple(meta, &int_tuple(42)).unwrap();
        assert_eq!(slot, 0);

        let read = TablePage::new(&page);
        let (got_meta, got_tuple) = read.get_tuple(0).unwrap();
        assert_eq!(got_meta, meta);
        assert_eq!(got_tuple.value(&schema(), 0), Value::from(42));
        assert!(read.get_tuple(1).is_err());
    }

    #[test]
    fn test_page_fills_up() {
        let mut page = Page::new();
        let mut tp = TablePageMut::new(&mut page);
        tp.init();
        let meta = TupleMeta::new(0, false);
        let mut inserted = 0;
        while tp.insert_tuple(meta, &int_tuple(inserted)).is_some() {
            inserted += 1;
        }
        // Each row costs slot (20) + payload (5): the page must hold
        // more than a hundred and reject the overflow cleanly.
        assert!(inserted > 100);
        let read = TablePage::new(&page);
        assert_eq!(read.num_tuples() as i32, inserted);
        assert_eq!(
            read.get_tuple(0).unwrap().1.value(&schema(), 0),
            Value::from(0)
        );
    }

    #[test]
    fn test_update_meta_tracks_deleted_count() {
        let mut page = Page::new();
        let mut tp = TablePageMut::new(&mut page);
        tp.init();
        tp.insert_tuple(TupleMeta::new(0, false), &int_tuple(1)).unwrap();
        tp.update_tuple_meta(TupleMeta::new(5, true), 0).unwrap();
        assert_eq!(tp.as_read().num_deleted_tuples(), 1);
        tp.update_tuple_meta(TupleMeta::new(6, false), 0).unwrap();
        assert_eq!(tp.as_read().num_deleted_tuples(), 0);
    }

    #[test]
    fn test_in_place_update_respects_capacity() {
        let varchar_schema = Schema::new(vec![Column::new("s", TypeId::Varchar)]);
        let long = Tuple::from_values(&varchar_schema, &[Value::from("a longer string")]);
        let short = Tuple::from_values(&varchar_schema, &[Value::from("tiny")]);

        let mut page = Page::new();
        let mut tp = TablePageMut::new(&mut page);
        tp.init();
        tp.insert_tuple(TupleMeta::new(0, false), &long).unwrap();

        // Shrink, then grow back to the original size: both fit the
        // reserved capacity.
        tp.update_tuple_in_place(TupleMeta::new(1, false), &short, 0).unwrap();
        assert_eq!(
            TablePage::new(&page).get_tuple(0).unwrap().1,
            short
        );
        let mut tp = TablePageMut::new(&mut page);
        tp.update_tuple_in_place(TupleMeta::new(2, false), &long, 0).unwrap();

        // Growing past the reserved capacity is rejected.
        let longer = Tuple::from_values(&varchar_schema, &[Value::from("an even longer string!")]);
        let err = tp.update_tuple_in_place(TupleMeta::new(3, false), &longer, 0);
        assert!(matches!(err, Err(Error::InsufficientFreeSpaceForInplaceUpdate)));
    }
}
