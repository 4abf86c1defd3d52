/// Size of a disk page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Identifier of a page within the page file.
pub type PageId = u32;

/// Identifier of a frame within the buffer pool, dense in
/// `0..pool_size`.
pub type FrameId = usize;

/// Sentinel for "no page".
pub const INVALID_PAGE_ID: PageId = PageId::MAX;

/// A fixed-size page buffer.
///
/// The buffer pool owns one `Page` per frame; typed views such as the
/// slotted table page interpret the raw bytes.
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    #[inline]
    pub fn new() -> Self {
        Page {
            data: [0; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    /// Zeroes the whole page.
    #[inline]
    pub fn zero(&mut self) {
        self.data.fill(0);
    }

    #[inline]
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }
}

impl Default for Page {
    #[inline]
    fn default() -> Self {
        Page::new()
    }
}

impl Clone for Page {
    #[inline]
    fn clone(&self) -> Self {
        Page { data: self.data }
    }
}
