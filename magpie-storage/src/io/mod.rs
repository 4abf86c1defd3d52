mod scheduler;

pub use scheduler::{DiskRequest, DiskScheduler};

use crate::buffer::page::{Page, PageId, PAGE_SIZE};
use crate::error::Result;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

/// Page-granular file I/O over a single database file.
///
/// Reads past the end of the file yield a zeroed page, so a freshly
/// allocated page can be fetched before its first flush.
pub struct DiskManager {
    file: Mutex<File>,
    next_page_id: AtomicU32,
    path: PathBuf,
}

impl DiskManager {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let len = file.metadata()?.len();
        let next_page_id = len.div_ceil(PAGE_SIZE as u64) as u32;
        Ok(DiskManager {
            file: Mutex::new(file),
            next_page_id: AtomicU32::new(next_page_id),
            path,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hands out the next unused page id.
    #[inline]
    pub fn allocate_page(&self) -> PageId {
        self.next_page_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Page ids are not recycled; deallocation only forgets the page
    /// contents logically.
    #[inline]
    pub fn deallocate_page(&self, _page_id: PageId) {}

    pub fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()> {
        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        if offset >= len {
            page.zero();
            return Ok(());
        }
        file.seek(SeekFrom::Start(offset))?;
        let buf = page.data_mut();
        let mut read = 0;
        while read < PAGE_SIZE {
            let n = file.read(&mut buf[read..])?;
            if n == 0 {
                buf[read..].fill(0);
                break;
            }
            read += n;
        }
        Ok(())
    }

    pub fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.data())?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_disk_manager_round_trip() {
        let dir = TempDir::new().unwrap();
        let disk = DiskManager::new(dir.path().join("test.db")).unwrap();
        let p0 = disk.allocate_page();
        let p1 = disk.allocate_page();
        assert_ne!(p0, p1);

        let mut page = Page::new();
        page.data_mut()[..5].copy_from_slice(b"hello");
        disk.write_page(p1, &page).unwrap();

        let mut out = Page::new();
        disk.read_page(p1, &mut out).unwrap();
        assert_eq!(&out.data()[..5], b"hello");

        // Unwritten page reads back zeroed.
        disk.read_page(p0, &mut out).unwrap();
        assert_eq!(out.data()[0], 0);
    }

    #[test]
    fn test_reopen_preserves_allocation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let first = {
            let disk = DiskManager::new(&path).unwrap();
            let page_id = disk.allocate_page();
            disk.write_page(page_id, &Page::new()).unwrap();
            page_id
        };
        let disk = DiskManager::new(&path).unwrap();
        assert!(disk.allocate_page() > first);
    }
}
