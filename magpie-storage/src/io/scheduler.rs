use crate::buffer::page::{Page, PageId};
use crate::error::Result;
use crate::io::DiskManager;
use flume::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// One read or write request against the page file.
///
/// The worker fulfils the promise with the page buffer: the freshly
/// read image for reads, the written-out buffer handed back for writes.
pub struct DiskRequest {
    pub is_write: bool,
    pub data: Box<Page>,
    pub page_id: PageId,
    pub promise: Sender<Box<Page>>,
}

/// Single-worker disk scheduler.
///
/// Requests are queued on a channel and drained by one background
/// thread in arrival order. Dropping the scheduler closes the queue and
/// joins the worker.
pub struct DiskScheduler {
    request_tx: Option<Sender<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk: Arc<DiskManager>) -> Self {
        let (request_tx, request_rx) = flume::unbounded();
        let worker = std::thread::Builder::new()
            .name("magpie-disk-io".to_string())
            .spawn(move || Self::worker_loop(disk, request_rx))
            .expect("spawn disk scheduler worker");
        DiskScheduler {
            request_tx: Some(request_tx),
            worker: Some(worker),
        }
    }

    fn worker_loop(disk: Arc<DiskManager>, request_rx: Receiver<DiskRequest>) {
        while let Ok(mut req) = request_rx.recv() {
            let res = if req.is_write {
                disk.write_page(req.page_id, &req.data)
            } else {
                disk.read_page(req.page_id, &mut req.data)
            };
            if let Err(e) = res {
                // Nothing sensible to do here without recovery; the
                // waiter observes a disconnected promise.
                log::error!("disk request on page {} failed: {e}", req.page_id);
                continue;
            }
            let _ = req.promise.send(req.data);
        }
    }

    /// Enqueues a raw request. The caller awaits the promise.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        self.request_tx
            .as_ref()
            .expect("scheduler shut down")
            .send(request)?;
        Ok(())
    }

    /// Schedules a read of `page_id` and waits for the image.
    pub fn read_page(&self, page_id: PageId) -> Result<Box<Page>> {
        let (promise, future) = flume::bounded(1);
        self.schedule(DiskRequest {
            is_write: false,
            data: Box::new(Page::new()),
            page_id,
            promise,
        })?;
        Ok(future.recv()?)
    }

    /// Schedules a write of `data` to `page_id` and waits for
    /// completion.
    pub fn write_page(&self, page_id: PageId, data: Page) -> Result<()> {
        let (promise, future) = flume::bounded(1);
        self.schedule(DiskRequest {
            is_write: true,
            data: Box::new(data),
            page_id,
            promise,
        })?;
        future.recv()?;
        Ok(())
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Closing the channel stops the worker after the queue drains.
        drop(self.request_tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_schedule_write_then_read() {
        let dir = TempDir::new().unwrap();
        let disk = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
        let scheduler = DiskScheduler::new(Arc::clone(&disk));
        let page_id = disk.allocate_page();

        let mut page = Page::new();
        page.data_mut()[..13].copy_from_slice(b"A test string");
        scheduler.write_page(page_id, page).unwrap();

        let out = scheduler.read_page(page_id).unwrap();
        assert_eq!(&out.data()[..13], b"A test string");
    }

    #[test]
    fn test_requests_processed_in_order() {
        let dir = TempDir::new().unwrap();
        let disk = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
        let scheduler = DiskScheduler::new(Arc::clone(&disk));
        let page_id = disk.allocate_page();

        let mut promises = vec![];
        for i in 0..8u8 {
            let mut page = Page::new();
            page.data_mut()[0] = i;
            let (promise, future) = flume::bounded(1);
            scheduler
                .schedule(DiskRequest {
                    is_write: true,
                    data: Box::new(page),
                    page_id,
                    promise,
                })
                .unwrap();
            promises.push(future);
        }
        for future in promises {
            future.recv().unwrap();
        }
        let out = scheduler.read_page(page_id).unwrap();
        assert_eq!(out.data()[0], 7);
    }
}
