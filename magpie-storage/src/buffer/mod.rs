pub mod frame;
pub mod guard;
pub mod page;
pub mod pool;
pub mod replacer;

pub use frame::FrameHeader;
pub use guard::{ReadPageGuard, WritePageGuard};
pub use page::{FrameId, Page, PageId, INVALID_PAGE_ID, PAGE_SIZE};
pub use pool::BufferPool;
pub use replacer::LruKReplacer;
