pub mod buffer_pool;
pub mod page;
pub mod replacer;

pub use buffer_pool::BufferPoolManager;
pub use page::{Page, FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};
pub use replacer::{LruKReplacer, Replacer};
