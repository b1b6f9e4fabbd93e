use std::collections::HashMap;

use log::{debug, warn};

use crate::buffer::page::{FrameId, Page, PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::buffer::replacer::{LruKReplacer, Replacer};
use crate::config::BufferPoolConfig;
use crate::error::{RoostError, RoostResult};
use crate::storage::disk_manager::DiskManager;

#[derive(Debug, Clone)]
struct FrameMeta {
    page_id: Option<PageId>,
    pin_count: u32,
    is_dirty: bool,
}

/// Fixed-capacity page cache over one disk file. Every `fetch_page` /
/// `new_page` pins the frame; callers must pair each pin with exactly one
/// `unpin_page`, passing `is_dirty = true` iff the page bytes were written
/// while pinned.
#[derive(Debug)]
pub struct BufferPoolManager {
    pool: Vec<Page>,
    page_table: HashMap<PageId, FrameId>,
    frame_meta: Vec<FrameMeta>,
    replacer: LruKReplacer,
    free_list: Vec<FrameId>,
    disk_manager: DiskManager,
}

impl BufferPoolManager {
    pub fn new(config: BufferPoolConfig, disk_manager: DiskManager) -> Self {
        let pool_size = config.buffer_pool_size.max(1);
        let mut pool = Vec::with_capacity(pool_size);
        let mut frame_meta = Vec::with_capacity(pool_size);
        let mut free_list = Vec::with_capacity(pool_size);
        for frame_id in 0..pool_size {
            pool.push(Page::new());
            frame_meta.push(FrameMeta {
                page_id: None,
                pin_count: 0,
                is_dirty: false,
            });
            free_list.push(frame_id);
        }
        Self {
            pool,
            page_table: HashMap::new(),
            frame_meta,
            replacer: LruKReplacer::new(pool_size, config.lru_k_k),
            free_list,
            disk_manager,
        }
    }

    /// Pins `page_id`, loading it from disk on a miss. The returned frame
    /// stays resident until the matching `unpin_page`.
    pub fn fetch_page(&mut self, page_id: PageId) -> RoostResult<&mut Page> {
        if page_id == INVALID_PAGE_ID {
            return Err(RoostError::Storage(
                "fetch_page: invalid page id".to_string(),
            ));
        }
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            let meta = &mut self.frame_meta[frame_id];
            meta.pin_count += 1;
            if meta.pin_count == 1 {
                self.replacer.set_evictable(frame_id, false)?;
            }
            self.replacer.record_access(frame_id)?;
            return Ok(&mut self.pool[frame_id]);
        }

        let frame_id = self.take_victim_frame()?;
        let data = self.disk_manager.read_page(page_id)?;
        self.pool[frame_id].set_data(&data);
        let meta = &mut self.frame_meta[frame_id];
        meta.page_id = Some(page_id);
        meta.pin_count = 1;
        meta.is_dirty = false;
        self.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id)?;
        self.replacer.set_evictable(frame_id, false)?;
        Ok(&mut self.pool[frame_id])
    }

    /// Allocates a fresh zeroed page, pinned.
    pub fn new_page(&mut self) -> RoostResult<(PageId, &mut Page)> {
        let frame_id = self.take_victim_frame()?;
        let page_id = self.disk_manager.allocate_page();
        self.pool[frame_id].reset();
        let meta = &mut self.frame_meta[frame_id];
        meta.page_id = Some(page_id);
        meta.pin_count = 1;
        meta.is_dirty = true;
        self.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id)?;
        self.replacer.set_evictable(frame_id, false)?;
        Ok((page_id, &mut self.pool[frame_id]))
    }

    /// Replaces the byte image of an already-pinned resident page without
    /// touching its pin count. The dirty flag is still conveyed at unpin.
    pub fn apply_page_image(&mut self, page_id: PageId, image: &[u8]) -> RoostResult<()> {
        if image.len() != PAGE_SIZE {
            return Err(RoostError::Internal(format!(
                "page image size is {} instead of {}",
                image.len(),
                PAGE_SIZE
            )));
        }
        let Some(&frame_id) = self.page_table.get(&page_id) else {
            return Err(RoostError::Internal(format!(
                "apply_page_image: page {} is not resident",
                page_id
            )));
        };
        if self.frame_meta[frame_id].pin_count == 0 {
            return Err(RoostError::Internal(format!(
                "apply_page_image: page {} is not pinned",
                page_id
            )));
        }
        self.pool[frame_id].set_data(image);
        Ok(())
    }

    pub fn unpin_page(&mut self, page_id: PageId, is_dirty: bool) -> RoostResult<()> {
        let Some(&frame_id) = self.page_table.get(&page_id) else {
            warn!("unpin_page called on page {} not in the pool", page_id);
            return Ok(());
        };
        let meta = &mut self.frame_meta[frame_id];
        if meta.pin_count == 0 {
            warn!("unpin_page called on page {} with pin count 0", page_id);
            return Ok(());
        }
        meta.pin_count -= 1;
        if is_dirty {
            meta.is_dirty = true;
        }
        if meta.pin_count == 0 {
            self.replacer.set_evictable(frame_id, true)?;
        }
        Ok(())
    }

    pub fn flush_page(&mut self, page_id: PageId) -> RoostResult<()> {
        let Some(&frame_id) = self.page_table.get(&page_id) else {
            return Ok(());
        };
        self.flush_frame_if_dirty(frame_id)
    }

    pub fn flush_all_pages(&mut self) -> RoostResult<()> {
        for frame_id in 0..self.pool.len() {
            self.flush_frame_if_dirty(frame_id)?;
        }
        self.disk_manager.sync()
    }

    fn take_victim_frame(&mut self) -> RoostResult<FrameId> {
        if let Some(frame_id) = self.free_list.pop() {
            return Ok(frame_id);
        }
        let Some(frame_id) = self.replacer.evict() else {
            return Err(RoostError::Storage(
                "buffer pool exhausted: every frame is pinned".to_string(),
            ));
        };
        self.flush_frame_if_dirty(frame_id)?;
        if let Some(old_page_id) = self.frame_meta[frame_id].page_id.take() {
            debug!("evicting page {} from frame {}", old_page_id, frame_id);
            self.page_table.remove(&old_page_id);
        }
        Ok(frame_id)
    }

    fn flush_frame_if_dirty(&mut self, frame_id: FrameId) -> RoostResult<()> {
        let meta = &mut self.frame_meta[frame_id];
        if !meta.is_dirty {
            return Ok(());
        }
        let Some(page_id) = meta.page_id else {
            warn!("dirty frame {} has no associated page", frame_id);
            meta.is_dirty = false;
            return Ok(());
        };
        self.disk_manager
            .write_page(page_id, self.pool[frame_id].data())?;
        self.frame_meta[frame_id].is_dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_pool(pool_size: usize) -> (TempDir, BufferPoolManager) {
        let dir = TempDir::new().unwrap();
        let disk = DiskManager::open(&dir.path().join("pool.db")).unwrap();
        let config = BufferPoolConfig {
            buffer_pool_size: pool_size,
            lru_k_k: 2,
        };
        (dir, BufferPoolManager::new(config, disk))
    }

    #[test]
    fn new_page_ids_are_sequential() {
        let (_dir, mut pool) = setup_pool(4);
        for expected in 1..=3 {
            let (page_id, _) = pool.new_page().unwrap();
            assert_eq!(page_id, expected);
            pool.unpin_page(page_id, false).unwrap();
        }
    }

    #[test]
    fn dirty_page_survives_eviction() {
        let (_dir, mut pool) = setup_pool(2);
        let (page_id, page) = pool.new_page().unwrap();
        page.data_mut()[0] = 0xAB;
        pool.unpin_page(page_id, true).unwrap();

        // churn through enough new pages to evict the first one
        for _ in 0..4 {
            let (other, _) = pool.new_page().unwrap();
            pool.unpin_page(other, false).unwrap();
        }

        let page = pool.fetch_page(page_id).unwrap();
        assert_eq!(page.data()[0], 0xAB);
        pool.unpin_page(page_id, false).unwrap();
    }

    #[test]
    fn fetch_fails_when_every_frame_is_pinned() {
        let (_dir, mut pool) = setup_pool(2);
        let (a, _) = pool.new_page().unwrap();
        let (b, _) = pool.new_page().unwrap();
        assert!(pool.new_page().is_err());
        pool.unpin_page(a, false).unwrap();
        pool.unpin_page(b, false).unwrap();
        assert!(pool.new_page().is_ok());
    }
}
