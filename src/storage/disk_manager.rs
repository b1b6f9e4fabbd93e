use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::BytesMut;
use log::{debug, warn};

use crate::buffer::{PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::error::{RoostError, RoostResult};

/// Paged I/O over one blob file. Page ids are 1-based; page `p` lives at
/// byte offset `(p - 1) * PAGE_SIZE`. Allocation is a bump counter: pages
/// are never freed.
#[derive(Debug)]
pub struct DiskManager {
    file: File,
    num_pages: u32,
}

impl DiskManager {
    pub fn open(path: &Path) -> RoostResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        let file_len = file.metadata()?.len();
        let num_pages = file_len.div_ceil(PAGE_SIZE as u64) as u32;
        if file_len % PAGE_SIZE as u64 != 0 {
            warn!(
                "file size {} of {:?} is not a multiple of the page size {}",
                file_len, path, PAGE_SIZE
            );
        }
        Ok(DiskManager { file, num_pages })
    }

    /// Reads one page. A page at or past EOF reads back zero-filled, which
    /// is how freshly allocated but never-flushed pages look.
    pub fn read_page(&mut self, page_id: PageId) -> RoostResult<BytesMut> {
        if page_id == INVALID_PAGE_ID {
            return Err(RoostError::Storage(
                "read_page: invalid page id".to_string(),
            ));
        }
        let mut buf = BytesMut::zeroed(PAGE_SIZE);
        let offset = (page_id - 1) as u64 * PAGE_SIZE as u64;
        let file_len = self.file.metadata()?.len();
        if offset >= file_len {
            debug!("read_page {} past EOF, returning zeroed page", page_id);
            return Ok(buf);
        }
        self.file.seek(SeekFrom::Start(offset))?;
        match self.file.read_exact(&mut buf) {
            Ok(()) => Ok(buf),
            // the tail page of a file that was cut short mid-write
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(buf),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_page(&mut self, page_id: PageId, data: &[u8]) -> RoostResult<()> {
        if page_id == INVALID_PAGE_ID {
            return Err(RoostError::Storage(
                "write_page: invalid page id".to_string(),
            ));
        }
        if data.len() != PAGE_SIZE {
            return Err(RoostError::Internal(format!(
                "page size is {} instead of {}",
                data.len(),
                PAGE_SIZE
            )));
        }
        let offset = (page_id - 1) as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.num_pages = self.num_pages.max(page_id);
        Ok(())
    }

    /// Hands out the next page id. No disk I/O happens until the page is
    /// first written.
    pub fn allocate_page(&mut self) -> PageId {
        self.num_pages += 1;
        self.num_pages
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    pub fn sync(&mut self) -> RoostResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_read_page_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut disk = DiskManager::open(&dir.path().join("test.db")).unwrap();

        let page_id = disk.allocate_page();
        assert_eq!(page_id, 1);
        let mut image = vec![7u8; 3];
        image.extend(vec![0; PAGE_SIZE - 3]);
        disk.write_page(page_id, &image).unwrap();
        assert_eq!(&disk.read_page(page_id).unwrap()[..], image.as_slice());

        let page_id2 = disk.allocate_page();
        assert_eq!(page_id2, 2);
        // allocated but never written pages read back zeroed
        assert!(disk.read_page(page_id2).unwrap().iter().all(|b| *b == 0));
    }

    #[test]
    fn reopen_recovers_page_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        {
            let mut disk = DiskManager::open(&path).unwrap();
            for _ in 0..3 {
                let page_id = disk.allocate_page();
                disk.write_page(page_id, &[1u8; PAGE_SIZE]).unwrap();
            }
        }
        let mut disk = DiskManager::open(&path).unwrap();
        assert_eq!(disk.num_pages(), 3);
        assert_eq!(disk.allocate_page(), 4);
    }
}
