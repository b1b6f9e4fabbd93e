use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use crate::buffer::{PageId, PAGE_SIZE};
use crate::error::{RoostError, RoostResult};
use crate::storage::codec::{CommonCodec, DecodedData};
use crate::storage::disk_manager::DiskManager;

/// Identifies one record in a relation. The index stores these verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_num: u32,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_num: u32) -> Self {
        Self { page_id, slot_num }
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.page_id, self.slot_num)
    }
}

/// Slotted page: record count, then a slot directory of (offset, len)
/// pairs growing forward while record bytes grow backward from the page
/// end. Records are append-only.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HeapPage {
    pub records: Vec<Vec<u8>>,
}

// record count
const HEAP_PAGE_HEADER_SIZE: usize = 2;
// offset + len
const SLOT_SIZE: usize = 4;

impl HeapPage {
    pub fn new() -> Self {
        Self::default()
    }

    fn bytes_used(&self) -> usize {
        HEAP_PAGE_HEADER_SIZE
            + self.records.len() * SLOT_SIZE
            + self.records.iter().map(|r| r.len()).sum::<usize>()
    }

    pub fn can_hold(&self, record_len: usize) -> bool {
        self.bytes_used() + SLOT_SIZE + record_len <= PAGE_SIZE
    }

    pub fn push(&mut self, record: &[u8]) -> u32 {
        self.records.push(record.to_vec());
        (self.records.len() - 1) as u32
    }

    pub fn record(&self, slot_num: u32) -> Option<&[u8]> {
        self.records.get(slot_num as usize).map(|r| r.as_slice())
    }
}

pub struct HeapPageCodec;

impl HeapPageCodec {
    pub fn encode(page: &HeapPage) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PAGE_SIZE);
        bytes.extend(CommonCodec::encode_u16(page.records.len() as u16));
        let mut data_offset = PAGE_SIZE;
        for record in page.records.iter() {
            data_offset -= record.len();
            bytes.extend(CommonCodec::encode_u16(data_offset as u16));
            bytes.extend(CommonCodec::encode_u16(record.len() as u16));
        }
        assert!(bytes.len() <= data_offset);
        bytes.resize(PAGE_SIZE, 0);
        for (slot, record) in page.records.iter().enumerate() {
            let offset = Self::slot_offset(&bytes, slot);
            bytes[offset..offset + record.len()].copy_from_slice(record);
        }
        bytes
    }

    fn slot_offset(bytes: &[u8], slot: usize) -> usize {
        let base = HEAP_PAGE_HEADER_SIZE + slot * SLOT_SIZE;
        u16::from_be_bytes([bytes[base], bytes[base + 1]]) as usize
    }

    pub fn decode(bytes: &[u8]) -> RoostResult<DecodedData<HeapPage>> {
        if bytes.len() != PAGE_SIZE {
            return Err(RoostError::Storage(format!(
                "heap page size is {} instead of {}",
                bytes.len(),
                PAGE_SIZE
            )));
        }
        let (num_records, mut pos) = CommonCodec::decode_u16(bytes)?;
        let mut records = Vec::with_capacity(num_records as usize);
        for _ in 0..num_records {
            let (offset, consumed) = CommonCodec::decode_u16(&bytes[pos..])?;
            pos += consumed;
            let (len, consumed) = CommonCodec::decode_u16(&bytes[pos..])?;
            pos += consumed;
            let (offset, len) = (offset as usize, len as usize);
            if offset + len > PAGE_SIZE {
                return Err(RoostError::Storage(format!(
                    "heap page slot points past the page end: offset {} len {}",
                    offset, len
                )));
            }
            records.push(bytes[offset..offset + len].to_vec());
        }
        Ok((HeapPage { records }, PAGE_SIZE))
    }
}

/// The record-oriented relation an index is built over: variable-length
/// records in slotted pages, addressed by `RecordId`.
#[derive(Debug)]
pub struct HeapFile {
    name: String,
    disk: DiskManager,
}

impl HeapFile {
    fn file_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.tbl", name))
    }

    /// Creates an empty relation, truncating any previous file.
    pub fn create(dir: &Path, name: &str) -> RoostResult<Self> {
        let path = Self::file_path(dir, name);
        std::fs::File::create(&path)?;
        Ok(Self {
            name: name.to_string(),
            disk: DiskManager::open(&path)?,
        })
    }

    pub fn open(dir: &Path, name: &str) -> RoostResult<Self> {
        let path = Self::file_path(dir, name);
        if !path.exists() {
            return Err(RoostError::Storage(format!(
                "relation {} does not exist in {:?}",
                name, dir
            )));
        }
        Ok(Self {
            name: name.to_string(),
            disk: DiskManager::open(&path)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn append(&mut self, record: &[u8]) -> RoostResult<RecordId> {
        if record.len() > PAGE_SIZE - HEAP_PAGE_HEADER_SIZE - SLOT_SIZE {
            return Err(RoostError::Storage(format!(
                "record of {} bytes does not fit in one page",
                record.len()
            )));
        }
        let tail_page_id = self.disk.num_pages();
        let (page_id, mut page) = if tail_page_id == 0 {
            (self.disk.allocate_page(), HeapPage::new())
        } else {
            let page = HeapPageCodec::decode(&self.disk.read_page(tail_page_id)?)?.0;
            if page.can_hold(record.len()) {
                (tail_page_id, page)
            } else {
                (self.disk.allocate_page(), HeapPage::new())
            }
        };
        let slot_num = page.push(record);
        self.disk.write_page(page_id, &HeapPageCodec::encode(&page))?;
        Ok(RecordId::new(page_id, slot_num))
    }

    pub fn record(&mut self, rid: RecordId) -> RoostResult<Vec<u8>> {
        let page = HeapPageCodec::decode(&self.disk.read_page(rid.page_id)?)?.0;
        page.record(rid.slot_num)
            .map(|r| r.to_vec())
            .ok_or_else(|| RoostError::Storage(format!("no record at {}", rid)))
    }

    /// Scans every record in (page, slot) order. End of file is signalled
    /// by iterator exhaustion.
    pub fn scan(&mut self) -> HeapFileScan<'_> {
        HeapFileScan {
            file: self,
            current: None,
            next_page_id: 1,
            next_slot: 0,
        }
    }
}

pub struct HeapFileScan<'a> {
    file: &'a mut HeapFile,
    current: Option<(PageId, HeapPage)>,
    next_page_id: PageId,
    next_slot: u32,
}

impl Iterator for HeapFileScan<'_> {
    type Item = RoostResult<(RecordId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((page_id, page)) = &self.current {
                if let Some(record) = page.record(self.next_slot) {
                    let rid = RecordId::new(*page_id, self.next_slot);
                    let record = record.to_vec();
                    self.next_slot += 1;
                    return Some(Ok((rid, record)));
                }
                self.current = None;
            }
            if self.next_page_id > self.file.disk.num_pages() {
                return None;
            }
            let page_id = self.next_page_id;
            self.next_page_id += 1;
            self.next_slot = 0;
            match self.file.disk.read_page(page_id) {
                Ok(bytes) => match HeapPageCodec::decode(&bytes) {
                    Ok((page, _)) => self.current = Some((page_id, page)),
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn heap_page_codec_roundtrip() {
        let mut page = HeapPage::new();
        page.push(b"alpha");
        page.push(b"beta");
        page.push(&[0u8; 32]);
        let (decoded, _) = HeapPageCodec::decode(&HeapPageCodec::encode(&page)).unwrap();
        assert_eq!(decoded, page);
    }

    #[test]
    fn append_and_scan_across_pages() {
        let dir = TempDir::new().unwrap();
        let mut heap = HeapFile::create(dir.path(), "people").unwrap();

        let record = vec![0xCDu8; 512];
        let mut rids = Vec::new();
        for _ in 0..20 {
            rids.push(heap.append(&record).unwrap());
        }
        // 512-byte records cannot all share one 4K page
        assert!(rids.last().unwrap().page_id > rids[0].page_id);

        let scanned: Vec<_> = heap.scan().collect::<RoostResult<Vec<_>>>().unwrap();
        assert_eq!(scanned.len(), 20);
        for ((rid, bytes), expected_rid) in scanned.iter().zip(rids.iter()) {
            assert_eq!(rid, expected_rid);
            assert_eq!(bytes, &record);
        }
    }

    #[test]
    fn record_fetch_by_rid() {
        let dir = TempDir::new().unwrap();
        let mut heap = HeapFile::create(dir.path(), "items").unwrap();
        let rid_a = heap.append(b"first").unwrap();
        let rid_b = heap.append(b"second").unwrap();
        assert_eq!(heap.record(rid_b).unwrap(), b"second");
        assert_eq!(heap.record(rid_a).unwrap(), b"first");
        assert!(heap.record(RecordId::new(1, 9)).is_err());
    }

    #[test]
    fn reopen_preserves_records() {
        let dir = TempDir::new().unwrap();
        {
            let mut heap = HeapFile::create(dir.path(), "kept").unwrap();
            heap.append(b"persisted").unwrap();
        }
        let mut heap = HeapFile::open(dir.path(), "kept").unwrap();
        let scanned: Vec<_> = heap.scan().collect::<RoostResult<Vec<_>>>().unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].1, b"persisted");
    }
}
