use std::path::Path;

use log::{debug, error};

use crate::buffer::BufferPoolManager;
use crate::config::IndexOptions;
use crate::error::{RoostError, RoostResult};
use crate::index::btree::BTree;
use crate::index::codec::IndexMetaPageCodec;
use crate::index::key::{Char10, IndexKey, KeyType, ScalarKey};
use crate::index::page::{IndexMetaPage, META_PAGE_ID};
use crate::index::scan::{RangeScan, ScanOperator};
use crate::storage::disk_manager::DiskManager;
use crate::storage::heap_file::{HeapFile, RecordId};

/// One key type's tree plus its at-most-one executing scan.
#[derive(Debug)]
struct TreeState<K: IndexKey> {
    tree: BTree<K>,
    scan: Option<RangeScan<K>>,
}

impl<K: IndexKey> TreeState<K> {
    fn new(tree: BTree<K>) -> Self {
        Self { tree, scan: None }
    }

    fn bulk_load(
        &mut self,
        pool: &mut BufferPoolManager,
        relation: &mut HeapFile,
        attr_byte_offset: u32,
    ) -> RoostResult<()> {
        let mut loaded = 0usize;
        for item in relation.scan() {
            let (rid, record) = item?;
            let key = K::from_record(&record, attr_byte_offset)?;
            self.tree.insert(pool, key, rid)?;
            loaded += 1;
        }
        debug!("bulk loaded {} entries", loaded);
        Ok(())
    }

    fn insert_entry(
        &mut self,
        pool: &mut BufferPoolManager,
        key: &ScalarKey,
        rid: RecordId,
    ) -> RoostResult<()> {
        self.tree.insert(pool, K::from_scalar(key)?, rid)
    }

    fn start_scan(
        &mut self,
        pool: &mut BufferPoolManager,
        low: &ScalarKey,
        low_op: ScanOperator,
        high: &ScalarKey,
        high_op: ScanOperator,
    ) -> RoostResult<()> {
        if let Some(scan) = self.scan.take() {
            scan.end(pool)?;
        }
        let scan = RangeScan::start(
            &self.tree,
            pool,
            K::from_scalar(low)?,
            low_op,
            K::from_scalar(high)?,
            high_op,
        )?;
        self.scan = Some(scan);
        Ok(())
    }

    fn scan_next(&mut self, pool: &mut BufferPoolManager) -> RoostResult<RecordId> {
        self.scan
            .as_mut()
            .ok_or(RoostError::ScanNotInitialized)?
            .next(pool)
    }

    fn end_scan(&mut self, pool: &mut BufferPoolManager) -> RoostResult<()> {
        self.scan
            .take()
            .ok_or(RoostError::ScanNotInitialized)?
            .end(pool)
    }

    fn end_scan_if_active(&mut self, pool: &mut BufferPoolManager) {
        if let Some(scan) = self.scan.take() {
            if let Err(e) = scan.end(pool) {
                error!("failed to end scan while closing index: {}", e);
            }
        }
    }
}

/// Tagged variant over the three key types; each arm stays monomorphic.
#[derive(Debug)]
enum TypedIndex {
    Int32(TreeState<i32>),
    Float64(TreeState<f64>),
    Char10(TreeState<Char10>),
}

macro_rules! with_tree {
    ($self:expr, $state:ident => $body:expr) => {
        match &mut $self.inner {
            TypedIndex::Int32($state) => $body,
            TypedIndex::Float64($state) => $body,
            TypedIndex::Char10($state) => $body,
        }
    };
}

/// A persistent B+ tree index over one fixed-width attribute of a
/// relation. The index file name is derived from the relation name and
/// attribute offset; opening an existing file validates its metadata,
/// creating a fresh one bulk-loads every record of the relation.
#[derive(Debug)]
pub struct BTreeIndex {
    index_file_name: String,
    key_type: KeyType,
    buffer_pool: BufferPoolManager,
    inner: TypedIndex,
}

impl BTreeIndex {
    pub fn open(
        dir: &Path,
        relation: &mut HeapFile,
        attr_byte_offset: u32,
        key_type: KeyType,
        options: IndexOptions,
    ) -> RoostResult<Self> {
        let index_file_name = format!("{}.{}", relation.name(), attr_byte_offset);
        let index_path = dir.join(&index_file_name);
        let exists = index_path.exists();
        let disk = DiskManager::open(&index_path)?;
        let mut pool = BufferPoolManager::new(options.buffer_pool, disk);

        let meta = if exists {
            let meta = {
                let page = pool.fetch_page(META_PAGE_ID)?;
                IndexMetaPageCodec::decode(page.data())?.0
            };
            pool.unpin_page(META_PAGE_ID, false)?;
            if meta.relation_name != relation.name()
                || meta.attr_byte_offset != attr_byte_offset
                || meta.key_type != key_type
            {
                return Err(RoostError::BadIndexInfo(format!(
                    "index file {} holds ({}, {}, {:?}), requested ({}, {}, {:?})",
                    index_file_name,
                    meta.relation_name,
                    meta.attr_byte_offset,
                    meta.key_type,
                    relation.name(),
                    attr_byte_offset,
                    key_type
                )));
            }
            debug!("opened existing index {}", index_file_name);
            meta
        } else {
            let (leaf_max_size, internal_max_size) = match key_type {
                KeyType::Int32 => BTree::<i32>::resolve_capacities(&options.btree),
                KeyType::Float64 => BTree::<f64>::resolve_capacities(&options.btree),
                KeyType::Char10 => BTree::<Char10>::resolve_capacities(&options.btree),
            };
            let (meta_page_id, _) = pool.new_page()?;
            debug_assert_eq!(meta_page_id, META_PAGE_ID);
            // the freshly allocated root page is zeroed, which is exactly
            // the empty-root sentinel
            let (root_page_id, _) = pool.new_page()?;
            let meta = IndexMetaPage::try_new(
                relation.name(),
                key_type,
                attr_byte_offset,
                root_page_id,
                leaf_max_size,
                internal_max_size,
            )?;
            pool.apply_page_image(META_PAGE_ID, &IndexMetaPageCodec::encode(&meta))?;
            pool.unpin_page(META_PAGE_ID, true)?;
            pool.unpin_page(root_page_id, true)?;
            debug!(
                "created index {} with leaf/internal capacities {}/{}",
                index_file_name, leaf_max_size, internal_max_size
            );
            meta
        };

        let inner = match key_type {
            KeyType::Int32 => TypedIndex::Int32(TreeState::new(BTree::new(
                meta.root_page_id,
                meta.leaf_max_size,
                meta.internal_max_size,
            ))),
            KeyType::Float64 => TypedIndex::Float64(TreeState::new(BTree::new(
                meta.root_page_id,
                meta.leaf_max_size,
                meta.internal_max_size,
            ))),
            KeyType::Char10 => TypedIndex::Char10(TreeState::new(BTree::new(
                meta.root_page_id,
                meta.leaf_max_size,
                meta.internal_max_size,
            ))),
        };
        let mut index = Self {
            index_file_name,
            key_type,
            buffer_pool: pool,
            inner,
        };
        if !exists {
            let pool = &mut index.buffer_pool;
            match &mut index.inner {
                TypedIndex::Int32(state) => state.bulk_load(pool, relation, attr_byte_offset)?,
                TypedIndex::Float64(state) => state.bulk_load(pool, relation, attr_byte_offset)?,
                TypedIndex::Char10(state) => state.bulk_load(pool, relation, attr_byte_offset)?,
            }
        }
        Ok(index)
    }

    /// The file name this index lives under, derived from the relation
    /// name and attribute offset.
    pub fn index_file_name(&self) -> &str {
        &self.index_file_name
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Inserts one (key, rid) entry. Duplicates are stored again.
    pub fn insert_entry(
        &mut self,
        key: impl Into<ScalarKey>,
        rid: RecordId,
    ) -> RoostResult<()> {
        let key = key.into();
        let pool = &mut self.buffer_pool;
        with_tree!(self, state => state.insert_entry(pool, &key, rid))
    }

    /// Opens a range scan over `(low, high)` under the given operators.
    /// An already-executing scan is ended first.
    pub fn start_scan(
        &mut self,
        low: impl Into<ScalarKey>,
        low_op: ScanOperator,
        high: impl Into<ScalarKey>,
        high_op: ScanOperator,
    ) -> RoostResult<()> {
        let (low, high) = (low.into(), high.into());
        let pool = &mut self.buffer_pool;
        with_tree!(self, state => state.start_scan(pool, &low, low_op, &high, high_op))
    }

    /// The RID of the next entry in the range, in ascending key order.
    pub fn scan_next(&mut self) -> RoostResult<RecordId> {
        let pool = &mut self.buffer_pool;
        with_tree!(self, state => state.scan_next(pool))
    }

    pub fn end_scan(&mut self) -> RoostResult<()> {
        let pool = &mut self.buffer_pool;
        with_tree!(self, state => state.end_scan(pool))
    }

    /// Writes every dirty page back to disk.
    pub fn flush(&mut self) -> RoostResult<()> {
        self.buffer_pool.flush_all_pages()
    }
}

impl Drop for BTreeIndex {
    fn drop(&mut self) {
        let pool = &mut self.buffer_pool;
        with_tree!(self, state => state.end_scan_if_active(pool));
        if let Err(e) = self.buffer_pool.flush_all_pages() {
            error!("failed to flush index {} on close: {}", self.index_file_name, e);
        }
    }
}
