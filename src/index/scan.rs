use std::cmp::Ordering;

use crate::buffer::{BufferPoolManager, PageId, INVALID_PAGE_ID};
use crate::error::{RoostError, RoostResult};
use crate::index::btree::BTree;
use crate::index::key::IndexKey;
use crate::index::page::LeafNode;
use crate::storage::heap_file::RecordId;

/// Range scan comparison operators. `start_scan` accepts `Gt`/`Gte` for
/// the low bound and `Lt`/`Lte` for the high bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOperator {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ScanOperator {
    fn admits_low<K: IndexKey>(self, key: &K, bound: &K) -> bool {
        match self {
            ScanOperator::Gt => key.key_cmp(bound) == Ordering::Greater,
            ScanOperator::Gte => key.key_cmp(bound) != Ordering::Less,
            _ => false,
        }
    }

    fn admits_high<K: IndexKey>(self, key: &K, bound: &K) -> bool {
        match self {
            ScanOperator::Lt => key.key_cmp(bound) == Ordering::Less,
            ScanOperator::Lte => key.key_cmp(bound) != Ordering::Greater,
            _ => false,
        }
    }
}

/// An executing range scan. The current leaf stays pinned between calls;
/// its decoded image is cursored by `next_entry` (-1 once the scan has
/// walked off the end of the chain).
#[derive(Debug)]
pub(crate) struct RangeScan<K: IndexKey> {
    high: K,
    high_op: ScanOperator,
    leaf_page_id: PageId,
    leaf: LeafNode<K>,
    next_entry: i64,
}

impl<K: IndexKey> RangeScan<K> {
    /// Positions a scan on the first entry satisfying the low predicate.
    /// Fails with `NoSuchKeyFound` when no entry matches; every failure
    /// path leaves no page pinned.
    pub fn start(
        tree: &BTree<K>,
        pool: &mut BufferPoolManager,
        low: K,
        low_op: ScanOperator,
        high: K,
        high_op: ScanOperator,
    ) -> RoostResult<Self> {
        if !matches!(low_op, ScanOperator::Gt | ScanOperator::Gte)
            || !matches!(high_op, ScanOperator::Lt | ScanOperator::Lte)
        {
            return Err(RoostError::BadOpcodes);
        }
        if low.key_cmp(&high) == Ordering::Greater {
            return Err(RoostError::BadScanRange);
        }

        let mut leaf_page_id = tree.find_leaf(pool, &low, None)?;
        if leaf_page_id == INVALID_PAGE_ID {
            return Err(RoostError::NoSuchKeyFound);
        }
        let mut leaf = BTree::<K>::read_leaf(pool, leaf_page_id)?;
        let mut start_pos = leaf
            .entries
            .iter()
            .position(|(k, _)| low_op.admits_low(k, &low));
        if start_pos.is_none() {
            // the descent lands on the low bound's leaf or its immediate
            // predecessor, so one sibling hop settles it either way
            let right = leaf.next_page_id;
            pool.unpin_page(leaf_page_id, false)?;
            if right == INVALID_PAGE_ID {
                return Err(RoostError::NoSuchKeyFound);
            }
            leaf_page_id = right;
            leaf = BTree::<K>::read_leaf(pool, leaf_page_id)?;
            start_pos = leaf
                .entries
                .iter()
                .position(|(k, _)| low_op.admits_low(k, &low));
        }
        let Some(pos) = start_pos else {
            pool.unpin_page(leaf_page_id, false)?;
            return Err(RoostError::NoSuchKeyFound);
        };
        if !high_op.admits_high(&leaf.entries[pos].0, &high) {
            pool.unpin_page(leaf_page_id, false)?;
            return Err(RoostError::NoSuchKeyFound);
        }
        Ok(Self {
            high,
            high_op,
            leaf_page_id,
            leaf,
            next_entry: pos as i64,
        })
    }

    /// Emits the RID at the cursor and advances along the leaf chain. A
    /// completed scan fails with `IndexScanCompleted` but stays active
    /// until `end` releases it.
    pub fn next(&mut self, pool: &mut BufferPoolManager) -> RoostResult<RecordId> {
        if self.next_entry < 0 {
            return Err(RoostError::IndexScanCompleted);
        }
        let (key, rid) = self.leaf.entries[self.next_entry as usize];
        if !self.high_op.admits_high(&key, &self.high) {
            return Err(RoostError::IndexScanCompleted);
        }
        if (self.next_entry as usize) + 1 < self.leaf.entries.len() {
            self.next_entry += 1;
        } else {
            let right = self.leaf.next_page_id;
            if right == INVALID_PAGE_ID {
                self.next_entry = -1;
            } else {
                pool.unpin_page(self.leaf_page_id, false)?;
                self.leaf_page_id = right;
                self.leaf = BTree::<K>::read_leaf(pool, right)?;
                self.next_entry = 0;
            }
        }
        Ok(rid)
    }

    /// Releases the scan's pin. Consuming `self` makes a second end
    /// structurally impossible; the caller maps an absent scan to
    /// `ScanNotInitialized`.
    pub fn end(self, pool: &mut BufferPoolManager) -> RoostResult<()> {
        pool.unpin_page(self.leaf_page_id, false)
    }
}
