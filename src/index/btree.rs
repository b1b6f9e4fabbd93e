use std::cmp::Ordering;
use std::marker::PhantomData;

use log::debug;

use crate::buffer::{BufferPoolManager, PageId, INVALID_PAGE_ID};
use crate::config::BTreeConfig;
use crate::error::RoostResult;
use crate::index::codec::{IndexMetaPageCodec, InternalNodeCodec, LeafNodeCodec};
use crate::index::key::IndexKey;
use crate::index::page::{InternalNode, LeafNode, META_PAGE_ID};
use crate::storage::heap_file::RecordId;

// below this, a split could leave a non-leaf with zero keys
const MIN_LEAF_SIZE: u32 = 2;
const MIN_INTERNAL_SIZE: u32 = 4;

/// One step of a root-to-leaf descent: the non-leaf visited and the child
/// immediately right of the one taken (0 when the rightmost child was
/// taken). The neighbor becomes the chain link of a leaf created by
/// splitting at the bottom of this path.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PathEntry {
    pub page_id: PageId,
    pub right_neighbor: PageId,
}

/// Monomorphic B+ tree core for one key type. Holds no pages itself; every
/// operation reads and writes nodes through the buffer pool, pairing each
/// pin with exactly one unpin.
#[derive(Debug)]
pub(crate) struct BTree<K: IndexKey> {
    pub root_page_id: PageId,
    pub leaf_max_size: u32,
    pub internal_max_size: u32,
    _marker: PhantomData<K>,
}

impl<K: IndexKey> BTree<K> {
    pub fn new(root_page_id: PageId, leaf_max_size: u32, internal_max_size: u32) -> Self {
        Self {
            root_page_id,
            leaf_max_size,
            internal_max_size,
            _marker: PhantomData,
        }
    }

    /// Node capacities for this key type: derived from the page layout,
    /// with overrides clamped to what actually fits.
    pub fn resolve_capacities(config: &BTreeConfig) -> (u32, u32) {
        let leaf_cap = LeafNode::<K>::max_capacity();
        let internal_cap = InternalNode::<K>::max_capacity();
        let leaf = config
            .leaf_max_size
            .unwrap_or(leaf_cap)
            .clamp(MIN_LEAF_SIZE, leaf_cap);
        let internal = config
            .internal_max_size
            .unwrap_or(internal_cap)
            .clamp(MIN_INTERNAL_SIZE, internal_cap);
        (leaf, internal)
    }

    pub(crate) fn read_leaf(
        pool: &mut BufferPoolManager,
        page_id: PageId,
    ) -> RoostResult<LeafNode<K>> {
        let page = pool.fetch_page(page_id)?;
        Ok(LeafNodeCodec::decode::<K>(page.data())?.0)
    }

    pub(crate) fn read_internal(
        pool: &mut BufferPoolManager,
        page_id: PageId,
    ) -> RoostResult<InternalNode<K>> {
        let page = pool.fetch_page(page_id)?;
        Ok(InternalNodeCodec::decode::<K>(page.data())?.0)
    }

    /// Descends from the root to the leaf that would hold `key`, unpinning
    /// every non-leaf on the way. When `path` is given, each visited
    /// non-leaf and its right-neighbor child are recorded for upward split
    /// propagation. Returns 0 when the tree has no leaf yet.
    pub fn find_leaf(
        &self,
        pool: &mut BufferPoolManager,
        key: &K,
        mut path: Option<&mut Vec<PathEntry>>,
    ) -> RoostResult<PageId> {
        let mut current_page_id = self.root_page_id;
        loop {
            let node = Self::read_internal(pool, current_page_id)?;
            pool.unpin_page(current_page_id, false)?;
            if node.level == 0 {
                // empty-root sentinel: the sole child (if any) is a leaf
                if let Some(path) = path.as_mut() {
                    path.push(PathEntry {
                        page_id: current_page_id,
                        right_neighbor: INVALID_PAGE_ID,
                    });
                }
                return Ok(node.children[0]);
            }
            let child_pos = node.child_index(key);
            let right_neighbor = if child_pos < node.keys.len() {
                node.children[child_pos + 1]
            } else {
                INVALID_PAGE_ID
            };
            if let Some(path) = path.as_mut() {
                path.push(PathEntry {
                    page_id: current_page_id,
                    right_neighbor,
                });
            }
            let child = node.children[child_pos];
            if node.level == 1 {
                return Ok(child);
            }
            current_page_id = child;
        }
    }

    /// Inserts one entry. Duplicate (key, rid) pairs are stored again, not
    /// deduplicated.
    pub fn insert(
        &mut self,
        pool: &mut BufferPoolManager,
        key: K,
        rid: RecordId,
    ) -> RoostResult<()> {
        let mut path = Vec::new();
        let leaf_page_id = self.find_leaf(pool, &key, Some(&mut path))?;
        if leaf_page_id == INVALID_PAGE_ID {
            return self.start_first_leaf(pool, key, rid);
        }

        let mut leaf = Self::read_leaf(pool, leaf_page_id)?;
        if (leaf.entries.len() as u32) < self.leaf_max_size {
            leaf.insert(key, rid);
            pool.apply_page_image(leaf_page_id, &LeafNodeCodec::encode(&leaf))?;
            pool.unpin_page(leaf_page_id, true)?;
            return Ok(());
        }

        let (new_leaf_id, _) = pool.new_page()?;
        let (mut right, separator) = leaf.split(new_leaf_id);
        if key.key_cmp(&separator) == Ordering::Less {
            leaf.insert(key, rid);
        } else {
            right.insert(key, rid);
        }
        // The recorded neighbor keeps the chain ordered when the split
        // happens mid-parent; at a parent's rightmost child nothing was
        // recorded and the old link already points at the next parent's
        // first leaf.
        if let Some(step) = path.last() {
            if step.right_neighbor != INVALID_PAGE_ID {
                right.next_page_id = step.right_neighbor;
            }
        }
        debug!(
            "split leaf {}, new leaf {}, separator {:?}",
            leaf_page_id, new_leaf_id, separator
        );
        pool.apply_page_image(leaf_page_id, &LeafNodeCodec::encode(&leaf))?;
        pool.unpin_page(leaf_page_id, true)?;
        pool.apply_page_image(new_leaf_id, &LeafNodeCodec::encode(&right))?;
        pool.unpin_page(new_leaf_id, true)?;

        // propagate the separator up the recorded path
        let mut pending = Some((separator, new_leaf_id));
        while let Some((sep, child_id)) = pending.take() {
            let Some(step) = path.pop() else {
                pending = Some((sep, child_id));
                break;
            };
            let mut parent = Self::read_internal(pool, step.page_id)?;
            if (parent.keys.len() as u32) < self.internal_max_size {
                parent.insert(sep, child_id);
                if parent.level == 0 {
                    // the sentinel root just gained a second leaf
                    parent.level = 1;
                }
                pool.apply_page_image(step.page_id, &InternalNodeCodec::encode(&parent))?;
                pool.unpin_page(step.page_id, true)?;
            } else {
                let (new_internal_id, _) = pool.new_page()?;
                let (mut right_node, promoted) = parent.split();
                match sep.key_cmp(&promoted) {
                    Ordering::Less => parent.insert(sep, child_id),
                    _ => right_node.insert(sep, child_id),
                }
                debug!(
                    "split internal {}, new internal {}, promoted {:?}",
                    step.page_id, new_internal_id, promoted
                );
                pool.apply_page_image(step.page_id, &InternalNodeCodec::encode(&parent))?;
                pool.unpin_page(step.page_id, true)?;
                pool.apply_page_image(new_internal_id, &InternalNodeCodec::encode(&right_node))?;
                pool.unpin_page(new_internal_id, true)?;
                pending = Some((promoted, new_internal_id));
            }
        }

        if let Some((separator, right_child)) = pending {
            self.grow_root(pool, separator, right_child)?;
        }
        Ok(())
    }

    /// First entry of a fresh index: create the first leaf and hang it off
    /// the sentinel root.
    fn start_first_leaf(
        &mut self,
        pool: &mut BufferPoolManager,
        key: K,
        rid: RecordId,
    ) -> RoostResult<()> {
        let (leaf_page_id, _) = pool.new_page()?;
        let mut leaf = LeafNode::new();
        leaf.entries.push((key, rid));
        pool.apply_page_image(leaf_page_id, &LeafNodeCodec::encode(&leaf))?;
        pool.unpin_page(leaf_page_id, true)?;

        let mut root = Self::read_internal(pool, self.root_page_id)?;
        root.children[0] = leaf_page_id;
        pool.apply_page_image(self.root_page_id, &InternalNodeCodec::encode(&root))?;
        pool.unpin_page(self.root_page_id, true)?;
        debug!("created first leaf {}", leaf_page_id);
        Ok(())
    }

    /// The root itself split: allocate a replacement root one level up and
    /// publish its id through the metadata page.
    fn grow_root(
        &mut self,
        pool: &mut BufferPoolManager,
        separator: K,
        right_child: PageId,
    ) -> RoostResult<()> {
        let old_root_id = self.root_page_id;
        let old_level = {
            let node = Self::read_internal(pool, old_root_id)?;
            pool.unpin_page(old_root_id, false)?;
            node.level
        };
        let (new_root_id, _) = pool.new_page()?;
        let new_root = InternalNode {
            level: old_level + 1,
            keys: vec![separator],
            children: vec![old_root_id, right_child],
        };
        pool.apply_page_image(new_root_id, &InternalNodeCodec::encode(&new_root))?;
        pool.unpin_page(new_root_id, true)?;
        self.root_page_id = new_root_id;

        let meta_page = pool.fetch_page(META_PAGE_ID)?;
        let (mut meta, _) = IndexMetaPageCodec::decode(meta_page.data())?;
        meta.root_page_id = new_root_id;
        pool.apply_page_image(META_PAGE_ID, &IndexMetaPageCodec::encode(&meta))?;
        pool.unpin_page(META_PAGE_ID, true)?;
        debug!(
            "root grew to level {}: {} replaces {}",
            old_level + 1,
            new_root_id,
            old_root_id
        );
        Ok(())
    }

    /// Every entry in leaf-chain order, from the leftmost leaf.
    pub fn walk_leaf_chain(
        &self,
        pool: &mut BufferPoolManager,
    ) -> RoostResult<Vec<(K, RecordId)>> {
        let mut entries = Vec::new();
        let mut page_id = self.leftmost_leaf(pool)?;
        while page_id != INVALID_PAGE_ID {
            let leaf = Self::read_leaf(pool, page_id)?;
            pool.unpin_page(page_id, false)?;
            entries.extend(leaf.entries.iter().copied());
            page_id = leaf.next_page_id;
        }
        Ok(entries)
    }

    fn leftmost_leaf(&self, pool: &mut BufferPoolManager) -> RoostResult<PageId> {
        let mut current_page_id = self.root_page_id;
        loop {
            let node = Self::read_internal(pool, current_page_id)?;
            pool.unpin_page(current_page_id, false)?;
            if node.level <= 1 {
                return Ok(node.children[0]);
            }
            current_page_id = node.children[0];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferPoolConfig;
    use crate::index::key::KeyType;
    use crate::index::page::IndexMetaPage;
    use crate::storage::disk_manager::DiskManager;
    use tempfile::TempDir;

    fn setup_tree(
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> (TempDir, BufferPoolManager, BTree<i32>) {
        let dir = TempDir::new().unwrap();
        let disk = DiskManager::open(&dir.path().join("tree.idx")).unwrap();
        let mut pool = BufferPoolManager::new(BufferPoolConfig::default(), disk);

        let (meta_page_id, _) = pool.new_page().unwrap();
        assert_eq!(meta_page_id, META_PAGE_ID);
        let (root_page_id, _) = pool.new_page().unwrap();
        let meta = IndexMetaPage::try_new(
            "t",
            KeyType::Int32,
            0,
            root_page_id,
            leaf_max_size,
            internal_max_size,
        )
        .unwrap();
        pool.apply_page_image(META_PAGE_ID, &IndexMetaPageCodec::encode(&meta))
            .unwrap();
        pool.unpin_page(META_PAGE_ID, true).unwrap();
        pool.unpin_page(root_page_id, true).unwrap();

        let tree = BTree::new(root_page_id, leaf_max_size, internal_max_size);
        (dir, pool, tree)
    }

    fn rid(n: i32) -> RecordId {
        RecordId::new(n as u32 + 1, 0)
    }

    /// Recursively checks ordering, separator bounds, uniform leaf depth
    /// and child levels below `page_id`; returns the leaf depth.
    fn check_subtree(
        pool: &mut BufferPoolManager,
        page_id: PageId,
        level: u32,
        low: Option<i32>,
        high: Option<i32>,
    ) -> usize {
        if level == 0 {
            let leaf = BTree::<i32>::read_leaf(pool, page_id).unwrap();
            pool.unpin_page(page_id, false).unwrap();
            let keys: Vec<i32> = leaf.entries.iter().map(|(k, _)| *k).collect();
            let mut sorted = keys.clone();
            sorted.sort();
            assert_eq!(keys, sorted, "leaf {} out of order", page_id);
            for key in keys {
                assert!(low.map_or(true, |b| key >= b), "leaf {} below bound", page_id);
                assert!(high.map_or(true, |b| key < b), "leaf {} above bound", page_id);
            }
            return 1;
        }
        let node = BTree::<i32>::read_internal(pool, page_id).unwrap();
        pool.unpin_page(page_id, false).unwrap();
        assert_eq!(node.level, level);
        let mut sorted = node.keys.clone();
        sorted.sort();
        assert_eq!(node.keys, sorted, "internal {} out of order", page_id);
        let mut depths = Vec::new();
        for (pos, child) in node.children.iter().enumerate() {
            let child_low = if pos == 0 { low } else { Some(node.keys[pos - 1]) };
            let child_high = if pos == node.keys.len() {
                high
            } else {
                Some(node.keys[pos])
            };
            depths.push(check_subtree(pool, *child, level - 1, child_low, child_high));
        }
        assert!(
            depths.windows(2).all(|w| w[0] == w[1]),
            "leaves at unequal depth under {}",
            page_id
        );
        depths[0] + 1
    }

    fn check_tree(pool: &mut BufferPoolManager, tree: &BTree<i32>, expected_keys: &[i32]) {
        let root = BTree::<i32>::read_internal(pool, tree.root_page_id).unwrap();
        pool.unpin_page(tree.root_page_id, false).unwrap();
        if !root.is_empty_root() && root.level > 0 {
            check_subtree(pool, tree.root_page_id, root.level, None, None);
        }
        let chain: Vec<i32> = tree
            .walk_leaf_chain(pool)
            .unwrap()
            .iter()
            .map(|(k, _)| *k)
            .collect();
        let mut sorted = expected_keys.to_vec();
        sorted.sort();
        assert_eq!(chain, sorted);
    }

    #[test]
    fn first_insert_creates_leaf_under_sentinel() {
        let (_dir, mut pool, mut tree) = setup_tree(4, 4);
        tree.insert(&mut pool, 42, rid(42)).unwrap();
        let root = BTree::<i32>::read_internal(&mut pool, tree.root_page_id).unwrap();
        pool.unpin_page(tree.root_page_id, false).unwrap();
        assert_eq!(root.level, 0);
        assert_ne!(root.children[0], INVALID_PAGE_ID);
        check_tree(&mut pool, &tree, &[42]);
    }

    #[test]
    fn sentinel_root_becomes_level_one_on_first_split() {
        let (_dir, mut pool, mut tree) = setup_tree(4, 4);
        for key in 0..5 {
            tree.insert(&mut pool, key, rid(key)).unwrap();
        }
        let root = BTree::<i32>::read_internal(&mut pool, tree.root_page_id).unwrap();
        pool.unpin_page(tree.root_page_id, false).unwrap();
        assert_eq!(root.level, 1);
        assert_eq!(root.keys.len(), 1);
        check_tree(&mut pool, &tree, &(0..5).collect::<Vec<_>>());
    }

    #[test]
    fn cascading_splits_grow_the_root() {
        let (_dir, mut pool, mut tree) = setup_tree(4, 4);
        let original_root = tree.root_page_id;
        let keys: Vec<i32> = (0..200).collect();
        for &key in &keys {
            tree.insert(&mut pool, key, rid(key)).unwrap();
        }
        assert_ne!(tree.root_page_id, original_root);
        let root = BTree::<i32>::read_internal(&mut pool, tree.root_page_id).unwrap();
        pool.unpin_page(tree.root_page_id, false).unwrap();
        assert!(root.level >= 2, "expected at least one internal split");
        check_tree(&mut pool, &tree, &keys);

        // the metadata page tracks the new root
        let meta_page = pool.fetch_page(META_PAGE_ID).unwrap();
        let (meta, _) = IndexMetaPageCodec::decode(meta_page.data()).unwrap();
        pool.unpin_page(META_PAGE_ID, false).unwrap();
        assert_eq!(meta.root_page_id, tree.root_page_id);
    }

    #[test]
    fn descending_inserts_keep_the_chain_ordered() {
        let (_dir, mut pool, mut tree) = setup_tree(4, 4);
        let keys: Vec<i32> = (0..100).rev().collect();
        for &key in &keys {
            tree.insert(&mut pool, key, rid(key)).unwrap();
        }
        check_tree(&mut pool, &tree, &keys);
    }

    #[test]
    fn interleaved_inserts_keep_the_chain_ordered() {
        let (_dir, mut pool, mut tree) = setup_tree(4, 4);
        // odds first, then evens, so later splits land mid-parent
        let mut keys: Vec<i32> = (0..120).filter(|k| k % 2 == 1).collect();
        keys.extend((0..120).filter(|k| k % 2 == 0));
        for &key in &keys {
            tree.insert(&mut pool, key, rid(key)).unwrap();
        }
        check_tree(&mut pool, &tree, &keys);
    }

    #[test]
    fn duplicate_pairs_are_stored_twice() {
        let (_dir, mut pool, mut tree) = setup_tree(4, 4);
        for _ in 0..3 {
            tree.insert(&mut pool, 7, rid(7)).unwrap();
        }
        let chain = tree.walk_leaf_chain(&mut pool).unwrap();
        assert_eq!(chain.len(), 3);
        assert!(chain.iter().all(|(k, r)| *k == 7 && *r == rid(7)));
    }

    #[test]
    fn capacities_are_clamped_to_page_fit() {
        let config = BTreeConfig {
            leaf_max_size: Some(1_000_000),
            internal_max_size: Some(1),
        };
        let (leaf, internal) = BTree::<i32>::resolve_capacities(&config);
        assert_eq!(leaf, LeafNode::<i32>::max_capacity());
        assert_eq!(internal, MIN_INTERNAL_SIZE);

        let (leaf, internal) = BTree::<f64>::resolve_capacities(&BTreeConfig::default());
        assert_eq!(leaf, LeafNode::<f64>::max_capacity());
        assert_eq!(internal, InternalNode::<f64>::max_capacity());
    }
}
