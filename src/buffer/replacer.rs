use std::collections::{HashMap, VecDeque};

use crate::buffer::FrameId;
use crate::error::{RoostError, RoostResult};

pub trait Replacer {
    fn record_access(&mut self, frame_id: FrameId) -> RoostResult<()>;

    fn evict(&mut self) -> Option<FrameId>;

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) -> RoostResult<()>;

    fn remove(&mut self, frame_id: FrameId);

    fn size(&self) -> usize;
}

#[derive(Debug)]
struct LruKNode {
    // last k access timestamps, oldest first
    history: VecDeque<u64>,
    is_evictable: bool,
}

/// LRU-K eviction: frames with fewer than k recorded accesses have infinite
/// backward k-distance and are evicted first, oldest access first; among
/// frames with full history the one with the largest k-distance loses.
#[derive(Debug)]
pub struct LruKReplacer {
    current_size: usize,
    replacer_size: usize,
    k: usize,
    node_store: HashMap<FrameId, LruKNode>,
    current_timestamp: u64,
}

impl LruKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        Self {
            current_size: 0,
            replacer_size: num_frames,
            k,
            node_store: HashMap::with_capacity(num_frames),
            current_timestamp: 0,
        }
    }
}

impl Replacer for LruKReplacer {
    fn record_access(&mut self, frame_id: FrameId) -> RoostResult<()> {
        if let Some(node) = self.node_store.get_mut(&frame_id) {
            node.history.push_back(self.current_timestamp);
            if node.history.len() > self.k {
                node.history.pop_front();
            }
        } else {
            if self.node_store.len() >= self.replacer_size {
                return Err(RoostError::Internal(
                    "frame count exceeds the replacer limit".to_string(),
                ));
            }
            let mut node = LruKNode {
                history: VecDeque::with_capacity(self.k),
                is_evictable: false,
            };
            node.history.push_back(self.current_timestamp);
            self.node_store.insert(frame_id, node);
        }
        self.current_timestamp += 1;
        Ok(())
    }

    fn evict(&mut self) -> Option<FrameId> {
        let mut victim: Option<FrameId> = None;
        let mut victim_inf = false;
        let mut victim_rank = 0u64;
        for (frame_id, node) in self.node_store.iter() {
            if !node.is_evictable {
                continue;
            }
            let Some(&oldest) = node.history.front() else {
                continue;
            };
            let inf = node.history.len() < self.k;
            // infinite-distance frames beat finite ones; within a class the
            // oldest first access (largest distance) wins
            let rank = if inf {
                u64::MAX - oldest
            } else {
                self.current_timestamp - oldest
            };
            let better = match (inf, victim_inf) {
                (true, false) => true,
                (false, true) => false,
                _ => rank > victim_rank,
            };
            if victim.is_none() || better {
                victim = Some(*frame_id);
                victim_inf = inf;
                victim_rank = rank;
            }
        }
        if let Some(frame_id) = victim {
            self.remove(frame_id);
        }
        victim
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) -> RoostResult<()> {
        let Some(node) = self.node_store.get_mut(&frame_id) else {
            return Err(RoostError::Internal(format!(
                "frame {} not tracked by the replacer",
                frame_id
            )));
        };
        let was = node.is_evictable;
        node.is_evictable = evictable;
        if evictable && !was {
            self.current_size += 1;
        } else if !evictable && was {
            self.current_size -= 1;
        }
        Ok(())
    }

    fn remove(&mut self, frame_id: FrameId) {
        if let Some(node) = self.node_store.remove(&frame_id) {
            debug_assert!(node.is_evictable, "evicting a pinned frame");
            self.current_size -= 1;
        }
    }

    fn size(&self) -> usize {
        self.current_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_evictable_tracks_size() {
        let mut replacer = LruKReplacer::new(3, 2);
        replacer.record_access(1).unwrap();
        replacer.set_evictable(1, true).unwrap();
        assert_eq!(replacer.size(), 1);
        replacer.set_evictable(1, false).unwrap();
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn evict_prefers_largest_k_distance() {
        let mut replacer = LruKReplacer::new(2, 3);
        replacer.record_access(1).unwrap(); // ts=0
        replacer.record_access(2).unwrap(); // ts=1
        replacer.record_access(2).unwrap(); // ts=2
        replacer.record_access(1).unwrap(); // ts=3
        replacer.record_access(2).unwrap(); // ts=4
        replacer.record_access(1).unwrap(); // ts=5
        replacer.set_evictable(1, true).unwrap();
        replacer.set_evictable(2, true).unwrap();
        // frame 1 history [0,3,5] vs frame 2 history [1,2,4]
        assert_eq!(replacer.evict(), Some(1));
    }

    #[test]
    fn evict_prefers_infinite_distance_oldest_first() {
        let mut replacer = LruKReplacer::new(3, 3);
        replacer.record_access(1).unwrap(); // ts=0
        replacer.record_access(2).unwrap(); // ts=1, history < k
        replacer.record_access(3).unwrap(); // ts=2, history < k
        replacer.record_access(1).unwrap();
        replacer.record_access(1).unwrap(); // frame 1 has full history
        replacer.record_access(3).unwrap();
        replacer.set_evictable(1, true).unwrap();
        replacer.set_evictable(2, true).unwrap();
        replacer.set_evictable(3, true).unwrap();
        // frames 2 and 3 both have infinite distance; 2 was touched first
        assert_eq!(replacer.evict(), Some(2));
        assert_eq!(replacer.evict(), Some(3));
        assert_eq!(replacer.evict(), Some(1));
        assert_eq!(replacer.evict(), None);
    }
}
