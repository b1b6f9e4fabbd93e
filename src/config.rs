#[derive(Debug, Clone, Copy)]
pub struct BufferPoolConfig {
    pub buffer_pool_size: usize,
    pub lru_k_k: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        BufferPoolConfig {
            buffer_pool_size: 512,
            lru_k_k: 2,
        }
    }
}

/// Node fan-out control. `None` derives the largest capacity that fits a
/// page for the index's key type; `Some` overrides are clamped to that
/// maximum, with a floor small enough nodes can still split cleanly.
#[derive(Debug, Clone, Copy, Default)]
pub struct BTreeConfig {
    pub leaf_max_size: Option<u32>,
    pub internal_max_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    pub buffer_pool: BufferPoolConfig,
    pub btree: BTreeConfig,
}
