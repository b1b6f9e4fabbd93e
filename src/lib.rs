//! Disk-backed B+ tree index over one fixed-width attribute of a
//! record-oriented relation.
//!
//! An index maps keys extracted at a fixed byte offset of each relation
//! record to the record ids holding them, and answers bounded range scans
//! by walking the leaf sibling chain. All node access flows through a
//! fixed-capacity buffer pool with explicit pin/unpin and dirty tracking.
//!
//! ```no_run
//! use roost::{BTreeIndex, HeapFile, IndexOptions, KeyType, ScanOperator};
//!
//! # fn main() -> roost::RoostResult<()> {
//! let dir = std::path::Path::new("/tmp/roost");
//! let mut relation = HeapFile::open(dir, "employees")?;
//! let mut index = BTreeIndex::open(
//!     dir,
//!     &mut relation,
//!     0,
//!     KeyType::Int32,
//!     IndexOptions::default(),
//! )?;
//!
//! index.start_scan(100, ScanOperator::Gte, 200, ScanOperator::Lte)?;
//! while let Ok(rid) = index.scan_next() {
//!     println!("matched record {}", rid);
//! }
//! index.end_scan()?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod index;
pub mod storage;

pub use config::{BTreeConfig, BufferPoolConfig, IndexOptions};
pub use error::{RoostError, RoostResult};
pub use index::{BTreeIndex, Char10, KeyType, ScalarKey, ScanOperator};
pub use storage::{HeapFile, RecordId};
