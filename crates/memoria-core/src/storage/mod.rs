//! Concrete collaborators named but left external by : the node
//! store, vector index, and full-text index. `memoria-core`'s logic only
//! ever talks to them through `crate::ports`; these are one reference
//! implementation of those ports, not part of the core's contract.

pub mod bm25_index;
pub mod redb_store;
pub mod vector_index;

pub use bm25_index::Bm25Index;
pub use redb_store::RedbStore;
pub use vector_index::FlatVectorIndex;
