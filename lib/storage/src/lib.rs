pub mod manager;
pub mod lmdb_storage;
pub mod memory;
pub mod store;

pub use manager::StorageManager;
pub use lmdb_storage::LmdbStorage;
pub use memory::MemoryStorage;
pub use store::{CatalogStore, SimilarityStore, SimilarityTxn};
