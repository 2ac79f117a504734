use catalogx_core::{
    Category, CategoryId, Product, ProductDraft, ProductId, Result, SimilarityRecord, Tag, TagId,
};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::lmdb_storage::LmdbStorage;
use crate::memory::MemoryStorage;
use crate::store::{CatalogStore, SimilarityStore, SimilarityTxn};

enum Backend {
    Lmdb(LmdbStorage),
    Memory(MemoryStorage),
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match &$self.backend {
            Backend::Lmdb($store) => $call,
            Backend::Memory($store) => $call,
        }
    };
}

/// Owns the storage backend selected at startup
pub struct StorageManager {
    backend: Backend,
    data_dir: Option<PathBuf>,
}

impl StorageManager {
    /// Opens (or creates) the LMDB environment under `data_dir/lmdb`.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let lmdb = LmdbStorage::new(data_dir.join("lmdb"))?;
        info!("Storage initialized at {:?}", data_dir);

        Ok(Self {
            backend: Backend::Lmdb(lmdb),
            data_dir: Some(data_dir),
        })
    }

    /// Volatile storage; everything is lost when the manager is dropped.
    pub fn in_memory() -> Self {
        info!("Using in-memory storage");
        Self {
            backend: Backend::Memory(MemoryStorage::new()),
            data_dir: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, Backend::Lmdb(_))
    }
}

impl CatalogStore for StorageManager {
    fn insert_category(&self, name: &str) -> Result<Category> {
        dispatch!(self, s => s.insert_category(name))
    }

    fn get_category(&self, id: CategoryId) -> Result<Category> {
        dispatch!(self, s => s.get_category(id))
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        dispatch!(self, s => s.list_categories())
    }

    fn insert_tag(&self, name: &str) -> Result<Tag> {
        dispatch!(self, s => s.insert_tag(name))
    }

    fn get_tag(&self, id: TagId) -> Result<Tag> {
        dispatch!(self, s => s.get_tag(id))
    }

    fn list_tags(&self) -> Result<Vec<Tag>> {
        dispatch!(self, s => s.list_tags())
    }

    fn insert_product(&self, draft: ProductDraft) -> Result<Product> {
        dispatch!(self, s => s.insert_product(draft))
    }

    fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product> {
        dispatch!(self, s => s.update_product(id, draft))
    }

    fn get_product(&self, id: ProductId) -> Result<Product> {
        dispatch!(self, s => s.get_product(id))
    }

    fn list_products(&self) -> Result<Vec<Product>> {
        dispatch!(self, s => s.list_products())
    }

    fn remove_product(&self, id: ProductId) -> Result<bool> {
        dispatch!(self, s => s.remove_product(id))
    }
}

impl SimilarityStore for StorageManager {
    fn upsert_default(
        &self,
        a: ProductId,
        b: ProductId,
        default_score: f64,
    ) -> Result<(SimilarityRecord, bool)> {
        dispatch!(self, s => s.upsert_default(a, b, default_score))
    }

    fn upsert_linked(
        &self,
        a: ProductId,
        b: ProductId,
        default_score: f64,
    ) -> Result<(SimilarityRecord, bool)> {
        dispatch!(self, s => s.upsert_linked(a, b, default_score))
    }

    fn upsert_default_many(
        &self,
        pairs: &[(ProductId, ProductId)],
        default_score: f64,
    ) -> Result<Vec<Result<bool>>> {
        dispatch!(self, s => s.upsert_default_many(pairs, default_score))
    }

    fn find_between(&self, a: ProductId, b: ProductId) -> Result<SimilarityRecord> {
        dispatch!(self, s => SimilarityStore::find_between(s, a, b))
    }

    fn find_all_involving(&self, product: ProductId) -> Result<Vec<SimilarityRecord>> {
        dispatch!(self, s => s.find_all_involving(product))
    }

    fn save(&self, record: SimilarityRecord) -> Result<SimilarityRecord> {
        dispatch!(self, s => SimilarityStore::save(s, record))
    }

    fn delete_all_involving(&self, product: ProductId) -> Result<usize> {
        dispatch!(self, s => s.delete_all_involving(product))
    }

    fn count(&self) -> Result<usize> {
        dispatch!(self, s => s.count())
    }

    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn SimilarityTxn) -> Result<T>,
    {
        dispatch!(self, s => s.atomically(f))
    }
}
