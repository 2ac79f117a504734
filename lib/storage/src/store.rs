// Persistence interfaces consumed by the similarity engine and the catalog service
use catalogx_core::{
    Category, CategoryId, Error, Product, ProductDraft, ProductId, Result, SimilarityRecord, Tag,
    TagId,
};
use std::fmt::Display;

/// Catalog entities: categories, tags and products.
pub trait CatalogStore: Send + Sync {
    fn insert_category(&self, name: &str) -> Result<Category>;

    fn get_category(&self, id: CategoryId) -> Result<Category>;

    fn list_categories(&self) -> Result<Vec<Category>>;

    fn insert_tag(&self, name: &str) -> Result<Tag>;

    fn get_tag(&self, id: TagId) -> Result<Tag>;

    fn list_tags(&self) -> Result<Vec<Tag>>;

    /// Validates the draft and its category/tag references, then assigns a
    /// fresh identifier.
    fn insert_product(&self, draft: ProductDraft) -> Result<Product>;

    fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product>;

    fn get_product(&self, id: ProductId) -> Result<Product>;

    /// All products in ascending id order
    fn list_products(&self) -> Result<Vec<Product>>;

    /// Removes the product row only. Similarity cascade is the caller's job,
    /// and must run after the removal so no link can be added in between.
    fn remove_product(&self, id: ProductId) -> Result<bool>;
}

/// Scoped unit of work handed out by [`SimilarityStore::atomically`].
pub trait SimilarityTxn {
    fn find_between(&mut self, a: ProductId, b: ProductId) -> Result<SimilarityRecord>;

    fn save(&mut self, record: SimilarityRecord) -> Result<SimilarityRecord>;
}

/// Storage for canonical similarity records.
///
/// Implementations key records by the normalized `(low, high)` pair, which
/// makes at most one record per unordered pair a property of the layout.
pub trait SimilarityStore: Send + Sync {
    /// Get-or-create. Returns the stored record and whether this call created it.
    /// An existing record is returned unchanged.
    fn upsert_default(
        &self,
        a: ProductId,
        b: ProductId,
        default_score: f64,
    ) -> Result<(SimilarityRecord, bool)>;

    /// [`upsert_default`](Self::upsert_default) that only links products still
    /// present in the catalog. The existence check and the insert happen in
    /// one step, so a concurrent product removal either sees the new record
    /// in its cascade or makes this call fail with [`Error::ProductNotFound`].
    fn upsert_linked(
        &self,
        a: ProductId,
        b: ProductId,
        default_score: f64,
    ) -> Result<(SimilarityRecord, bool)>;

    /// Get-or-create for many pairs at once. The outer error means the batch
    /// as a whole could not be written; otherwise each pair gets its own
    /// outcome (`true` when created) and a failing pair does not affect the
    /// others.
    fn upsert_default_many(
        &self,
        pairs: &[(ProductId, ProductId)],
        default_score: f64,
    ) -> Result<Vec<Result<bool>>> {
        Ok(pairs
            .iter()
            .map(|&(a, b)| {
                self.upsert_default(a, b, default_score)
                    .map(|(_, created)| created)
            })
            .collect())
    }

    /// Fails with [`Error::SimilarityNotFound`] when the pair was never seeded.
    fn find_between(&self, a: ProductId, b: ProductId) -> Result<SimilarityRecord>;

    /// Every record with `product` as either member, in ascending peer-id order.
    fn find_all_involving(&self, product: ProductId) -> Result<Vec<SimilarityRecord>>;

    /// Persists a score change on an existing record. The record is
    /// re-normalized and its bounds re-checked before commit.
    fn save(&self, record: SimilarityRecord) -> Result<SimilarityRecord> {
        self.atomically(|txn| txn.save(record))
    }

    /// Returns how many records were removed.
    fn delete_all_involving(&self, product: ProductId) -> Result<usize>;

    fn count(&self) -> Result<usize>;

    /// Runs `f` in one transaction. Writes become visible only if `f` returns
    /// `Ok`; on `Err` nothing is applied.
    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn SimilarityTxn) -> Result<T>;
}

pub(crate) trait StorageResultExt<T> {
    fn storage(self) -> Result<T>;
    fn serialization(self) -> Result<T>;
}

impl<T, E: Display> StorageResultExt<T> for std::result::Result<T, E> {
    #[inline]
    fn storage(self) -> Result<T> {
        self.map_err(|e| Error::Storage(e.to_string()))
    }

    #[inline]
    fn serialization(self) -> Result<T> {
        self.map_err(|e| Error::Serialization(e.to_string()))
    }
}
