// Volatile in-process storage, used for tests and `--in-memory` runs
use ahash::AHashMap;
use catalogx_core::{
    normalize, validate_score, Category, CategoryId, Error, Product, ProductDraft, ProductId,
    Result, SimilarityRecord, Tag, TagId,
};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::BTreeMap;

use crate::store::{CatalogStore, SimilarityStore, SimilarityTxn};

type Pair = (ProductId, ProductId);

#[derive(Default)]
struct CatalogTables {
    categories: BTreeMap<CategoryId, Category>,
    tags: BTreeMap<TagId, Tag>,
    products: BTreeMap<ProductId, Product>,
    last_category: CategoryId,
    last_tag: TagId,
    last_product: ProductId,
}

impl CatalogTables {
    fn check_references(&self, draft: &ProductDraft) -> Result<()> {
        if !self.categories.contains_key(&draft.category) {
            return Err(Error::CategoryNotFound(draft.category));
        }
        if let Some(tag) = draft.tags.iter().find(|t| !self.tags.contains_key(*t)) {
            return Err(Error::TagNotFound(*tag));
        }
        Ok(())
    }
}

/// Catalog and similarity tables behind `parking_lot` locks.
#[derive(Default)]
pub struct MemoryStorage {
    catalog: RwLock<CatalogTables>,
    similarities: RwLock<AHashMap<Pair, SimilarityRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogStore for MemoryStorage {
    fn insert_category(&self, name: &str) -> Result<Category> {
        catalogx_core::product::validate_name(name)?;
        let mut tables = self.catalog.write();
        tables.last_category += 1;
        let category = Category {
            id: tables.last_category,
            name: name.to_string(),
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    fn get_category(&self, id: CategoryId) -> Result<Category> {
        self.catalog
            .read()
            .categories
            .get(&id)
            .cloned()
            .ok_or(Error::CategoryNotFound(id))
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.catalog.read().categories.values().cloned().collect())
    }

    fn insert_tag(&self, name: &str) -> Result<Tag> {
        catalogx_core::product::validate_name(name)?;
        let mut tables = self.catalog.write();
        tables.last_tag += 1;
        let tag = Tag {
            id: tables.last_tag,
            name: name.to_string(),
        };
        tables.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    fn get_tag(&self, id: TagId) -> Result<Tag> {
        self.catalog
            .read()
            .tags
            .get(&id)
            .cloned()
            .ok_or(Error::TagNotFound(id))
    }

    fn list_tags(&self) -> Result<Vec<Tag>> {
        Ok(self.catalog.read().tags.values().cloned().collect())
    }

    fn insert_product(&self, draft: ProductDraft) -> Result<Product> {
        let draft = draft.validate()?;
        let mut tables = self.catalog.write();
        tables.check_references(&draft)?;

        tables.last_product += 1;
        let product = Product::from_draft(tables.last_product, draft);
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product> {
        let draft = draft.validate()?;
        let mut tables = self.catalog.write();
        if !tables.products.contains_key(&id) {
            return Err(Error::ProductNotFound(id));
        }
        tables.check_references(&draft)?;

        let product = Product::from_draft(id, draft);
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    fn get_product(&self, id: ProductId) -> Result<Product> {
        self.catalog
            .read()
            .products
            .get(&id)
            .cloned()
            .ok_or(Error::ProductNotFound(id))
    }

    fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.catalog.read().products.values().cloned().collect())
    }

    fn remove_product(&self, id: ProductId) -> Result<bool> {
        Ok(self.catalog.write().products.remove(&id).is_some())
    }
}

impl MemoryStorage {
    fn get_or_insert(&self, (low, high): Pair, default_score: f64) -> (SimilarityRecord, bool) {
        match self.similarities.write().entry((low, high)) {
            Entry::Occupied(entry) => (*entry.get(), false),
            Entry::Vacant(entry) => {
                let record = SimilarityRecord::new(low, high, default_score);
                entry.insert(record);
                (record, true)
            }
        }
    }
}

impl SimilarityStore for MemoryStorage {
    fn upsert_default(
        &self,
        a: ProductId,
        b: ProductId,
        default_score: f64,
    ) -> Result<(SimilarityRecord, bool)> {
        let pair = normalize(a, b)?;
        validate_score(default_score)?;
        Ok(self.get_or_insert(pair, default_score))
    }

    fn upsert_linked(
        &self,
        a: ProductId,
        b: ProductId,
        default_score: f64,
    ) -> Result<(SimilarityRecord, bool)> {
        let pair = normalize(a, b)?;
        validate_score(default_score)?;

        // Lock order: catalog, then similarities. Removal takes the catalog
        // write lock, so it cannot slip between the check and the insert.
        let tables = self.catalog.read();
        if let Some(missing) = [pair.0, pair.1]
            .into_iter()
            .find(|id| !tables.products.contains_key(id))
        {
            return Err(Error::ProductNotFound(missing));
        }
        Ok(self.get_or_insert(pair, default_score))
    }

    fn upsert_default_many(
        &self,
        pairs: &[(ProductId, ProductId)],
        default_score: f64,
    ) -> Result<Vec<Result<bool>>> {
        let mut similarities = self.similarities.write();
        Ok(pairs
            .iter()
            .map(|&(a, b)| -> Result<bool> {
                let (low, high) = normalize(a, b)?;
                validate_score(default_score)?;
                match similarities.entry((low, high)) {
                    Entry::Occupied(_) => Ok(false),
                    Entry::Vacant(entry) => {
                        entry.insert(SimilarityRecord::new(low, high, default_score));
                        Ok(true)
                    }
                }
            })
            .collect())
    }

    fn find_between(&self, a: ProductId, b: ProductId) -> Result<SimilarityRecord> {
        let (low, high) = normalize(a, b)?;
        self.similarities
            .read()
            .get(&(low, high))
            .copied()
            .ok_or(Error::SimilarityNotFound { low, high })
    }

    fn find_all_involving(&self, product: ProductId) -> Result<Vec<SimilarityRecord>> {
        let mut records: Vec<(ProductId, SimilarityRecord)> = self
            .similarities
            .read()
            .values()
            .filter_map(|record| record.other(product).map(|peer| (peer, *record)))
            .collect();
        records.sort_unstable_by_key(|(peer, _)| *peer);
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    fn delete_all_involving(&self, product: ProductId) -> Result<usize> {
        let mut similarities = self.similarities.write();
        let before = similarities.len();
        similarities.retain(|_, record| !record.involves(product));
        Ok(before - similarities.len())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.similarities.read().len())
    }

    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn SimilarityTxn) -> Result<T>,
    {
        let mut similarities = self.similarities.write();
        let mut txn = MemoryTxn {
            committed: &similarities,
            staged: AHashMap::new(),
        };
        let value = f(&mut txn)?;
        let staged = txn.staged;
        similarities.extend(staged);
        Ok(value)
    }
}

/// Reads see staged writes first, then the committed map. The write lock is
/// held for the whole transaction.
struct MemoryTxn<'a> {
    committed: &'a AHashMap<Pair, SimilarityRecord>,
    staged: AHashMap<Pair, SimilarityRecord>,
}

impl MemoryTxn<'_> {
    fn lookup(&self, pair: Pair) -> Option<SimilarityRecord> {
        self.staged
            .get(&pair)
            .or_else(|| self.committed.get(&pair))
            .copied()
    }
}

impl SimilarityTxn for MemoryTxn<'_> {
    fn find_between(&mut self, a: ProductId, b: ProductId) -> Result<SimilarityRecord> {
        let (low, high) = normalize(a, b)?;
        self.lookup((low, high))
            .ok_or(Error::SimilarityNotFound { low, high })
    }

    fn save(&mut self, record: SimilarityRecord) -> Result<SimilarityRecord> {
        let record = record.normalized()?;
        let (low, high) = record.pair();
        if self.lookup((low, high)).is_none() {
            return Err(Error::SimilarityNotFound { low, high });
        }
        self.staged.insert((low, high), record);
        Ok(record)
    }
}
