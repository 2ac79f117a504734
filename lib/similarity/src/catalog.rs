//! Catalog service: product lifecycle with the similarity hooks attached
//!
//! Creating a product links it to every existing product, deleting one
//! cascades through its similarity records, and product detail pulls the
//! top recommendations from the [`Selector`].

use catalogx_core::{
    Category, Error, Filter, Product, ProductDraft, ProductFilter, ProductId, ProductView, Result,
    SimilarityConfig, SimilarityRecord, Tag,
};
use catalogx_storage::{CatalogStore, SimilarityStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::feedback::{FeedbackEvent, FeedbackUpdater};
use crate::initializer::{InitReport, Initializer};
use crate::selector::Selector;

/// A product together with the products recommended next to it
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetail {
    pub product: ProductView,
    pub recommendations: Vec<ProductView>,
}

pub struct Catalog<S> {
    store: Arc<S>,
    config: SimilarityConfig,
}

impl<S> Catalog<S>
where
    S: CatalogStore + SimilarityStore,
{
    pub fn new(store: Arc<S>, config: SimilarityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[inline]
    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    pub fn create_category(&self, name: &str) -> Result<Category> {
        let category = self.store.insert_category(name)?;
        info!(id = category.id, name = %category.name, "Created category");
        Ok(category)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.store.list_categories()
    }

    pub fn create_tag(&self, name: &str) -> Result<Tag> {
        let tag = self.store.insert_tag(name)?;
        info!(id = tag.id, name = %tag.name, "Created tag");
        Ok(tag)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        self.store.list_tags()
    }

    /// Resolves the category and tags of `product`
    pub fn view(&self, product: Product) -> Result<ProductView> {
        let category = self.store.get_category(product.category)?;
        let tags = product
            .tags
            .iter()
            .map(|tag| self.store.get_tag(*tag))
            .collect::<Result<Vec<_>>>()?;

        Ok(ProductView {
            id: product.id,
            name: product.name,
            description: product.description,
            category,
            tags,
        })
    }

    pub fn list_products(&self, filter: &ProductFilter) -> Result<Vec<ProductView>> {
        self.store
            .list_products()?
            .into_iter()
            .filter(|product| filter.matches(product))
            .map(|product| self.view(product))
            .collect()
    }

    pub fn get_product(&self, id: ProductId) -> Result<ProductView> {
        self.view(self.store.get_product(id)?)
    }

    /// Top `recommendation_limit` neighbours of `id`. Peers that have since
    /// been removed from the catalog are skipped and the next best peer takes
    /// their place.
    pub fn recommendations(&self, id: ProductId) -> Result<Vec<ProductView>> {
        let limit = self.config.recommendation_limit;
        let mut views = Vec::with_capacity(limit);
        for peer in Selector::new(&*self.store).recommend(id, usize::MAX)? {
            if views.len() == limit {
                break;
            }
            match self.store.get_product(peer) {
                Ok(product) => views.push(self.view(product)?),
                Err(e) if e.is_not_found() => {
                    warn!(product = id, peer, "Recommended product no longer exists");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(views)
    }

    pub fn product_detail(&self, id: ProductId) -> Result<ProductDetail> {
        let product = self.get_product(id)?;
        let recommendations = self.recommendations(id)?;
        Ok(ProductDetail {
            product,
            recommendations,
        })
    }

    /// Stores the product, then links it to every other product at the
    /// default score. A linkage failure is retried `link_retries` times; if it
    /// still fails the product is kept with fewer links and the error is logged.
    pub fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        let product = self.store.insert_product(draft)?;
        info!(id = product.id, name = %product.name, "Created product");

        let initializer = Initializer::from_config(&*self.store, &self.config);
        let mut attempt = 0;
        loop {
            let linked = self.existing_ids().and_then(|existing| {
                initializer.initialize_for_new_product(product.id, &existing)
            });
            match linked {
                Ok(report) => {
                    debug!(id = product.id, created = report.created, "Product linked");
                    break;
                }
                Err(Error::ProductNotFound(id)) if id == product.id => {
                    debug!(id, "Product removed during linkage");
                    break;
                }
                Err(e) if attempt < self.config.link_retries => {
                    attempt += 1;
                    warn!(id = product.id, attempt, error = %e, "Retrying product linkage");
                }
                Err(e) => {
                    warn!(id = product.id, error = %e, "Product linkage incomplete");
                    break;
                }
            }
        }

        Ok(product)
    }

    pub fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product> {
        let product = self.store.update_product(id, draft)?;
        info!(id, "Updated product");
        Ok(product)
    }

    /// Removes the product, then every similarity record that references it.
    ///
    /// The row goes first so a concurrent linkage cannot add a record after
    /// the cascade. Deleting an id that is gone but still has records clears
    /// those records; only an id with neither is [`Error::ProductNotFound`].
    pub fn delete_product(&self, id: ProductId) -> Result<()> {
        let removed = self.store.remove_product(id)?;
        let similarities = self.store.delete_all_involving(id)?;
        if !removed {
            if similarities == 0 {
                return Err(Error::ProductNotFound(id));
            }
            warn!(id, similarities, "Cleared similarities of a removed product");
            return Ok(());
        }
        info!(id, similarities, "Deleted product");
        Ok(())
    }

    /// Checks that every referenced product exists, then applies the event.
    pub fn record_feedback(&self, event: &FeedbackEvent) -> Result<Vec<SimilarityRecord>> {
        for id in [event.current, event.clicked]
            .iter()
            .chain(event.unclicked.iter())
        {
            self.store.get_product(*id)?;
        }

        let updated = FeedbackUpdater::from_config(&*self.store, &self.config).apply_feedback(event)?;
        debug!(
            current = event.current,
            clicked = event.clicked,
            updated = updated.len(),
            "Applied feedback"
        );
        Ok(updated)
    }

    /// Seeds every missing pair among the current products
    pub fn initialize_similarities(&self) -> Result<InitReport> {
        let ids = self.existing_ids()?;
        Ok(Initializer::from_config(&*self.store, &self.config).initialize_all(&ids))
    }

    fn existing_ids(&self) -> Result<Vec<ProductId>> {
        Ok(self
            .store
            .list_products()?
            .into_iter()
            .map(|product| product.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogx_storage::MemoryStorage;

    struct Fixture {
        catalog: Catalog<MemoryStorage>,
        category: Category,
        tags: Vec<Tag>,
    }

    fn fixture() -> Fixture {
        let catalog = Catalog::new(Arc::new(MemoryStorage::new()), SimilarityConfig::default()).unwrap();
        let category = catalog.create_category("Furniture").unwrap();
        let tags = vec![
            catalog.create_tag("wood").unwrap(),
            catalog.create_tag("metal").unwrap(),
        ];
        Fixture {
            catalog,
            category,
            tags,
        }
    }

    impl Fixture {
        fn product(&self, name: &str) -> Product {
            self.catalog
                .create_product(ProductDraft::new(name, format!("{} description", name), self.category.id))
                .unwrap()
        }
    }

    #[test]
    fn test_create_product_links_to_existing() {
        let f = fixture();
        let ids: Vec<ProductId> = (0..4).map(|i| f.product(&format!("p{}", i)).id).collect();

        let store = f.catalog.store();
        assert_eq!(store.count().unwrap(), 6);
        for &id in &ids {
            assert_eq!(store.find_all_involving(id).unwrap().len(), 3);
        }
    }

    #[test]
    fn test_delete_product_cascades() {
        let f = fixture();
        let a = f.product("a");
        let b = f.product("b");
        let c = f.product("c");

        f.catalog.delete_product(b.id).unwrap();
        let store = f.catalog.store();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.find_between(a.id, c.id).is_ok());
        assert!(matches!(
            f.catalog.get_product(b.id),
            Err(Error::ProductNotFound(_))
        ));
        assert!(matches!(
            f.catalog.delete_product(b.id),
            Err(Error::ProductNotFound(_))
        ));
    }

    #[test]
    fn test_product_detail_with_recommendations() {
        let f = fixture();
        let ids: Vec<ProductId> = (0..5).map(|i| f.product(&format!("p{}", i)).id).collect();
        let store = f.catalog.store();
        store.save(SimilarityRecord::new(ids[0], ids[3], 0.9)).unwrap();
        store.save(SimilarityRecord::new(ids[0], ids[1], 0.2)).unwrap();

        let detail = f.catalog.product_detail(ids[0]).unwrap();
        assert_eq!(detail.product.id, ids[0]);
        assert_eq!(detail.product.category, f.category);
        let recommended: Vec<ProductId> = detail.recommendations.iter().map(|p| p.id).collect();
        assert_eq!(recommended, vec![ids[3], ids[2], ids[4]]);
    }

    #[test]
    fn test_recommendations_skip_missing_products() {
        let f = fixture();
        let a = f.product("a");
        let b = f.product("b");
        // Dangling record: product 99 was never stored
        f.catalog.store().upsert_default(a.id, 99, 0.9).unwrap();

        let recommended: Vec<ProductId> = f
            .catalog
            .recommendations(a.id)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(recommended, vec![b.id]);
    }

    #[test]
    fn test_recommendations_fill_past_missing_peers() {
        let f = fixture();
        let ids: Vec<ProductId> = (0..5).map(|i| f.product(&format!("p{}", i)).id).collect();
        let store = f.catalog.store();
        // Two dangling records outrank every real peer
        store.upsert_default(ids[0], 98, 0.9).unwrap();
        store.upsert_default(ids[0], 99, 0.8).unwrap();

        let recommended: Vec<ProductId> = f
            .catalog
            .recommendations(ids[0])
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(recommended, vec![ids[1], ids[2], ids[3]]);
    }

    #[test]
    fn test_linkage_racing_delete_leaves_no_records() {
        let f = fixture();
        let ids: Vec<ProductId> = (0..4).map(|i| f.product(&format!("p{}", i)).id).collect();
        let store = f.catalog.store();

        // A creation reads the id list, then a delete lands before its linkage
        let existing = f.catalog.existing_ids().unwrap();
        let fresh = store
            .insert_product(ProductDraft::new("fresh", "", f.category.id))
            .unwrap();
        f.catalog.delete_product(ids[2]).unwrap();

        let report = Initializer::from_config(store, f.catalog.config())
            .initialize_for_new_product(fresh.id, &existing)
            .unwrap();
        assert_eq!(report.created, 3);
        assert!(store.find_all_involving(ids[2]).unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 3 + 3);

        let recommended = f.catalog.recommendations(fresh.id).unwrap();
        assert_eq!(recommended.len(), 3);
    }

    #[test]
    fn test_delete_clears_records_of_removed_product() {
        let f = fixture();
        let a = f.product("a");
        let b = f.product("b");
        f.product("c");
        let store = f.catalog.store();

        // Row removed but the cascade never ran
        store.remove_product(b.id).unwrap();
        assert_eq!(store.find_all_involving(b.id).unwrap().len(), 2);

        f.catalog.delete_product(b.id).unwrap();
        assert!(store.find_all_involving(b.id).unwrap().is_empty());
        assert_eq!(store.find_all_involving(a.id).unwrap().len(), 1);
        assert!(matches!(
            f.catalog.delete_product(b.id),
            Err(Error::ProductNotFound(_))
        ));
    }

    #[test]
    fn test_record_feedback_checks_products() {
        let f = fixture();
        let a = f.product("a");
        let b = f.product("b");
        let c = f.product("c");

        let result = f.catalog.record_feedback(&FeedbackEvent::new(a.id, b.id, [c.id, 42]));
        assert!(matches!(result, Err(Error::ProductNotFound(42))));

        let updated = f
            .catalog
            .record_feedback(&FeedbackEvent::new(a.id, b.id, [c.id]))
            .unwrap();
        assert_eq!(updated.len(), 2);
        let store = f.catalog.store();
        assert!((store.find_between(a.id, b.id).unwrap().score - 0.6).abs() < 1e-9);
        assert!((store.find_between(a.id, c.id).unwrap().score - 0.45).abs() < 1e-9);
        assert_eq!(store.find_between(b.id, c.id).unwrap().score, 0.5);
    }

    #[test]
    fn test_list_products_with_filter() {
        let f = fixture();
        let oak = f
            .catalog
            .create_product(
                ProductDraft::new("Table", "solid oak table", f.category.id).with_tags([f.tags[0].id]),
            )
            .unwrap();
        f.catalog
            .create_product(
                ProductDraft::new("Shelf", "steel shelf", f.category.id).with_tags([f.tags[1].id]),
            )
            .unwrap();

        let all = f.catalog.list_products(&ProductFilter::new()).unwrap();
        assert_eq!(all.len(), 2);

        let wood = f
            .catalog
            .list_products(&ProductFilter::new().tag(f.tags[0].id))
            .unwrap();
        assert_eq!(wood.len(), 1);
        assert_eq!(wood[0].id, oak.id);
        assert_eq!(wood[0].tags, vec![f.tags[0].clone()]);

        let search = f
            .catalog
            .list_products(&ProductFilter::new().search("OAK"))
            .unwrap();
        assert_eq!(search.len(), 1);

        let other_category = f
            .catalog
            .list_products(&ProductFilter::new().category(f.category.id + 1))
            .unwrap();
        assert!(other_category.is_empty());
    }

    #[test]
    fn test_initialize_similarities_backfills() {
        let store = Arc::new(MemoryStorage::new());
        let category = store.insert_category("Books").unwrap();
        for name in ["a", "b", "c", "d"] {
            store
                .insert_product(ProductDraft::new(name, "", category.id))
                .unwrap();
        }
        let catalog = Catalog::new(store, SimilarityConfig::default()).unwrap();

        let report = catalog.initialize_similarities().unwrap();
        assert_eq!(report.total_pairs, 6);
        assert_eq!(report.created, 6);
        assert_eq!(catalog.initialize_similarities().unwrap().created, 0);
    }

    #[test]
    fn test_update_product() {
        let f = fixture();
        let product = f.product("lamp");
        let updated = f
            .catalog
            .update_product(
                product.id,
                ProductDraft::new("lamp v2", "brighter", f.category.id).with_tags([f.tags[1].id]),
            )
            .unwrap();
        assert_eq!(updated.name, "lamp v2");
        assert_eq!(f.catalog.get_product(product.id).unwrap().tags, vec![f.tags[1].clone()]);

        let missing = f
            .catalog
            .update_product(999, ProductDraft::new("x", "", f.category.id));
        assert!(matches!(missing, Err(Error::ProductNotFound(999))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimilarityConfig {
            increment_step: 2.0,
            ..Default::default()
        };
        assert!(Catalog::new(Arc::new(MemoryStorage::new()), config).is_err());
    }
}
