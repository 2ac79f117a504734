//! Seeding of baseline similarity records
//!
//! Both entry points use the store's get-or-create upserts, so a repeated or
//! concurrent run never duplicates a pair and never touches a score that
//! already exists.

use catalogx_core::{Error, ProductId, Result, SimilarityConfig};
use catalogx_storage::SimilarityStore;
use tracing::{debug, info, warn};

/// Outcome counts of a seeding run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Unique unordered pairs considered
    pub total_pairs: usize,
    /// Records that did not exist before this run
    pub created: usize,
    /// Pairs whose upsert failed and were skipped
    pub failed: usize,
}

impl InitReport {
    /// Pairs that already had a record
    #[inline]
    #[must_use]
    pub fn existing(&self) -> usize {
        self.total_pairs - self.created - self.failed
    }
}

/// Pairs written per store call during a full backfill
pub const SEED_BATCH: usize = 1024;

pub struct Initializer<'a, S> {
    store: &'a S,
    default_score: f64,
}

impl<'a, S: SimilarityStore> Initializer<'a, S> {
    pub fn new(store: &'a S, default_score: f64) -> Self {
        Self {
            store,
            default_score,
        }
    }

    pub fn from_config(store: &'a S, config: &SimilarityConfig) -> Self {
        Self::new(store, config.default_score)
    }

    /// Fills in a record for every unordered pair of `products`.
    ///
    /// Best-effort backfill: a failing pair is logged and counted in
    /// [`InitReport::failed`], and the run continues with the next pair.
    /// Duplicate ids in `products` are ignored. Pairs are written in batches
    /// of [`SEED_BATCH`]; a batch the store cannot write counts as failed.
    pub fn initialize_all(&self, products: &[ProductId]) -> InitReport {
        let mut ids = products.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let pairs: Vec<(ProductId, ProductId)> = ids
            .iter()
            .enumerate()
            .flat_map(|(i, &a)| ids[i + 1..].iter().map(move |&b| (a, b)))
            .collect();

        let mut report = InitReport {
            total_pairs: pairs.len(),
            ..Default::default()
        };
        for batch in pairs.chunks(SEED_BATCH) {
            let outcomes = match self.store.upsert_default_many(batch, self.default_score) {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    warn!(pairs = batch.len(), error = %e, "Failed to seed similarity batch");
                    report.failed += batch.len();
                    continue;
                }
            };
            for (&(a, b), outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(true) => report.created += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(a, b, error = %e, "Failed to seed similarity pair");
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            "Processed {} pairs. Created {} new similarities ({} failed)",
            report.total_pairs, report.created, report.failed
        );
        report
    }

    /// Links `new_product` to every id in `existing` (itself excluded).
    ///
    /// Each link is only created while both products are in the catalog. A
    /// peer removed since `existing` was read is skipped and not counted.
    /// Any other failure stops the run so the caller can retry the whole
    /// linkage; pairs seeded before the failure are kept and skipped on the
    /// retry.
    pub fn initialize_for_new_product(
        &self,
        new_product: ProductId,
        existing: &[ProductId],
    ) -> Result<InitReport> {
        let mut report = InitReport::default();
        for &other in existing.iter().filter(|&&id| id != new_product) {
            match self
                .store
                .upsert_linked(new_product, other, self.default_score)
            {
                Ok((_, created)) => {
                    report.total_pairs += 1;
                    if created {
                        report.created += 1;
                    }
                }
                Err(Error::ProductNotFound(id)) if id == other => {
                    debug!(product = new_product, peer = other, "Peer removed before linkage");
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            product = new_product,
            linked = report.total_pairs,
            created = report.created,
            "Linked new product"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogx_core::{ProductDraft, SimilarityRecord};
    use catalogx_storage::CatalogStore;
    use catalogx_storage::MemoryStorage;

    #[test]
    fn test_initialize_all_creates_every_pair() {
        let store = MemoryStorage::new();
        let ids: Vec<ProductId> = (1..=6).collect();

        let report = Initializer::new(&store, 0.5).initialize_all(&ids);
        assert_eq!(report.total_pairs, 15);
        assert_eq!(report.created, 15);
        assert_eq!(report.failed, 0);
        assert_eq!(store.count().unwrap(), 15);

        for a in 1..=6 {
            for b in (a + 1)..=6 {
                assert_eq!(store.find_between(a, b).unwrap().score, 0.5);
            }
        }
    }

    #[test]
    fn test_initialize_all_is_idempotent() {
        let store = MemoryStorage::new();
        let ids = [3, 1, 2, 4];
        let initializer = Initializer::new(&store, 0.5);
        initializer.initialize_all(&ids);
        store.save(SimilarityRecord::new(2, 4, 0.9)).unwrap();

        let report = initializer.initialize_all(&ids);
        assert_eq!(report.total_pairs, 6);
        assert_eq!(report.created, 0);
        assert_eq!(report.existing(), 6);
        assert_eq!(store.count().unwrap(), 6);
        assert_eq!(store.find_between(4, 2).unwrap().score, 0.9);
    }

    #[test]
    fn test_initialize_all_fills_gaps_only() {
        let store = MemoryStorage::new();
        store.upsert_default(1, 2, 0.7).unwrap();

        let report = Initializer::new(&store, 0.5).initialize_all(&[1, 2, 3]);
        assert_eq!(report.created, 2);
        assert_eq!(store.find_between(1, 2).unwrap().score, 0.7);
        assert_eq!(store.find_between(1, 3).unwrap().score, 0.5);
    }

    #[test]
    fn test_duplicate_ids_and_small_inputs() {
        let store = MemoryStorage::new();
        let initializer = Initializer::new(&store, 0.5);
        assert_eq!(initializer.initialize_all(&[]).total_pairs, 0);
        assert_eq!(initializer.initialize_all(&[7]).total_pairs, 0);
        assert_eq!(initializer.initialize_all(&[7, 7, 8, 8]).total_pairs, 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_invalid_default_counts_failures() {
        let store = MemoryStorage::new();
        let report = Initializer::new(&store, 2.0).initialize_all(&[1, 2, 3]);
        assert_eq!(report.total_pairs, 3);
        assert_eq!(report.failed, 3);
        assert_eq!(store.count().unwrap(), 0);
    }

    fn stocked(count: usize) -> (MemoryStorage, Vec<ProductId>) {
        let store = MemoryStorage::new();
        let category = store.insert_category("Hardware").unwrap();
        let ids = (0..count)
            .map(|i| {
                store
                    .insert_product(ProductDraft::new(format!("item {}", i), "", category.id))
                    .unwrap()
                    .id
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn test_new_product_linkage() {
        let (store, ids) = stocked(5);
        let existing = &ids[..4];
        let initializer = Initializer::from_config(&store, &SimilarityConfig::default());
        initializer.initialize_all(existing);
        let before = store.count().unwrap();

        let report = initializer.initialize_for_new_product(ids[4], &ids).unwrap();
        assert_eq!(report.total_pairs, 4);
        assert_eq!(report.created, 4);
        assert_eq!(store.count().unwrap(), before + 4);

        let linked: Vec<_> = store
            .find_all_involving(ids[4])
            .unwrap()
            .iter()
            .map(|r| (r.other(ids[4]).unwrap(), r.score))
            .collect();
        let expected: Vec<_> = existing.iter().map(|&id| (id, 0.5)).collect();
        assert_eq!(linked, expected);
    }

    #[test]
    fn test_new_product_linkage_retry_is_safe() {
        let (store, ids) = stocked(3);
        let initializer = Initializer::new(&store, 0.5);
        initializer.initialize_for_new_product(ids[2], &ids).unwrap();

        let report = initializer.initialize_for_new_product(ids[2], &ids).unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_new_product_linkage_skips_removed_peer() {
        let (store, ids) = stocked(4);
        let initializer = Initializer::new(&store, 0.5);
        initializer.initialize_all(&ids[..3]);

        // The id list was read before a peer was removed and cascaded
        let existing = store
            .list_products()
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect::<Vec<_>>();
        store.remove_product(ids[1]).unwrap();
        store.delete_all_involving(ids[1]).unwrap();

        let report = initializer.initialize_for_new_product(ids[3], &existing).unwrap();
        assert_eq!(report.total_pairs, 2);
        assert_eq!(report.created, 2);
        assert!(store.find_all_involving(ids[1]).unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_new_product_linkage_fails_for_removed_product() {
        let (store, ids) = stocked(3);
        store.remove_product(ids[2]).unwrap();

        let result = Initializer::new(&store, 0.5).initialize_for_new_product(ids[2], &ids);
        assert!(matches!(result, Err(Error::ProductNotFound(id)) if id == ids[2]));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_new_product_linkage_stops_on_error() {
        let (store, ids) = stocked(3);
        let result = Initializer::new(&store, -1.0).initialize_for_new_product(ids[2], &ids);
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_initialize_all_spans_batches() {
        let store = MemoryStorage::new();
        let ids: Vec<ProductId> = (1..=50).collect();

        let report = Initializer::new(&store, 0.5).initialize_all(&ids);
        assert!(report.total_pairs > SEED_BATCH);
        assert_eq!(report.total_pairs, 50 * 49 / 2);
        assert_eq!(report.created, report.total_pairs);
        assert_eq!(store.count().unwrap(), report.total_pairs);
    }
}
