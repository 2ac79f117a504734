//! Click feedback on a shown set of recommendations
//!
//! One event raises the score of the (current, clicked) pair and lowers the
//! score of every (current, unclicked) pair. Scores saturate at the bounds
//! instead of failing. All adjustments of an event commit in one store
//! transaction, so a missing pair leaves every score untouched.

use catalogx_core::{Error, ProductId, Result, SimilarityConfig, SimilarityRecord, MAX_SCORE, MIN_SCORE};
use catalogx_storage::SimilarityStore;

/// A product detail view offered several recommendations and the user clicked one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEvent {
    pub current: ProductId,
    pub clicked: ProductId,
    pub unclicked: Vec<ProductId>,
}

impl FeedbackEvent {
    pub fn new(current: ProductId, clicked: ProductId, unclicked: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            current,
            clicked,
            unclicked: unclicked.into_iter().collect(),
        }
    }

    /// Rejects events that name the viewed product as a recommendation or list
    /// the clicked product as unclicked. Returns the unclicked ids without
    /// duplicates, in first-seen order.
    fn checked_unclicked(&self) -> Result<Vec<ProductId>> {
        if self.clicked == self.current {
            return Err(Error::InvariantViolation(format!(
                "clicked product {} is the product being viewed",
                self.clicked
            )));
        }

        let mut unclicked: Vec<ProductId> = Vec::with_capacity(self.unclicked.len());
        for &id in &self.unclicked {
            if id == self.current || id == self.clicked {
                return Err(Error::InvariantViolation(format!(
                    "product {} cannot be both shown-unclicked and viewed or clicked",
                    id
                )));
            }
            if !unclicked.contains(&id) {
                unclicked.push(id);
            }
        }
        Ok(unclicked)
    }
}

pub struct FeedbackUpdater<'a, S> {
    store: &'a S,
    increment_step: f64,
    decrement_step: f64,
}

impl<'a, S: SimilarityStore> FeedbackUpdater<'a, S> {
    pub fn new(store: &'a S, increment_step: f64, decrement_step: f64) -> Self {
        Self {
            store,
            increment_step,
            decrement_step,
        }
    }

    pub fn from_config(store: &'a S, config: &SimilarityConfig) -> Self {
        Self::new(store, config.increment_step, config.decrement_step)
    }

    /// Applies one feedback event and returns the updated records, clicked
    /// pair first. Fails with `SimilarityNotFound` if any pair was never
    /// seeded; missing records are not created here.
    pub fn apply_feedback(&self, event: &FeedbackEvent) -> Result<Vec<SimilarityRecord>> {
        let unclicked = event.checked_unclicked()?;

        self.store.atomically(|txn| {
            let mut updated = Vec::with_capacity(unclicked.len() + 1);

            let mut record = txn.find_between(event.current, event.clicked)?;
            record.score = (record.score + self.increment_step).min(MAX_SCORE);
            updated.push(txn.save(record)?);

            for &other in &unclicked {
                let mut record = txn.find_between(event.current, other)?;
                record.score = (record.score - self.decrement_step).max(MIN_SCORE);
                updated.push(txn.save(record)?);
            }

            Ok(updated)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializer::Initializer;
    use catalogx_storage::MemoryStorage;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn catalog_of(n: ProductId) -> MemoryStorage {
        let store = MemoryStorage::new();
        let ids: Vec<ProductId> = (1..=n).collect();
        Initializer::new(&store, 0.5).initialize_all(&ids);
        store
    }

    #[test]
    fn test_click_scenario() {
        let store = catalog_of(5);
        let updater = FeedbackUpdater::from_config(&store, &SimilarityConfig::default());

        let updated = updater
            .apply_feedback(&FeedbackEvent::new(1, 2, [3, 4]))
            .unwrap();
        assert_eq!(updated.len(), 3);

        assert!(approx(store.find_between(1, 2).unwrap().score, 0.6));
        assert!(approx(store.find_between(1, 3).unwrap().score, 0.45));
        assert!(approx(store.find_between(4, 1).unwrap().score, 0.45));

        // Pairs outside the event are untouched
        for (a, b) in [(1, 5), (2, 3), (2, 4), (2, 5), (3, 4), (3, 5), (4, 5)] {
            assert_eq!(store.find_between(a, b).unwrap().score, 0.5);
        }
    }

    #[test]
    fn test_increment_saturates_at_one() {
        let store = catalog_of(2);
        store.save(SimilarityRecord::new(1, 2, 0.95)).unwrap();
        let updater = FeedbackUpdater::new(&store, 0.1, 0.05);

        updater.apply_feedback(&FeedbackEvent::new(1, 2, Vec::new())).unwrap();
        assert_eq!(store.find_between(1, 2).unwrap().score, 1.0);

        for _ in 0..5 {
            updater.apply_feedback(&FeedbackEvent::new(2, 1, Vec::new())).unwrap();
        }
        assert_eq!(store.find_between(1, 2).unwrap().score, 1.0);
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let store = catalog_of(3);
        let updater = FeedbackUpdater::new(&store, 0.1, 0.05);
        for _ in 0..20 {
            updater.apply_feedback(&FeedbackEvent::new(1, 2, [3])).unwrap();
        }
        assert_eq!(store.find_between(1, 3).unwrap().score, 0.0);
        assert_eq!(store.find_between(1, 2).unwrap().score, 1.0);
    }

    #[test]
    fn test_missing_pair_applies_nothing() {
        let store = catalog_of(3);
        let updater = FeedbackUpdater::new(&store, 0.1, 0.05);

        let result = updater.apply_feedback(&FeedbackEvent::new(1, 2, [3, 9]));
        assert!(matches!(result, Err(Error::SimilarityNotFound { low: 1, high: 9 })));
        assert_eq!(store.find_between(1, 2).unwrap().score, 0.5);
        assert_eq!(store.find_between(1, 3).unwrap().score, 0.5);
    }

    #[test]
    fn test_missing_clicked_pair() {
        let store = catalog_of(2);
        let result = FeedbackUpdater::new(&store, 0.1, 0.05).apply_feedback(&FeedbackEvent::new(1, 7, [2]));
        assert!(matches!(result, Err(Error::SimilarityNotFound { low: 1, high: 7 })));
        assert_eq!(store.find_between(1, 2).unwrap().score, 0.5);
    }

    #[test]
    fn test_duplicate_unclicked_decremented_once() {
        let store = catalog_of(3);
        FeedbackUpdater::new(&store, 0.1, 0.05)
            .apply_feedback(&FeedbackEvent::new(1, 2, [3, 3]))
            .unwrap();
        assert!(approx(store.find_between(1, 3).unwrap().score, 0.45));
    }

    #[test]
    fn test_inconsistent_events_rejected() {
        let store = catalog_of(3);
        let updater = FeedbackUpdater::new(&store, 0.1, 0.05);
        assert!(matches!(
            updater.apply_feedback(&FeedbackEvent::new(1, 1, [2])),
            Err(Error::InvariantViolation(_))
        ));
        assert!(matches!(
            updater.apply_feedback(&FeedbackEvent::new(1, 2, [2])),
            Err(Error::InvariantViolation(_))
        ));
        assert!(matches!(
            updater.apply_feedback(&FeedbackEvent::new(1, 2, [1])),
            Err(Error::InvariantViolation(_))
        ));
        assert_eq!(store.find_between(1, 2).unwrap().score, 0.5);
    }

    #[test]
    fn test_custom_steps() {
        let store = catalog_of(3);
        FeedbackUpdater::new(&store, 0.25, 0.2)
            .apply_feedback(&FeedbackEvent::new(2, 3, [1]))
            .unwrap();
        assert!(approx(store.find_between(2, 3).unwrap().score, 0.75));
        assert!(approx(store.find_between(1, 2).unwrap().score, 0.3));
    }
}
