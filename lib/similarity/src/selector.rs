//! Top-k neighbour selection over stored similarity records

use catalogx_core::{ProductId, Result};
use catalogx_storage::SimilarityStore;

/// A neighbour of the query product together with its current score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recommendation {
    pub product: ProductId,
    pub score: f64,
}

pub struct Selector<'a, S> {
    store: &'a S,
}

impl<'a, S: SimilarityStore> Selector<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Up to `k` neighbours of `product`, highest score first.
    ///
    /// Equal scores keep the store's discovery order (ascending peer id), so
    /// the lower peer id wins a tie. Returns fewer than `k` entries when the
    /// product has fewer records; never pads.
    pub fn ranked(&self, product: ProductId, k: usize) -> Result<Vec<Recommendation>> {
        let mut records = self.store.find_all_involving(product)?;

        // Stable: ties stay in discovery order
        records.sort_by(|a, b| b.score.total_cmp(&a.score));

        Ok(records
            .into_iter()
            .filter_map(|record| {
                record.other(product).map(|peer| Recommendation {
                    product: peer,
                    score: record.score,
                })
            })
            .take(k)
            .collect())
    }

    /// Ids of the top `k` neighbours of `product`.
    pub fn recommend(&self, product: ProductId, k: usize) -> Result<Vec<ProductId>> {
        Ok(self
            .ranked(product, k)?
            .into_iter()
            .map(|r| r.product)
            .collect())
    }
}
