// Undirected similarity between two distinct products
use serde::{Deserialize, Serialize};

use crate::product::ProductId;
use crate::{Error, Result};

/// Lowest score a record may hold
pub const MIN_SCORE: f64 = 0.0;
/// Highest score a record may hold
pub const MAX_SCORE: f64 = 1.0;

/// Orders a product pair canonically as `(low, high)`.
///
/// Every store entry point funnels through this function, so callers may pass
/// the two ids in either orientation. Self-pairs are rejected.
#[inline]
pub fn normalize(a: ProductId, b: ProductId) -> Result<(ProductId, ProductId)> {
    if a == b {
        return Err(Error::InvariantViolation(format!(
            "product {} cannot be similar to itself",
            a
        )));
    }
    Ok(if a < b { (a, b) } else { (b, a) })
}

/// Checks that a score is finite and within `[MIN_SCORE, MAX_SCORE]`.
#[inline]
pub fn validate_score(score: f64) -> Result<()> {
    if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(Error::InvariantViolation(format!(
            "score {} outside [{}, {}]",
            score, MIN_SCORE, MAX_SCORE
        )));
    }
    Ok(())
}

/// Similarity score between two products.
///
/// Stored records always satisfy `low_id < high_id`. A record built by a caller
/// may hold either orientation; the store re-normalizes it on every write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    pub low_id: ProductId,
    pub high_id: ProductId,
    pub score: f64,
}

impl SimilarityRecord {
    #[inline]
    #[must_use]
    pub fn new(a: ProductId, b: ProductId, score: f64) -> Self {
        Self {
            low_id: a,
            high_id: b,
            score,
        }
    }

    /// Returns the canonical form of this record, validating both the pair and
    /// the score bounds.
    pub fn normalized(self) -> Result<Self> {
        let (low_id, high_id) = normalize(self.low_id, self.high_id)?;
        validate_score(self.score)?;
        Ok(Self {
            low_id,
            high_id,
            score: self.score,
        })
    }

    #[inline]
    #[must_use]
    pub fn pair(&self) -> (ProductId, ProductId) {
        (self.low_id, self.high_id)
    }

    #[inline]
    #[must_use]
    pub fn involves(&self, product: ProductId) -> bool {
        self.low_id == product || self.high_id == product
    }

    /// The member of the pair that is not `product`, if `product` is a member.
    #[inline]
    #[must_use]
    pub fn other(&self, product: ProductId) -> Option<ProductId> {
        if self.low_id == product {
            Some(self.high_id)
        } else if self.high_id == product {
            Some(self.low_id)
        } else {
            None
        }
    }
}
