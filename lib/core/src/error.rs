use thiserror::Error;

use crate::product::{CategoryId, ProductId, TagId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("Tag not found: {0}")]
    TagNotFound(TagId),

    #[error("Similarity not found between products {low} and {high}")]
    SimilarityNotFound { low: ProductId, high: ProductId },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for every "requested entity does not exist" variant.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ProductNotFound(_)
                | Error::CategoryNotFound(_)
                | Error::TagNotFound(_)
                | Error::SimilarityNotFound { .. }
        )
    }
}
