//! # catalogx
//!
//! A product catalog service with lightweight, feedback-driven recommendations.
//!
//! Every pair of products carries one global similarity score. New products
//! are linked to the whole catalog at a default score, product pages show the
//! highest-scoring neighbours, and each click on a recommendation nudges the
//! scores of the set that was shown.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! catalogx add-category Kitchen
//! catalogx serve --http-port 8000
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use catalogx::prelude::*;
//! use std::sync::Arc;
//!
//! let catalog = Catalog::new(Arc::new(StorageManager::in_memory()), SimilarityConfig::default()).unwrap();
//! let kitchen = catalog.create_category("Kitchen").unwrap();
//!
//! let pan = catalog.create_product(ProductDraft::new("Pan", "cast iron pan", kitchen.id)).unwrap();
//! let pot = catalog.create_product(ProductDraft::new("Pot", "steel pot", kitchen.id)).unwrap();
//! let lid = catalog.create_product(ProductDraft::new("Lid", "glass lid", kitchen.id)).unwrap();
//!
//! // The user viewed the pan, was shown the pot and the lid, and clicked the lid
//! catalog.record_feedback(&FeedbackEvent::new(pan.id, lid.id, [pot.id])).unwrap();
//!
//! let detail = catalog.product_detail(pan.id).unwrap();
//! assert_eq!(detail.recommendations[0].id, lid.id);
//! ```
//!
//! ## Crate Structure
//!
//! - `catalogx-core` - Domain types, canonical pair ordering, configuration
//! - `catalogx-storage` - Store traits with LMDB and in-memory backends
//! - `catalogx-similarity` - Initializer, selector, feedback updater, catalog service
//! - `catalogx-api` - REST API

// Re-export core types
pub use catalogx_core::{
    normalize, Category, Error, Product, ProductDraft, ProductFilter, ProductId, ProductView,
    Result, SimilarityConfig, SimilarityRecord, Tag,
};

// Re-export storage
pub use catalogx_storage::{CatalogStore, LmdbStorage, MemoryStorage, SimilarityStore, StorageManager};

// Re-export engine
pub use catalogx_similarity::{
    Catalog, FeedbackEvent, FeedbackUpdater, InitReport, Initializer, ProductDetail, Selector,
};

// Re-export API
pub use catalogx_api::RestApi;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Catalog, CatalogStore, Error, FeedbackEvent, ProductDraft, ProductFilter, Result,
        SimilarityConfig, SimilarityStore, StorageManager,
    };
}
