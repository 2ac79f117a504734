//! # catalogx Core
//!
//! Core library for the catalogx product catalog.
//!
//! This crate provides the fundamental data structures:
//!
//! - [`Product`], [`Category`], [`Tag`] - Catalog entities
//! - [`SimilarityRecord`] - Canonical, undirected similarity between two products
//! - [`normalize`] - The single pair-ordering step used by every store write path
//! - [`SimilarityConfig`] - Default score and feedback step sizes
//! - [`ProductFilter`] - Category / tag / description list filtering
//!
//! ## Example
//!
//! ```rust
//! use catalogx_core::{normalize, SimilarityRecord};
//!
//! assert_eq!(normalize(9, 4).unwrap(), (4, 9));
//!
//! let record = SimilarityRecord::new(9, 4, 0.5).normalized().unwrap();
//! assert_eq!(record.pair(), (4, 9));
//! assert_eq!(record.other(9), Some(4));
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod product;
pub mod similarity;

pub use config::SimilarityConfig;
pub use error::{Error, Result};
pub use filter::{Filter, ProductFilter};
pub use product::{Category, CategoryId, Product, ProductDraft, ProductId, ProductView, Tag, TagId};
pub use similarity::{normalize, validate_score, SimilarityRecord, MAX_SCORE, MIN_SCORE};
