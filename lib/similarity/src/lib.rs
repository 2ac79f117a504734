//! # catalogx Similarity
//!
//! The similarity engine behind catalogx recommendations.
//!
//! Every pair of products carries one global score in `[0, 1]`. Scores start
//! at a default value and move with click feedback: the clicked
//! recommendation gains, the ones shown but ignored lose.
//!
//! ## Components
//!
//! - [`Initializer`] - Seeds a default record for every product pair
//! - [`Selector`] - Top-k most similar products for a product
//! - [`FeedbackUpdater`] - Applies one click event atomically
//! - [`Catalog`] - Product lifecycle with the engine hooks attached
//!
//! ## Example
//!
//! ```rust
//! use catalogx_similarity::{FeedbackEvent, FeedbackUpdater, Initializer, Selector};
//! use catalogx_storage::{MemoryStorage, SimilarityStore};
//!
//! let store = MemoryStorage::new();
//! Initializer::new(&store, 0.5).initialize_all(&[1, 2, 3, 4]);
//!
//! FeedbackUpdater::new(&store, 0.1, 0.05)
//!     .apply_feedback(&FeedbackEvent::new(1, 3, [2, 4]))
//!     .unwrap();
//!
//! let top = Selector::new(&store).recommend(1, 3).unwrap();
//! assert_eq!(top[0], 3);
//! assert_eq!(store.count().unwrap(), 6);
//! ```
//!
//! ## Data flow
//!
//! ```text
//! product created ──> Initializer ──┐
//!                                    v
//! click event ──> FeedbackUpdater ─> SimilarityStore ─> Selector ──> detail view
//!                                    ^
//! product deleted ──> cascade ───────┘
//! ```

pub mod catalog;
pub mod feedback;
pub mod initializer;
pub mod selector;

pub use catalog::{Catalog, ProductDetail};
pub use feedback::{FeedbackEvent, FeedbackUpdater};
pub use initializer::{InitReport, Initializer};
pub use selector::{Recommendation, Selector};
