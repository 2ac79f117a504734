// Catalog entities: products, categories and tags
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub type ProductId = u64;
pub type CategoryId = u64;
pub type TagId = u64;

/// Longest accepted product, category or tag name
pub const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// A product in the catalog. Belongs to exactly one category and carries a
/// set of tags (kept sorted, without duplicates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: CategoryId,
    pub tags: Vec<TagId>,
}

impl Product {
    #[inline]
    #[must_use]
    pub fn from_draft(id: ProductId, draft: ProductDraft) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            category: draft.category,
            tags: draft.tags,
        }
    }

    #[inline]
    #[must_use]
    pub fn has_tag(&self, tag: TagId) -> bool {
        self.tags.binary_search(&tag).is_ok()
    }
}

/// Create/update payload for a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: CategoryId,
    #[serde(default)]
    pub tags: Vec<TagId>,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>, category: CategoryId) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = TagId>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    /// Checks field-level constraints and puts `tags` into set form.
    /// Existence of the referenced category and tags is checked by the store.
    pub fn validate(mut self) -> Result<Self> {
        validate_name(&self.name)?;
        self.tags.sort_unstable();
        self.tags.dedup();
        Ok(self)
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::Validation(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// Product with its category and tags resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub tags: Vec<Tag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_validation_sorts_and_dedups_tags() {
        let draft = ProductDraft::new("Lamp", "A desk lamp", 1)
            .with_tags([3, 1, 3, 2])
            .validate()
            .unwrap();
        assert_eq!(draft.tags, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = ProductDraft::new("   ", "", 1).validate();
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_long_name_rejected() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(validate_name(&name), Err(Error::Validation(_))));
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_draft_defaults_when_deserializing() {
        let draft: ProductDraft =
            serde_json::from_str(r#"{"name": "Mug", "category": 4}"#).unwrap();
        assert_eq!(draft.description, "");
        assert!(draft.tags.is_empty());
    }

    #[test]
    fn test_has_tag() {
        let product = Product::from_draft(7, ProductDraft::new("Mug", "", 1).with_tags([2, 5]));
        assert!(product.has_tag(5));
        assert!(!product.has_tag(3));
    }
}
