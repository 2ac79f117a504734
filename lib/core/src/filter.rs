// Product list filtering: category, tags and description search
use serde::{Deserialize, Serialize};

use crate::product::{CategoryId, Product, TagId};

pub trait Filter {
    fn matches(&self, product: &Product) -> bool;
}

/// Conjunction of the optional list criteria. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category: Option<CategoryId>,
    /// The product must carry every one of these tags
    #[serde(default)]
    pub tags: Vec<TagId>,
    /// Whole-word (or whole-phrase) match against the description, ignoring case
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: TagId) -> Self {
        self.tags.push(tag);
        self
    }

    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }
}

impl Filter for ProductFilter {
    fn matches(&self, product: &Product) -> bool {
        if let Some(category) = self.category {
            if product.category != category {
                return false;
            }
        }

        if !self.tags.iter().all(|tag| product.has_tag(*tag)) {
            return false;
        }

        // The term is used as given: surrounding spaces are part of it
        match self.search.as_deref() {
            Some(term) if !term.is_empty() => contains_word(&product.description, term),
            _ => true,
        }
    }
}

/// True when `term` occurs in `text` bounded on both sides by whitespace or
/// the ends of the text. Comparison is case-insensitive.
pub fn contains_word(text: &str, term: &str) -> bool {
    let text = text.to_lowercase();
    let term = term.to_lowercase();
    if term.is_empty() {
        return true;
    }

    let mut prev: Option<char> = None;
    for (start, ch) in text.char_indices() {
        let bounded_before = prev.map_or(true, char::is_whitespace);
        prev = Some(ch);
        if !bounded_before || !text[start..].starts_with(&term) {
            continue;
        }
        let end = start + term.len();
        if text[end..].chars().next().map_or(true, char::is_whitespace) {
            return true;
        }
    }
    false
}
