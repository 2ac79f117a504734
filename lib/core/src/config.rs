use serde::{Deserialize, Serialize};

use crate::similarity::{validate_score, MAX_SCORE, MIN_SCORE};
use crate::{Error, Result};

/// Tunables for similarity seeding, recommendation and feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Score given to every newly seeded pair
    pub default_score: f64,
    /// Added to the (current, clicked) pair on feedback
    pub increment_step: f64,
    /// Subtracted from each (current, unclicked) pair on feedback
    pub decrement_step: f64,
    /// How many recommendations a product detail shows
    pub recommendation_limit: usize,
    /// Extra attempts at linking a newly created product
    pub link_retries: u32,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            default_score: 0.5,
            increment_step: 0.1,
            decrement_step: 0.05,
            recommendation_limit: 3,
            link_retries: 1,
        }
    }
}

impl SimilarityConfig {
    pub fn validate(&self) -> Result<()> {
        validate_score(self.default_score)
            .map_err(|_| Error::InvalidConfig(format!("default_score {} outside [0, 1]", self.default_score)))?;

        for (name, step) in [
            ("increment_step", self.increment_step),
            ("decrement_step", self.decrement_step),
        ] {
            if !step.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&step) {
                return Err(Error::InvalidConfig(format!("{} {} outside [0, 1]", name, step)));
            }
        }

        if self.recommendation_limit == 0 {
            return Err(Error::InvalidConfig(
                "recommendation_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimilarityConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_score, 0.5);
        assert_eq!(config.increment_step, 0.1);
        assert_eq!(config.decrement_step, 0.05);
        assert_eq!(config.recommendation_limit, 3);
    }

    #[test]
    fn test_invalid_config() {
        let config = SimilarityConfig {
            default_score: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = SimilarityConfig {
            decrement_step: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SimilarityConfig {
            recommendation_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
