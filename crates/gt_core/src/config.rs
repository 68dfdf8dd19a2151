use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Tunables for the ingestion pipeline and standings queries.
///
/// Owned by the components built from it; there is no global
/// configuration state.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rating every player starts from before their first match. Also the
    /// team rating of an empty side.
    pub starting_rating: f64,

    /// Elo K-factor: the maximum rating movement a single match can cause.
    pub k_factor: f64,

    /// Elo logistic scale. With the standard 400, a player rated 400
    /// points above their opponent is expected to score ~91%.
    pub rating_scale: f64,

    /// Category used when neither the player nor the match names one.
    pub default_category: String,

    /// Attempts for the optimistic profile update before the revision
    /// conflict is surfaced to the caller.
    pub update_max_attempts: u32,

    /// Standings fetch headroom: the indexed query fetches
    /// `page_size * standings_overfetch` rows (at least
    /// `standings_fetch_floor`) to leave room for the secondary in-memory
    /// sort.
    pub standings_overfetch: usize,
    pub standings_fetch_floor: usize,

    /// TTL for cached standings candidate sets. Zero disables caching;
    /// freshly ingested matches are then visible to standings immediately.
    pub standings_cache_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            starting_rating: 1000.0,
            k_factor: 32.0,
            rating_scale: 400.0,
            default_category: "default".to_string(),
            update_max_attempts: 5,
            standings_overfetch: 3,
            standings_fetch_floor: 100,
            standings_cache_ttl: Duration::ZERO,
        }
    }
}

impl PipelineConfig {
    /// Reject configurations the rating math cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !self.starting_rating.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "starting_rating must be finite".to_string(),
            ));
        }
        if !(self.k_factor.is_finite() && self.k_factor > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "k_factor must be positive, got {}",
                self.k_factor
            )));
        }
        if !(self.rating_scale.is_finite() && self.rating_scale > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "rating_scale must be positive, got {}",
                self.rating_scale
            )));
        }
        if self.default_category.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "default_category must not be empty".to_string(),
            ));
        }
        if self.update_max_attempts == 0 {
            return Err(PipelineError::InvalidConfig(
                "update_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.standings_overfetch == 0 {
            return Err(PipelineError::InvalidConfig(
                "standings_overfetch must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
