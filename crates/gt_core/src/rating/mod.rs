//! # Rating Engine
//!
//! Standard logistic Elo, applied team-vs-team: each side's delta is
//! computed against the *other* side's mean pre-match rating. That makes
//! the update deliberately not zero-sum across a match (each side is
//! scored against the opposing mean, not pairwise); the aggregate updater
//! preserves this long-standing site behavior.

/// Outcome of a match from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

impl GameResult {
    /// Actual score used by the Elo update.
    pub fn actual_score(self) -> f64 {
        match self {
            GameResult::Win => 1.0,
            GameResult::Loss => 0.0,
            GameResult::Draw => 0.5,
        }
    }
}

/// Expected score of `player_rating` against `opponent_rating`:
/// `1 / (1 + 10^((opponent - player) / scale))`.
pub fn expected_score(player_rating: f64, opponent_rating: f64, scale: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent_rating - player_rating) / scale))
}

/// Rating delta for one player, rounded to 2 decimals.
pub fn elo_delta(
    player_rating: f64,
    opponent_rating: f64,
    result: GameResult,
    k_factor: f64,
    scale: f64,
) -> f64 {
    let expected = expected_score(player_rating, opponent_rating, scale);
    round2(k_factor * (result.actual_score() - expected))
}

/// Arithmetic mean of a team's pre-match ratings, rounded to 2 decimals.
/// An empty team rates at `starting_rating`.
pub fn team_rating(ratings: &[f64], starting_rating: f64) -> f64 {
    if ratings.is_empty() {
        return starting_rating;
    }
    round2(ratings.iter().sum::<f64>() / ratings.len() as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
