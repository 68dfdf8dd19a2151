use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stats::PlayerStatPatch;
use super::ResultFlag;

/// Lifetime combat accumulators for one category.
///
/// Old documents written before a field existed deserialize to zeroed
/// defaults, so the struct can grow without a migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatTotals {
    #[serde(default)]
    pub kills: u64,
    #[serde(default)]
    pub deaths: u64,
    #[serde(default)]
    pub assists: u64,
    #[serde(default)]
    pub gold: u64,
    #[serde(default)]
    pub damage_dealt: u64,
    #[serde(default)]
    pub damage_taken: u64,
    /// Matches entered with a randomly assigned class.
    #[serde(default)]
    pub random_picks: u64,
}

/// Per-category slice of a player's durable profile.
///
/// Invariants: `games == wins + losses + draws`; `score` is the rating
/// after the most recent match in this category; `peak_score` never
/// decreases and is `>= score` whenever it has been set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub games: u32,
    /// Current rating.
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub peak_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub peak_score_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub totals: StatTotals,
    /// Class the player most recently finished a match as.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_class: Option<String>,
}

impl CategoryStats {
    pub fn new(starting_rating: f64) -> Self {
        Self {
            wins: 0,
            losses: 0,
            draws: 0,
            games: 0,
            score: starting_rating,
            peak_score: None,
            peak_score_at: None,
            totals: StatTotals::default(),
            last_class: None,
        }
    }

    /// Fold one match result into the counters and rating.
    pub fn record_result(&mut self, flag: ResultFlag, score_after: f64, played_at: DateTime<Utc>) {
        match flag {
            ResultFlag::Winner => self.wins += 1,
            ResultFlag::Loser => self.losses += 1,
            ResultFlag::Drawer => self.draws += 1,
        }
        self.games = self.wins + self.losses + self.draws;
        self.score = score_after;
        if self.peak_score.map_or(true, |peak| score_after > peak) {
            self.peak_score = Some(score_after);
            self.peak_score_at = Some(played_at);
        }
    }

    /// Fold a decoded stat patch into the lifetime totals.
    pub fn absorb_patch(&mut self, patch: &PlayerStatPatch) {
        fn add(total: &mut u64, value: Option<i64>) {
            if let Some(v) = value {
                *total = total.saturating_add(v.max(0) as u64);
            }
        }

        add(&mut self.totals.kills, patch.kills);
        add(&mut self.totals.deaths, patch.deaths);
        add(&mut self.totals.assists, patch.assists);
        add(&mut self.totals.gold, patch.gold);
        add(&mut self.totals.damage_dealt, patch.damage_dealt);
        add(&mut self.totals.damage_taken, patch.damage_taken);
        if patch.random_class == Some(true) {
            self.totals.random_picks += 1;
        }
        if let Some(name) = &patch.class_name {
            self.last_class = Some(name.clone());
        }
    }

    /// Win rate over decisive games only; 0 when none were played.
    pub fn win_rate(&self) -> f64 {
        let decisive = self.wins + self.losses;
        if decisive == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(decisive)
        }
    }
}

/// A player's long-lived profile document.
///
/// Created on the first match a player appears in, mutated once per
/// subsequent match, never deleted except by an administrative wipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Normalized display name; doubles as the document id.
    pub id: String,
    pub display_name: String,
    pub categories: BTreeMap<String, CategoryStats>,
    /// Sum of `games` across all categories.
    pub total_games: u32,
    pub first_played_at: DateTime<Utc>,
    pub last_played_at: DateTime<Utc>,
}

impl PlayerProfile {
    pub fn new(id: String, display_name: String, played_at: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name,
            categories: BTreeMap::new(),
            total_games: 0,
            first_played_at: played_at,
            last_played_at: played_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_counters_stay_consistent() {
        let mut stats = CategoryStats::new(1000.0);
        stats.record_result(ResultFlag::Winner, 1016.0, at(1));
        stats.record_result(ResultFlag::Loser, 1001.0, at(2));
        stats.record_result(ResultFlag::Drawer, 1001.5, at(3));

        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.draws, 1);
        assert_eq!(stats.games, 3);
        assert_eq!(stats.score, 1001.5);
    }

    #[test]
    fn test_peak_score_is_monotonic() {
        let mut stats = CategoryStats::new(1000.0);
        stats.record_result(ResultFlag::Winner, 1016.0, at(1));
        assert_eq!(stats.peak_score, Some(1016.0));
        assert_eq!(stats.peak_score_at, Some(at(1)));

        stats.record_result(ResultFlag::Loser, 1000.0, at(2));
        assert_eq!(stats.peak_score, Some(1016.0));
        assert_eq!(stats.peak_score_at, Some(at(1)));

        stats.record_result(ResultFlag::Winner, 1017.0, at(3));
        assert_eq!(stats.peak_score, Some(1017.0));
        assert_eq!(stats.peak_score_at, Some(at(3)));
    }

    #[test]
    fn test_patch_totals_accumulate() {
        let mut stats = CategoryStats::new(1000.0);
        let patch = PlayerStatPatch {
            kills: Some(5),
            deaths: Some(2),
            gold: Some(900),
            class_name: Some("Mage".to_string()),
            ..PlayerStatPatch::default()
        };
        stats.absorb_patch(&patch);
        stats.absorb_patch(&patch);

        assert_eq!(stats.totals.kills, 10);
        assert_eq!(stats.totals.deaths, 4);
        assert_eq!(stats.totals.gold, 1800);
        assert_eq!(stats.last_class.as_deref(), Some("Mage"));
    }

    #[test]
    fn test_negative_patch_values_do_not_underflow() {
        let mut stats = CategoryStats::new(1000.0);
        let patch = PlayerStatPatch {
            kills: Some(-3),
            ..PlayerStatPatch::default()
        };
        stats.absorb_patch(&patch);
        assert_eq!(stats.totals.kills, 0);
    }

    #[test]
    fn test_win_rate_ignores_draws() {
        let mut stats = CategoryStats::new(1000.0);
        assert_eq!(stats.win_rate(), 0.0);

        stats.record_result(ResultFlag::Winner, 1016.0, at(1));
        stats.record_result(ResultFlag::Loser, 1001.0, at(2));
        stats.record_result(ResultFlag::Drawer, 1001.0, at(3));
        assert_eq!(stats.win_rate(), 0.5);
    }

    #[test]
    fn test_old_documents_gain_default_totals() {
        // A document written before `totals`/`last_class` existed.
        let doc = serde_json::json!({
            "wins": 2,
            "losses": 1,
            "draws": 0,
            "games": 3,
            "score": 1024.5
        });
        let stats: CategoryStats = serde_json::from_value(doc).unwrap();
        assert_eq!(stats.totals, StatTotals::default());
        assert!(stats.last_class.is_none());
    }
}
