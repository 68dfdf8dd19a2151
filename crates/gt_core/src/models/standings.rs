use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::CategoryStats;

/// Denormalized per-player-per-category ranking row.
///
/// Owned solely by the aggregate updater; the standings query engine only
/// reads it. An eventually consistent mirror of the matching
/// [`CategoryStats`]: it converges once the updater finishes a match but
/// may briefly lag the profile between the two write steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingsRecord {
    pub player_id: String,
    pub display_name: String,
    pub category: String,
    pub score: f64,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub games: u32,
    /// Derived for display; ranking recomputes it from the counters.
    pub win_rate: f64,
    pub last_played_at: DateTime<Utc>,
}

impl StandingsRecord {
    /// Build the mirror row from a profile's category slice.
    pub fn from_stats(
        player_id: &str,
        display_name: &str,
        category: &str,
        stats: &CategoryStats,
        last_played_at: DateTime<Utc>,
    ) -> Self {
        Self {
            player_id: player_id.to_string(),
            display_name: display_name.to_string(),
            category: category.to_string(),
            score: stats.score,
            wins: stats.wins,
            losses: stats.losses,
            draws: stats.draws,
            games: stats.games,
            win_rate: stats.win_rate(),
            last_played_at,
        }
    }

    /// Document id, one row per player and category.
    pub fn doc_id(&self) -> String {
        standings_doc_id(&self.player_id, &self.category)
    }

    /// Win rate over decisive games, recomputed from the counters for
    /// ranking tie-breaks (the stored `win_rate` is not authoritative).
    pub fn decisive_win_rate(&self) -> f64 {
        let decisive = self.wins + self.losses;
        if decisive == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(decisive)
        }
    }
}

pub fn standings_doc_id(player_id: &str, category: &str) -> String {
    format!("{player_id}::{category}")
}

/// One ranked leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingsEntry {
    /// 1-based rank over the entire eligible set, stable across pages.
    pub rank: u32,
    #[serde(flatten)]
    pub record: StandingsRecord,
}

/// One page of ranked standings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingsPage {
    pub entries: Vec<StandingsEntry>,
    /// Total eligible rows. When the count query failed this is the
    /// number of fetched rows, an explicit undercount.
    pub total: u64,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultFlag;
    use chrono::TimeZone;

    #[test]
    fn test_record_mirrors_stats() {
        let mut stats = CategoryStats::new(1000.0);
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        stats.record_result(ResultFlag::Winner, 1016.0, at);

        let record = StandingsRecord::from_stats("alice", "Alice", "2v2", &stats, at);
        assert_eq!(record.doc_id(), "alice::2v2");
        assert_eq!(record.score, 1016.0);
        assert_eq!(record.games, 1);
        assert_eq!(record.win_rate, 1.0);
    }

    #[test]
    fn test_decisive_win_rate_without_decisive_games() {
        let stats = CategoryStats::new(1000.0);
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = StandingsRecord::from_stats("bob", "Bob", "ffa", &stats, at);
        assert_eq!(record.decisive_win_rate(), 0.0);
    }
}
