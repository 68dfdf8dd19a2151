use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::telemetry::normalize_key;

/// How a single player finished the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFlag {
    Winner,
    Loser,
    Drawer,
}

/// One participant of a completed match, as reported by the replay parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPlayer {
    pub display_name: String,
    /// Zero-based lobby slot, also the key telemetry patches are returned
    /// under.
    pub slot_id: u32,
    pub team_id: u32,
    pub result_flag: ResultFlag,
    /// Per-player category override; falls back to the match category.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub category: Option<String>,
}

/// A completed match. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub match_id: String,
    pub players: Vec<MatchPlayer>,
    /// Free-form category label such as "2v2" or "ffa".
    pub category: String,
    pub played_at: DateTime<Utc>,
}

impl MatchOutcome {
    /// Check the model invariants before any persistence happens.
    ///
    /// A match needs at least two players, every player needs a name that
    /// survives normalization (it becomes the profile id), and a decided
    /// match needs both a winning and a losing side. A match where every
    /// player drew is valid.
    pub fn validate(&self) -> Result<()> {
        if self.players.len() < 2 {
            return Err(PipelineError::InvalidMatch(format!(
                "match {} has {} players, need at least 2",
                self.match_id,
                self.players.len()
            )));
        }

        for player in &self.players {
            if normalize_key(&player.display_name).is_empty() {
                return Err(PipelineError::InvalidMatch(format!(
                    "match {} slot {} has no usable player name",
                    self.match_id, player.slot_id
                )));
            }
        }

        let winners = self.count(ResultFlag::Winner);
        let losers = self.count(ResultFlag::Loser);
        let drawers = self.count(ResultFlag::Drawer);
        if drawers != self.players.len() && (winners == 0 || losers == 0) {
            return Err(PipelineError::InvalidMatch(format!(
                "match {} was decided but has {} winners and {} losers",
                self.match_id, winners, losers
            )));
        }

        Ok(())
    }

    fn count(&self, flag: ResultFlag) -> usize {
        self.players.iter().filter(|p| p.result_flag == flag).count()
    }
}
