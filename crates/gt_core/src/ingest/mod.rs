//! # Player Aggregate Updater
//!
//! Applies one completed match to every participant's durable profile:
//! win/loss/draw counters per category, the Elo rating update, peak
//! tracking, decoded combat totals, and the denormalized standings
//! record used by ranking queries.
//!
//! Per player, the profile document is written first (through the
//! optimistic revision-checked loop) and the standings record second;
//! the pair is not transactional, so a racing reader can observe the
//! profile ahead of its standings mirror. The standings engine tolerates
//! that window.
//!
//! Calling [`MatchPipeline::apply_match`] twice for the same match
//! double-counts: there is no dedupe key, and at-most-once invocation
//! per match id is the caller's contract.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::{
    CategoryStats, MatchOutcome, MatchPlayer, PlayerProfile, PlayerStatPatch, ResultFlag,
    StandingsRecord, TelemetryEntry, PROFILE_COLLECTION, STANDINGS_COLLECTION,
};
use crate::rating::{elo_delta, team_rating, GameResult};
use crate::store::{update_with_retry, DocumentStore, StoreError};
use crate::telemetry::{build_lookup, map_to_players, normalize_key};

/// One participant resolved against their pre-match profile state.
struct Participant<'a> {
    player: &'a MatchPlayer,
    profile_id: String,
    category: String,
    rating_before: f64,
}

pub struct MatchPipeline {
    store: Arc<dyn DocumentStore>,
    config: PipelineConfig,
}

impl MatchPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, config: PipelineConfig) -> Self {
        Self { store, config }
    }

    /// Ingest one completed match.
    ///
    /// Validates the outcome, decodes telemetry into per-slot stat
    /// patches, computes each side's pre-match mean rating, then updates
    /// every participant's profile and standings record. A validation
    /// failure rejects the match before any write happens.
    pub async fn apply_match(
        &self,
        outcome: &MatchOutcome,
        telemetry: &[TelemetryEntry],
    ) -> Result<()> {
        outcome.validate()?;

        let lookup = build_lookup(telemetry);
        let patches = map_to_players(&outcome.players, &lookup);
        log::debug!(
            "match {}: decoded telemetry patches for {}/{} players",
            outcome.match_id,
            patches.len(),
            outcome.players.len()
        );

        let participants = self.resolve_participants(outcome).await?;

        // Team means come from the pre-match ratings, not from any
        // historical team aggregate.
        let winner_ratings: Vec<f64> = ratings_for(&participants, ResultFlag::Winner);
        let loser_ratings: Vec<f64> = ratings_for(&participants, ResultFlag::Loser);
        let has_winners = !winner_ratings.is_empty();
        let winners_mean = team_rating(&winner_ratings, self.config.starting_rating);
        let losers_mean = team_rating(&loser_ratings, self.config.starting_rating);

        for participant in &participants {
            let result = match participant.player.result_flag {
                ResultFlag::Winner => GameResult::Win,
                ResultFlag::Loser => GameResult::Loss,
                ResultFlag::Drawer => GameResult::Draw,
            };
            let opponent_mean = match participant.player.result_flag {
                ResultFlag::Winner => losers_mean,
                ResultFlag::Loser => winners_mean,
                // Drawers are scored against whichever side exists,
                // winners preferred; with no decided side both means
                // collapse to the starting rating.
                ResultFlag::Drawer => {
                    if has_winners {
                        winners_mean
                    } else {
                        losers_mean
                    }
                }
            };
            let delta = elo_delta(
                participant.rating_before,
                opponent_mean,
                result,
                self.config.k_factor,
                self.config.rating_scale,
            );
            let rating_after = participant.rating_before + delta;

            self.persist_participant(outcome, participant, rating_after, &patches)
                .await?;

            log::debug!(
                "match {}: {} [{}] {:.2} -> {:.2}",
                outcome.match_id,
                participant.profile_id,
                participant.category,
                participant.rating_before,
                rating_after
            );
        }

        Ok(())
    }

    /// Fetch a player profile by (fuzzy) display name.
    pub async fn get_player_profile(&self, name: &str) -> Result<Option<PlayerProfile>> {
        let id = normalize_key(name);
        if id.is_empty() {
            return Ok(None);
        }
        match self.store.get(PROFILE_COLLECTION, &id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Resolve every player to their profile id, category, and pre-match
    /// rating.
    async fn resolve_participants<'a>(
        &self,
        outcome: &'a MatchOutcome,
    ) -> Result<Vec<Participant<'a>>> {
        let mut participants = Vec::with_capacity(outcome.players.len());
        for player in &outcome.players {
            let profile_id = normalize_key(&player.display_name);
            let category = self.category_for(player, outcome);
            let rating_before = match self.store.get(PROFILE_COLLECTION, &profile_id).await? {
                Some(doc) => {
                    let profile: PlayerProfile = serde_json::from_value(doc)?;
                    profile
                        .categories
                        .get(&category)
                        .map(|stats| stats.score)
                        .unwrap_or(self.config.starting_rating)
                }
                None => self.config.starting_rating,
            };
            participants.push(Participant {
                player,
                profile_id,
                category,
                rating_before,
            });
        }
        Ok(participants)
    }

    /// The player's own category if present, else the match category,
    /// else the configured default.
    fn category_for(&self, player: &MatchPlayer, outcome: &MatchOutcome) -> String {
        if let Some(category) = player.category.as_deref() {
            if !category.is_empty() {
                return category.to_string();
            }
        }
        if !outcome.category.is_empty() {
            return outcome.category.clone();
        }
        self.config.default_category.clone()
    }

    /// Write the profile (optimistically) and then its standings mirror.
    async fn persist_participant(
        &self,
        outcome: &MatchOutcome,
        participant: &Participant<'_>,
        rating_after: f64,
        patches: &HashMap<u32, PlayerStatPatch>,
    ) -> Result<()> {
        let patch = patches.get(&participant.player.slot_id);
        let starting_rating = self.config.starting_rating;

        let written = update_with_retry(
            self.store.as_ref(),
            PROFILE_COLLECTION,
            &participant.profile_id,
            self.config.update_max_attempts,
            |current: Option<Value>| {
                let mut profile = match current {
                    Some(doc) => serde_json::from_value::<PlayerProfile>(doc)?,
                    None => PlayerProfile::new(
                        participant.profile_id.clone(),
                        participant.player.display_name.clone(),
                        outcome.played_at,
                    ),
                };
                profile.display_name = participant.player.display_name.clone();
                if outcome.played_at < profile.first_played_at {
                    profile.first_played_at = outcome.played_at;
                }
                profile.last_played_at = outcome.played_at;

                let stats = profile
                    .categories
                    .entry(participant.category.clone())
                    .or_insert_with(|| CategoryStats::new(starting_rating));
                stats.record_result(
                    participant.player.result_flag,
                    rating_after,
                    outcome.played_at,
                );
                if let Some(patch) = patch {
                    stats.absorb_patch(patch);
                }
                profile.total_games = profile.categories.values().map(|c| c.games).sum();

                serde_json::to_value(&profile).map_err(StoreError::from)
            },
        )
        .await?;

        // Standings mirror, written strictly after the profile.
        let profile: PlayerProfile = serde_json::from_value(written)?;
        if let Some(stats) = profile.categories.get(&participant.category) {
            let record = StandingsRecord::from_stats(
                &profile.id,
                &profile.display_name,
                &participant.category,
                stats,
                outcome.played_at,
            );
            self.store
                .set(
                    STANDINGS_COLLECTION,
                    &record.doc_id(),
                    serde_json::to_value(&record)?,
                )
                .await?;
        }
        Ok(())
    }
}

fn ratings_for(participants: &[Participant<'_>], flag: ResultFlag) -> Vec<f64> {
    participants
        .iter()
        .filter(|p| p.player.result_flag == flag)
        .map(|p| p.rating_before)
        .collect()
}
