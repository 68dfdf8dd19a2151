//! # gt_core - Match Ingestion, Rating, and Standings Pipeline
//!
//! Core library behind the community game tracker. It turns a completed
//! match's raw per-player telemetry into validated statistics, a
//! team-vs-team Elo rating update, an incrementally maintained player
//! profile, and ranked, paginated standings that stay correct even while
//! the backing store's secondary indexes are missing or still building.
//!
//! ## Features
//! - Fuzzy telemetry decoding with an explicit, ordered candidate-key list
//! - Team-vs-team Elo with configurable K-factor and starting rating
//! - Optimistic (revision-checked) player profile updates
//! - Standings queries that degrade to a full profile scan when the
//!   store reports a missing index
//!
//! The library is storage-agnostic: callers hand it any
//! [`store::DocumentStore`] implementation. [`store::MemoryStore`] is the
//! in-memory reference used throughout the test suite.

pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod rating;
pub mod standings;
pub mod store;
pub mod telemetry;

// Re-export the public surface
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use ingest::MatchPipeline;
pub use models::{
    CategoryStats, MatchOutcome, MatchPlayer, PlayerProfile, PlayerStatPatch, ResultFlag,
    StandingsEntry, StandingsPage, StandingsRecord, StatTotals, TelemetryEntry,
};
pub use rating::{elo_delta, team_rating, GameResult};
pub use standings::StandingsQuery;
pub use store::{
    update_with_retry, DocumentStore, Filter, FilterOp, MemoryStore, OrderBy, StoreError, TtlCache,
};
pub use telemetry::{build_lookup, map_to_players, normalize_key};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
