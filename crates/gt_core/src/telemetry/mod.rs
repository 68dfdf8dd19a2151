//! # Telemetry Decoder
//!
//! Turns the replay parser's raw `(entity key, variable name, value)`
//! tuples into typed per-player stat patches.
//!
//! Entity keys are free text written by match instrumentation, so the
//! decoder matches players through an ordered list of candidate keys
//! (normalized display name first, then the positional `player{slot}`
//! spellings). Variable names are classified by substring rules evaluated
//! in a fixed order; the source site relied on object-key iteration order
//! here, which this implementation replaces with an explicit rule table
//! and sorted variable iteration so same-field collisions resolve
//! deterministically.

use std::collections::{BTreeMap, HashMap};

use crate::models::{MatchPlayer, PlayerStatPatch, TelemetryEntry};

/// Normalized telemetry: entity key -> variable name -> value.
///
/// The inner map is ordered so variables are always applied in sorted
/// name order.
pub type TelemetryLookup = HashMap<String, BTreeMap<String, f64>>;

/// Lowercase and strip everything that is not alphanumeric.
///
/// Applied to entity keys and variable names before any lookup, and to
/// display names when deriving profile ids.
pub fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Index raw telemetry by normalized entity key and variable name.
///
/// Entries whose entity key or variable name normalizes to nothing are
/// discarded; later entries for the same variable overwrite earlier ones
/// (last write wins). Nothing else is ever dropped.
pub fn build_lookup(entries: &[TelemetryEntry]) -> TelemetryLookup {
    let mut lookup = TelemetryLookup::new();
    for entry in entries {
        let entity = normalize_key(&entry.entity_key);
        let variable = normalize_key(&entry.variable_name);
        if entity.is_empty() || variable.is_empty() {
            continue;
        }
        lookup
            .entry(entity)
            .or_default()
            .insert(variable, entry.numeric_value);
    }
    lookup
}

/// Decode stats for every player we can match to a telemetry entity.
///
/// The first candidate key with a non-empty variable map wins
/// (first-match-wins, not best-match). A player with no matching entity
/// simply gets no patch; that is an expected decode miss, not an error.
pub fn map_to_players(
    players: &[MatchPlayer],
    lookup: &TelemetryLookup,
) -> HashMap<u32, PlayerStatPatch> {
    let mut patches = HashMap::new();
    for player in players {
        let variables = candidate_keys(player)
            .iter()
            .find_map(|key| lookup.get(key).filter(|vars| !vars.is_empty()));
        let Some(variables) = variables else {
            continue;
        };

        let mut patch = PlayerStatPatch::default();
        for (variable, value) in variables {
            if let Some(field) = classify_variable(variable) {
                apply_field(&mut patch, field, *value);
            }
        }
        patches.insert(player.slot_id, patch);
    }
    patches
}

/// Candidate entity keys for one player, most specific first.
fn candidate_keys(player: &MatchPlayer) -> [String; 6] {
    [
        normalize_key(&player.display_name),
        format!("player{}", player.slot_id),
        format!("player{}", player.slot_id + 1),
        format!("p{}", player.slot_id),
        format!("slot{}", player.slot_id),
        normalize_key(&format!("{}-{}", player.team_id, player.slot_id)),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatField {
    Kills,
    Deaths,
    Assists,
    Gold,
    DamageTaken,
    DamageDealt,
    RandomClass,
    ClassName,
}

type Predicate = fn(&str) -> bool;

/// Fixed-priority classification rules; the first matching rule wins.
/// Variable names reaching this table are already normalized to
/// lowercase, which makes the substring checks case-insensitive.
const CLASSIFICATION_RULES: &[(Predicate, StatField)] = &[
    (|name| name.contains("kill"), StatField::Kills),
    (|name| name.contains("death"), StatField::Deaths),
    (|name| name.contains("assist"), StatField::Assists),
    (|name| name.contains("gold"), StatField::Gold),
    (
        |name| name.contains("damage") && name.contains("taken"),
        StatField::DamageTaken,
    ),
    (|name| name.contains("damage"), StatField::DamageDealt),
    (|name| name.contains("random"), StatField::RandomClass),
    (|name| name.contains("class"), StatField::ClassName),
];

fn classify_variable(name: &str) -> Option<StatField> {
    CLASSIFICATION_RULES
        .iter()
        .find(|(matches, _)| matches(name))
        .map(|(_, field)| *field)
}

fn apply_field(patch: &mut PlayerStatPatch, field: StatField, value: f64) {
    match field {
        StatField::Kills => patch.kills = Some(value as i64),
        StatField::Deaths => patch.deaths = Some(value as i64),
        StatField::Assists => patch.assists = Some(value as i64),
        StatField::Gold => patch.gold = Some(value as i64),
        StatField::DamageTaken => patch.damage_taken = Some(value as i64),
        StatField::DamageDealt => patch.damage_dealt = Some(value as i64),
        StatField::RandomClass => patch.random_class = Some(value > 0.0),
        StatField::ClassName => patch.class_name = Some(decode_class_name(value)),
    }
}

/// Decode a class name smuggled inside a 32-bit numeric value.
///
/// The instrumentation packs up to four ASCII bytes big-endian into the
/// number. Truncate to u32, trim trailing NULs, and accept the bytes as
/// a name only if every one of them is printable ASCII (0x20-0x7E) and
/// at least one byte survived trimming; anything else falls back to the
/// decimal rendering of the original number.
pub fn decode_class_name(value: f64) -> String {
    let packed = value as u32;
    let bytes = packed.to_be_bytes();
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let trimmed = &bytes[..end];
    if !trimmed.is_empty() && trimmed.iter().all(|&b| (0x20..=0x7e).contains(&b)) {
        if let Ok(name) = std::str::from_utf8(trimmed) {
            return name.to_string();
        }
    }

    if value.is_finite() && value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultFlag;

    fn entry(entity: &str, variable: &str, value: f64) -> TelemetryEntry {
        TelemetryEntry {
            entity_key: entity.to_string(),
            variable_name: variable.to_string(),
            numeric_value: value,
        }
    }

    fn player(name: &str, slot: u32, team: u32) -> MatchPlayer {
        MatchPlayer {
            display_name: name.to_string(),
            slot_id: slot,
            team_id: team,
            result_flag: ResultFlag::Winner,
            category: None,
        }
    }

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize_key("Player One!"), "playerone");
        assert_eq!(normalize_key("  [P1] "), "p1");
        assert_eq!(normalize_key("___"), "");
    }

    #[test]
    fn test_lookup_last_write_wins() {
        let lookup = build_lookup(&[
            entry("Player1", "Kills", 3.0),
            entry("player-1", "kills", 5.0),
        ]);
        assert_eq!(lookup["player1"]["kills"], 5.0);
    }

    #[test]
    fn test_lookup_discards_empty_keys() {
        let lookup = build_lookup(&[
            entry("", "Kills", 3.0),
            entry("!!!", "Kills", 3.0),
            entry("Player1", "", 3.0),
        ]);
        assert!(lookup.is_empty());
    }

    #[test]
    fn test_maps_kills_by_display_name() {
        let lookup = build_lookup(&[entry("Player1", "Kills", 5.0)]);
        let patches = map_to_players(&[player("Player1", 0, 1)], &lookup);
        assert_eq!(patches[&0].kills, Some(5));
    }

    #[test]
    fn test_display_name_beats_positional_keys() {
        let lookup = build_lookup(&[
            entry("Alice", "Kills", 9.0),
            entry("player0", "Kills", 1.0),
        ]);
        let patches = map_to_players(&[player("Alice", 0, 1)], &lookup);
        assert_eq!(patches[&0].kills, Some(9));
    }

    #[test]
    fn test_positional_fallback_uses_first_candidate() {
        // First-match-wins: "player0" is tried before "player1" and "p0".
        let lookup = build_lookup(&[
            entry("player0", "Kills", 2.0),
            entry("p0", "Kills", 7.0),
        ]);
        let patches = map_to_players(&[player("Alice", 0, 1)], &lookup);
        assert_eq!(patches[&0].kills, Some(2));
    }

    #[test]
    fn test_team_slot_candidate() {
        let lookup = build_lookup(&[entry("2-3", "Gold", 400.0)]);
        let patches = map_to_players(&[player("Zed", 3, 2)], &lookup);
        assert_eq!(patches[&3].gold, Some(400));
    }

    #[test]
    fn test_decode_miss_yields_no_patch() {
        let lookup = build_lookup(&[entry("somebody_else", "Kills", 5.0)]);
        let patches = map_to_players(&[player("Alice", 0, 1)], &lookup);
        assert!(patches.is_empty());
    }

    #[test]
    fn test_damage_taken_beats_damage_dealt() {
        let lookup = build_lookup(&[
            entry("Alice", "DamageTaken", 100.0),
            entry("Alice", "DamageDone", 250.0),
        ]);
        let patches = map_to_players(&[player("Alice", 0, 1)], &lookup);
        assert_eq!(patches[&0].damage_taken, Some(100));
        assert_eq!(patches[&0].damage_dealt, Some(250));
    }

    #[test]
    fn test_same_field_collision_is_deterministic() {
        // Both variables classify as kills; sorted variable order means
        // "totalkills" is processed after "herokills" and wins.
        let lookup = build_lookup(&[
            entry("Alice", "TotalKills", 11.0),
            entry("Alice", "HeroKills", 4.0),
        ]);
        let patches = map_to_players(&[player("Alice", 0, 1)], &lookup);
        assert_eq!(patches[&0].kills, Some(11));
    }

    #[test]
    fn test_unknown_variables_are_ignored() {
        let lookup = build_lookup(&[
            entry("Alice", "Kills", 5.0),
            entry("Alice", "PingMs", 48.0),
        ]);
        let patches = map_to_players(&[player("Alice", 0, 1)], &lookup);
        assert_eq!(patches[&0].kills, Some(5));
        assert!(patches[&0].gold.is_none());
    }

    #[test]
    fn test_random_class_flag() {
        let lookup = build_lookup(&[entry("Alice", "RandomHero", 1.0)]);
        let patches = map_to_players(&[player("Alice", 0, 1)], &lookup);
        assert_eq!(patches[&0].random_class, Some(true));
    }

    #[test]
    fn test_class_name_round_trip() {
        let packed = u32::from_be_bytes(*b"Mage");
        assert_eq!(decode_class_name(f64::from(packed)), "Mage");
    }

    #[test]
    fn test_class_name_shorter_than_four_bytes() {
        // "Ork" packed with a trailing NUL.
        let packed = u32::from_be_bytes([b'O', b'r', b'k', 0]);
        assert_eq!(decode_class_name(f64::from(packed)), "Ork");
    }

    #[test]
    fn test_class_name_non_printable_falls_back_to_decimal() {
        assert_eq!(decode_class_name(7.0), "7");
        assert_eq!(decode_class_name(0.0), "0");
    }

    #[test]
    fn test_class_name_variable_decodes() {
        let packed = u32::from_be_bytes(*b"Mage");
        let lookup = build_lookup(&[entry("Alice", "HeroClass", f64::from(packed))]);
        let patches = map_to_players(&[player("Alice", 0, 1)], &lookup);
        assert_eq!(patches[&0].class_name.as_deref(), Some("Mage"));
    }
}
