use serde::{Deserialize, Serialize};

/// One raw telemetry tuple emitted by match instrumentation.
///
/// Entity keys and variable names are free text; both are normalized
/// before any lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEntry {
    pub entity_key: String,
    pub variable_name: String,
    pub numeric_value: f64,
}

/// Decoded per-player statistics for a single match.
///
/// Ephemeral: produced by the telemetry decoder, consumed once by the
/// aggregate updater, never persisted on its own. Every field is optional
/// because telemetry routinely omits variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatPatch {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kills: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deaths: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub assists: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub damage_dealt: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub damage_taken: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub random_class: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub class_name: Option<String>,
}

impl PlayerStatPatch {
    /// True when no variable decoded into any field.
    pub fn is_empty(&self) -> bool {
        self.kills.is_none()
            && self.deaths.is_none()
            && self.assists.is_none()
            && self.gold.is_none()
            && self.damage_dealt.is_none()
            && self.damage_taken.is_none()
            && self.random_class.is_none()
            && self.class_name.is_none()
    }
}
