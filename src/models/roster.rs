use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

pub const CURRENT_SCHEMA_VERSION: &str = "2.0";
pub const DEFAULT_WEEK: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Goalkeeper,
    Defence,
    Midfield,
    Forward,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Position::Goalkeeper => "goalkeeper",
            Position::Defence => "defence",
            Position::Midfield => "midfield",
            Position::Forward => "forward",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "goalkeeper" => Some(Position::Goalkeeper),
            "defence" => Some(Position::Defence),
            "midfield" => Some(Position::Midfield),
            "forward" => Some(Position::Forward),
            _ => None,
        }
    }

    /// Pitch order, goalkeeper first.
    pub fn rank(self) -> usize {
        match self {
            Position::Goalkeeper => 0,
            Position::Defence => 1,
            Position::Midfield => 2,
            Position::Forward => 3,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Green,
    Yellow,
    Red,
}

impl PlayerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerStatus::Green => "green",
            PlayerStatus::Yellow => "yellow",
            PlayerStatus::Red => "red",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "green" => Some(PlayerStatus::Green),
            "yellow" => Some(PlayerStatus::Yellow),
            "red" => Some(PlayerStatus::Red),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub position: Position,
    pub team: String,
    pub price: f64,
    pub have: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PlayerStatus>,
    #[serde(default)]
    pub notes: String,
    /// Fields written by other clients, carried through untouched.
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

/// When a player joined the team. Migrated legacy data only knows the week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AddedAt {
    Week(u64),
    Timestamp(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub player_id: String,
    pub added_at: AddedAt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamStats {
    pub total_value: f64,
    pub player_count: u32,
    pub updated_date: String,
}

impl TeamStats {
    pub fn zeroed(updated_date: impl Into<String>) -> Self {
        Self {
            total_value: 0.0,
            player_count: 0,
            updated_date: updated_date.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeekRecord {
    pub players: Vec<Player>,
    pub captain: Option<String>,
    pub vice_captain: Option<String>,
    pub team_members: Vec<TeamMember>,
    pub team_stats: TeamStats,
    pub total_team_cost: f64,
    pub is_read_only: bool,
}

impl WeekRecord {
    pub fn empty(updated_date: impl Into<String>) -> Self {
        Self {
            players: Vec::new(),
            captain: None,
            vice_captain: None,
            team_members: Vec::new(),
            team_stats: TeamStats::zeroed(updated_date),
            total_team_cost: 0.0,
            is_read_only: false,
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id == player_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RootDocument {
    pub version: String,
    pub current_week: u32,
    pub weeks: BTreeMap<u32, WeekRecord>,
}

impl RootDocument {
    pub fn with_single_week(updated_date: impl Into<String>) -> Self {
        let mut weeks = BTreeMap::new();
        weeks.insert(DEFAULT_WEEK, WeekRecord::empty(updated_date));
        Self {
            version: CURRENT_SCHEMA_VERSION.to_string(),
            current_week: DEFAULT_WEEK,
            weeks,
        }
    }

    pub fn week(&self, week_number: u32) -> Option<&WeekRecord> {
        self.weeks.get(&week_number)
    }

    pub fn current(&self) -> Option<&WeekRecord> {
        self.weeks.get(&self.current_week)
    }

    pub fn week_numbers(&self) -> Vec<u32> {
        self.weeks.keys().copied().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCreateInput {
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub team: String,
    pub price: f64,
    #[serde(default)]
    pub have: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdateInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub have: Option<bool>,
    #[serde(default)]
    pub status: Option<Option<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeekView {
    pub week_number: u32,
    pub is_current: bool,
    pub is_read_only: bool,
    pub record: WeekRecord,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeekSummary {
    pub week_number: u32,
    pub player_count: usize,
    pub team_size: u32,
    pub total_team_cost: f64,
    pub captain_name: Option<String>,
    pub vice_captain_name: Option<String>,
    pub is_read_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn week_keys_serialize_as_strings() {
        let doc = RootDocument::with_single_week("2025-01-01T00:00:00Z");
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["version"], json!("2.0"));
        assert_eq!(value["currentWeek"], json!(1));
        assert!(value["weeks"].get("1").is_some());
        assert_eq!(value["weeks"]["1"]["isReadOnly"], json!(false));
        assert_eq!(value["weeks"]["1"]["captain"], json!(null));

        let back: RootDocument = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn team_member_has_only_two_keys() {
        let member = TeamMember {
            player_id: "p1".into(),
            added_at: AddedAt::Week(1),
        };
        let value = serde_json::to_value(&member).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["addedAt", "playerId"]);
    }

    #[test]
    fn position_parse_is_case_insensitive() {
        assert_eq!(Position::parse(" Forward "), Some(Position::Forward));
        assert_eq!(Position::parse("striker"), None);
    }
}
