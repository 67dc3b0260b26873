//! Canonical shape enforcement for anything read back from a storage backend.
//!
//! The normalizer only fills in what is missing or malformed; it never
//! recomputes derived fields, so running it twice yields the same document.
//! The exceptions are structural: player ids are made unique per week,
//! team members are deduplicated, and every week before `currentWeek` is
//! read-only while the rest are writable.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, warn};

use crate::models::roster::{
    AddedAt, Player, PlayerStatus, Position, RootDocument, TeamMember, TeamStats, WeekRecord,
    CURRENT_SCHEMA_VERSION, DEFAULT_WEEK,
};

pub fn default_document() -> RootDocument {
    RootDocument::with_single_week(Utc::now().to_rfc3339())
}

/// Coerce an arbitrary payload into a valid [`RootDocument`].
///
/// Non-object input and documents without any usable week fall back to the
/// default document. The input is never modified.
pub fn normalize(raw: &JsonValue) -> RootDocument {
    let Some(map) = raw.as_object() else {
        debug!(target: "app::storage", "payload is not an object, using default document");
        return default_document();
    };

    let version = map
        .get("version")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(CURRENT_SCHEMA_VERSION)
        .to_string();

    let requested_week = map
        .get("currentWeek")
        .and_then(positive_integer)
        .unwrap_or(DEFAULT_WEEK);

    let mut weeks = BTreeMap::new();
    if let Some(entries) = map.get("weeks").and_then(JsonValue::as_object) {
        for (key, value) in entries {
            match key.trim().parse::<u32>() {
                Ok(week_number) if week_number > 0 => {
                    weeks.insert(week_number, normalize_week(value, week_number));
                }
                _ => {
                    warn!(target: "app::storage", week_key = %key, "dropping week with invalid key");
                }
            }
        }
    }

    if weeks.is_empty() {
        debug!(target: "app::storage", "document has no weeks, using default document");
        return default_document();
    }

    let current_week = if weeks.contains_key(&requested_week) {
        requested_week
    } else {
        let latest = weeks.keys().next_back().copied().unwrap_or(DEFAULT_WEEK);
        warn!(
            target: "app::storage",
            requested_week,
            latest,
            "current week missing from document, pointing at latest week"
        );
        latest
    };

    for (week_number, record) in weeks.iter_mut() {
        let frozen = *week_number < current_week;
        if record.is_read_only != frozen {
            debug!(target: "app::storage", week_number, frozen, "correcting read-only flag");
            record.is_read_only = frozen;
        }
    }

    RootDocument {
        version,
        current_week,
        weeks,
    }
}

pub fn normalize_week(raw: &JsonValue, week_number: u32) -> WeekRecord {
    let empty = JsonMap::new();
    let map = raw.as_object().unwrap_or(&empty);

    let mut players: Vec<Player> = map
        .get("players")
        .and_then(JsonValue::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| normalize_player(item, week_number, index))
                .collect()
        })
        .unwrap_or_default();
    ensure_unique_ids(&mut players);

    let mut member_ids = HashSet::new();
    let team_members = map
        .get("teamMembers")
        .and_then(JsonValue::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(normalize_member)
                .filter(|member| member_ids.insert(member.player_id.clone()))
                .collect()
        })
        .unwrap_or_default();

    let team_stats = map
        .get("teamStats")
        .and_then(JsonValue::as_object)
        .map(normalize_stats)
        .unwrap_or_else(|| TeamStats::zeroed(Utc::now().to_rfc3339()));

    let total_team_cost = map
        .get("totalTeamCost")
        .and_then(finite_number)
        .unwrap_or(team_stats.total_value);

    WeekRecord {
        players,
        captain: map.get("captain").and_then(identifier),
        vice_captain: map.get("viceCaptain").and_then(identifier),
        team_members,
        team_stats,
        total_team_cost,
        is_read_only: map.get("isReadOnly").map(truthy).unwrap_or(false),
    }
}

/// Lenient player parsing shared with the legacy migrator.
pub fn normalize_player(raw: &JsonValue, week_number: u32, index: usize) -> Option<Player> {
    let map = raw.as_object()?;

    let id = map
        .get("id")
        .and_then(identifier)
        .unwrap_or_else(|| format!("w{week_number}-p{}", index + 1));

    let position = map
        .get("position")
        .and_then(JsonValue::as_str)
        .and_then(Position::parse)
        .unwrap_or_else(|| {
            debug!(target: "app::storage", player_id = %id, "unknown position, defaulting to midfield");
            Position::Midfield
        });

    let price = map
        .get("price")
        .and_then(|value| match value {
            JsonValue::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            other => finite_number(other),
        })
        .map(|value| value.max(0.0))
        .unwrap_or(0.0);

    let extra: JsonMap<String, JsonValue> = map
        .iter()
        .filter(|(key, _)| !PLAYER_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Some(Player {
        name: text(map.get("name")),
        position,
        team: text(map.get("team")),
        price,
        have: map.get("have").map(truthy).unwrap_or(false),
        status: map
            .get("status")
            .and_then(JsonValue::as_str)
            .and_then(PlayerStatus::parse),
        notes: text(map.get("notes")),
        extra,
        id,
    })
}

const PLAYER_FIELDS: [&str; 8] = [
    "id", "name", "position", "team", "price", "have", "status", "notes",
];

/// Give every later duplicate of an id a `-{n}` suffix that no other player
/// in the week uses. The first occurrence keeps its id.
pub fn ensure_unique_ids(players: &mut [Player]) {
    let taken: HashSet<String> = players.iter().map(|player| player.id.clone()).collect();
    let mut assigned: HashSet<String> = HashSet::with_capacity(players.len());

    for player in players.iter_mut() {
        if assigned.insert(player.id.clone()) {
            continue;
        }
        let mut suffix = 2;
        let replacement = loop {
            let candidate = format!("{}-{suffix}", player.id);
            if !taken.contains(&candidate) && !assigned.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        warn!(
            target: "app::storage",
            duplicate = %player.id,
            replacement = %replacement,
            "re-identifying duplicate player id"
        );
        assigned.insert(replacement.clone());
        player.id = replacement;
    }
}

fn normalize_member(raw: &JsonValue) -> Option<TeamMember> {
    let map = raw.as_object()?;
    let player_id = map.get("playerId").and_then(identifier)?;
    let added_at = match map.get("addedAt") {
        Some(JsonValue::Number(number)) => number
            .as_u64()
            .map(AddedAt::Week)
            .unwrap_or_else(|| AddedAt::Timestamp(number.to_string())),
        Some(JsonValue::String(value)) => AddedAt::Timestamp(value.clone()),
        _ => AddedAt::Timestamp(Utc::now().to_rfc3339()),
    };
    Some(TeamMember {
        player_id,
        added_at,
    })
}

fn normalize_stats(map: &JsonMap<String, JsonValue>) -> TeamStats {
    TeamStats {
        total_value: map
            .get("totalValue")
            .and_then(finite_number)
            .unwrap_or(0.0),
        player_count: map
            .get("playerCount")
            .and_then(JsonValue::as_u64)
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(0),
        updated_date: map
            .get("updatedDate")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
    }
}

fn positive_integer(value: &JsonValue) -> Option<u32> {
    let number = match value {
        JsonValue::Number(number) => number
            .as_u64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && *f > 0.0)
                    .map(|f| f as u64)
            })?,
        JsonValue::String(text) => text.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(number).ok().filter(|week| *week > 0)
}

fn finite_number(value: &JsonValue) -> Option<f64> {
    value.as_f64().filter(|number| number.is_finite())
}

fn identifier(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(text) if !text.trim().is_empty() => Some(text.clone()),
        JsonValue::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn text(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(text)) => text.clone(),
        Some(JsonValue::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

/// JavaScript-style truthiness, used for boolean flags written by older clients.
fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(flag) => *flag,
        JsonValue::Number(number) => number.as_f64().map(|n| n != 0.0 && !n.is_nan()).unwrap_or(false),
        JsonValue::String(text) => !text.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_objects_become_default_document() {
        for raw in [json!(null), json!(42), json!("rootData"), json!([1, 2])] {
            let doc = normalize(&raw);
            assert_eq!(doc.version, CURRENT_SCHEMA_VERSION);
            assert_eq!(doc.current_week, 1);
            assert_eq!(doc.weeks.len(), 1);
            assert!(doc.weeks[&1].players.is_empty());
        }
    }

    #[test]
    fn missing_week_fields_are_filled() {
        let raw = json!({
            "currentWeek": 2,
            "weeks": {
                "1": { "isReadOnly": 1, "teamStats": { "totalValue": 9.5, "playerCount": 2, "updatedDate": "x" } },
                "2": {}
            }
        });

        let doc = normalize(&raw);
        assert_eq!(doc.version, "2.0");
        assert_eq!(doc.current_week, 2);

        let first = &doc.weeks[&1];
        assert!(first.is_read_only);
        assert_eq!(first.total_team_cost, 9.5);
        assert!(first.team_members.is_empty());

        let second = &doc.weeks[&2];
        assert!(!second.is_read_only);
        assert_eq!(second.team_stats.total_value, 0.0);
        assert_eq!(second.team_stats.player_count, 0);
    }

    #[test]
    fn invalid_current_week_is_coerced() {
        let raw = json!({ "version": "2.0", "currentWeek": -3, "weeks": { "1": {} } });
        assert_eq!(normalize(&raw).current_week, 1);

        let raw = json!({ "currentWeek": "7", "weeks": { "1": {}, "4": {} } });
        assert_eq!(normalize(&raw).current_week, 4);
    }

    #[test]
    fn zero_usable_weeks_falls_back_to_default() {
        let raw = json!({ "version": "2.0", "currentWeek": 3, "weeks": { "abc": {}, "0": {} } });
        let doc = normalize(&raw);
        assert_eq!(doc.current_week, 1);
        assert_eq!(doc.week_numbers(), vec![1]);
    }

    #[test]
    fn normalization_is_idempotent_and_pure() {
        let raw = json!({
            "currentWeek": 1,
            "weeks": {
                "1": {
                    "players": [
                        { "id": "p1", "name": "Saka", "position": "forward", "team": "ARS", "price": 9, "have": true },
                        { "name": "No id", "position": "keeper?", "price": "free" },
                        "garbage"
                    ],
                    "teamMembers": [{ "playerId": "p1", "addedAt": 1, "extra": true }]
                }
            }
        });
        let before = raw.to_string();

        let once = normalize(&raw);
        let twice = normalize(&serde_json::to_value(&once).unwrap());

        assert_eq!(once, twice);
        assert_eq!(raw.to_string(), before);

        let players = &once.weeks[&1].players;
        assert_eq!(players.len(), 2);
        assert_eq!(players[1].id, "w1-p2");
        assert_eq!(players[1].position, Position::Midfield);
        assert_eq!(players[1].price, 0.0);
        assert_eq!(
            once.weeks[&1].team_members,
            vec![TeamMember {
                player_id: "p1".into(),
                added_at: AddedAt::Week(1)
            }]
        );
    }

    #[test]
    fn read_only_flags_follow_current_week_on_load() {
        let raw = json!({
            "currentWeek": 2,
            "weeks": {
                "1": { "isReadOnly": false },
                "2": { "isReadOnly": true },
                "3": { "isReadOnly": true }
            }
        });

        let doc = normalize(&raw);
        assert!(doc.weeks[&1].is_read_only);
        assert!(!doc.weeks[&2].is_read_only);
        assert!(!doc.weeks[&3].is_read_only);
        assert_eq!(normalize(&serde_json::to_value(&doc).unwrap()), doc);

        let single = normalize(&json!({ "currentWeek": 1, "weeks": { "1": { "isReadOnly": true } } }));
        assert!(!single.weeks[&1].is_read_only);
    }

    #[test]
    fn duplicate_ids_are_reassigned_and_members_deduplicated() {
        let raw = json!({
            "currentWeek": 1,
            "weeks": {
                "1": {
                    "players": [
                        { "id": "p1", "name": "Raya", "have": true },
                        { "id": "p1", "name": "Areola", "have": true },
                        { "id": "p1-2", "name": "Flekken", "have": false },
                        { "name": "No id" },
                        { "id": "w1-p4", "name": "Clash" }
                    ],
                    "teamMembers": [
                        { "playerId": "p1", "addedAt": 1 },
                        { "playerId": "p1", "addedAt": 2 }
                    ]
                }
            }
        });

        let doc = normalize(&raw);
        let ids: Vec<&str> = doc.weeks[&1].players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p1-3", "p1-2", "w1-p4", "w1-p4-2"]);
        assert_eq!(
            doc.weeks[&1].team_members,
            vec![TeamMember {
                player_id: "p1".into(),
                added_at: AddedAt::Week(1)
            }]
        );
        assert_eq!(normalize(&serde_json::to_value(&doc).unwrap()), doc);
    }

    #[test]
    fn unknown_player_fields_survive_and_numeric_strings_are_prices() {
        let raw = json!({
            "players": [
                { "id": "a", "name": "Rice", "position": "midfield", "price": "6.5", "have": true, "shirt": 41 }
            ]
        });
        let player = normalize_player(&raw["players"][0], 1, 0).unwrap();
        assert_eq!(player.price, 6.5);
        assert_eq!(player.extra.get("shirt"), Some(&json!(41)));

        let value = serde_json::to_value(&player).unwrap();
        assert_eq!(value["shirt"], json!(41));
        assert_eq!(normalize_player(&value, 1, 0).unwrap(), player);
    }
}
