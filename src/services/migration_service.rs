use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::roster::{
    AddedAt, RootDocument, TeamMember, TeamStats, WeekRecord, CURRENT_SCHEMA_VERSION,
    DEFAULT_WEEK,
};
use crate::services::normalizer::{
    default_document, ensure_unique_ids, normalize, normalize_player,
};
use crate::storage::{StorageAdapter, LEGACY_BACKUP_KEY, LEGACY_DATA_KEY};

/// Upgrade a single-week legacy payload to the versioned multi-week document.
///
/// Documents that already carry `version` or `weeks` are only normalized, so
/// running the migration on its own output is a no-op. Anything without a
/// recognizable player list becomes the default document. `legacy` is
/// borrowed immutably and never altered.
pub fn migrate_v1_to_v2(legacy: &JsonValue) -> RootDocument {
    if let Some(map) = legacy.as_object() {
        if map.contains_key("version") || map.contains_key("weeks") {
            debug!(target: "app::migration", "document already versioned, normalizing only");
            return normalize(legacy);
        }
    }

    let (players_raw, captain, vice_captain) = match legacy {
        JsonValue::Array(items) => (items, None, None),
        JsonValue::Object(map) => match map.get("players").and_then(JsonValue::as_array) {
            Some(items) => (
                items,
                map.get("captain").and_then(JsonValue::as_str),
                map.get("viceCaptain").and_then(JsonValue::as_str),
            ),
            None => {
                debug!(target: "app::migration", "no legacy player list found, using default document");
                return default_document();
            }
        },
        _ => return default_document(),
    };

    let mut players: Vec<_> = players_raw
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| normalize_player(raw, DEFAULT_WEEK, index))
        .collect();
    ensure_unique_ids(&mut players);

    let team_members: Vec<TeamMember> = players
        .iter()
        .filter(|player| player.have)
        .map(|player| TeamMember {
            player_id: player.id.clone(),
            added_at: AddedAt::Week(u64::from(DEFAULT_WEEK)),
        })
        .collect();

    let total_value: f64 = players
        .iter()
        .filter(|player| player.have)
        .map(|player| player.price)
        .sum();

    let week = WeekRecord {
        captain: captain.map(str::to_string),
        vice_captain: vice_captain.map(str::to_string),
        team_stats: TeamStats {
            total_value,
            player_count: team_members.len() as u32,
            updated_date: Utc::now().to_rfc3339(),
        },
        total_team_cost: total_value,
        team_members,
        players,
        is_read_only: false,
    };

    info!(
        target: "app::migration",
        player_count = week.players.len(),
        owned = week.team_members.len(),
        "migrated legacy roster into week 1"
    );

    RootDocument {
        version: CURRENT_SCHEMA_VERSION.to_string(),
        current_week: DEFAULT_WEEK,
        weeks: [(DEFAULT_WEEK, week)].into_iter().collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MigrationOutcome {
    /// Versioned data exists; nothing was touched.
    AlreadyVersioned,
    NoLegacyData,
    /// Legacy payload was not valid JSON and was left alone.
    Skipped,
    Migrated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub outcome: MigrationOutcome,
    pub backup_key: Option<String>,
    pub backup_sha256: Option<String>,
}

impl MigrationReport {
    fn without_backup(outcome: MigrationOutcome) -> Self {
        Self {
            outcome,
            backup_key: None,
            backup_sha256: None,
        }
    }
}

/// Startup migration against the active backend. The legacy key is never
/// removed or rewritten.
pub struct MigrationService {
    adapter: Arc<dyn StorageAdapter>,
}

impl MigrationService {
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self { adapter }
    }

    pub async fn run(&self) -> AppResult<MigrationReport> {
        if self.adapter.has_root_data().await? {
            debug!(target: "app::migration", backend = %self.adapter.kind(), "versioned data present, skipping migration");
            return Ok(MigrationReport::without_backup(
                MigrationOutcome::AlreadyVersioned,
            ));
        }

        let Some(raw) = self.adapter.get_raw(LEGACY_DATA_KEY).await? else {
            return Ok(MigrationReport::without_backup(MigrationOutcome::NoLegacyData));
        };

        let legacy: JsonValue = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "app::migration", error = %err, "legacy payload is not valid JSON, leaving it untouched");
                return Ok(MigrationReport::without_backup(MigrationOutcome::Skipped));
            }
        };

        let digest = payload_digest(&raw);
        self.adapter.set_raw(LEGACY_BACKUP_KEY, raw.clone()).await?;

        let stored = self.adapter.get_raw(LEGACY_BACKUP_KEY).await?;
        let stored_digest = stored.as_deref().map(payload_digest);
        if stored_digest.as_deref() != Some(digest.as_str()) {
            return Err(AppError::transaction(
                "legacy backup could not be verified after writing",
            ));
        }

        let migrated = migrate_v1_to_v2(&legacy);
        let persisted = self.adapter.set_root_data(&migrated).await?;

        info!(
            target: "app::migration",
            backend = %self.adapter.kind(),
            backup_key = LEGACY_BACKUP_KEY,
            weeks = persisted.weeks.len(),
            "legacy roster migrated"
        );

        Ok(MigrationReport {
            outcome: MigrationOutcome::Migrated,
            backup_key: Some(LEGACY_BACKUP_KEY.to_string()),
            backup_sha256: Some(digest),
        })
    }
}

fn payload_digest(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    Base64.encode(hasher.finalize())
}
