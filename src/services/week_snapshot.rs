//! Derived-field computation and the freeze-then-clone week lifecycle.
//!
//! Weeks are edited through [`checkout`] / [`commit`]: a checkout is an owned
//! deep copy of a writable week, and frozen weeks have no checkout path at
//! all. Every function here takes the document by reference and returns a
//! new one.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::roster::{AddedAt, RootDocument, TeamMember, TeamStats, WeekRecord};
use crate::services::normalizer::ensure_unique_ids;

/// Recompute `teamMembers`, `teamStats` and `totalTeamCost` for one week.
///
/// Other weeks are left untouched, as is any read-only week.
pub fn ensure_derived_fields(document: &RootDocument, week_number: u32) -> RootDocument {
    let mut next = document.clone();
    match next.weeks.get_mut(&week_number) {
        Some(record) if !record.is_read_only => derive_week(record),
        Some(_) => {
            debug!(target: "app::roster", week_number, "skipping derived fields for read-only week");
        }
        None => {
            debug!(target: "app::roster", week_number, "no such week, nothing to derive");
        }
    }
    next
}

/// Derive team fields from the player list in place.
///
/// Duplicate player ids are re-identified first, so every owned player maps
/// to exactly one member. Members already on the team keep their `addedAt`;
/// new ones are stamped now.
/// Captain and vice-captain roles pointing at players that are not owned are
/// cleared.
pub(crate) fn derive_week(record: &mut WeekRecord) {
    ensure_unique_ids(&mut record.players);

    let previous: HashMap<&str, &AddedAt> = record
        .team_members
        .iter()
        .map(|member| (member.player_id.as_str(), &member.added_at))
        .collect();

    let now = Utc::now().to_rfc3339();
    let team_members: Vec<TeamMember> = record
        .players
        .iter()
        .filter(|player| player.have)
        .map(|player| TeamMember {
            player_id: player.id.clone(),
            added_at: previous
                .get(player.id.as_str())
                .map(|added_at| (*added_at).clone())
                .unwrap_or_else(|| AddedAt::Timestamp(now.clone())),
        })
        .collect();

    let total_value: f64 = record
        .players
        .iter()
        .filter(|player| player.have)
        .map(|player| player.price)
        .sum();

    let owns = |id: &Option<String>| {
        id.as_deref()
            .map(|id| record.players.iter().any(|player| player.id == id && player.have))
            .unwrap_or(false)
    };
    let captain = record.captain.clone().filter(|_| owns(&record.captain));
    let vice_captain = record
        .vice_captain
        .clone()
        .filter(|_| owns(&record.vice_captain));

    record.team_stats = TeamStats {
        total_value,
        player_count: team_members.len() as u32,
        updated_date: now,
    };
    record.total_team_cost = total_value;
    record.team_members = team_members;
    record.captain = captain;
    record.vice_captain = vice_captain;
}

/// Freeze the current week and continue in `currentWeek + 1`.
///
/// The new week is cloned from the snapshot taken before the freeze, so the
/// two records share nothing.
pub fn create_new_week(document: &RootDocument) -> AppResult<RootDocument> {
    let current = document.current_week;
    let next_week = current
        .checked_add(1)
        .ok_or_else(|| AppError::validation("week number overflow"))?;

    if document.weeks.contains_key(&next_week) {
        return Err(AppError::conflict(format!("week {next_week} already exists")));
    }

    let mut snapshot = document
        .week(current)
        .cloned()
        .ok_or_else(|| {
            AppError::validation_with_details("current week is missing", json!(current))
        })?;
    if !snapshot.is_read_only {
        derive_week(&mut snapshot);
    }

    let mut frozen = snapshot.clone();
    frozen.is_read_only = true;

    let mut upcoming = snapshot;
    upcoming.is_read_only = false;
    derive_week(&mut upcoming);

    let mut next = document.clone();
    for (week_number, record) in next.weeks.iter_mut() {
        if *week_number < next_week {
            record.is_read_only = true;
        }
    }
    next.weeks.insert(current, frozen);
    next.weeks.insert(next_week, upcoming);
    next.current_week = next_week;

    info!(target: "app::roster", frozen_week = current, new_week = next_week, "advanced to new week");
    Ok(next)
}

/// Owned, writable copy of one week.
#[derive(Debug, Clone)]
pub struct WeekCheckout {
    week_number: u32,
    record: WeekRecord,
}

impl WeekCheckout {
    pub fn week_number(&self) -> u32 {
        self.week_number
    }

    pub fn record(&self) -> &WeekRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut WeekRecord {
        &mut self.record
    }
}

pub fn checkout(document: &RootDocument, week_number: u32) -> AppResult<WeekCheckout> {
    let record = document.week(week_number).ok_or_else(|| {
        AppError::validation_with_details("week does not exist", json!(week_number))
    })?;

    if record.is_read_only {
        return Err(AppError::read_only_week(week_number));
    }

    Ok(WeekCheckout {
        week_number,
        record: record.clone(),
    })
}

/// Write a checkout back, recomputing its derived fields.
///
/// Fails if the week was frozen or removed after the checkout was taken.
pub fn commit(document: &RootDocument, checkout: WeekCheckout) -> AppResult<RootDocument> {
    let WeekCheckout {
        week_number,
        mut record,
    } = checkout;

    match document.week(week_number) {
        Some(existing) if existing.is_read_only => {
            return Err(AppError::read_only_week(week_number));
        }
        Some(_) => {}
        None => {
            return Err(AppError::validation_with_details(
                "week does not exist",
                json!(week_number),
            ));
        }
    }

    record.is_read_only = false;
    derive_week(&mut record);

    let mut next = document.clone();
    next.weeks.insert(week_number, record);
    Ok(next)
}
