//! Pure roster commands. Each takes the document and the target week and
//! returns a new document; the input is never modified, and a rejected
//! command leaves the caller's document as it was.

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::roster::{
    Player, PlayerCreateInput, PlayerStatus, PlayerUpdateInput, Position, RootDocument, WeekRecord,
    WeekSummary, WeekView,
};
use crate::services::week_snapshot::{checkout, commit};

pub fn add_player(
    document: &RootDocument,
    week_number: u32,
    input: PlayerCreateInput,
) -> AppResult<(RootDocument, Player)> {
    let mut draft = checkout(document, week_number)?;

    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("player name is required"));
    }
    let position = parse_position(&input.position)?;
    let price = validate_price(input.price)?;
    let status = parse_status(input.status.as_deref())?;

    let player = Player {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        position,
        team: input.team.trim().to_string(),
        price,
        have: input.have.unwrap_or(false),
        status,
        notes: input.notes.unwrap_or_default(),
        extra: Default::default(),
    };

    draft.record_mut().players.push(player.clone());
    let next = commit(document, draft)?;
    info!(target: "app::roster", week_number, player_id = %player.id, "player added");
    Ok((next, player))
}

pub fn update_player(
    document: &RootDocument,
    week_number: u32,
    player_id: &str,
    patch: PlayerUpdateInput,
) -> AppResult<(RootDocument, Player)> {
    let mut draft = checkout(document, week_number)?;
    let player = find_player_mut(draft.record_mut(), player_id)?;

    if let Some(name) = patch.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("player name is required"));
        }
        player.name = name.to_string();
    }
    if let Some(position) = patch.position {
        player.position = parse_position(&position)?;
    }
    if let Some(team) = patch.team {
        player.team = team.trim().to_string();
    }
    if let Some(price) = patch.price {
        player.price = validate_price(price)?;
    }
    if let Some(have) = patch.have {
        player.have = have;
    }
    if let Some(status) = patch.status {
        player.status = parse_status(status.as_deref())?;
    }
    if let Some(notes) = patch.notes {
        player.notes = notes;
    }

    let updated = player.clone();
    let next = commit(document, draft)?;
    debug!(target: "app::roster", week_number, player_id, "player updated");
    Ok((next, updated))
}

pub fn delete_player(
    document: &RootDocument,
    week_number: u32,
    player_id: &str,
) -> AppResult<RootDocument> {
    let mut draft = checkout(document, week_number)?;
    let record = draft.record_mut();

    let before = record.players.len();
    record.players.retain(|player| player.id != player_id);
    if record.players.len() == before {
        return Err(AppError::not_found());
    }
    if record.captain.as_deref() == Some(player_id) {
        record.captain = None;
    }
    if record.vice_captain.as_deref() == Some(player_id) {
        record.vice_captain = None;
    }

    let next = commit(document, draft)?;
    info!(target: "app::roster", week_number, player_id, "player deleted");
    Ok(next)
}

/// Flip team membership. Derivation drops any role the player loses with it.
pub fn toggle_have(
    document: &RootDocument,
    week_number: u32,
    player_id: &str,
) -> AppResult<(RootDocument, Player)> {
    let mut draft = checkout(document, week_number)?;
    let player = find_player_mut(draft.record_mut(), player_id)?;
    player.have = !player.have;
    let toggled = player.clone();

    let next = commit(document, draft)?;
    debug!(target: "app::roster", week_number, player_id, have = toggled.have, "membership toggled");
    Ok((next, toggled))
}

/// Assign the captaincy. Choosing the current captain again clears it;
/// taking the role from the vice-captain clears the vice role.
pub fn set_captain(
    document: &RootDocument,
    week_number: u32,
    player_id: &str,
) -> AppResult<RootDocument> {
    let mut draft = checkout(document, week_number)?;
    let record = draft.record_mut();
    ensure_owned(record, player_id)?;

    if record.captain.as_deref() == Some(player_id) {
        record.captain = None;
    } else {
        if record.vice_captain.as_deref() == Some(player_id) {
            record.vice_captain = None;
        }
        record.captain = Some(player_id.to_string());
    }

    let next = commit(document, draft)?;
    debug!(target: "app::roster", week_number, captain = ?next.weeks[&week_number].captain, "captain set");
    Ok(next)
}

pub fn set_vice_captain(
    document: &RootDocument,
    week_number: u32,
    player_id: &str,
) -> AppResult<RootDocument> {
    let mut draft = checkout(document, week_number)?;
    let record = draft.record_mut();
    ensure_owned(record, player_id)?;

    if record.vice_captain.as_deref() == Some(player_id) {
        record.vice_captain = None;
    } else {
        if record.captain.as_deref() == Some(player_id) {
            record.captain = None;
        }
        record.vice_captain = Some(player_id.to_string());
    }

    let next = commit(document, draft)?;
    debug!(target: "app::roster", week_number, vice_captain = ?next.weeks[&week_number].vice_captain, "vice-captain set");
    Ok(next)
}

/// Any existing week can be viewed, frozen or not.
pub fn go_to_week(document: &RootDocument, week_number: u32) -> AppResult<WeekView> {
    let record = document.week(week_number).ok_or_else(|| {
        AppError::validation_with_details("week does not exist", json!(week_number))
    })?;

    Ok(WeekView {
        week_number,
        is_current: week_number == document.current_week,
        is_read_only: record.is_read_only,
        record: record.clone(),
    })
}

pub fn week_summary(document: &RootDocument, week_number: u32) -> AppResult<WeekSummary> {
    let record = document.week(week_number).ok_or_else(|| {
        AppError::validation_with_details("week does not exist", json!(week_number))
    })?;

    let name_of = |id: &Option<String>| {
        id.as_deref()
            .and_then(|id| record.player(id))
            .map(|player| player.name.clone())
    };

    Ok(WeekSummary {
        week_number,
        player_count: record.players.len(),
        team_size: record.team_stats.player_count,
        total_team_cost: record.total_team_cost,
        captain_name: name_of(&record.captain),
        vice_captain_name: name_of(&record.vice_captain),
        is_read_only: record.is_read_only,
    })
}

fn find_player_mut<'a>(record: &'a mut WeekRecord, player_id: &str) -> AppResult<&'a mut Player> {
    record
        .players
        .iter_mut()
        .find(|player| player.id == player_id)
        .ok_or_else(AppError::not_found)
}

fn ensure_owned(record: &WeekRecord, player_id: &str) -> AppResult<()> {
    match record.player(player_id) {
        Some(player) if player.have => Ok(()),
        Some(_) => Err(AppError::validation_with_details(
            "only players on the team can hold a role",
            json!(player_id),
        )),
        None => Err(AppError::not_found()),
    }
}

fn parse_position(raw: &str) -> AppResult<Position> {
    Position::parse(raw)
        .ok_or_else(|| AppError::validation_with_details("unknown position", json!(raw)))
}

fn parse_status(raw: Option<&str>) -> AppResult<Option<PlayerStatus>> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => PlayerStatus::parse(value)
            .map(Some)
            .ok_or_else(|| AppError::validation_with_details("unknown status", json!(value))),
    }
}

fn validate_price(price: f64) -> AppResult<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("price must be a non-negative number"));
    }
    Ok(price)
}
