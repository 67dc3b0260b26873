use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::roster::{
    Player, PlayerCreateInput, PlayerUpdateInput, RootDocument, WeekSummary, WeekView,
};

use super::{AppState, CommandError, CommandResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerListFilters {
    pub search: Option<String>,
    pub positions: Option<Vec<String>>,
    pub statuses: Option<Vec<String>>,
    pub have: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl Default for PlayerListFilters {
    fn default() -> Self {
        Self {
            search: None,
            positions: None,
            statuses: None,
            have: None,
            sort_by: Some("position".to_string()),
            sort_order: Some("asc".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerListResponse {
    pub week_number: u32,
    pub is_read_only: bool,
    pub items: Vec<Player>,
    pub total: usize,
}

pub async fn roster_document(state: &AppState) -> CommandResult<RootDocument> {
    state.roster().document().await.map_err(CommandError::from)
}

pub async fn roster_current_week(state: &AppState) -> CommandResult<WeekView> {
    state.roster().current_view().await.map_err(CommandError::from)
}

pub async fn players_list(
    state: &AppState,
    filters: Option<PlayerListFilters>,
) -> CommandResult<PlayerListResponse> {
    let view = state.roster().current_view().await?;
    let filters = filters.unwrap_or_default();

    let items = filter_players(view.record.players, filters);
    debug!(target: "app::command", week_number = view.week_number, returned = items.len(), "players_list");

    Ok(PlayerListResponse {
        week_number: view.week_number,
        is_read_only: view.is_read_only,
        total: items.len(),
        items,
    })
}

pub async fn players_create(state: &AppState, payload: PlayerCreateInput) -> CommandResult<Player> {
    state
        .roster()
        .add_player(payload)
        .await
        .map_err(CommandError::from)
}

pub async fn players_update(
    state: &AppState,
    id: String,
    payload: PlayerUpdateInput,
) -> CommandResult<Player> {
    state
        .roster()
        .update_player(&id, payload)
        .await
        .map_err(CommandError::from)
}

pub async fn players_delete(state: &AppState, id: String) -> CommandResult<WeekView> {
    state
        .roster()
        .delete_player(&id)
        .await
        .map_err(CommandError::from)
}

pub async fn players_toggle_have(state: &AppState, id: String) -> CommandResult<Player> {
    state
        .roster()
        .toggle_have(&id)
        .await
        .map_err(CommandError::from)
}

pub async fn captain_set(state: &AppState, id: String) -> CommandResult<WeekView> {
    state
        .roster()
        .set_captain(&id)
        .await
        .map_err(CommandError::from)
}

pub async fn vice_captain_set(state: &AppState, id: String) -> CommandResult<WeekView> {
    state
        .roster()
        .set_vice_captain(&id)
        .await
        .map_err(CommandError::from)
}

pub async fn weeks_create(state: &AppState) -> CommandResult<WeekView> {
    state
        .roster()
        .create_new_week()
        .await
        .map_err(CommandError::from)
}

pub async fn weeks_go_to(state: &AppState, week_number: u32) -> CommandResult<WeekView> {
    state
        .roster()
        .go_to_week(week_number)
        .await
        .map_err(CommandError::from)
}

pub async fn weeks_summary(
    state: &AppState,
    week_number: Option<u32>,
) -> CommandResult<WeekSummary> {
    state
        .roster()
        .week_summary(week_number)
        .await
        .map_err(CommandError::from)
}

fn filter_players(players: Vec<Player>, filters: PlayerListFilters) -> Vec<Player> {
    let positions = normalize_set(filters.positions);
    let statuses = normalize_set(filters.statuses);
    let search = filters
        .search
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());

    let mut filtered: Vec<Player> = players
        .into_iter()
        .filter(|player| match_filters(player, &positions, &statuses, filters.have, search.as_deref()))
        .collect();

    sort_players(
        &mut filtered,
        filters.sort_by.as_deref(),
        filters.sort_order.as_deref(),
    );
    filtered
}

fn match_filters(
    player: &Player,
    positions: &HashSet<String>,
    statuses: &HashSet<String>,
    have: Option<bool>,
    search: Option<&str>,
) -> bool {
    if !positions.is_empty() && !positions.contains(player.position.as_str()) {
        return false;
    }

    if !statuses.is_empty() {
        match player.status {
            Some(status) if statuses.contains(status.as_str()) => {}
            _ => return false,
        }
    }

    if let Some(have) = have {
        if player.have != have {
            return false;
        }
    }

    if let Some(search) = search {
        let in_name = player.name.to_lowercase().contains(search);
        let in_team = player.team.to_lowercase().contains(search);
        let in_notes = player.notes.to_lowercase().contains(search);
        if !in_name && !in_team && !in_notes {
            return false;
        }
    }

    true
}

fn sort_players(players: &mut [Player], sort_by: Option<&str>, sort_order: Option<&str>) {
    let order_desc = sort_order.unwrap_or("asc").eq_ignore_ascii_case("desc");
    let key = sort_by.unwrap_or("position");

    players.sort_by(|a, b| {
        let ordering = match key {
            "name" => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            "team" => a.team.to_lowercase().cmp(&b.team.to_lowercase()),
            "price" => a.price.total_cmp(&b.price),
            _ => a
                .position
                .rank()
                .cmp(&b.position.rank())
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        };

        if order_desc {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn normalize_set(values: Option<Vec<String>>) -> HashSet<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}
