use serde_json::json;
use squadbook_app_lib::error::AppError;
use squadbook_app_lib::models::roster::{AddedAt, PlayerCreateInput, RootDocument};
use squadbook_app_lib::services::normalizer::normalize;
use squadbook_app_lib::services::roster_ops::{add_player, set_captain, toggle_have};
use squadbook_app_lib::services::week_snapshot::{
    checkout, commit, create_new_week, ensure_derived_fields,
};

fn opening_week() -> RootDocument {
    normalize(&json!({
        "version": "2.0",
        "currentWeek": 1,
        "weeks": {
            "1": {
                "players": [
                    { "id": "a", "name": "Pickford", "position": "goalkeeper", "team": "EVE", "price": 6.0, "have": true },
                    { "id": "b", "name": "Gvardiol", "position": "defence", "team": "MCI", "price": 4.5, "have": true },
                    { "id": "c", "name": "Palmer", "position": "midfield", "team": "CHE", "price": 10.5, "have": false }
                ],
                "captain": "a",
                "teamMembers": [ { "playerId": "a", "addedAt": 1 } ]
            }
        }
    }))
}

#[test]
fn derived_fields_follow_owned_players() {
    let document = ensure_derived_fields(&opening_week(), 1);
    let week = &document.weeks[&1];

    assert_eq!(week.total_team_cost, 10.5);
    assert_eq!(week.team_stats.total_value, 10.5);
    assert_eq!(week.team_stats.player_count, 2);
    assert_eq!(week.team_members.len(), 2);
    assert_eq!(week.team_members[0].added_at, AddedAt::Week(1));
    assert!(matches!(week.team_members[1].added_at, AddedAt::Timestamp(_)));
}

#[test]
fn frozen_week_survives_later_edits() {
    let start = ensure_derived_fields(&opening_week(), 1);
    let before = start.weeks[&1].clone();

    let advanced = create_new_week(&start).unwrap();
    assert_eq!(advanced.current_week, 2);
    assert!(advanced.weeks[&1].is_read_only);
    assert!(!advanced.weeks[&2].is_read_only);

    let (edited, _) = toggle_have(&advanced, 2, "c").unwrap();
    let edited = set_captain(&edited, 2, "c").unwrap();
    let (edited, _) = add_player(
        &edited,
        2,
        PlayerCreateInput {
            name: "Haaland".to_string(),
            position: "forward".to_string(),
            team: "MCI".to_string(),
            price: 15.0,
            have: Some(true),
            status: None,
            notes: None,
        },
    )
    .unwrap();

    let frozen = &edited.weeks[&1];
    assert_eq!(frozen.players, before.players);
    assert_eq!(frozen.captain, before.captain);
    assert_eq!(frozen.total_team_cost, before.total_team_cost);
    assert_eq!(frozen.team_members, before.team_members);

    let live = &edited.weeks[&2];
    assert_eq!(live.players.len(), 4);
    assert_eq!(live.captain.as_deref(), Some("c"));
    assert_eq!(live.total_team_cost, 36.0);
}

#[test]
fn repeated_advances_freeze_every_earlier_week() {
    let mut document = opening_week();
    for _ in 0..3 {
        document = create_new_week(&document).unwrap();
    }

    assert_eq!(document.current_week, 4);
    assert_eq!(document.week_numbers(), vec![1, 2, 3, 4]);
    for week in 1..4 {
        assert!(document.weeks[&week].is_read_only, "week {week}");
    }
    assert!(!document.weeks[&4].is_read_only);
}

#[test]
fn frozen_weeks_have_no_checkout() {
    let advanced = create_new_week(&opening_week()).unwrap();

    let error = checkout(&advanced, 1).expect_err("week 1 is frozen");
    assert!(matches!(error, AppError::ReadOnlyWeek { week: 1 }));

    let error = checkout(&advanced, 9).expect_err("week 9 does not exist");
    assert!(matches!(error, AppError::Validation { .. }));
}

#[test]
fn stale_checkout_cannot_commit_after_freeze() {
    let start = opening_week();
    let mut draft = checkout(&start, 1).unwrap();
    draft.record_mut().players[2].have = true;

    let advanced = create_new_week(&start).unwrap();
    let error = commit(&advanced, draft).expect_err("week froze in between");
    assert!(matches!(error, AppError::ReadOnlyWeek { .. }));
    assert!(!advanced.weeks[&1].players[2].have);
}

#[test]
fn existing_next_week_is_a_conflict() {
    let mut document = opening_week();
    let copy = document.weeks[&1].clone();
    document.weeks.insert(2, copy);

    let error = create_new_week(&document).expect_err("week 2 exists");
    assert!(matches!(error, AppError::Conflict { .. }));
}

#[test]
fn read_only_week_is_not_rederived() {
    let advanced = create_new_week(&opening_week()).unwrap();
    let mut tampered = advanced.clone();
    if let Some(week) = tampered.weeks.get_mut(&1) {
        week.total_team_cost = 999.0;
    }

    let after = ensure_derived_fields(&tampered, 1);
    assert_eq!(after.weeks[&1].total_team_cost, 999.0);
}
