use std::sync::Arc;
use std::time::Duration;

use squadbook_app_lib::commands::diagnostics::{diagnostics_events, storage_status};
use squadbook_app_lib::commands::roster::{
    captain_set, players_create, players_delete, players_list, players_toggle_have,
    players_update, roster_document, vice_captain_set, weeks_create, weeks_go_to, weeks_summary,
    PlayerListFilters,
};
use squadbook_app_lib::db::DbPool;
use squadbook_app_lib::launch_with;
use squadbook_app_lib::models::diagnostics::DiagnosticType;
use squadbook_app_lib::models::roster::{PlayerCreateInput, PlayerUpdateInput};
use squadbook_app_lib::models::settings::{AppConfig, BackendKind};
use squadbook_app_lib::services::bootstrap_service::TracingNotifier;
use squadbook_app_lib::services::diagnostics::DiagnosticsLog;
use squadbook_app_lib::storage::key_value::{KeyValueStore, SqliteKeyValueStore};
use tempfile::tempdir;

fn config_for(dir: &std::path::Path, backend: BackendKind) -> AppConfig {
    AppConfig {
        data_dir: dir.to_path_buf(),
        requested_backend: Some(backend),
        init_timeout: Duration::from_secs(5),
        ..AppConfig::default()
    }
}

fn player(name: &str, position: &str, price: f64, have: bool) -> PlayerCreateInput {
    PlayerCreateInput {
        name: name.to_string(),
        position: position.to_string(),
        team: "BHA".to_string(),
        price,
        have: Some(have),
        status: None,
        notes: None,
    }
}

#[tokio::test]
async fn launch_migrates_legacy_key_value_data() {
    let dir = tempdir().expect("temp dir");
    let config = config_for(dir.path(), BackendKind::KeyValue);

    std::fs::create_dir_all(&config.data_dir).unwrap();
    let store = SqliteKeyValueStore::new(DbPool::new(config.preferences_path()).unwrap());
    store
        .set_item(
            "squadbook:fantasyTeamData",
            r#"{"players":[{"id":"m1","name":"Mitoma","position":"midfield","team":"BHA","price":6.5,"have":true}]}"#,
        )
        .unwrap();

    let state = launch_with(config, Arc::new(TracingNotifier), DiagnosticsLog::new())
        .await
        .expect("launch");

    let status = storage_status(&state).await.unwrap();
    assert_eq!(status.active_backend, "localstorage");
    assert!(!status.fell_back);

    let document = roster_document(&state).await.unwrap();
    assert_eq!(document.weeks[&1].players[0].name, "Mitoma");
    assert_eq!(document.weeks[&1].total_team_cost, 6.5);
    assert!(store.get_item("squadbook:fantasyTeamData_backup_v1").unwrap().is_some());
    assert!(store.get_item("squadbook:fantasyTeamData").unwrap().is_some());
}

#[tokio::test]
async fn full_week_cycle_on_document_store() {
    let dir = tempdir().expect("temp dir");
    let diagnostics = DiagnosticsLog::new();
    let state = launch_with(
        config_for(dir.path(), BackendKind::DocumentStore),
        Arc::new(TracingNotifier),
        diagnostics.clone(),
    )
    .await
    .expect("launch");

    assert_eq!(state.active_backend(), BackendKind::DocumentStore);
    let events = diagnostics_events(&state).await.unwrap();
    assert!(events.iter().any(|event| event.event_type == DiagnosticType::Success));

    let keeper = players_create(&state, player("Verbruggen", "goalkeeper", 4.5, true))
        .await
        .unwrap();
    let striker = players_create(&state, player("Welbeck", "forward", 5.5, true))
        .await
        .unwrap();
    let bench = players_create(&state, player("Adingra", "midfield", 5.0, false))
        .await
        .unwrap();

    captain_set(&state, striker.id.clone()).await.unwrap();
    let view = vice_captain_set(&state, keeper.id.clone()).await.unwrap();
    assert_eq!(view.record.captain.as_deref(), Some(striker.id.as_str()));
    assert_eq!(view.record.vice_captain.as_deref(), Some(keeper.id.as_str()));
    assert_eq!(view.record.total_team_cost, 10.0);

    let owned = players_list(
        &state,
        Some(PlayerListFilters {
            have: Some(true),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(owned.total, 2);
    assert_eq!(owned.items[0].name, "Verbruggen");

    let next = weeks_create(&state).await.unwrap();
    assert_eq!(next.week_number, 2);
    assert!(next.is_current);

    players_update(
        &state,
        striker.id.clone(),
        PlayerUpdateInput {
            price: Some(6.0),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    players_toggle_have(&state, bench.id.clone()).await.unwrap();

    let past = weeks_go_to(&state, 1).await.unwrap();
    assert!(past.is_read_only);
    assert_eq!(past.record.total_team_cost, 10.0);

    let rejected = players_delete(&state, keeper.id.clone())
        .await
        .expect_err("frozen week");
    assert_eq!(rejected.code, "READ_ONLY_WEEK");

    weeks_go_to(&state, 2).await.unwrap();
    let summary = weeks_summary(&state, None).await.unwrap();
    assert_eq!(summary.week_number, 2);
    assert_eq!(summary.team_size, 3);
    assert_eq!(summary.total_team_cost, 15.5);
    assert_eq!(summary.captain_name.as_deref(), Some("Welbeck"));

    let document = roster_document(&state).await.unwrap();
    assert_eq!(document.current_week, 2);
    assert!(document.weeks[&1].is_read_only);
    assert_eq!(document.weeks[&1].player(&striker.id).unwrap().price, 5.5);
}

#[tokio::test]
async fn invalid_input_maps_to_validation_code() {
    let dir = tempdir().expect("temp dir");
    let state = launch_with(
        config_for(dir.path(), BackendKind::KeyValue),
        Arc::new(TracingNotifier),
        DiagnosticsLog::new(),
    )
    .await
    .expect("launch");

    let error = players_create(&state, player("", "forward", 5.0, true))
        .await
        .expect_err("empty name");
    assert_eq!(error.code, "VALIDATION_ERROR");

    let error = weeks_go_to(&state, 7).await.expect_err("missing week");
    assert_eq!(error.code, "VALIDATION_ERROR");
}
