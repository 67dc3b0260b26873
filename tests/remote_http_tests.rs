use std::time::Duration as StdDuration;

use httpmock::prelude::*;
use serde_json::json;
use squadbook_app_lib::error::AppError;
use squadbook_app_lib::models::settings::RemoteSettings;
use squadbook_app_lib::storage::remote::RemoteAdapter;
use squadbook_app_lib::storage::StorageAdapter;

fn adapter_for(server: &MockServer) -> RemoteAdapter {
    RemoteAdapter::over_http(&RemoteSettings {
        base_url: server.base_url(),
        request_timeout: StdDuration::from_secs(2),
    })
    .expect("http client")
}

#[tokio::test]
async fn structured_error_body_is_surfaced() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/weeks/0");
            then.status(400)
                .header("content-type", "application/json")
                .json_body(json!({
                    "message": "Week number must be a positive integer",
                    "details": "0"
                }));
        })
        .await;

    let error = adapter_for(&server)
        .get_week(0)
        .await
        .expect_err("400 should fail");

    assert_eq!(error.remote_status(), Some(400));
    assert_eq!(error.to_string(), "Week number must be a positive integer");
    assert_eq!(error.remote_details(), Some(&json!("0")));
}

#[tokio::test]
async fn unparsable_success_body_is_reported() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/root");
            then.status(200)
                .header("content-type", "application/json")
                .body("<html>gateway</html>");
        })
        .await;

    let error = adapter_for(&server)
        .get_root_data()
        .await
        .expect_err("invalid JSON should fail");

    assert!(matches!(error, AppError::MalformedResponse { status: 200, .. }));
    assert_eq!(error.to_string(), "Failed to parse JSON response");
}

#[tokio::test]
async fn plain_server_error_gets_generic_message() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/weeks");
            then.status(502).body("bad gateway");
        })
        .await;

    let error = adapter_for(&server)
        .list_weeks()
        .await
        .expect_err("502 should fail");

    assert_eq!(error.remote_status(), Some(502));
    assert_eq!(error.to_string(), "Request failed with status 502");
}

#[tokio::test]
async fn missing_root_reads_as_default_document() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/root");
            then.status(404)
                .header("content-type", "application/json")
                .json_body(json!({ "message": "Root document not found" }));
        })
        .await;

    let adapter = adapter_for(&server);
    assert!(!adapter.has_root_data().await.unwrap());
    assert_eq!(adapter.get_root_data().await.unwrap().current_week, 1);
}

#[tokio::test]
async fn root_document_is_normalized_on_read() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/root");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "version": "2.0",
                    "currentWeek": 4,
                    "weeks": {
                        "2": { "players": [], "isReadOnly": true },
                        "3": { "players": [] }
                    }
                }));
        })
        .await;

    let document = adapter_for(&server).get_root_data().await.unwrap();
    assert_eq!(document.current_week, 3);
    assert!(document.weeks[&2].is_read_only);
    assert_eq!(document.weeks[&3].total_team_cost, 0.0);
}

#[tokio::test]
async fn entry_writes_send_stringified_value() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/entries/theme")
                .json_body(json!({ "value": "{\"mode\":\"dark\"}" }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "key": "theme", "value": "{\"mode\":\"dark\"}" }));
        })
        .await;

    adapter_for(&server)
        .set("theme", &json!({ "mode": "dark" }))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn week_creation_posts_week_number_and_payload() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/weeks")
                .body_contains("\"weekNumber\":5");
            then.status(201)
                .header("content-type", "application/json")
                .json_body(json!({ "weekNumber": 5, "payload": {} }));
        })
        .await;

    let record = squadbook_app_lib::services::normalizer::default_document().weeks[&1].clone();
    adapter_for(&server).create_week(5, &record).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let adapter = RemoteAdapter::over_http(&RemoteSettings {
        base_url: "http://127.0.0.1:9".to_string(),
        request_timeout: StdDuration::from_millis(500),
    })
    .expect("http client");

    let error = adapter.read_root_raw().await.expect_err("should fail");
    assert!(matches!(error, AppError::Transport { .. }));
}
