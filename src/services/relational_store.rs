//! Request handling for the remote relational store.
//!
//! Implements the endpoint's observable contract (routes, validation, status
//! codes, `{message, details?}` error bodies) over SQLite. It also implements
//! [`RemoteTransport`], so a [`RemoteAdapter`](crate::storage::remote::RemoteAdapter)
//! can talk to it in-process.

use std::sync::Arc;

use serde_json::{json, Map as JsonMap, Value as JsonValue};
use tracing::{debug, error};

use crate::db::repositories::entry_repository::EntryRepository;
use crate::db::repositories::relational_repository::{RelationalRepository, RemoteWeekRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::remote::{CreateWeekBody, ErrorBody, RemoteMethod, RemoteRequest, RemoteResponse};
use crate::models::roster::{CURRENT_SCHEMA_VERSION, DEFAULT_WEEK};
use crate::storage::remote::RemoteTransport;

struct RouteError {
    status: u16,
    message: String,
    details: Option<JsonValue>,
}

impl RouteError {
    fn bad_request(message: impl Into<String>, details: Option<JsonValue>) -> Self {
        Self {
            status: 400,
            message: message.into(),
            details,
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: 404,
            message: message.into(),
            details: None,
        }
    }

    fn into_response(self) -> RemoteResponse {
        let body = ErrorBody {
            message: self.message,
            details: self.details,
        };
        let value = serde_json::to_value(&body).unwrap_or_else(|_| json!({ "message": "Internal server error" }));
        RemoteResponse::json(self.status, &value)
    }
}

impl From<AppError> for RouteError {
    fn from(error: AppError) -> Self {
        error!(target: "app::remote", error = %error, "relational store request failed");
        Self {
            status: 500,
            message: "Internal server error".to_string(),
            details: Some(JsonValue::String(error.to_string())),
        }
    }
}

type RouteResult = Result<RemoteResponse, RouteError>;

#[derive(Clone)]
pub struct RelationalStoreHandler {
    db: Arc<DbPool>,
}

impl RelationalStoreHandler {
    pub fn new(db: DbPool) -> Self {
        Self { db: Arc::new(db) }
    }

    pub async fn handle(&self, request: RemoteRequest) -> RemoteResponse {
        let db = Arc::clone(&self.db);
        let method = request.method;
        let path = request.path.clone();

        let outcome = tokio::task::spawn_blocking(move || route(&db, request))
            .await
            .unwrap_or_else(|err| Err(AppError::other(format!("handler task failed: {err}")).into()));

        let response = match outcome {
            Ok(response) => response,
            Err(err) => err.into_response(),
        };
        debug!(target: "app::remote", %method, path = %path, status = response.status, "relational store handled request");
        response
    }
}

#[async_trait::async_trait]
impl RemoteTransport for RelationalStoreHandler {
    async fn send(&self, request: RemoteRequest) -> AppResult<RemoteResponse> {
        Ok(self.handle(request).await)
    }
}

fn route(db: &DbPool, request: RemoteRequest) -> RouteResult {
    let path = request.path.split('?').next().unwrap_or_default().to_string();
    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match (request.method, segments.as_slice()) {
        (RemoteMethod::Get, ["root"]) => get_root(db),
        (RemoteMethod::Put, ["root"]) => put_root(db, request.body),
        (RemoteMethod::Delete, ["root"]) => delete_root(db),
        (RemoteMethod::Get, ["weeks"]) => list_weeks(db),
        (RemoteMethod::Post, ["weeks"]) => create_week(db, request.body),
        (RemoteMethod::Get, ["weeks", week]) => get_week(db, parse_week_number(week)?),
        (RemoteMethod::Put, ["weeks", week]) => {
            let week_number = parse_week_number(week)?;
            put_week(db, week_number, request.body)
        }
        (RemoteMethod::Delete, ["weeks", week]) => delete_week(db, parse_week_number(week)?),
        (RemoteMethod::Get, ["entries"]) => list_entries(db),
        (RemoteMethod::Delete, ["entries"]) => clear_entries(db),
        (RemoteMethod::Get, ["entries", key]) => get_entry(db, &decode_entry_key(key)?),
        (RemoteMethod::Put, ["entries", key]) => put_entry(db, &decode_entry_key(key)?, request.body),
        (RemoteMethod::Delete, ["entries", key]) => delete_entry(db, &decode_entry_key(key)?),
        (_, ["root"]) | (_, ["weeks"]) | (_, ["weeks", _]) | (_, ["entries"]) | (_, ["entries", _]) => {
            Err(RouteError {
                status: 405,
                message: "Method not allowed".to_string(),
                details: Some(json!({ "method": request.method.as_str(), "path": path })),
            })
        }
        _ => Err(RouteError::not_found("Route not found")),
    }
}

fn get_root(db: &DbPool) -> RouteResult {
    let document = db.with_connection(|conn| {
        let Some(root) = RelationalRepository::get_root(conn)? else {
            return Ok(None);
        };
        let weeks = RelationalRepository::list_weeks(conn)?;
        Ok(Some((root, weeks)))
    })?;

    let Some((root, weeks)) = document else {
        return Err(RouteError::not_found("Root document not found"));
    };

    let mut week_map = JsonMap::new();
    for row in weeks {
        week_map.insert(row.week_number.to_string(), parse_payload(&row)?);
    }

    Ok(RemoteResponse::json(
        200,
        &json!({
            "version": root.version,
            "currentWeek": root.current_week,
            "weeks": JsonValue::Object(week_map),
        }),
    ))
}

fn put_root(db: &DbPool, body: Option<JsonValue>) -> RouteResult {
    let Some(JsonValue::Object(map)) = body else {
        return Err(RouteError::bad_request(
            "Root document must be a JSON object",
            None,
        ));
    };

    let version = map
        .get("version")
        .and_then(JsonValue::as_str)
        .unwrap_or(CURRENT_SCHEMA_VERSION)
        .to_string();
    let current_week = map
        .get("currentWeek")
        .and_then(JsonValue::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_WEEK);

    let mut weeks = Vec::new();
    if let Some(entries) = map.get("weeks") {
        let Some(entries) = entries.as_object() else {
            return Err(RouteError::bad_request("weeks must be a JSON object", None));
        };
        for (key, payload) in entries {
            let week_number = parse_week_number(key)?;
            weeks.push((week_number, serde_json::to_string(payload).map_err(AppError::from)?));
        }
    }

    db.with_transaction(|tx| {
        RelationalRepository::upsert_root(tx, &version, current_week)?;
        RelationalRepository::delete_all_weeks(tx)?;
        for (week_number, payload) in &weeks {
            RelationalRepository::insert_week(tx, *week_number, payload)?;
        }
        Ok(())
    })?;

    get_root(db)
}

fn delete_root(db: &DbPool) -> RouteResult {
    db.with_transaction(|tx| RelationalRepository::delete_root(tx))?;
    Ok(RemoteResponse::no_content())
}

fn list_weeks(db: &DbPool) -> RouteResult {
    let rows = db.with_connection(|conn| RelationalRepository::list_weeks(conn))?;
    let items = rows
        .iter()
        .map(week_json)
        .collect::<Result<Vec<_>, RouteError>>()?;
    Ok(RemoteResponse::json(200, &JsonValue::Array(items)))
}

fn create_week(db: &DbPool, body: Option<JsonValue>) -> RouteResult {
    let body: CreateWeekBody = body
        .and_then(|value| serde_json::from_value(value).ok())
        .ok_or_else(|| RouteError::bad_request("weekNumber is required", None))?;

    let week_number = body
        .week_number
        .as_ref()
        .and_then(JsonValue::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .filter(|value| *value > 0)
        .ok_or_else(|| {
            RouteError::bad_request(
                "weekNumber must be a positive integer",
                body.week_number.clone(),
            )
        })?;

    let payload = body.payload.unwrap_or_else(|| json!({}));
    let payload_text = serde_json::to_string(&payload).map_err(AppError::from)?;

    let exists = db.with_connection(|conn| RelationalRepository::get_week(conn, week_number))?;
    if exists.is_some() {
        return Err(RouteError {
            status: 409,
            message: format!("Week {week_number} already exists"),
            details: None,
        });
    }

    db.with_connection(|conn| RelationalRepository::insert_week(conn, week_number, &payload_text))?;
    Ok(RemoteResponse::json(
        201,
        &json!({ "weekNumber": week_number, "payload": payload }),
    ))
}

fn get_week(db: &DbPool, week_number: u32) -> RouteResult {
    let row = db
        .with_connection(|conn| RelationalRepository::get_week(conn, week_number))?
        .ok_or_else(|| RouteError::not_found(format!("Week {week_number} not found")))?;
    Ok(RemoteResponse::json(200, &week_json(&row)?))
}

fn put_week(db: &DbPool, week_number: u32, body: Option<JsonValue>) -> RouteResult {
    let payload = match body {
        Some(JsonValue::Object(mut map)) => match map.remove("payload") {
            Some(payload @ JsonValue::Object(_)) => payload,
            Some(_) => {
                return Err(RouteError::bad_request("payload must be a JSON object", None));
            }
            None => JsonValue::Object(map),
        },
        _ => {
            return Err(RouteError::bad_request(
                "Week payload must be a JSON object",
                None,
            ))
        }
    };
    let payload_text = serde_json::to_string(&payload).map_err(AppError::from)?;

    db.with_connection(|conn| RelationalRepository::upsert_week(conn, week_number, &payload_text))?;
    get_week(db, week_number)
}

fn delete_week(db: &DbPool, week_number: u32) -> RouteResult {
    let deleted = db.with_connection(|conn| RelationalRepository::delete_week(conn, week_number))?;
    if deleted == 0 {
        return Err(RouteError::not_found(format!("Week {week_number} not found")));
    }
    Ok(RemoteResponse::no_content())
}

fn list_entries(db: &DbPool) -> RouteResult {
    let rows = db.with_connection(|conn| EntryRepository::relational().list(conn))?;
    let map: JsonMap<String, JsonValue> = rows
        .into_iter()
        .map(|row| (row.key, JsonValue::String(row.value)))
        .collect();
    Ok(RemoteResponse::json(200, &JsonValue::Object(map)))
}

fn clear_entries(db: &DbPool) -> RouteResult {
    db.with_connection(|conn| EntryRepository::relational().delete_all(conn))?;
    Ok(RemoteResponse::no_content())
}

fn get_entry(db: &DbPool, key: &str) -> RouteResult {
    let row = db
        .with_connection(|conn| EntryRepository::relational().get(conn, key))?
        .ok_or_else(|| RouteError::not_found(format!("Entry {key} not found")))?;
    Ok(RemoteResponse::json(
        200,
        &json!({ "key": row.key, "value": row.value, "updatedAt": row.updated_at }),
    ))
}

fn put_entry(db: &DbPool, key: &str, body: Option<JsonValue>) -> RouteResult {
    let value = body
        .as_ref()
        .and_then(|body| body.get("value"))
        .and_then(JsonValue::as_str)
        .ok_or_else(|| RouteError::bad_request("value must be a string", None))?;

    db.with_connection(|conn| EntryRepository::relational().upsert(conn, key, value))?;
    Ok(RemoteResponse::json(200, &json!({ "key": key, "value": value })))
}

fn delete_entry(db: &DbPool, key: &str) -> RouteResult {
    db.with_connection(|conn| EntryRepository::relational().delete(conn, key))?;
    Ok(RemoteResponse::no_content())
}

fn week_json(row: &RemoteWeekRow) -> Result<JsonValue, RouteError> {
    Ok(json!({
        "weekNumber": row.week_number,
        "payload": parse_payload(row)?,
        "updatedAt": row.updated_at,
    }))
}

fn parse_payload(row: &RemoteWeekRow) -> Result<JsonValue, RouteError> {
    serde_json::from_str(&row.payload)
        .map_err(|err| RouteError::from(AppError::from(err)))
}

fn parse_week_number(raw: &str) -> Result<u32, RouteError> {
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty() && trimmed.bytes().all(|byte| byte.is_ascii_digit());
    valid
        .then(|| trimmed.parse::<u32>().ok())
        .flatten()
        .filter(|value| *value > 0)
        .ok_or_else(|| {
            RouteError::bad_request(
                "Week number must be a positive integer",
                Some(JsonValue::String(raw.to_string())),
            )
        })
}

fn decode_entry_key(raw: &str) -> Result<String, RouteError> {
    urlencoding::decode(raw)
        .map(|key| key.into_owned())
        .map_err(|_| RouteError::bad_request("Malformed entry key", Some(json!(raw))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup_handler() -> (RelationalStoreHandler, tempfile::TempDir) {
        let dir = tempdir().expect("temp dir");
        let pool = DbPool::new(dir.path().join("remote.sqlite")).expect("db pool");
        (RelationalStoreHandler::new(pool), dir)
    }

    fn body(response: &RemoteResponse) -> JsonValue {
        serde_json::from_str(&response.body).expect("json body")
    }

    #[tokio::test]
    async fn root_is_missing_until_written() {
        let (handler, _dir) = setup_handler();
        let response = handler
            .handle(RemoteRequest::new(RemoteMethod::Get, "/root"))
            .await;
        assert_eq!(response.status, 404);
        assert_eq!(body(&response)["message"], json!("Root document not found"));
    }

    #[tokio::test]
    async fn put_root_rejects_non_objects() {
        let (handler, _dir) = setup_handler();
        let response = handler
            .handle(RemoteRequest::new(RemoteMethod::Put, "/root").with_body(json!([1, 2])))
            .await;
        assert_eq!(response.status, 400);
        assert!(body(&response)["message"].is_string());
    }

    #[tokio::test]
    async fn week_numbers_are_validated() {
        let (handler, _dir) = setup_handler();

        for bad in ["0", "-1", "abc", "1.5"] {
            let response = handler
                .handle(RemoteRequest::new(RemoteMethod::Get, format!("/weeks/{bad}")))
                .await;
            assert_eq!(response.status, 400, "week {bad}");
            assert_eq!(body(&response)["details"], json!(bad));
        }

        let response = handler
            .handle(RemoteRequest::new(RemoteMethod::Get, "/weeks/3"))
            .await;
        assert_eq!(response.status, 404);

        let response = handler
            .handle(RemoteRequest::new(RemoteMethod::Delete, "/weeks/3"))
            .await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn create_week_requires_positive_week_number() {
        let (handler, _dir) = setup_handler();

        let missing = handler
            .handle(RemoteRequest::new(RemoteMethod::Post, "/weeks").with_body(json!({ "payload": {} })))
            .await;
        assert_eq!(missing.status, 400);

        let negative = handler
            .handle(
                RemoteRequest::new(RemoteMethod::Post, "/weeks")
                    .with_body(json!({ "weekNumber": -2, "payload": {} })),
            )
            .await;
        assert_eq!(negative.status, 400);

        let created = handler
            .handle(
                RemoteRequest::new(RemoteMethod::Post, "/weeks")
                    .with_body(json!({ "weekNumber": 2, "payload": { "players": [] } })),
            )
            .await;
        assert_eq!(created.status, 201);

        let listed = handler
            .handle(RemoteRequest::new(RemoteMethod::Get, "/weeks"))
            .await;
        assert_eq!(body(&listed)[0]["weekNumber"], json!(2));
    }

    #[tokio::test]
    async fn unknown_routes_and_methods() {
        let (handler, _dir) = setup_handler();
        let response = handler
            .handle(RemoteRequest::new(RemoteMethod::Get, "/players"))
            .await;
        assert_eq!(response.status, 404);

        let response = handler
            .handle(RemoteRequest::new(RemoteMethod::Post, "/root"))
            .await;
        assert_eq!(response.status, 405);
    }

    #[test]
    fn entry_keys_decode_reserved_characters() {
        assert_eq!(decode_entry_key("a%20b%2Fc").ok(), Some("a b/c".to_string()));
        assert_eq!(decode_entry_key("caf%C3%A9").ok(), Some("café".to_string()));
        assert!(decode_entry_key("%FF").is_err());
    }

    #[tokio::test]
    async fn entry_keys_with_reserved_characters_round_trip() {
        let (handler, _dir) = setup_handler();
        let path = format!("/entries/{}", urlencoding::encode("team sheet/week 1"));

        let stored = handler
            .handle(RemoteRequest::new(RemoteMethod::Put, path.clone()).with_body(json!({ "value": "42" })))
            .await;
        assert_eq!(stored.status, 200);
        assert_eq!(body(&stored)["key"], json!("team sheet/week 1"));

        let fetched = handler.handle(RemoteRequest::new(RemoteMethod::Get, path)).await;
        assert_eq!(body(&fetched)["value"], json!("42"));

        let listed = handler.handle(RemoteRequest::new(RemoteMethod::Get, "/entries")).await;
        assert_eq!(body(&listed), json!({ "team sheet/week 1": "42" }));

        let malformed = handler
            .handle(RemoteRequest::new(RemoteMethod::Get, "/entries/%FF"))
            .await;
        assert_eq!(malformed.status, 400);
        assert_eq!(body(&malformed)["message"], json!("Malformed entry key"));
    }

    #[tokio::test]
    async fn put_week_replaces_one_week_only() {
        let (handler, _dir) = setup_handler();
        handler
            .handle(RemoteRequest::new(RemoteMethod::Put, "/root").with_body(json!({
                "version": "2.0",
                "currentWeek": 2,
                "weeks": { "1": { "captain": "a" }, "2": { "captain": "b" } }
            })))
            .await;

        let response = handler
            .handle(
                RemoteRequest::new(RemoteMethod::Put, "/weeks/2")
                    .with_body(json!({ "payload": { "captain": "c" } })),
            )
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(body(&response)["payload"], json!({ "captain": "c" }));

        let root = body(&handler.handle(RemoteRequest::new(RemoteMethod::Get, "/root")).await);
        assert_eq!(root["currentWeek"], json!(2));
        assert_eq!(root["weeks"]["1"], json!({ "captain": "a" }));
        assert_eq!(root["weeks"]["2"], json!({ "captain": "c" }));
    }
}
