use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use reqwest::Method;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::remote::{ErrorBody, RemoteMethod, RemoteRequest, RemoteResponse};
use crate::models::roster::{RootDocument, WeekRecord};
use crate::models::settings::{BackendKind, RemoteSettings};
use crate::services::normalizer::normalize_week;
use crate::storage::StorageAdapter;
use crate::utils::redact::redact_sensitive_data;

/// Request/response channel to the relational store endpoint.
#[async_trait::async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn send(&self, request: RemoteRequest) -> AppResult<RemoteResponse>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn try_new(settings: &RemoteSettings) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Some(StdDuration::from_secs(90)))
            .build()
            .map_err(|err| AppError::transport(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl RemoteTransport for HttpTransport {
    async fn send(&self, request: RemoteRequest) -> AppResult<RemoteResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        let method = match request.method {
            RemoteMethod::Get => Method::GET,
            RemoteMethod::Post => Method::POST,
            RemoteMethod::Put => Method::PUT,
            RemoteMethod::Delete => Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                AppError::transport(format!("request to {url} timed out"))
            } else {
                AppError::transport(format!("request to {url} failed: {err}"))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| AppError::transport(format!("failed to read response body: {err}")))?;

        debug!(
            target: "app::remote",
            method = %request.method,
            path = %request.path,
            status,
            latency_ms = start.elapsed().as_millis() as u64,
            "remote responded"
        );

        Ok(RemoteResponse { status, body })
    }
}

/// Backend that reaches the relational store only through [`RemoteTransport`].
#[derive(Clone)]
pub struct RemoteAdapter {
    transport: Arc<dyn RemoteTransport>,
}

impl RemoteAdapter {
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self { transport }
    }

    pub fn over_http(settings: &RemoteSettings) -> AppResult<Self> {
        Ok(Self::new(Arc::new(HttpTransport::try_new(settings)?)))
    }

    async fn request(
        &self,
        method: RemoteMethod,
        path: &str,
        body: Option<JsonValue>,
    ) -> AppResult<Option<JsonValue>> {
        if let Some(payload) = body.as_ref() {
            let sanitized = redact_sensitive_data(payload)
                .unwrap_or_else(|_| JsonValue::String("<redacted>".to_string()));
            debug!(target: "app::remote", %method, path, payload = %sanitized, "sending remote request");
        }

        let mut request = RemoteRequest::new(method, path);
        if let Some(payload) = body {
            request = request.with_body(payload);
        }

        let response = self.transport.send(request).await?;
        interpret_response(response)
    }

    async fn request_optional(&self, path: &str) -> AppResult<Option<JsonValue>> {
        match self.request(RemoteMethod::Get, path, None).await {
            Ok(value) => Ok(value),
            Err(AppError::Remote { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn list_weeks(&self) -> AppResult<Vec<(u32, WeekRecord)>> {
        let value = self
            .request(RemoteMethod::Get, "/weeks", None)
            .await?
            .unwrap_or_else(|| json!([]));

        let items = value.as_array().cloned().unwrap_or_default();
        let mut weeks = Vec::with_capacity(items.len());
        for item in items {
            let Some(week_number) = item
                .get("weekNumber")
                .and_then(JsonValue::as_u64)
                .and_then(|value| u32::try_from(value).ok())
            else {
                warn!(target: "app::remote", "skipping week row without weekNumber");
                continue;
            };
            let payload = item.get("payload").cloned().unwrap_or(JsonValue::Null);
            weeks.push((week_number, normalize_week(&payload, week_number)));
        }
        Ok(weeks)
    }

    pub async fn get_week(&self, week_number: u32) -> AppResult<Option<WeekRecord>> {
        let value = self
            .request_optional(&format!("/weeks/{week_number}"))
            .await?;
        Ok(value.map(|item| {
            let payload = item.get("payload").cloned().unwrap_or(item);
            normalize_week(&payload, week_number)
        }))
    }

    pub async fn create_week(&self, week_number: u32, record: &WeekRecord) -> AppResult<()> {
        let body = json!({
            "weekNumber": week_number,
            "payload": serde_json::to_value(record)?,
        });
        self.request(RemoteMethod::Post, "/weeks", Some(body)).await?;
        Ok(())
    }

    pub async fn put_week(&self, week_number: u32, record: &WeekRecord) -> AppResult<()> {
        let body = json!({ "payload": serde_json::to_value(record)? });
        self.request(RemoteMethod::Put, &format!("/weeks/{week_number}"), Some(body))
            .await?;
        Ok(())
    }

    pub async fn delete_week(&self, week_number: u32) -> AppResult<()> {
        self.request(RemoteMethod::Delete, &format!("/weeks/{week_number}"), None)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageAdapter for RemoteAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn ready(&self) -> AppResult<()> {
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
        let value = self.request_optional(&entry_path(key)).await?;
        Ok(value.and_then(|item| {
            item.get("value")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        }))
    }

    async fn set_raw(&self, key: &str, value: String) -> AppResult<()> {
        self.request(
            RemoteMethod::Put,
            &entry_path(key),
            Some(json!({ "value": value })),
        )
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.request(RemoteMethod::Delete, &entry_path(key), None)
            .await?;
        Ok(())
    }

    async fn get_all_raw(&self) -> AppResult<BTreeMap<String, String>> {
        let value = self
            .request(RemoteMethod::Get, "/entries", None)
            .await?
            .unwrap_or_else(|| json!({}));

        let mut entries = BTreeMap::new();
        if let Some(map) = value.as_object() {
            for (key, raw) in map {
                if let Some(text) = raw.as_str() {
                    entries.insert(key.clone(), text.to_string());
                }
            }
        }
        Ok(entries)
    }

    async fn clear(&self) -> AppResult<()> {
        self.request(RemoteMethod::Delete, "/entries", None).await?;
        self.request(RemoteMethod::Delete, "/root", None).await?;
        Ok(())
    }

    async fn read_root_raw(&self) -> AppResult<Option<JsonValue>> {
        self.request_optional("/root").await
    }

    async fn write_root(&self, document: &RootDocument) -> AppResult<()> {
        let body = serde_json::to_value(document)?;
        self.request(RemoteMethod::Put, "/root", Some(body)).await?;
        Ok(())
    }

    async fn write_week(&self, document: &RootDocument, week_number: u32) -> AppResult<()> {
        let Some(record) = document.weeks.get(&week_number) else {
            return self.write_root(document).await;
        };
        if !self.has_root_data().await? {
            return self.write_root(document).await;
        }
        self.put_week(week_number, record).await
    }
}

fn entry_path(key: &str) -> String {
    format!("/entries/{}", urlencoding::encode(key))
}

/// Non-2xx responses become [`AppError::Remote`] carrying the server's
/// `{message, details}`; a 2xx body that is not JSON is its own failure.
pub fn interpret_response(response: RemoteResponse) -> AppResult<Option<JsonValue>> {
    let success = response.is_success();
    let RemoteResponse { status, body } = response;

    if !success {
        let error_body = serde_json::from_str::<ErrorBody>(&body).ok();
        return Err(match error_body {
            Some(ErrorBody { message, details }) => AppError::remote(status, message, details),
            None => AppError::remote(
                status,
                format!("Request failed with status {status}"),
                if body.trim().is_empty() {
                    None
                } else {
                    Some(JsonValue::String(body))
                },
            ),
        });
    }

    if status == 204 || body.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&body)
        .map(Some)
        .map_err(|err| AppError::malformed_response(status, err.to_string()))
}
