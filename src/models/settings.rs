use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_DATA_DIR: &str = "./squadbook-data";
const DEFAULT_NAMESPACE: &str = "squadbook";
const DEFAULT_INIT_TIMEOUT_MS: u64 = 2_500;
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BackendKind {
    #[serde(rename = "localstorage")]
    KeyValue,
    #[serde(rename = "indexeddb")]
    DocumentStore,
    #[serde(rename = "remote")]
    Remote,
}

impl BackendKind {
    /// Backend that never needs an asynchronous open step.
    pub const SAFE_DEFAULT: BackendKind = BackendKind::KeyValue;

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::KeyValue => "localstorage",
            BackendKind::DocumentStore => "indexeddb",
            BackendKind::Remote => "remote",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "localstorage" | "local" | "keyvalue" => Some(BackendKind::KeyValue),
            "indexeddb" | "document" | "documentstore" => Some(BackendKind::DocumentStore),
            "remote" | "sql" | "remote-sql" => Some(BackendKind::Remote),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSettings {
    pub base_url: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub requested_backend: Option<BackendKind>,
    pub document_store_enabled: bool,
    pub init_timeout: Duration,
    pub key_value_namespace: String,
    pub remote: Option<RemoteSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            requested_backend: None,
            document_store_enabled: true,
            init_timeout: Duration::from_millis(DEFAULT_INIT_TIMEOUT_MS),
            key_value_namespace: DEFAULT_NAMESPACE.to_string(),
            remote: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_dir = std::env::var("SQUADBOOK_DATA_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let requested_backend = std::env::var("SQUADBOOK_STORAGE_BACKEND")
            .ok()
            .and_then(|value| BackendKind::parse(&value));

        let document_store_enabled = !std::env::var("SQUADBOOK_DISABLE_INDEXEDDB")
            .ok()
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        let init_timeout = std::env::var("SQUADBOOK_INIT_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.init_timeout);

        let key_value_namespace = std::env::var("SQUADBOOK_KV_NAMESPACE")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.key_value_namespace);

        let request_timeout = std::env::var("SQUADBOOK_REMOTE_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS);

        let remote = std::env::var("SQUADBOOK_REMOTE_BASE_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .map(|base_url| RemoteSettings {
                base_url,
                request_timeout: Duration::from_millis(request_timeout),
            });

        Self {
            data_dir,
            requested_backend,
            document_store_enabled,
            init_timeout,
            key_value_namespace,
            remote,
        }
    }

    pub fn document_store_path(&self) -> PathBuf {
        self.data_dir.join("squadbook-documents.sqlite")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("squadbook-preferences.sqlite")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
