use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::db::repositories::entry_repository::EntryRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::roster::RootDocument;
use crate::models::settings::BackendKind;
use crate::storage::{StorageAdapter, ROOT_DATA_KEY};

/// Synchronous string store shared by every logical key-value namespace.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> AppResult<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> AppResult<()>;

    fn remove_item(&self, key: &str) -> AppResult<()>;

    fn keys(&self) -> AppResult<Vec<String>>;
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        let guard = self
            .items
            .read()
            .map_err(|_| AppError::other("key-value store lock poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let mut guard = self
            .items
            .write()
            .map_err(|_| AppError::other("key-value store lock poisoned"))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> AppResult<()> {
        let mut guard = self
            .items
            .write()
            .map_err(|_| AppError::other("key-value store lock poisoned"))?;
        guard.remove(key);
        Ok(())
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        let guard = self
            .items
            .read()
            .map_err(|_| AppError::other("key-value store lock poisoned"))?;
        let mut keys: Vec<String> = guard.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Durable variant backed by the `key_value_entries` table.
#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    db: DbPool,
}

impl SqliteKeyValueStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        let row = self
            .db
            .with_connection(|conn| EntryRepository::key_value().get(conn, key))?;
        Ok(row.map(|row| row.value))
    }

    fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        self.db
            .with_connection(|conn| EntryRepository::key_value().upsert(conn, key, value))
    }

    fn remove_item(&self, key: &str) -> AppResult<()> {
        self.db
            .with_connection(|conn| EntryRepository::key_value().delete(conn, key))
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        let rows = self
            .db
            .with_connection(|conn| EntryRepository::key_value().list(conn))?;
        Ok(rows.into_iter().map(|row| row.key).collect())
    }
}

/// The synchronous backend. Values are JSON strings stored under
/// `"{namespace}:{key}"`, so several logical stores can share one
/// [`KeyValueStore`] without seeing each other's keys.
///
/// The namespace is percent-encoded, so it never contains `:` or `/`. The
/// root document sits under `"{namespace}/rootData"`, outside the entry
/// keyspace.
#[derive(Clone)]
pub struct KeyValueAdapter {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    prefix: String,
    root_key: String,
}

impl KeyValueAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let encoded = urlencoding::encode(&namespace).into_owned();
        Self {
            store,
            prefix: format!("{encoded}:"),
            root_key: format!("{encoded}/{ROOT_DATA_KEY}"),
            namespace,
        }
    }

    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()), namespace)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn unscoped<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())
    }
}

#[async_trait::async_trait]
impl StorageAdapter for KeyValueAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    async fn ready(&self) -> AppResult<()> {
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
        self.store.get_item(&self.scoped(key))
    }

    async fn set_raw(&self, key: &str, value: String) -> AppResult<()> {
        self.store.set_item(&self.scoped(key), &value)
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.store.remove_item(&self.scoped(key))
    }

    async fn get_all_raw(&self) -> AppResult<BTreeMap<String, String>> {
        let mut values = BTreeMap::new();
        for full_key in self.store.keys()? {
            let Some(key) = self.unscoped(&full_key) else {
                continue;
            };
            if let Some(value) = self.store.get_item(&full_key)? {
                values.insert(key.to_string(), value);
            }
        }
        Ok(values)
    }

    async fn clear(&self) -> AppResult<()> {
        let mut removed = 0usize;
        for full_key in self.store.keys()? {
            if self.unscoped(&full_key).is_some() {
                self.store.remove_item(&full_key)?;
                removed += 1;
            }
        }
        self.store.remove_item(&self.root_key)?;
        debug!(target: "app::storage", namespace = %self.namespace, removed, "cleared key-value namespace");
        Ok(())
    }

    async fn read_root_raw(&self) -> AppResult<Option<JsonValue>> {
        match self.store.get_item(&self.root_key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write_root(&self, document: &RootDocument) -> AppResult<()> {
        let raw = serde_json::to_string(document)?;
        self.store.set_item(&self.root_key, &raw)
    }
}
