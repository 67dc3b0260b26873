use std::sync::Arc;

use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::settings::BackendKind;
use crate::storage::key_value::KeyValueStore;

pub const STORAGE_BACKEND_KEY: &str = "storageBackend";

/// Durable user preferences. Values are plain strings, not JSON.
#[derive(Clone)]
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> AppResult<Option<BackendKind>> {
        let stored = self.store.get_item(STORAGE_BACKEND_KEY)?;
        Ok(stored.and_then(|value| {
            let parsed = BackendKind::parse(&value);
            if parsed.is_none() {
                warn!(target: "app::storage", stored = %value, "ignoring unknown backend preference");
            }
            parsed
        }))
    }

    pub fn set_backend(&self, backend: BackendKind) -> AppResult<()> {
        self.store.set_item(STORAGE_BACKEND_KEY, backend.as_str())?;
        info!(target: "app::storage", backend = %backend, "backend preference saved");
        Ok(())
    }

    pub fn clear_backend(&self) -> AppResult<()> {
        self.store.remove_item(STORAGE_BACKEND_KEY)
    }
}
