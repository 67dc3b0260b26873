pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use std::sync::Arc;

use tracing::info;

use crate::commands::AppState;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::settings::AppConfig;
use crate::services::bootstrap_service::{
    DefaultAdapterFactory, Notifier, StorageBootstrapper, TracingNotifier,
};
use crate::services::diagnostics::{self, DiagnosticsLog};
use crate::services::migration_service::MigrationService;
use crate::storage::key_value::{KeyValueStore, SqliteKeyValueStore};
use crate::storage::preferences::PreferenceStore;

/// Start the persistence core with the process-wide diagnostics log.
pub async fn launch(config: AppConfig) -> AppResult<AppState> {
    launch_with(config, Arc::new(TracingNotifier), diagnostics::global()).await
}

/// Logging, backend selection, legacy migration, then command state.
pub async fn launch_with(
    config: AppConfig,
    notifier: Arc<dyn Notifier>,
    diagnostics: DiagnosticsLog,
) -> AppResult<AppState> {
    std::fs::create_dir_all(&config.data_dir)?;
    crate::utils::logger::init_logging(&config.log_dir())?;

    let preferences_db = DbPool::new(config.preferences_path())?;
    let key_value_store: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(preferences_db));

    let bootstrapper = StorageBootstrapper::new(
        Arc::new(DefaultAdapterFactory::new(
            config.clone(),
            Arc::clone(&key_value_store),
        )),
        PreferenceStore::new(key_value_store),
        notifier,
        diagnostics.clone(),
    )
    .with_timeout(config.init_timeout)
    .with_document_store_enabled(config.document_store_enabled);

    let bootstrap = bootstrapper.bootstrap(config.requested_backend).await?;
    let migration = MigrationService::new(Arc::clone(&bootstrap.adapter))
        .run()
        .await?;

    info!(
        target: "app::bootstrap",
        backend = %bootstrap.backend,
        fell_back = bootstrap.fell_back,
        migration = ?migration.outcome,
        "storage ready"
    );

    Ok(AppState::new(bootstrap, diagnostics, migration))
}
