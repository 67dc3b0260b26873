use serde::Serialize;

use crate::models::diagnostics::DiagnosticEvent;
use crate::services::migration_service::MigrationReport;

use super::{AppState, CommandResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    pub requested_backend: String,
    pub active_backend: String,
    pub fell_back: bool,
    pub migration: MigrationReport,
}

pub async fn diagnostics_events(state: &AppState) -> CommandResult<Vec<DiagnosticEvent>> {
    Ok(state.diagnostics().events())
}

pub async fn storage_status(state: &AppState) -> CommandResult<StorageStatus> {
    Ok(StorageStatus {
        requested_backend: state.requested_backend().as_str().to_string(),
        active_backend: state.active_backend().as_str().to_string(),
        fell_back: state.fell_back(),
        migration: state.migration().clone(),
    })
}
