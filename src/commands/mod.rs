pub mod diagnostics;
pub mod roster;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use tracing::{error, warn};

use crate::error::AppError;
use crate::models::settings::BackendKind;
use crate::services::bootstrap_service::BootstrapResult;
use crate::services::diagnostics::DiagnosticsLog;
use crate::services::migration_service::MigrationReport;
use crate::services::roster_service::RosterService;

#[derive(Clone)]
pub struct AppState {
    roster_service: Arc<RosterService>,
    diagnostics: DiagnosticsLog,
    requested_backend: BackendKind,
    active_backend: BackendKind,
    fell_back: bool,
    migration: MigrationReport,
}

impl AppState {
    pub fn new(
        bootstrap: BootstrapResult,
        diagnostics: DiagnosticsLog,
        migration: MigrationReport,
    ) -> Self {
        Self {
            roster_service: Arc::new(RosterService::new(Arc::clone(&bootstrap.adapter))),
            diagnostics,
            requested_backend: bootstrap.requested,
            active_backend: bootstrap.backend,
            fell_back: bootstrap.fell_back,
            migration,
        }
    }

    pub fn roster(&self) -> Arc<RosterService> {
        Arc::clone(&self.roster_service)
    }

    pub fn diagnostics(&self) -> &DiagnosticsLog {
        &self.diagnostics
    }

    pub fn requested_backend(&self) -> BackendKind {
        self.requested_backend
    }

    pub fn active_backend(&self) -> BackendKind {
        self.active_backend
    }

    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    pub fn migration(&self) -> &MigrationReport {
        &self.migration
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl CommandError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<JsonValue>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
        }
    }
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        let code = error.code().as_str();
        match error {
            AppError::Validation { message, details } => CommandError::new(code, message, details),
            AppError::NotFound => CommandError::new(code, "The requested player or week does not exist", None),
            AppError::Conflict { message } => CommandError::new(code, message, None),
            AppError::ReadOnlyWeek { week } => CommandError::new(
                code,
                format!("Week {week} is read-only"),
                Some(json!({ "week": week })),
            ),
            AppError::Transaction { message } => {
                error!(target: "app::command", %message, "write transaction failed in command");
                CommandError::new(code, "The change could not be saved", Some(json!(message)))
            }
            AppError::AdapterInit { backend, reason } => CommandError::new(
                code,
                reason,
                Some(json!({ "backend": backend })),
            ),
            AppError::Remote {
                status,
                message,
                details,
            } => {
                let mut merged = JsonMap::new();
                merged.insert("status".to_string(), json!(status));
                match details {
                    Some(JsonValue::Object(map)) => merged.extend(map),
                    Some(value) => {
                        merged.insert("info".to_string(), value);
                    }
                    None => {}
                }
                warn!(target: "app::command", status, %message, "remote error in command");
                CommandError::new(code, message, Some(JsonValue::Object(merged)))
            }
            AppError::MalformedResponse { status, details } => CommandError::new(
                code,
                "Failed to parse JSON response",
                Some(json!({ "status": status, "info": details })),
            ),
            AppError::Transport { message } => CommandError::new(code, message, None),
            AppError::Database { message } => {
                error!(target: "app::command", %message, "database error in command");
                CommandError::new(code, message, None)
            }
            AppError::Serialization(error) => {
                error!(target: "app::command", error = %error, "serialization error in command");
                CommandError::new(code, "Serialization failed", None)
            }
            AppError::Io(error) => {
                error!(target: "app::command", error = %error, "io error in command");
                CommandError::new(code, "File system access failed", None)
            }
            AppError::Other(message) => {
                error!(target: "app::command", %message, "unexpected error in command");
                CommandError::new(code, message, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_keep_status_and_details() {
        let error = AppError::remote(400, "Invalid week number", Some(json!({ "week": "0" })));
        let command = CommandError::from(error);

        assert_eq!(command.code, "REMOTE_ERROR");
        assert_eq!(command.message, "Invalid week number");
        let details = command.details.unwrap();
        assert_eq!(details["status"], json!(400));
        assert_eq!(details["week"], json!("0"));
    }

    #[test]
    fn read_only_week_has_stable_code() {
        let command = CommandError::from(AppError::read_only_week(3));
        assert_eq!(command.code, "READ_ONLY_WEEK");
        assert_eq!(command.details, Some(json!({ "week": 3 })));
    }

    #[test]
    fn malformed_response_uses_fixed_message() {
        let command = CommandError::from(AppError::malformed_response(200, "expected value"));
        assert_eq!(command.code, "INVALID_RESPONSE");
        assert_eq!(command.message, "Failed to parse JSON response");
    }
}
