use std::fmt;

use rusqlite;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    NotFound,
    Conflict,
    ReadOnlyWeek,
    Transaction,
    AdapterInit,
    Remote,
    InvalidResponse,
    Transport,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::ReadOnlyWeek => "READ_ONLY_WEEK",
            ErrorCode::Transaction => "TRANSACTION_FAILED",
            ErrorCode::AdapterInit => "ADAPTER_INIT_FAILED",
            ErrorCode::Remote => "REMOTE_ERROR",
            ErrorCode::InvalidResponse => "INVALID_RESPONSE",
            ErrorCode::Transport => "TRANSPORT_ERROR",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {message}")]
    Database { message: String },

    #[error("record not found")]
    NotFound,

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<JsonValue>,
    },

    #[error("week {week} is read-only")]
    ReadOnlyWeek { week: u32 },

    #[error("transaction aborted: {message}")]
    Transaction { message: String },

    #[error("storage backend {backend} failed to initialize: {reason}")]
    AdapterInit { backend: String, reason: String },

    #[error("{message}")]
    Remote {
        status: u16,
        message: String,
        details: Option<JsonValue>,
    },

    #[error("Failed to parse JSON response")]
    MalformedResponse { status: u16, details: String },

    #[error("remote transport failed: {message}")]
    Transport { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            details: Some(details),
        }
    }

    pub fn not_found() -> Self {
        warn!(target: "app::database", "resource not found");
        AppError::NotFound
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::conflict", %message, "conflict error");
        AppError::Conflict { message }
    }

    pub fn read_only_week(week: u32) -> Self {
        warn!(target: "app::roster", week, "rejected edit against read-only week");
        AppError::ReadOnlyWeek { week }
    }

    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::database", %message, "database error");
        AppError::Database { message }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::storage", %message, "transaction aborted");
        AppError::Transaction { message }
    }

    pub fn adapter_init(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        let backend = backend.into();
        let reason = reason.into();
        warn!(target: "app::bootstrap", %backend, %reason, "adapter initialization failed");
        AppError::AdapterInit { backend, reason }
    }

    pub fn remote(status: u16, message: impl Into<String>, details: Option<JsonValue>) -> Self {
        let message = message.into();
        match &details {
            Some(payload) => {
                warn!(target: "app::remote", status, details = %payload, %message, "remote error");
            }
            None => {
                warn!(target: "app::remote", status, %message, "remote error");
            }
        }
        AppError::Remote {
            status,
            message,
            details,
        }
    }

    pub fn malformed_response(status: u16, details: impl Into<String>) -> Self {
        let details = details.into();
        warn!(target: "app::remote", status, %details, "remote response body is not valid JSON");
        AppError::MalformedResponse { status, details }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::remote", %message, "remote transport error");
        AppError::Transport { message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::Validation,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::Conflict { .. } => ErrorCode::Conflict,
            AppError::ReadOnlyWeek { .. } => ErrorCode::ReadOnlyWeek,
            AppError::Transaction { .. } => ErrorCode::Transaction,
            AppError::AdapterInit { .. } => ErrorCode::AdapterInit,
            AppError::Remote { .. } => ErrorCode::Remote,
            AppError::MalformedResponse { .. } => ErrorCode::InvalidResponse,
            AppError::Transport { .. } => ErrorCode::Transport,
            AppError::Database { .. }
            | AppError::Serialization(_)
            | AppError::Io(_)
            | AppError::Other(_) => ErrorCode::Unknown,
        }
    }

    pub fn remote_status(&self) -> Option<u16> {
        match self {
            AppError::Remote { status, .. } | AppError::MalformedResponse { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn remote_details(&self) -> Option<&JsonValue> {
        match self {
            AppError::Remote { details, .. } | AppError::Validation { details, .. } => {
                details.as_ref()
            }
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::{QueryReturnedNoRows, SqliteFailure};
        use rusqlite::ErrorCode;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                AppError::conflict("unique or check constraint violated")
            }
            _ => {
                error!(target: "app::database", error = ?error, "sqlite error");
                AppError::database(error.to_string())
            }
        }
    }
}
