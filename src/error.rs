//! Error types for glaura
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, invalid input, unsupported transition)
//! - 3: Authentication required (missing or rejected bearer token)
//! - 4: Operation failed (missing entity, network or upstream failure)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the glaura CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const AUTH_REQUIRED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for glaura operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    // Authentication (exit code 3)
    #[error("Authentication required: {0}")]
    Auth(String),

    // Operation failures (exit code 4)
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::UnsupportedOperation(_)
            | Error::ConfigNotFound(_) => exit_codes::USER_ERROR,

            Error::Auth(_) => exit_codes::AUTH_REQUIRED,

            Error::NotFound { .. }
            | Error::Transient(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Only network failures and 5xx answers are worth a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Short machine-readable kind used in JSON output and roll-up warnings.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::InvalidConfig(_) | Error::ConfigNotFound(_) => "invalid_config",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::UnsupportedOperation(_) => "unsupported_operation",
            Error::Auth(_) => "auth",
            Error::NotFound { .. } => "not_found",
            Error::Transient(_) => "transient",
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::OperationFailed(_) => "operation_failed",
        }
    }

    /// Structured details for the JSON error envelope.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::NotFound { entity, id } => Some(serde_json::json!({
                "entity": entity,
                "id": id,
            })),
            Error::ConfigNotFound(path) => Some(serde_json::json!({
                "path": path.to_string_lossy(),
            })),
            Error::Validation(message)
            | Error::InvalidConfig(message)
            | Error::InvalidArgument(message)
            | Error::UnsupportedOperation(message)
            | Error::Auth(message)
            | Error::Transient(message) => Some(serde_json::json!({
                "message": message,
            })),
            _ => None,
        }
    }

    /// Classify a non-success HTTP status from the port-call API.
    pub fn from_status(status: u16, entity: &'static str, id: &str, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", body.trim())
        };
        match status {
            400 | 422 => Error::Validation(message),
            401 => Error::Auth(message),
            404 => Error::not_found(entity, id),
            500..=599 | 408 | 429 => Error::Transient(message),
            _ => Error::OperationFailed(message),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status.as_u16() == 401 {
                return Error::Auth(err.to_string());
            }
            if status.is_server_error() {
                return Error::Transient(err.to_string());
            }
        }
        if err.is_decode() {
            return Error::OperationFailed(format!("malformed response: {err}"));
        }
        if err.is_builder() {
            return Error::InvalidConfig(err.to_string());
        }
        Error::Transient(err.to_string())
    }
}

/// Result type alias for glaura operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
