use crate::validators::{ValidationErrors, NON_FIELD_ERRORS};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";
pub const NOT_FOUND: &str = "Not found.";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Bulk validation failed for {} item(s)", .0.iter().filter(|e| !e.is_empty()).count())]
    BulkValidation(Vec<ValidationErrors>),

    #[error("Registration not found: {reg_id}")]
    RegistrationNotFound { reg_id: i64 },

    #[error("Provider not found: {name}")]
    ProviderNotFound { name: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: i64 },

    #[error("Username already taken: {username}")]
    UsernameTaken { username: String },

    #[error("Authentication credentials were not provided")]
    NotAuthenticated,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Admin endpoints are disabled")]
    AdminDisabled,

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Storage unavailable: {cause}")]
    StorageUnavailable { cause: String },

    #[error("Migration {migration} failed: {cause}")]
    MigrationFailed { migration: String, cause: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ErrorResponse {
    fn new(error: &str, detail: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            detail: detail.into(),
            cause: None,
        }
    }

    fn with_cause(mut self, cause: &str) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            // Field errors are rendered as the bare field -> messages map
            RegistryError::Validation(errors) => {
                return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
            }
            RegistryError::BulkValidation(errors) => {
                return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
            }
            RegistryError::RegistrationNotFound { reg_id } => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(
                    "registration_not_found",
                    format!("Registration {} does not exist", reg_id),
                ),
            ),
            RegistryError::ProviderNotFound { name } => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(
                    "provider_not_found",
                    format!("No provider registered as '{}'", name),
                ),
            ),
            RegistryError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("not_found", NOT_FOUND),
            ),
            RegistryError::UsernameTaken { username } => (
                StatusCode::CONFLICT,
                ErrorResponse::new(
                    "username_taken",
                    format!("A user named '{}' already exists", username),
                ),
            ),
            RegistryError::NotAuthenticated => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("not_authenticated", NOT_AUTHENTICATED),
            ),
            RegistryError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("authentication_failed", "Invalid token."),
            ),
            RegistryError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("permission_denied", PERMISSION_DENIED),
            ),
            RegistryError::AdminDisabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("admin_disabled", "Admin endpoints are not configured"),
            ),
            RegistryError::InvalidRequest { message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("invalid_request", message.clone()),
            ),
            RegistryError::StorageUnavailable { cause } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("storage_unavailable", "Storage backend is unavailable")
                    .with_cause(cause),
            ),
            RegistryError::MigrationFailed { migration, cause } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("migration_failed", format!("Migration {} failed", migration))
                    .with_cause(cause),
            ),
            RegistryError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("internal_error", msg.clone()),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<ValidationErrors> for RegistryError {
    fn from(errors: ValidationErrors) -> Self {
        RegistryError::Validation(errors)
    }
}

impl From<tokio_postgres::Error> for RegistryError {
    fn from(err: tokio_postgres::Error) -> Self {
        RegistryError::Internal(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for RegistryError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        RegistryError::StorageUnavailable {
            cause: format!("Pool error: {}", err),
        }
    }
}

/// Bodies of the wrong shape come back as `non_field_errors`; unreadable
/// bodies as `invalid_request`. Both are 400.
impl From<JsonRejection> for RegistryError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                let mut errors = ValidationErrors::new();
                errors.add(NON_FIELD_ERRORS, err.body_text());
                RegistryError::Validation(errors)
            }
            other => RegistryError::InvalidRequest {
                message: other.body_text(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
