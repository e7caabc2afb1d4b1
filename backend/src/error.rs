//! Error handling for the Agro Advisory bot
//!
//! Provides consistent JSON error responses for the HTTP surface and a single
//! error type for services and jobs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use shared::ChatId;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Dataset errors
    #[error("No advisory dataset available (tried {})", tried.join(", "))]
    DatasetUnavailable { tried: Vec<String> },

    #[error("Advisory dataset {path} is malformed: {reason}")]
    DatasetMalformed { path: String, reason: String },

    #[error("Field {0} is missing from the matched record")]
    FieldMissing(String),

    #[error("Gazetteer error: {0}")]
    Gazetteer(String),

    // Channel errors
    #[error("Chat {0} is unreachable")]
    ChannelUnreachable(ChatId),

    #[error("Chat {0} was not found")]
    ChannelChatNotFound(ChatId),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Validation failure for a named input field
    pub fn validation(field: &str, message: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// True for failures that stop a whole sweep rather than one farm
    pub fn aborts_sweep(&self) -> bool {
        matches!(
            self,
            AppError::DatasetUnavailable { .. } | AppError::DatasetMalformed { .. }
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::DuplicateEntry(what) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("DUPLICATE_ENTRY", format!("{} already exists", what)),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::DatasetUnavailable { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new("DATASET_UNAVAILABLE", self.to_string()),
            ),
            AppError::DatasetMalformed { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new("DATASET_MALFORMED", self.to_string()),
            ),
            AppError::FieldMissing(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("FIELD_MISSING", self.to_string()),
            ),
            AppError::Gazetteer(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("GAZETTEER_ERROR", self.to_string()),
            ),
            AppError::ChannelUnreachable(_)
            | AppError::ChannelChatNotFound(_) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new("CHANNEL_ERROR", self.to_string()),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("CONFIGURATION_ERROR", format!("Configuration error: {}", msg)),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
