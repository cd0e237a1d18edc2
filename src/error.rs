use std::time::Duration;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

use crate::ingest::Platform;
use crate::models::InvalidConfig;

/// JSON error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

/// Application errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_type = match self {
            AppError::NotFound(_) => "NotFound",
            AppError::Database(_) => "DatabaseError",
            AppError::Internal(_) => "InternalError",
        };

        let response = ErrorResponse {
            error: ErrorDetail {
                error_type: error_type.to_string(),
                message: self.to_string(),
            },
        };

        HttpResponse::build(self.status_code()).json(response)
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

/// Failures that end a webhook request before any delivery is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error(
        "Unknown webhook platform: expected X-Gitlab-Event, X-GitHub-Event or X-Event-Key header"
    )]
    UnknownPlatform,

    #[error("Unsupported {platform} event type: {event}")]
    UnsupportedEventType { platform: Platform, event: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),
}

impl PipelineError {
    /// Machine-readable tag stored in the event log
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnknownPlatform => "UnknownPlatform",
            PipelineError::UnsupportedEventType { .. } => "UnsupportedEventType",
            PipelineError::MalformedPayload(_) => "MalformedPayload",
            PipelineError::InvalidSignature(_) => "InvalidSignature",
        }
    }

    /// HTTP status reported back to the sending platform.
    ///
    /// Unsupported event types are acknowledged so the platform does not
    /// disable the hook; broken integrations get a 4xx.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::UnknownPlatform => StatusCode::BAD_REQUEST,
            PipelineError::UnsupportedEventType { .. } => StatusCode::OK,
            PipelineError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            PipelineError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Per-destination failures. Never terminal for the request as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Config error: {0}")]
    Config(#[from] InvalidConfig),

    #[error("{0}")]
    Failure(String),

    #[error("Delivery timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}
