//! Application Error Types
//!
//! Centralized error handling with Axum integration, plus the relay's own
//! error taxonomy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Errors raised by a broker adapter.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors surfaced by the relay gateway to the calling connection.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Sender not identified")]
    UnauthenticatedSender,

    #[error("Recipient not identified: {0}")]
    UnknownRecipient(String),

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Publish failed: {0}")]
    BrokerPublish(#[from] BrokerError),

    #[error("Directory lookup failed: {0}")]
    Directory(#[from] AppError),
}

impl RelayError {
    /// System message text reported back to the caller.
    pub fn system_message(&self) -> &'static str {
        match self {
            RelayError::UnauthenticatedSender => "Error: Sender not identified.",
            RelayError::UnknownRecipient(_) => "Error: Recipient not identified.",
            RelayError::InvalidContent(_) => "Error: Message content is invalid.",
            RelayError::BrokerPublish(_) | RelayError::Directory(_) => {
                "Error: Message could not be delivered."
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, 10001, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, 10003, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
        };

        (status, Json(ErrorResponse { code, message })).into_response()
    }
}
