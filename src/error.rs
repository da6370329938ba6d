// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! `AppError` is what handlers and the store return. The AI and parsing
//! errors below never reach the event pipeline: the synthesizer converts them
//! into a fallback recommendation and keeps them only as the reason.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::NoData(msg) => (StatusCode::NOT_FOUND, "no_data", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure invoking the AI capability.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AiError {
    #[error("AI request failed: {0}")]
    Transport(String),

    #[error("AI request timed out after {0:?}")]
    Timeout(Duration),

    #[error("AI rate limit exceeded")]
    RateLimited,

    #[error("AI returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl AiError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Transport(_) | AiError::Timeout(_) | AiError::RateLimited => true,
            AiError::Status { status, .. } => *status >= 500,
        }
    }
}

/// Structural problem in the AI response.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("AI envelope is not valid JSON: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    #[error("AI envelope has no candidates[0].content.parts[0].text")]
    MissingCandidateText,

    #[error("AI payload is not valid JSON: {0}")]
    InvalidPayload(#[source] serde_json::Error),
}

/// Why a synthesis fell back to the default recommendation.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Ai(#[from] AiError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}
