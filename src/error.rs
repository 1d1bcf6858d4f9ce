use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Lyric not found: track {track_id} has no verse at offset {offset}")]
    LyricNotFound { track_id: i32, offset: u64 },

    #[error("Enrichment failed: {0}")]
    EnrichmentFailed(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Operation timed out: {0}")]
    Timeout(&'static str),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Server-class failures are logged here and answered with a fixed message.
        let (status, error_message) = match self {
            Self::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred".to_string())
            }
            Self::HttpRequest(ref e) => {
                tracing::error!("HTTP request error: {}", e);
                (StatusCode::BAD_GATEWAY, "External service request failed".to_string())
            }
            Self::AlreadyExists(ref msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::LyricNotFound { .. } => (StatusCode::NOT_FOUND, "track lyric not found".to_string()),
            Self::EnrichmentFailed(ref msg) => {
                tracing::error!("Enrichment failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to request the track info from external API".to_string(),
                )
            }
            Self::Validation(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Timeout(operation) => {
                tracing::error!("Operation timed out: {}", operation);
                (StatusCode::GATEWAY_TIMEOUT, "Request timed out".to_string())
            }
            Self::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
