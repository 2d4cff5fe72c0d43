//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jobtrail_domain::CalendarError;
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error("Missing header: {0}")]
    MissingHeader(&'static str),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::MissingHeader(name) => (
                StatusCode::BAD_REQUEST,
                "MISSING_HEADER",
                format!("Required header '{name}' is not set"),
            ),
            AppError::Calendar(err) => map_calendar_error(err),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

fn map_calendar_error(err: &CalendarError) -> (StatusCode, &'static str, String) {
    match err {
        CalendarError::UnsupportedProvider(p) => (
            StatusCode::BAD_REQUEST,
            "UNSUPPORTED_PROVIDER",
            format!("Unsupported provider: {p}"),
        ),
        CalendarError::InvalidInput(msg) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        CalendarError::Auth(msg) => (StatusCode::UNAUTHORIZED, "AUTH_ERROR", msg.clone()),
        CalendarError::NotConnected(provider) => (
            StatusCode::NOT_FOUND,
            "NOT_CONNECTED",
            format!("No active {provider} integration for this user"),
        ),
        CalendarError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        CalendarError::ProviderApi(msg) => {
            tracing::error!("Provider API error: {msg}");
            (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", "The calendar provider rejected the request".to_string())
        }
        CalendarError::Network(msg) => {
            tracing::error!("Network error: {msg}");
            (StatusCode::BAD_GATEWAY, "NETWORK_ERROR", "Could not reach the calendar provider".to_string())
        }
        CalendarError::Database(msg) => {
            tracing::error!("Database error: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
            )
        }
        CalendarError::Config(msg) => {
            tracing::error!("Configuration error: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "A configuration error occurred".to_string(),
            )
        }
        CalendarError::Internal(msg) => {
            tracing::error!("Internal error: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
            )
        }
    }
}
