//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for jobtrail
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CalendarError {
    /// OAuth code exchange or token refresh failed; the stored integration
    /// is left in its prior state.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Operation attempted with no stored credentials for the provider.
    #[error("Integration not connected: {0}")]
    NotConnected(String),

    /// Non-2xx response from a provider API.
    #[error("Provider API error: {0}")]
    ProviderApi(String),

    /// Unknown provider identifier passed at the HTTP boundary.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure talking to a provider.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for jobtrail operations
pub type Result<T> = std::result::Result<T, CalendarError>;
