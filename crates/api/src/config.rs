//! Environment-driven configuration.

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub microsoft_client_id: String,
    pub microsoft_client_secret: String,
    /// Base URL the OAuth redirect URIs are built from, e.g.
    /// `https://app.example.com` -> `.../calendar/callback/google`.
    pub oauth_redirect_base: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "jobtrail.db".to_string()),
            google_client_id: require_env("GOOGLE_CLIENT_ID")?,
            google_client_secret: require_env("GOOGLE_CLIENT_SECRET")?,
            microsoft_client_id: require_env("MICROSOFT_CLIENT_ID")?,
            microsoft_client_secret: require_env("MICROSOFT_CLIENT_SECRET")?,
            oauth_redirect_base: require_env("OAUTH_REDIRECT_BASE")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn redirect_uri(&self, provider: &str) -> String {
        format!("{}/calendar/callback/{provider}", self.oauth_redirect_base.trim_end_matches('/'))
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
