//! OAuth2 authorization-code flow for calendar providers.
//!
//! One [`OAuthSettings`] per provider carries the endpoints, client
//! credentials, and scopes; the token endpoint is overridable so tests can
//! point it at a mock server.

use chrono::{DateTime, Duration, Utc};
use jobtrail_domain::{CalendarError, CalendarProvider, Result};
use serde::Deserialize;
use url::Url;

const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const MICROSOFT_AUTH_ENDPOINT: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
const MICROSOFT_TOKEN_ENDPOINT: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// OAuth2 configuration for one calendar provider.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub provider: CalendarProvider,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub scopes: Vec<String>,
    pub extra_authorize_params: Vec<(String, String)>,
}

impl OAuthSettings {
    /// Google settings with the calendar read-write scope. `access_type=offline`
    /// plus `prompt=consent` make Google return a refresh token.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            provider: CalendarProvider::Google,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorization_endpoint: GOOGLE_AUTH_ENDPOINT.to_string(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            scopes: vec!["https://www.googleapis.com/auth/calendar".to_string()],
            extra_authorize_params: vec![
                ("access_type".to_string(), "offline".to_string()),
                ("prompt".to_string(), "consent".to_string()),
            ],
        }
    }

    /// Microsoft settings; `offline_access` is required for refresh tokens.
    pub fn outlook(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            provider: CalendarProvider::Outlook,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorization_endpoint: MICROSOFT_AUTH_ENDPOINT.to_string(),
            token_endpoint: MICROSOFT_TOKEN_ENDPOINT.to_string(),
            scopes: vec![
                "offline_access".to_string(),
                "https://graph.microsoft.com/Calendars.ReadWrite".to_string(),
            ],
            extra_authorize_params: Vec::new(),
        }
    }

    /// Point the token endpoint elsewhere (used by tests).
    #[must_use]
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Build the authorization URL; `state` round-trips through the provider
    /// and identifies the user on callback.
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.authorization_endpoint)
            .map_err(|err| CalendarError::Config(format!("invalid OAuth endpoint URL: {err}")))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &self.scopes.join(" "))
                .append_pair("state", state);
            for (key, value) in &self.extra_authorize_params {
                query.append_pair(key, value);
            }
        }

        Ok(url.into())
    }

    /// Exchange an authorization code for an access/refresh token pair.
    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
    ) -> Result<TokenExchange> {
        self.token_request(http, &[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    /// Trade a refresh token for a fresh access token.
    pub async fn refresh_access_token(
        &self,
        http: &reqwest::Client,
        refresh_token: &str,
    ) -> Result<TokenExchange> {
        self.token_request(http, &[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn token_request(
        &self,
        http: &reqwest::Client,
        form: &[(&str, &str)],
    ) -> Result<TokenExchange> {
        let response = http
            .post(&self.token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(|err| CalendarError::Auth(format!("token request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::Auth(format!(
                "{} token endpoint returned {status}: {body}",
                self.provider
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| CalendarError::Auth(format!("failed to parse token response: {err}")))?;

        Ok(TokenExchange {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }
}

/// Result of a code exchange or refresh.
#[derive(Debug, Clone)]
pub struct TokenExchange {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_url_carries_state_and_scopes() {
        let settings = OAuthSettings::google("client-123", "secret", "http://localhost/callback");
        let url = settings.authorization_url("user-42").unwrap();

        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> =
            parsed.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();

        assert!(pairs.contains(&("client_id".into(), "client-123".into())));
        assert!(pairs.contains(&("state".into(), "user-42".into())));
        assert!(pairs.contains(&("access_type".into(), "offline".into())));
        assert!(pairs.iter().any(|(k, v)| k == "scope" && v.contains("calendar")));
    }

    #[test]
    fn outlook_scopes_include_offline_access() {
        let settings = OAuthSettings::outlook("id", "secret", "http://localhost/callback");
        let url = settings.authorization_url("u1").unwrap();
        assert!(url.contains("offline_access"));
    }
}
