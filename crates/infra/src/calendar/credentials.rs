//! Per-call credential resolution with transparent refresh.
//!
//! Adapters hold no mutable OAuth state: tokens are loaded from the
//! integration store on every call and refreshed in place when expired, so
//! a shared adapter instance stays safe under concurrent requests.

use std::sync::Arc;

use chrono::Utc;
use jobtrail_core::IntegrationRepository;
use jobtrail_domain::{CalendarError, Result};
use tracing::debug;

use super::oauth::OAuthSettings;

/// A refresh is attempted this many seconds before actual expiry so a token
/// cannot lapse mid-request.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Return a valid access token for `(user_id, settings.provider)`,
/// refreshing and persisting a new one when the stored token is stale.
pub async fn fresh_access_token(
    http: &reqwest::Client,
    settings: &OAuthSettings,
    integrations: &Arc<dyn IntegrationRepository>,
    user_id: &str,
) -> Result<String> {
    let provider = settings.provider;

    let integration = integrations
        .find(user_id, provider)
        .await?
        .filter(|i| i.is_active)
        .ok_or_else(|| CalendarError::NotConnected(provider.to_string()))?;

    let refresh_horizon = Utc::now() + chrono::Duration::seconds(EXPIRY_LEEWAY_SECS);
    if let Some(token) = &integration.access_token {
        if !integration.is_expired(refresh_horizon) {
            return Ok(token.clone());
        }
    }

    let refresh_token = integration.refresh_token.as_deref().ok_or_else(|| {
        CalendarError::Auth(format!("{provider} session expired and no refresh token is stored"))
    })?;

    debug!(user_id, %provider, "access token stale, refreshing");
    let exchange = settings.refresh_access_token(http, refresh_token).await?;

    integrations
        .update_tokens(user_id, provider, &exchange.access_token, exchange.expires_at)
        .await?;

    Ok(exchange.access_token)
}
