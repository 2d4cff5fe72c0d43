//! Microsoft Outlook adapter backed by the Graph API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use jobtrail_core::{IntegrationRepository, ProviderAdapter};
use jobtrail_domain::{
    CalendarError, CalendarEvent, CalendarIntegration, CalendarProvider, EventPatch, EventStatus,
    Result, UNTITLED_EVENT,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{error_from_response, parse_rfc3339};
use crate::calendar::credentials::fresh_access_token;
use crate::calendar::oauth::OAuthSettings;
use crate::errors::InfraError;

const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
const MAX_RESULTS: &str = "250";
/// Makes Graph render event times in UTC instead of the mailbox timezone.
const PREFER_UTC: &str = "outlook.timezone=\"UTC\"";

/// Adapter for the Microsoft Graph calendar API, operating on the signed-in
/// user's default calendar.
pub struct OutlookCalendarAdapter {
    http: reqwest::Client,
    oauth: OAuthSettings,
    integrations: Arc<dyn IntegrationRepository>,
    api_base: String,
}

impl OutlookCalendarAdapter {
    pub fn new(
        http: reqwest::Client,
        oauth: OAuthSettings,
        integrations: Arc<dyn IntegrationRepository>,
    ) -> Self {
        Self { http, oauth, integrations, api_base: GRAPH_API_BASE.to_string() }
    }

    /// Point the adapter at a different API base (used by tests).
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    async fn token(&self, user_id: &str) -> Result<String> {
        fresh_access_token(&self.http, &self.oauth, &self.integrations, user_id).await
    }
}

#[async_trait]
impl ProviderAdapter for OutlookCalendarAdapter {
    fn provider(&self) -> CalendarProvider {
        CalendarProvider::Outlook
    }

    fn auth_url(&self, user_id: &str) -> Result<String> {
        self.oauth.authorization_url(user_id)
    }

    #[instrument(skip(self, code), fields(user_id))]
    async fn complete_auth(&self, code: &str, user_id: &str) -> Result<()> {
        let exchange = self.oauth.exchange_code(&self.http, code).await?;

        // A re-auth without a new refresh token must not erase the stored one.
        let existing = self.integrations.find(user_id, CalendarProvider::Outlook).await?;
        let refresh_token =
            exchange.refresh_token.or(existing.as_ref().and_then(|i| i.refresh_token.clone()));

        let now = Utc::now();
        let integration = CalendarIntegration {
            user_id: user_id.to_string(),
            provider: CalendarProvider::Outlook,
            access_token: Some(exchange.access_token),
            refresh_token,
            expires_at: exchange.expires_at,
            is_active: true,
            last_synced_at: existing.and_then(|i| i.last_synced_at),
            created_at: now,
            updated_at: now,
        };
        self.integrations.upsert(&integration).await?;
        debug!(user_id, "outlook calendar connected");
        Ok(())
    }

    async fn create_event(&self, user_id: &str, event: &CalendarEvent) -> Result<CalendarEvent> {
        let token = self.token(user_id).await?;
        let url = format!("{}/me/events", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .header("Prefer", PREFER_UTC)
            .json(&GraphEventWrite::from_event(event))
            .send()
            .await
            .map_err(InfraError::from)?;
        if !response.status().is_success() {
            return Err(error_from_response("outlook", response).await);
        }

        let created: GraphEvent = response.json().await.map_err(InfraError::from)?;
        created.into_canonical()
    }

    async fn update_event(
        &self,
        user_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CalendarEvent> {
        let token = self.token(user_id).await?;
        let url = format!("{}/me/events/{event_id}", self.api_base);

        if patch.is_empty() {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .header("Prefer", PREFER_UTC)
                .send()
                .await
                .map_err(InfraError::from)?;
            if !response.status().is_success() {
                return Err(error_from_response("outlook", response).await);
            }
            let current: GraphEvent = response.json().await.map_err(InfraError::from)?;
            return current.into_canonical();
        }

        // Graph merges server-side, so only the supplied fields are sent.
        let response = self
            .http
            .patch(&url)
            .bearer_auth(&token)
            .header("Prefer", PREFER_UTC)
            .json(&GraphEventWrite::from_patch(patch))
            .send()
            .await
            .map_err(InfraError::from)?;
        if !response.status().is_success() {
            return Err(error_from_response("outlook", response).await);
        }

        let updated: GraphEvent = response.json().await.map_err(InfraError::from)?;
        updated.into_canonical()
    }

    async fn delete_event(&self, user_id: &str, event_id: &str) -> Result<()> {
        let token = self.token(user_id).await?;
        let url = format!("{}/me/events/{event_id}", self.api_base);

        let response =
            self.http.delete(&url).bearer_auth(&token).send().await.map_err(InfraError::from)?;
        if !response.status().is_success() {
            return Err(error_from_response("outlook", response).await);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id))]
    async fn sync_events(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let token = self.token(user_id).await?;
        let url = format!("{}/me/calendarview", self.api_base);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .header("Prefer", PREFER_UTC)
            .query(&[
                ("startDateTime", start.to_rfc3339()),
                ("endDateTime", end.to_rfc3339()),
                ("$top", MAX_RESULTS.to_string()),
                ("$orderby", "start/dateTime".to_string()),
            ])
            .send()
            .await
            .map_err(InfraError::from)?;
        if !response.status().is_success() {
            return Err(error_from_response("outlook", response).await);
        }

        let payload: GraphEventsResponse = response.json().await.map_err(InfraError::from)?;

        let mut events = Vec::with_capacity(payload.value.len());
        for item in payload.value {
            match item.into_canonical() {
                Ok(event) => events.push(event),
                // One malformed item must not fail the whole page.
                Err(err) => warn!(error = %err, "skipping unparsable outlook event"),
            }
        }
        debug!(count = events.len(), "synced outlook events");
        Ok(events)
    }

    async fn busy_events(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let mut events = self.sync_events(user_id, start, end).await?;
        events.retain(|e| !e.is_all_day);
        Ok(events)
    }

    async fn disconnect(&self, user_id: &str) -> Result<()> {
        self.integrations.deactivate(user_id, CalendarProvider::Outlook).await
    }
}

/* -------------------------------------------------------------------------- */
/* Wire types */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize)]
struct GraphEventsResponse {
    #[serde(default)]
    value: Vec<GraphEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphEvent {
    id: Option<String>,
    subject: Option<String>,
    body_preview: Option<String>,
    location: Option<GraphLocation>,
    start: Option<GraphDateTime>,
    end: Option<GraphDateTime>,
    is_all_day: Option<bool>,
    is_cancelled: Option<bool>,
    attendees: Option<Vec<GraphAttendee>>,
    web_link: Option<String>,
    created_date_time: Option<String>,
    last_modified_date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphLocation {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphAttendee {
    email_address: Option<GraphEmailAddress>,
}

#[derive(Debug, Deserialize)]
struct GraphEmailAddress {
    address: Option<String>,
}

impl GraphEvent {
    fn into_canonical(self) -> Result<CalendarEvent> {
        let start = self
            .start
            .ok_or_else(|| CalendarError::ProviderApi("outlook event missing start".into()))?;
        let end = self
            .end
            .ok_or_else(|| CalendarError::ProviderApi("outlook event missing end".into()))?;

        let timezone = start.time_zone.clone();
        let start_time = parse_graph_time(&start.date_time, "start")?;
        let end_time = parse_graph_time(&end.date_time, "end")?;

        let title = self
            .subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNTITLED_EVENT.to_string());

        let status = if self.is_cancelled.unwrap_or(false) {
            EventStatus::Cancelled
        } else {
            EventStatus::Confirmed
        };

        let attendees = self
            .attendees
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.email_address.and_then(|e| e.address))
            .filter(|email| !email.trim().is_empty())
            .collect();

        let metadata = self.web_link.map(|link| serde_json::json!({ "webLink": link }));

        let event = CalendarEvent {
            id: None,
            external_id: self.id,
            provider: Some(CalendarProvider::Outlook),
            title,
            description: self.body_preview.filter(|s| !s.is_empty()),
            location: self.location.and_then(|l| l.display_name).filter(|s| !s.is_empty()),
            start_time,
            end_time,
            timezone,
            is_all_day: self.is_all_day.unwrap_or(false),
            recurrence: None,
            attendees,
            reminders: Vec::new(),
            status,
            created: self
                .created_date_time
                .as_deref()
                .and_then(|s| parse_rfc3339(s, "createdDateTime").ok()),
            updated: self
                .last_modified_date_time
                .as_deref()
                .and_then(|s| parse_rfc3339(s, "lastModifiedDateTime").ok()),
            metadata,
        };
        // Inverted time ranges are treated like any other malformed item.
        event.validate()?;
        Ok(event)
    }
}

/// Graph emits `2026-03-02T09:00:00.0000000` without an offset when the
/// `Prefer` header pins the timezone to UTC; fall back to RFC 3339 for
/// payloads that carry one anyway.
fn parse_graph_time(value: &str, field: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(parsed.and_utc());
    }
    parse_rfc3339(value, field)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphEventWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<GraphBodyWrite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<GraphLocationWrite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<GraphDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<GraphDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_all_day: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attendees: Option<Vec<GraphAttendeeWrite>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphBodyWrite {
    content_type: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphLocationWrite {
    display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphAttendeeWrite {
    email_address: GraphEmailAddressWrite,
    #[serde(rename = "type")]
    attendee_type: &'static str,
}

#[derive(Debug, Serialize)]
struct GraphEmailAddressWrite {
    address: String,
}

impl GraphEventWrite {
    fn from_event(event: &CalendarEvent) -> Self {
        Self {
            subject: Some(event.title.clone()),
            body: event
                .description
                .clone()
                .map(|content| GraphBodyWrite { content_type: "text", content }),
            location: event
                .location
                .clone()
                .map(|display_name| GraphLocationWrite { display_name }),
            start: Some(graph_time(event.start_time)),
            end: Some(graph_time(event.end_time)),
            is_all_day: Some(event.is_all_day),
            attendees: if event.attendees.is_empty() {
                None
            } else {
                Some(
                    event
                        .attendees
                        .iter()
                        .map(|address| GraphAttendeeWrite {
                            email_address: GraphEmailAddressWrite { address: address.clone() },
                            attendee_type: "required",
                        })
                        .collect(),
                )
            },
        }
    }

    fn from_patch(patch: &EventPatch) -> Self {
        Self {
            subject: patch.title.clone(),
            body: patch
                .description
                .clone()
                .map(|content| GraphBodyWrite { content_type: "text", content }),
            location: patch
                .location
                .clone()
                .map(|display_name| GraphLocationWrite { display_name }),
            start: patch.start_time.map(graph_time),
            end: patch.end_time.map(graph_time),
            is_all_day: None,
            attendees: None,
        }
    }
}

fn graph_time(at: DateTime<Utc>) -> GraphDateTime {
    GraphDateTime {
        date_time: at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        time_zone: Some("UTC".to_string()),
    }
}
