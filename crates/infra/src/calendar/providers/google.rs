//! Google Calendar v3 adapter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobtrail_core::{IntegrationRepository, ProviderAdapter};
use jobtrail_domain::{
    CalendarError, CalendarEvent, CalendarIntegration, CalendarProvider, EventPatch, EventStatus,
    Reminder, ReminderMethod, Result, UNTITLED_EVENT,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{error_from_response, parse_all_day_date, parse_rfc3339};
use crate::calendar::credentials::fresh_access_token;
use crate::calendar::oauth::OAuthSettings;
use crate::errors::InfraError;

const GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
/// Page size cap; one page per sync window.
const MAX_RESULTS: &str = "250";

/// Adapter for the Google Calendar v3 API, operating on the user's primary
/// calendar.
pub struct GoogleCalendarAdapter {
    http: reqwest::Client,
    oauth: OAuthSettings,
    integrations: Arc<dyn IntegrationRepository>,
    api_base: String,
}

impl GoogleCalendarAdapter {
    pub fn new(
        http: reqwest::Client,
        oauth: OAuthSettings,
        integrations: Arc<dyn IntegrationRepository>,
    ) -> Self {
        Self { http, oauth, integrations, api_base: GOOGLE_API_BASE.to_string() }
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

    fn events_url(&self) -> String {
        format!("{}/calendars/primary/events", self.api_base)
    }

    async fn fetch_event(&self, token: &str, event_id: &str) -> Result<GoogleEvent> {
        let url = format!("{}/{event_id}", self.events_url());
        let response =
            self.http.get(&url).bearer_auth(token).send().await.map_err(InfraError::from)?;
        if !response.status().is_success() {
            return Err(error_from_response("google", response).await);
        }
        response.json::<GoogleEvent>().await.map_err(|e| InfraError::from(e).into())
    }
}

#[async_trait]
impl ProviderAdapter for GoogleCalendarAdapter {
    fn provider(&self) -> CalendarProvider {
        CalendarProvider::Google
    }

    fn auth_url(&self, user_id: &str) -> Result<String> {
        self.oauth.authorization_url(user_id)
    }

    #[instrument(skip(self, code), fields(user_id))]
    async fn complete_auth(&self, code: &str, user_id: &str) -> Result<()> {
        let exchange = self.oauth.exchange_code(&self.http, code).await?;

        // A re-auth without a new refresh token must not erase the stored one.
        let existing = self.integrations.find(user_id, CalendarProvider::Google).await?;
        let refresh_token =
            exchange.refresh_token.or(existing.as_ref().and_then(|i| i.refresh_token.clone()));

        let now = Utc::now();
        let integration = CalendarIntegration {
            user_id: user_id.to_string(),
            provider: CalendarProvider::Google,
            access_token: Some(exchange.access_token),
            refresh_token,
            expires_at: exchange.expires_at,
            is_active: true,
            last_synced_at: existing.and_then(|i| i.last_synced_at),
            created_at: now,
            updated_at: now,
        };
        self.integrations.upsert(&integration).await?;
        debug!(user_id, "google calendar connected");
        Ok(())
    }

    async fn create_event(&self, user_id: &str, event: &CalendarEvent) -> Result<CalendarEvent> {
        let token = self.token(user_id).await?;
        let payload = GoogleEventWrite::from_event(event);

        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(InfraError::from)?;
        if !response.status().is_success() {
            return Err(error_from_response("google", response).await);
        }

        let created: GoogleEvent = response.json().await.map_err(InfraError::from)?;
        created.into_canonical()
    }

    async fn update_event(
        &self,
        user_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CalendarEvent> {
        let token = self.token(user_id).await?;
        let current = self.fetch_event(&token, event_id).await?.into_canonical()?;
        if patch.is_empty() {
            return Ok(current);
        }

        let mut merged = current;
        if let Some(title) = &patch.title {
            merged.title = title.clone();
        }
        if let Some(description) = &patch.description {
            merged.description = Some(description.clone());
        }
        if let Some(location) = &patch.location {
            merged.location = Some(location.clone());
        }
        if let Some(start_time) = patch.start_time {
            merged.start_time = start_time;
        }
        if let Some(end_time) = patch.end_time {
            merged.end_time = end_time;
        }

        let url = format!("{}/{event_id}", self.events_url());
        let response = self
            .http
            .put(&url)
            .bearer_auth(&token)
            .json(&GoogleEventWrite::from_event(&merged))
            .send()
            .await
            .map_err(InfraError::from)?;
        if !response.status().is_success() {
            return Err(error_from_response("google", response).await);
        }

        let updated: GoogleEvent = response.json().await.map_err(InfraError::from)?;
        updated.into_canonical()
    }

    async fn delete_event(&self, user_id: &str, event_id: &str) -> Result<()> {
        let token = self.token(user_id).await?;
        let url = format!("{}/{event_id}", self.events_url());

        let response =
            self.http.delete(&url).bearer_auth(&token).send().await.map_err(InfraError::from)?;
        if !response.status().is_success() {
            return Err(error_from_response("google", response).await);
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

        let response = self
            .http
            .get(self.events_url())
            .bearer_auth(&token)
            .query(&[
                ("timeMin", start.to_rfc3339()),
                ("timeMax", end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", MAX_RESULTS.to_string()),
            ])
            .send()
            .await
            .map_err(InfraError::from)?;
        if !response.status().is_success() {
            return Err(error_from_response("google", response).await);
        }

        let payload: GoogleEventsResponse = response.json().await.map_err(InfraError::from)?;

        let mut events = Vec::with_capacity(payload.items.len());
        for item in payload.items {
            match item.into_canonical() {
                Ok(event) => events.push(event),
                // One malformed item must not fail the whole page.
                Err(err) => warn!(error = %err, "skipping unparsable google event"),
            }
        }
        debug!(count = events.len(), "synced google events");
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
        self.integrations.deactivate(user_id, CalendarProvider::Google).await
    }
}

/* -------------------------------------------------------------------------- */
/* Wire types */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize)]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<GoogleTime>,
    end: Option<GoogleTime>,
    status: Option<String>,
    recurrence: Option<Vec<String>>,
    attendees: Option<Vec<GoogleAttendee>>,
    reminders: Option<GoogleReminders>,
    html_link: Option<String>,
    created: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTime {
    date_time: Option<String>,
    date: Option<String>,
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleAttendee {
    email: String,
}

#[derive(Debug, Deserialize)]
struct GoogleReminders {
    #[serde(default)]
    overrides: Vec<GoogleReminderOverride>,
}

#[derive(Debug, Deserialize)]
struct GoogleReminderOverride {
    method: String,
    minutes: u32,
}

impl GoogleEvent {
    fn into_canonical(self) -> Result<CalendarEvent> {
        let start = self
            .start
            .ok_or_else(|| CalendarError::ProviderApi("google event missing start".into()))?;
        let end = self
            .end
            .ok_or_else(|| CalendarError::ProviderApi("google event missing end".into()))?;

        let is_all_day = start.date.is_some();
        let start_time = parse_time(&start, "start")?;
        let end_time = parse_time(&end, "end")?;

        let title = self
            .summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNTITLED_EVENT.to_string());

        let status = match self.status.as_deref() {
            Some("tentative") => EventStatus::Tentative,
            Some("cancelled") => EventStatus::Cancelled,
            _ => EventStatus::Confirmed,
        };

        let attendees = self
            .attendees
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.email)
            .filter(|email| !email.trim().is_empty())
            .collect();

        let reminders = self
            .reminders
            .map(|r| r.overrides)
            .unwrap_or_default()
            .into_iter()
            .map(|o| Reminder {
                method: match o.method.as_str() {
                    "email" => ReminderMethod::Email,
                    _ => ReminderMethod::Popup,
                },
                minutes: o.minutes,
            })
            .collect();

        let metadata = self.html_link.map(|link| serde_json::json!({ "htmlLink": link }));

        let event = CalendarEvent {
            id: None,
            external_id: self.id,
            provider: Some(CalendarProvider::Google),
            title,
            description: self.description,
            location: self.location,
            start_time,
            end_time,
            timezone: start.time_zone,
            is_all_day,
            recurrence: self.recurrence.and_then(|mut rules| {
                if rules.is_empty() {
                    None
                } else {
                    Some(rules.remove(0))
                }
            }),
            attendees,
            reminders,
            status,
            created: self.created.as_deref().and_then(|s| parse_rfc3339(s, "created").ok()),
            updated: self.updated.as_deref().and_then(|s| parse_rfc3339(s, "updated").ok()),
            metadata,
        };
        // Inverted time ranges are treated like any other malformed item.
        event.validate()?;
        Ok(event)
    }
}

fn parse_time(time: &GoogleTime, field: &str) -> Result<DateTime<Utc>> {
    match (&time.date_time, &time.date) {
        (Some(date_time), _) => parse_rfc3339(date_time, field),
        (None, Some(date)) => parse_all_day_date(date, field),
        (None, None) => {
            Err(CalendarError::ProviderApi(format!("google event {field} has no timestamp")))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventWrite {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    start: GoogleTimeWrite,
    end: GoogleTimeWrite,
    #[serde(skip_serializing_if = "Option::is_none")]
    recurrence: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attendees: Vec<GoogleAttendeeWrite>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTimeWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct GoogleAttendeeWrite {
    email: String,
}

impl GoogleEventWrite {
    fn from_event(event: &CalendarEvent) -> Self {
        let (start, end) = if event.is_all_day {
            (
                GoogleTimeWrite {
                    date_time: None,
                    date: Some(event.start_time.format("%Y-%m-%d").to_string()),
                },
                GoogleTimeWrite {
                    date_time: None,
                    date: Some(event.end_time.format("%Y-%m-%d").to_string()),
                },
            )
        } else {
            (
                GoogleTimeWrite { date_time: Some(event.start_time.to_rfc3339()), date: None },
                GoogleTimeWrite { date_time: Some(event.end_time.to_rfc3339()), date: None },
            )
        };

        Self {
            summary: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start,
            end,
            recurrence: event.recurrence.clone().map(|rule| vec![rule]),
            attendees: event
                .attendees
                .iter()
                .map(|email| GoogleAttendeeWrite { email: email.clone() })
                .collect(),
        }
    }
}
