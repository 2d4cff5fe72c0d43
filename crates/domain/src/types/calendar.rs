//! Canonical calendar types, independent of Google/Outlook wire formats.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CalendarError;

/// Supported calendar providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarProvider {
    Google,
    Outlook,
}

impl CalendarProvider {
    /// Stable lowercase tag used in storage and URLs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Outlook => "outlook",
        }
    }

    /// All known providers, in registration order.
    pub const ALL: [Self; 2] = [Self::Google, Self::Outlook];
}

impl fmt::Display for CalendarProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalendarProvider {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "outlook" | "microsoft" => Ok(Self::Outlook),
            other => Err(CalendarError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Event lifecycle status as reported by providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

/// Reminder delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMethod {
    Email,
    Popup,
}

/// A single reminder attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub method: ReminderMethod,
    pub minutes: u32,
}

/// Title substituted when a provider returns an event without a summary.
pub const UNTITLED_EVENT: &str = "Untitled Event";

/// Canonical representation of a scheduled event.
///
/// `(external_id, provider)` is unique per user once the event has been
/// synced from a provider. All-day events carry nominal start/end instants
/// but are excluded from conflict and availability logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Internal identifier, assigned on persistence.
    #[serde(default)]
    pub id: Option<String>,
    /// Provider-assigned identifier.
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub provider: Option<CalendarProvider>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub is_all_day: bool,
    /// Opaque recurrence rule; expansion is delegated to the provider APIs.
    #[serde(default)]
    pub recurrence: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    /// Provider-specific bag (deep links, raw identifiers).
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl CalendarEvent {
    /// Event duration in whole minutes, never below zero.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes().max(0)
    }

    /// Two events overlap iff each starts before the other ends.
    ///
    /// All-day events never overlap anything; they are excluded from
    /// scheduling logic entirely.
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.is_all_day || other.is_all_day {
            return false;
        }
        self.start_time < other.end_time && other.start_time < self.end_time
    }

    /// Enforce the `start < end` invariant for non-all-day events.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.is_all_day && self.start_time >= self.end_time {
            return Err(CalendarError::InvalidInput(format!(
                "event '{}' has start >= end ({} >= {})",
                self.title, self.start_time, self.end_time
            )));
        }
        Ok(())
    }
}

/// Partial update for a single provider event. Only supplied fields are
/// merged into the existing event before the provider update call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl EventPatch {
    /// True when no field is set; providers skip the round-trip then.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
    }
}

/// A user's stored connection to one calendar provider.
///
/// Created on OAuth callback, updated on token refresh and each sync,
/// soft-deactivated on disconnect (tokens cleared, row retained for audit).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarIntegration {
    pub user_id: String,
    pub provider: CalendarProvider,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarIntegration {
    /// Whether the stored access token has passed its expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}
