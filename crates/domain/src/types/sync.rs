//! Sync reporting types: per-run status, conflict groups, free slots.
//!
//! None of these are persisted; each sync or conflict check produces fresh
//! instances that are returned directly to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::calendar::{CalendarEvent, CalendarProvider};

/// Qualitative priority of a conflict group, ordered low < medium < high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

/// A base event plus all other events whose time ranges overlap it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictGroup {
    pub base_event: CalendarEvent,
    pub conflicting_events: Vec<CalendarEvent>,
    pub severity: ConflictSeverity,
    pub suggestions: Vec<String>,
}

/// Where a sync issue originated. Serializes as the provider tag or the
/// literal `"SYSTEM"` for orchestration failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSource {
    Provider(CalendarProvider),
    /// Failure in the orchestration itself rather than any one provider.
    System,
}

impl Serialize for IssueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Provider(p) => serializer.serialize_str(p.as_str()),
            Self::System => serializer.serialize_str("SYSTEM"),
        }
    }
}

impl<'de> Deserialize<'de> for IssueSource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        if tag == "SYSTEM" {
            return Ok(Self::System);
        }
        tag.parse::<CalendarProvider>().map(Self::Provider).map_err(serde::de::Error::custom)
    }
}

/// One error recorded during a sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncIssue {
    pub source: IssueSource,
    pub message: String,
}

impl SyncIssue {
    pub fn provider(provider: CalendarProvider, message: impl Into<String>) -> Self {
        Self { source: IssueSource::Provider(provider), message: message.into() }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self { source: IssueSource::System, message: message.into() }
    }
}

/// Per-provider outcome within one sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSyncOutcome {
    pub provider: CalendarProvider,
    pub success: bool,
    pub events_count: Option<usize>,
    pub error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl ProviderSyncOutcome {
    pub fn succeeded(
        provider: CalendarProvider,
        events_count: usize,
        last_synced_at: DateTime<Utc>,
    ) -> Self {
        Self {
            provider,
            success: true,
            events_count: Some(events_count),
            error: None,
            last_synced_at: Some(last_synced_at),
        }
    }

    pub fn failed(provider: CalendarProvider, error: impl Into<String>) -> Self {
        Self {
            provider,
            success: false,
            events_count: None,
            error: Some(error.into()),
            last_synced_at: None,
        }
    }
}

/// Outcome of a full multi-provider sync run. Constructed at call time,
/// finalized once every provider task has settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub success: bool,
    pub providers: Vec<ProviderSyncOutcome>,
    pub total_events: usize,
    pub conflicts: Vec<ConflictGroup>,
    pub errors: Vec<SyncIssue>,
}

impl SyncStatus {
    /// Fresh status for a run starting now.
    pub fn begin(user_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            start_time: started_at,
            end_time: None,
            success: true,
            providers: Vec::new(),
            total_events: 0,
            conflicts: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// A contiguous free interval within working hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Result of checking a proposed event time against existing calendars.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictCheck {
    pub has_conflicts: bool,
    pub conflicts: Vec<CalendarEvent>,
    pub suggestions: Vec<String>,
}

/// Outbound message published to external subscribers; fire-and-forget,
/// never blocks the sync path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    #[serde(rename = "calendar.synced")]
    #[serde(rename_all = "camelCase")]
    CalendarSynced { user_id: String, total_events: usize, conflict_count: usize },
}
