//! SQLite-backed implementation of the EventRepository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobtrail_core::EventRepository;
use jobtrail_domain::{
    CalendarEvent, CalendarProvider, EventStatus, Reminder, Result,
};
use rusqlite::ToSql;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{from_ts, to_ts, DbPool};
use crate::errors::InfraError;

/// SQLite implementation of EventRepository.
pub struct SqliteEventRepository {
    pool: DbPool,
}

impl SqliteEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    #[instrument(skip(self, events), fields(user_id, count = events.len()))]
    async fn upsert_synced(&self, user_id: &str, events: &[CalendarEvent]) -> Result<usize> {
        let mut conn = self.pool.get().map_err(InfraError::from)?;
        let tx = conn.transaction().map_err(InfraError::from)?;

        let now = to_ts(Utc::now());
        let mut written = 0;

        for event in events {
            let (Some(provider), Some(external_id)) = (event.provider, event.external_id.as_deref())
            else {
                warn!(title = %event.title, "skipping event without provider identity");
                continue;
            };

            let id = event.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
            let attendees =
                serde_json::to_string(&event.attendees).map_err(InfraError::from)?;
            let reminders =
                serde_json::to_string(&event.reminders).map_err(InfraError::from)?;
            let metadata = event
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(InfraError::from)?;

            tx.execute(
                "INSERT INTO calendar_events (
                    id, user_id, provider, external_id, title, description, location,
                    start_ts, end_ts, timezone, is_all_day, recurrence,
                    attendees, reminders, status, metadata, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                ON CONFLICT(user_id, provider, external_id) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    location = excluded.location,
                    start_ts = excluded.start_ts,
                    end_ts = excluded.end_ts,
                    timezone = excluded.timezone,
                    is_all_day = excluded.is_all_day,
                    recurrence = excluded.recurrence,
                    attendees = excluded.attendees,
                    reminders = excluded.reminders,
                    status = excluded.status,
                    metadata = excluded.metadata,
                    updated_at = excluded.updated_at",
                [
                    &id as &dyn ToSql,
                    &user_id,
                    &provider.as_str(),
                    &external_id,
                    &event.title,
                    &event.description,
                    &event.location,
                    &to_ts(event.start_time),
                    &to_ts(event.end_time),
                    &event.timezone,
                    &event.is_all_day,
                    &event.recurrence,
                    &attendees,
                    &reminders,
                    &status_to_str(event.status),
                    &metadata,
                    &now,
                    &now,
                ]
                .as_ref(),
            )
            .map_err(InfraError::from)?;

            written += 1;
        }

        tx.commit().map_err(InfraError::from)?;
        debug!(written, "upserted synced events");
        Ok(written)
    }

    async fn events_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let conn = self.pool.get().map_err(InfraError::from)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, provider, external_id, title, description, location,
                        start_ts, end_ts, timezone, is_all_day, recurrence,
                        attendees, reminders, status, metadata, created_at, updated_at
                 FROM calendar_events
                 WHERE user_id = ?1 AND start_ts >= ?2 AND end_ts <= ?3
                 ORDER BY start_ts ASC",
            )
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map(
                [&user_id as &dyn ToSql, &to_ts(start), &to_ts(end)].as_ref(),
                read_row,
            )
            .map_err(InfraError::from)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw.map_err(InfraError::from)?.into_domain()?);
        }
        Ok(out)
    }
}

struct RawEvent {
    id: String,
    provider: String,
    external_id: String,
    title: String,
    description: Option<String>,
    location: Option<String>,
    start_ts: i64,
    end_ts: i64,
    timezone: Option<String>,
    is_all_day: bool,
    recurrence: Option<String>,
    attendees: String,
    reminders: String,
    status: String,
    metadata: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        id: row.get(0)?,
        provider: row.get(1)?,
        external_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        location: row.get(5)?,
        start_ts: row.get(6)?,
        end_ts: row.get(7)?,
        timezone: row.get(8)?,
        is_all_day: row.get(9)?,
        recurrence: row.get(10)?,
        attendees: row.get(11)?,
        reminders: row.get(12)?,
        status: row.get(13)?,
        metadata: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

impl RawEvent {
    fn into_domain(self) -> Result<CalendarEvent> {
        let attendees: Vec<String> =
            serde_json::from_str(&self.attendees).map_err(InfraError::from)?;
        let reminders: Vec<Reminder> =
            serde_json::from_str(&self.reminders).map_err(InfraError::from)?;
        let metadata = self
            .metadata
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()
            .map_err(InfraError::from)?;

        Ok(CalendarEvent {
            id: Some(self.id),
            external_id: Some(self.external_id),
            provider: Some(self.provider.parse::<CalendarProvider>()?),
            title: self.title,
            description: self.description,
            location: self.location,
            start_time: from_ts(self.start_ts)?,
            end_time: from_ts(self.end_ts)?,
            timezone: self.timezone,
            is_all_day: self.is_all_day,
            recurrence: self.recurrence,
            attendees,
            reminders,
            status: status_from_str(&self.status),
            created: Some(from_ts(self.created_at)?),
            updated: Some(from_ts(self.updated_at)?),
            metadata,
        })
    }
}

fn status_to_str(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Confirmed => "confirmed",
        EventStatus::Tentative => "tentative",
        EventStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(status: &str) -> EventStatus {
    match status {
        "tentative" => EventStatus::Tentative,
        "cancelled" => EventStatus::Cancelled,
        _ => EventStatus::Confirmed,
    }
}
