//! Database schema for calendar integrations and synced events.
//!
//! Timestamps are stored as epoch seconds; attendees, reminders, and
//! provider metadata are stored as JSON text.

use jobtrail_domain::Result;
use rusqlite::Connection;

use crate::errors::InfraError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS calendar_integrations (
    user_id         TEXT NOT NULL,
    provider        TEXT NOT NULL,
    access_token    TEXT,
    refresh_token   TEXT,
    expires_at      INTEGER,
    is_active       INTEGER NOT NULL DEFAULT 1,
    last_synced_at  INTEGER,
    created_at      INTEGER NOT NULL,
    updated_at      INTEGER NOT NULL,
    PRIMARY KEY (user_id, provider)
);

CREATE INDEX IF NOT EXISTS idx_integrations_stale
    ON calendar_integrations (is_active, last_synced_at);

CREATE TABLE IF NOT EXISTS calendar_events (
    id              TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL,
    provider        TEXT NOT NULL,
    external_id     TEXT NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT,
    location        TEXT,
    start_ts        INTEGER NOT NULL,
    end_ts          INTEGER NOT NULL,
    timezone        TEXT,
    is_all_day      INTEGER NOT NULL DEFAULT 0,
    recurrence      TEXT,
    attendees       TEXT NOT NULL DEFAULT '[]',
    reminders       TEXT NOT NULL DEFAULT '[]',
    status          TEXT NOT NULL DEFAULT 'confirmed',
    metadata        TEXT,
    created_at      INTEGER NOT NULL,
    updated_at      INTEGER NOT NULL,
    UNIQUE (user_id, provider, external_id)
);

CREATE INDEX IF NOT EXISTS idx_events_user_time
    ON calendar_events (user_id, start_ts);
";

/// Apply the schema. Idempotent; safe to run on every startup.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA).map_err(InfraError::from)?;
    Ok(())
}
