//! SQLite-backed implementation of the IntegrationRepository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobtrail_core::IntegrationRepository;
use jobtrail_domain::{CalendarError, CalendarIntegration, CalendarProvider, Result};
use rusqlite::{OptionalExtension, ToSql};
use tracing::{debug, instrument};

use super::{from_ts, to_ts, DbPool};
use crate::errors::InfraError;

/// SQLite implementation of IntegrationRepository.
pub struct SqliteIntegrationRepository {
    pool: DbPool,
}

impl SqliteIntegrationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "user_id, provider, access_token, refresh_token, expires_at,
     is_active, last_synced_at, created_at, updated_at";

#[async_trait]
impl IntegrationRepository for SqliteIntegrationRepository {
    #[instrument(skip(self, integration), fields(user_id = %integration.user_id, provider = %integration.provider))]
    async fn upsert(&self, integration: &CalendarIntegration) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;

        conn.execute(
            "INSERT INTO calendar_integrations (
                user_id, provider, access_token, refresh_token, expires_at,
                is_active, last_synced_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(user_id, provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at",
            [
                &integration.user_id as &dyn ToSql,
                &integration.provider.as_str(),
                &integration.access_token,
                &integration.refresh_token,
                &integration.expires_at.map(to_ts),
                &integration.is_active,
                &integration.last_synced_at.map(to_ts),
                &to_ts(integration.created_at),
                &to_ts(integration.updated_at),
            ]
            .as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!("upserted calendar integration");
        Ok(())
    }

    async fn find(
        &self,
        user_id: &str,
        provider: CalendarProvider,
    ) -> Result<Option<CalendarIntegration>> {
        let conn = self.pool.get().map_err(InfraError::from)?;

        let raw = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM calendar_integrations
                     WHERE user_id = ?1 AND provider = ?2"
                ),
                [&user_id as &dyn ToSql, &provider.as_str()].as_ref(),
                read_row,
            )
            .optional()
            .map_err(InfraError::from)?;

        raw.map(RawIntegration::into_domain).transpose()
    }

    async fn active_for_user(&self, user_id: &str) -> Result<Vec<CalendarIntegration>> {
        let conn = self.pool.get().map_err(InfraError::from)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM calendar_integrations
                 WHERE user_id = ?1 AND is_active = 1
                 ORDER BY provider"
            ))
            .map_err(InfraError::from)?;

        let rows = stmt.query_map([user_id], read_row).map_err(InfraError::from)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw.map_err(InfraError::from)?.into_domain()?);
        }
        Ok(out)
    }

    async fn update_tokens(
        &self,
        user_id: &str,
        provider: CalendarProvider,
        access_token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;

        let changed = conn
            .execute(
                "UPDATE calendar_integrations
                 SET access_token = ?1, expires_at = ?2, updated_at = ?3
                 WHERE user_id = ?4 AND provider = ?5",
                [
                    &access_token as &dyn ToSql,
                    &expires_at.map(to_ts),
                    &to_ts(Utc::now()),
                    &user_id,
                    &provider.as_str(),
                ]
                .as_ref(),
            )
            .map_err(InfraError::from)?;

        if changed == 0 {
            return Err(CalendarError::NotFound(format!(
                "no {provider} integration for user {user_id}"
            )));
        }
        Ok(())
    }

    async fn mark_synced(
        &self,
        user_id: &str,
        provider: CalendarProvider,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;

        let changed = conn
            .execute(
                "UPDATE calendar_integrations
                 SET last_synced_at = ?1, updated_at = ?2
                 WHERE user_id = ?3 AND provider = ?4",
                [&to_ts(at) as &dyn ToSql, &to_ts(Utc::now()), &user_id, &provider.as_str()]
                    .as_ref(),
            )
            .map_err(InfraError::from)?;

        if changed == 0 {
            return Err(CalendarError::NotFound(format!(
                "no {provider} integration for user {user_id}"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn deactivate(&self, user_id: &str, provider: CalendarProvider) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;

        // Idempotent: disconnecting an absent integration is not an error.
        conn.execute(
            "UPDATE calendar_integrations
             SET access_token = NULL, refresh_token = NULL, is_active = 0, updated_at = ?1
             WHERE user_id = ?2 AND provider = ?3",
            [&to_ts(Utc::now()) as &dyn ToSql, &user_id, &provider.as_str()].as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!(user_id, %provider, "deactivated calendar integration");
        Ok(())
    }

    async fn stale_active_user_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let conn = self.pool.get().map_err(InfraError::from)?;

        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT user_id FROM calendar_integrations
                 WHERE is_active = 1
                   AND (last_synced_at IS NULL OR last_synced_at < ?1)
                 ORDER BY user_id",
            )
            .map_err(InfraError::from)?;

        let rows =
            stmt.query_map([to_ts(cutoff)], |row| row.get::<_, String>(0)).map_err(InfraError::from)?;

        let mut out = Vec::new();
        for user_id in rows {
            out.push(user_id.map_err(InfraError::from)?);
        }
        Ok(out)
    }
}

struct RawIntegration {
    user_id: String,
    provider: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    is_active: bool,
    last_synced_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawIntegration> {
    Ok(RawIntegration {
        user_id: row.get(0)?,
        provider: row.get(1)?,
        access_token: row.get(2)?,
        refresh_token: row.get(3)?,
        expires_at: row.get(4)?,
        is_active: row.get(5)?,
        last_synced_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl RawIntegration {
    fn into_domain(self) -> Result<CalendarIntegration> {
        Ok(CalendarIntegration {
            user_id: self.user_id,
            provider: self.provider.parse::<CalendarProvider>()?,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at.map(from_ts).transpose()?,
            is_active: self.is_active,
            last_synced_at: self.last_synced_at.map(from_ts).transpose()?,
            created_at: from_ts(self.created_at)?,
            updated_at: from_ts(self.updated_at)?,
        })
    }
}
