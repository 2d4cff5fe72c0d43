//! Repository tests against a real SQLite file.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jobtrail_core::{EventRepository, IntegrationRepository};
use jobtrail_domain::{
    CalendarError, CalendarEvent, CalendarIntegration, CalendarProvider, EventStatus, Reminder,
    ReminderMethod,
};
use jobtrail_infra::{open_pool, SqliteEventRepository, SqliteIntegrationRepository};
use tempfile::TempDir;

fn repos() -> (TempDir, Arc<SqliteIntegrationRepository>, Arc<SqliteEventRepository>) {
    let dir = TempDir::new().unwrap();
    let pool = open_pool(&dir.path().join("jobtrail.db")).unwrap();
    (
        dir,
        Arc::new(SqliteIntegrationRepository::new(pool.clone())),
        Arc::new(SqliteEventRepository::new(pool)),
    )
}

// Second-precision instants; storage truncates to epoch seconds.
fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, h, m, 0).unwrap()
}

fn integration(user_id: &str, provider: CalendarProvider) -> CalendarIntegration {
    CalendarIntegration {
        user_id: user_id.to_string(),
        provider,
        access_token: Some("access".to_string()),
        refresh_token: Some("refresh".to_string()),
        expires_at: Some(at(1, 12, 0)),
        is_active: true,
        last_synced_at: None,
        created_at: at(1, 9, 0),
        updated_at: at(1, 9, 0),
    }
}

fn event(external_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
    CalendarEvent {
        id: None,
        external_id: Some(external_id.to_string()),
        provider: Some(CalendarProvider::Google),
        title: format!("Event {external_id}"),
        description: Some("details".to_string()),
        location: Some("Room 1".to_string()),
        start_time: start,
        end_time: end,
        timezone: Some("UTC".to_string()),
        is_all_day: false,
        recurrence: None,
        attendees: vec!["a@example.com".to_string(), "b@example.com".to_string()],
        reminders: vec![Reminder { method: ReminderMethod::Popup, minutes: 10 }],
        status: EventStatus::Confirmed,
        created: None,
        updated: None,
        metadata: Some(serde_json::json!({ "htmlLink": "https://calendar.example/e" })),
    }
}

#[tokio::test]
async fn integration_round_trips_through_sqlite() {
    let (_dir, integrations, _) = repos();

    integrations.upsert(&integration("u1", CalendarProvider::Google)).await.unwrap();

    let found =
        integrations.find("u1", CalendarProvider::Google).await.unwrap().expect("row exists");
    assert_eq!(found.user_id, "u1");
    assert_eq!(found.provider, CalendarProvider::Google);
    assert_eq!(found.access_token.as_deref(), Some("access"));
    assert_eq!(found.refresh_token.as_deref(), Some("refresh"));
    assert_eq!(found.expires_at, Some(at(1, 12, 0)));
    assert!(found.is_active);
    assert!(found.last_synced_at.is_none());

    assert!(integrations.find("u1", CalendarProvider::Outlook).await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_replaces_tokens_for_the_same_user_provider_pair() {
    let (_dir, integrations, _) = repos();

    integrations.upsert(&integration("u1", CalendarProvider::Google)).await.unwrap();

    let mut reconnected = integration("u1", CalendarProvider::Google);
    reconnected.access_token = Some("rotated".to_string());
    integrations.upsert(&reconnected).await.unwrap();

    let rows = integrations.active_for_user("u1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].access_token.as_deref(), Some("rotated"));
}

#[tokio::test]
async fn active_for_user_skips_deactivated_rows() {
    let (_dir, integrations, _) = repos();

    integrations.upsert(&integration("u1", CalendarProvider::Google)).await.unwrap();
    integrations.upsert(&integration("u1", CalendarProvider::Outlook)).await.unwrap();
    integrations.deactivate("u1", CalendarProvider::Google).await.unwrap();

    let rows = integrations.active_for_user("u1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].provider, CalendarProvider::Outlook);

    // The deactivated row survives for audit, stripped of credentials.
    let google =
        integrations.find("u1", CalendarProvider::Google).await.unwrap().expect("row kept");
    assert!(!google.is_active);
    assert!(google.access_token.is_none());
    assert!(google.refresh_token.is_none());

    // Deactivating again (or a row that never existed) is not an error.
    integrations.deactivate("u1", CalendarProvider::Google).await.unwrap();
    integrations.deactivate("u2", CalendarProvider::Google).await.unwrap();
}

#[tokio::test]
async fn update_tokens_requires_an_existing_row() {
    let (_dir, integrations, _) = repos();

    let err = integrations
        .update_tokens("ghost", CalendarProvider::Google, "token", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CalendarError::NotFound(_)));

    integrations.upsert(&integration("u1", CalendarProvider::Google)).await.unwrap();
    integrations
        .update_tokens("u1", CalendarProvider::Google, "fresh", Some(at(2, 12, 0)))
        .await
        .unwrap();

    let found = integrations.find("u1", CalendarProvider::Google).await.unwrap().unwrap();
    assert_eq!(found.access_token.as_deref(), Some("fresh"));
    assert_eq!(found.expires_at, Some(at(2, 12, 0)));
}

#[tokio::test]
async fn stale_user_listing_tracks_last_synced_at() {
    let (_dir, integrations, _) = repos();

    integrations.upsert(&integration("never-synced", CalendarProvider::Google)).await.unwrap();
    integrations.upsert(&integration("recently-synced", CalendarProvider::Google)).await.unwrap();
    integrations.upsert(&integration("long-ago", CalendarProvider::Outlook)).await.unwrap();
    integrations.upsert(&integration("inactive", CalendarProvider::Google)).await.unwrap();
    integrations.deactivate("inactive", CalendarProvider::Google).await.unwrap();

    let now = Utc::now();
    integrations.mark_synced("recently-synced", CalendarProvider::Google, now).await.unwrap();
    integrations
        .mark_synced("long-ago", CalendarProvider::Outlook, now - Duration::hours(2))
        .await
        .unwrap();

    let stale = integrations.stale_active_user_ids(now - Duration::hours(1)).await.unwrap();
    assert_eq!(stale, vec!["long-ago".to_string(), "never-synced".to_string()]);
}

#[tokio::test]
async fn event_upsert_deduplicates_on_provider_identity() {
    let (_dir, _, events) = repos();

    let first = vec![event("g1", at(2, 9, 0), at(2, 10, 0))];
    assert_eq!(events.upsert_synced("u1", &first).await.unwrap(), 1);

    // Same provider identity, changed details: must update, not duplicate.
    let mut changed = event("g1", at(2, 9, 30), at(2, 10, 30));
    changed.title = "Renamed".to_string();
    assert_eq!(events.upsert_synced("u1", &[changed]).await.unwrap(), 1);

    let stored = events.events_in_range("u1", at(1, 0, 0), at(3, 0, 0)).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Renamed");
    assert_eq!(stored[0].start_time, at(2, 9, 30));
}

#[tokio::test]
async fn events_round_trip_with_json_columns() {
    let (_dir, _, events) = repos();

    events.upsert_synced("u1", &[event("g1", at(2, 9, 0), at(2, 10, 0))]).await.unwrap();

    let stored = events.events_in_range("u1", at(1, 0, 0), at(3, 0, 0)).await.unwrap();
    assert_eq!(stored.len(), 1);
    let stored = &stored[0];
    assert_eq!(stored.attendees, vec!["a@example.com", "b@example.com"]);
    assert_eq!(stored.reminders, vec![Reminder { method: ReminderMethod::Popup, minutes: 10 }]);
    assert_eq!(
        stored.metadata.as_ref().and_then(|m| m["htmlLink"].as_str()),
        Some("https://calendar.example/e")
    );
    assert_eq!(stored.provider, Some(CalendarProvider::Google));
    assert!(stored.id.is_some());
}

#[tokio::test]
async fn events_in_range_is_scoped_and_ordered() {
    let (_dir, _, events) = repos();

    events
        .upsert_synced(
            "u1",
            &[
                event("late", at(2, 15, 0), at(2, 16, 0)),
                event("early", at(2, 9, 0), at(2, 10, 0)),
                event("outside", at(9, 9, 0), at(9, 10, 0)),
            ],
        )
        .await
        .unwrap();
    events.upsert_synced("u2", &[event("other-user", at(2, 11, 0), at(2, 12, 0))]).await.unwrap();

    let stored = events.events_in_range("u1", at(2, 0, 0), at(3, 0, 0)).await.unwrap();
    let ids: Vec<_> = stored.iter().map(|e| e.external_id.as_deref().unwrap()).collect();
    assert_eq!(ids, vec!["early", "late"]);
}

#[tokio::test]
async fn events_without_provider_identity_are_skipped() {
    let (_dir, _, events) = repos();

    let mut anonymous = event("g1", at(2, 9, 0), at(2, 10, 0));
    anonymous.external_id = None;

    let written = events
        .upsert_synced("u1", &[anonymous, event("g2", at(2, 11, 0), at(2, 12, 0))])
        .await
        .unwrap();
    assert_eq!(written, 1);

    let stored = events.events_in_range("u1", at(1, 0, 0), at(3, 0, 0)).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].external_id.as_deref(), Some("g2"));
}
