//! Provider adapter tests against mocked Google and Graph APIs.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jobtrail_core::{IntegrationRepository, ProviderAdapter};
use jobtrail_domain::{
    CalendarError, CalendarEvent, CalendarIntegration, CalendarProvider, EventStatus,
};
use jobtrail_infra::database::open_in_memory_pool;
use jobtrail_infra::{
    GoogleCalendarAdapter, OAuthSettings, OutlookCalendarAdapter, SqliteIntegrationRepository,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, h, m, 0).unwrap()
}

fn http() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn integration_repo() -> Arc<dyn IntegrationRepository> {
    let pool = open_in_memory_pool().unwrap();
    Arc::new(SqliteIntegrationRepository::new(pool))
}

async fn connect(
    repo: &Arc<dyn IntegrationRepository>,
    provider: CalendarProvider,
    expires_at: Option<DateTime<Utc>>,
) {
    let now = Utc::now();
    repo.upsert(&CalendarIntegration {
        user_id: "u1".to_string(),
        provider,
        access_token: Some("live-token".to_string()),
        refresh_token: Some("refresh-token".to_string()),
        expires_at,
        is_active: true,
        last_synced_at: None,
        created_at: now,
        updated_at: now,
    })
    .await
    .unwrap();
}

fn google_adapter(
    server: &MockServer,
    repo: Arc<dyn IntegrationRepository>,
) -> GoogleCalendarAdapter {
    let oauth = OAuthSettings::google("client-id", "client-secret", "http://localhost/callback")
        .with_token_endpoint(format!("{}/token", server.uri()));
    GoogleCalendarAdapter::new(http(), oauth, repo).with_api_base(server.uri())
}

fn outlook_adapter(
    server: &MockServer,
    repo: Arc<dyn IntegrationRepository>,
) -> OutlookCalendarAdapter {
    let oauth = OAuthSettings::outlook("client-id", "client-secret", "http://localhost/callback")
        .with_token_endpoint(format!("{}/token", server.uri()));
    OutlookCalendarAdapter::new(http(), oauth, repo).with_api_base(server.uri())
}

#[tokio::test]
async fn google_sync_parses_timed_and_all_day_events() {
    let server = MockServer::start().await;
    let repo = integration_repo();
    connect(&repo, CalendarProvider::Google, Some(Utc::now() + Duration::hours(1))).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                {
                    "id": "g1",
                    "summary": "Interview with Acme",
                    "location": "HQ",
                    "start": { "dateTime": "2026-03-02T09:00:00Z", "timeZone": "UTC" },
                    "end": { "dateTime": "2026-03-02T10:00:00+00:00" },
                    "status": "confirmed",
                    "htmlLink": "https://calendar.google.com/event?eid=g1",
                    "attendees": [ { "email": "recruiter@acme.test" } ]
                },
                {
                    "id": "g2",
                    "summary": "Conference",
                    "start": { "date": "2026-03-03" },
                    "end": { "date": "2026-03-04" }
                },
                {
                    "id": "g3",
                    "summary": "   ",
                    "start": { "dateTime": "2026-03-02T14:00:00Z" },
                    "end": { "dateTime": "2026-03-02T15:00:00Z" },
                    "status": "tentative"
                }
            ]
        })))
        .mount(&server)
        .await;

    let adapter = google_adapter(&server, repo);
    let events = adapter.sync_events("u1", at(1, 0, 0), at(10, 0, 0)).await.unwrap();

    assert_eq!(events.len(), 3);

    let interview = &events[0];
    assert_eq!(interview.external_id.as_deref(), Some("g1"));
    assert_eq!(interview.provider, Some(CalendarProvider::Google));
    assert_eq!(interview.title, "Interview with Acme");
    assert_eq!(interview.start_time, at(2, 9, 0));
    assert_eq!(interview.end_time, at(2, 10, 0));
    assert!(!interview.is_all_day);
    assert_eq!(interview.attendees, vec!["recruiter@acme.test"]);
    assert_eq!(
        interview.metadata.as_ref().and_then(|m| m["htmlLink"].as_str()),
        Some("https://calendar.google.com/event?eid=g1")
    );

    let conference = &events[1];
    assert!(conference.is_all_day);
    assert_eq!(conference.start_time, at(3, 0, 0));

    // Blank summary falls back to the placeholder title.
    let untitled = &events[2];
    assert_eq!(untitled.title, "Untitled Event");
    assert_eq!(untitled.status, EventStatus::Tentative);
}

#[tokio::test]
async fn google_sync_skips_events_with_inverted_time_ranges() {
    let server = MockServer::start().await;
    let repo = integration_repo();
    connect(&repo, CalendarProvider::Google, Some(Utc::now() + Duration::hours(1))).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                {
                    "id": "backwards",
                    "summary": "Ends before it starts",
                    "start": { "dateTime": "2026-03-02T10:00:00Z" },
                    "end": { "dateTime": "2026-03-02T09:00:00Z" }
                },
                {
                    "id": "ok",
                    "summary": "Well formed",
                    "start": { "dateTime": "2026-03-02T11:00:00Z" },
                    "end": { "dateTime": "2026-03-02T12:00:00Z" }
                }
            ]
        })))
        .mount(&server)
        .await;

    let adapter = google_adapter(&server, repo);
    let events = adapter.sync_events("u1", at(1, 0, 0), at(10, 0, 0)).await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].external_id.as_deref(), Some("ok"));
}

#[tokio::test]
async fn missing_integration_is_reported_as_not_connected() {
    let server = MockServer::start().await;
    let adapter = google_adapter(&server, integration_repo());

    let err = adapter.sync_events("u1", at(1, 0, 0), at(10, 0, 0)).await.unwrap_err();
    assert!(matches!(err, CalendarError::NotConnected(_)));
}

#[tokio::test]
async fn expired_token_is_refreshed_and_persisted() {
    let server = MockServer::start().await;
    let repo = integration_repo();
    connect(&repo, CalendarProvider::Google, Some(Utc::now() - Duration::hours(1))).await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The API call must carry the refreshed token, not the expired one.
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = google_adapter(&server, repo.clone());
    adapter.sync_events("u1", at(1, 0, 0), at(10, 0, 0)).await.unwrap();

    let stored = repo.find("u1", CalendarProvider::Google).await.unwrap().unwrap();
    assert_eq!(stored.access_token.as_deref(), Some("fresh-token"));
    assert!(stored.expires_at.is_some_and(|expiry| expiry > Utc::now()));
}

#[tokio::test]
async fn google_401_maps_to_auth_error() {
    let server = MockServer::start().await;
    let repo = integration_repo();
    connect(&repo, CalendarProvider::Google, Some(Utc::now() + Duration::hours(1))).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let adapter = google_adapter(&server, repo);
    let err = adapter.sync_events("u1", at(1, 0, 0), at(10, 0, 0)).await.unwrap_err();
    assert!(matches!(err, CalendarError::Auth(_)));
}

#[tokio::test]
async fn google_create_event_returns_provider_identity() {
    let server = MockServer::start().await;
    let repo = integration_repo();
    connect(&repo, CalendarProvider::Google, Some(Utc::now() + Duration::hours(1))).await;

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "created-1",
            "summary": "Phone screen",
            "start": { "dateTime": "2026-03-02T09:00:00Z" },
            "end": { "dateTime": "2026-03-02T09:30:00Z" },
            "htmlLink": "https://calendar.google.com/event?eid=created-1"
        })))
        .mount(&server)
        .await;

    let draft = CalendarEvent {
        id: None,
        external_id: None,
        provider: None,
        title: "Phone screen".to_string(),
        description: None,
        location: None,
        start_time: at(2, 9, 0),
        end_time: at(2, 9, 30),
        timezone: None,
        is_all_day: false,
        recurrence: None,
        attendees: Vec::new(),
        reminders: Vec::new(),
        status: EventStatus::Confirmed,
        created: None,
        updated: None,
        metadata: None,
    };

    let adapter = google_adapter(&server, repo);
    let created = adapter.create_event("u1", &draft).await.unwrap();
    assert_eq!(created.external_id.as_deref(), Some("created-1"));
    assert!(created.metadata.is_some());
}

#[tokio::test]
async fn google_delete_of_gone_event_is_not_found() {
    let server = MockServer::start().await;
    let repo = integration_repo();
    connect(&repo, CalendarProvider::Google, Some(Utc::now() + Duration::hours(1))).await;

    Mock::given(method("DELETE"))
        .and(path("/calendars/primary/events/stale-1"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let adapter = google_adapter(&server, repo);
    let err = adapter.delete_event("u1", "stale-1").await.unwrap_err();
    assert!(matches!(err, CalendarError::NotFound(_)));
}

#[tokio::test]
async fn outlook_calendarview_parses_graph_timestamps() {
    let server = MockServer::start().await;
    let repo = integration_repo();
    connect(&repo, CalendarProvider::Outlook, Some(Utc::now() + Duration::hours(1))).await;

    Mock::given(method("GET"))
        .and(path("/me/calendarview"))
        .and(header("prefer", "outlook.timezone=\"UTC\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "o1",
                    "subject": "Team sync",
                    "bodyPreview": "weekly agenda",
                    "location": { "displayName": "Teams" },
                    "start": { "dateTime": "2026-03-02T09:00:00.0000000", "timeZone": "UTC" },
                    "end": { "dateTime": "2026-03-02T09:30:00.0000000", "timeZone": "UTC" },
                    "isAllDay": false,
                    "attendees": [ { "emailAddress": { "address": "pm@corp.test" } } ],
                    "webLink": "https://outlook.office.com/calendar/item/o1"
                }
            ]
        })))
        .mount(&server)
        .await;

    let adapter = outlook_adapter(&server, repo);
    let events = adapter.sync_events("u1", at(1, 0, 0), at(10, 0, 0)).await.unwrap();

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.external_id.as_deref(), Some("o1"));
    assert_eq!(event.provider, Some(CalendarProvider::Outlook));
    assert_eq!(event.start_time, at(2, 9, 0));
    assert_eq!(event.end_time, at(2, 9, 30));
    assert_eq!(event.description.as_deref(), Some("weekly agenda"));
    assert_eq!(event.location.as_deref(), Some("Teams"));
    assert_eq!(event.attendees, vec!["pm@corp.test"]);
    assert_eq!(
        event.metadata.as_ref().and_then(|m| m["webLink"].as_str()),
        Some("https://outlook.office.com/calendar/item/o1")
    );
}

#[tokio::test]
async fn outlook_busy_events_exclude_all_day_entries() {
    let server = MockServer::start().await;
    let repo = integration_repo();
    connect(&repo, CalendarProvider::Outlook, Some(Utc::now() + Duration::hours(1))).await;

    Mock::given(method("GET"))
        .and(path("/me/calendarview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "busy",
                    "subject": "Onsite loop",
                    "start": { "dateTime": "2026-03-02T09:00:00.0000000" },
                    "end": { "dateTime": "2026-03-02T12:00:00.0000000" },
                    "isAllDay": false
                },
                {
                    "id": "ooo",
                    "subject": "Public holiday",
                    "start": { "dateTime": "2026-03-02T00:00:00.0000000" },
                    "end": { "dateTime": "2026-03-03T00:00:00.0000000" },
                    "isAllDay": true
                }
            ]
        })))
        .mount(&server)
        .await;

    let adapter = outlook_adapter(&server, repo);
    let busy = adapter.busy_events("u1", at(1, 0, 0), at(10, 0, 0)).await.unwrap();

    assert_eq!(busy.len(), 1);
    assert_eq!(busy[0].external_id.as_deref(), Some("busy"));
}

#[tokio::test]
async fn complete_auth_stores_a_connected_integration() {
    let server = MockServer::start().await;
    let repo = integration_repo();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "first-token",
            "refresh_token": "first-refresh",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let adapter = outlook_adapter(&server, repo.clone());
    adapter.complete_auth("auth-code", "u1").await.unwrap();

    let stored = repo.find("u1", CalendarProvider::Outlook).await.unwrap().unwrap();
    assert!(stored.is_active);
    assert_eq!(stored.access_token.as_deref(), Some("first-token"));
    assert_eq!(stored.refresh_token.as_deref(), Some("first-refresh"));

    // Disconnect is routed through the repository and clears credentials.
    adapter.disconnect("u1").await.unwrap();
    let after = repo.find("u1", CalendarProvider::Outlook).await.unwrap().unwrap();
    assert!(!after.is_active);
    assert!(after.access_token.is_none());
}
