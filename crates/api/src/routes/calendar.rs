//! Calendar endpoints: OAuth connect/disconnect, sync, event CRUD,
//! conflict checks, and free-slot search.
//!
//! User identity comes from the `x-user-id` header; authentication itself
//! is handled upstream. Provider path segments are parsed into
//! [`CalendarProvider`] before any adapter is touched, so unknown providers
//! fail fast with a 400.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use jobtrail_domain::{
    AvailableSlot, CalendarError, CalendarEvent, CalendarProvider, ConflictCheck, EventPatch,
    SyncStatus,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;

const USER_ID_HEADER: &str = "x-user-id";

fn user_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or(AppError::MissingHeader(USER_ID_HEADER))
}

fn parse_provider(raw: &str) -> Result<CalendarProvider, AppError> {
    raw.parse::<CalendarProvider>().map_err(AppError::from)
}

pub async fn auth_url(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let provider = parse_provider(&provider)?;
    let user = user_id(&headers)?;
    let url = state.sync.adapter(provider)?.auth_url(&user)?;
    Ok(Json(json!({ "authUrl": url })))
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackRequest {
    pub code: String,
    /// Opaque state from the authorization URL; carries the user id.
    pub state: String,
}

pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(body): Json<OAuthCallbackRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let provider = parse_provider(&provider)?;
    if body.state.is_empty() {
        return Err(CalendarError::InvalidInput("OAuth state must not be empty".into()).into());
    }

    state.sync.adapter(provider)?.complete_auth(&body.code, &body.state).await?;
    info!(user_id = %body.state, %provider, "calendar integration connected");
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

pub async fn sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<SyncRequest>>,
) -> Result<Json<SyncStatus>, AppError> {
    let user = user_id(&headers)?;
    let Json(body) = body.unwrap_or_default();

    let window = match (body.start_date, body.end_date) {
        (Some(start), Some(end)) if start < end => Some((start, end)),
        (Some(_), Some(_)) => {
            return Err(
                CalendarError::InvalidInput("startDate must precede endDate".into()).into()
            );
        }
        (None, None) => None,
        _ => {
            return Err(CalendarError::InvalidInput(
                "startDate and endDate must be supplied together".into(),
            )
            .into());
        }
    };

    Ok(Json(state.sync.sync_all_calendars(&user, window).await))
}

pub async fn create_event(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Json(event): Json<CalendarEvent>,
) -> Result<Json<CalendarEvent>, AppError> {
    let provider = parse_provider(&provider)?;
    let user = user_id(&headers)?;
    event.validate()?;

    let created = state.sync.adapter(provider)?.create_event(&user, &event).await?;
    Ok(Json(created))
}

pub async fn update_event(
    State(state): State<AppState>,
    Path((provider, event_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(patch): Json<EventPatch>,
) -> Result<Json<CalendarEvent>, AppError> {
    let provider = parse_provider(&provider)?;
    let user = user_id(&headers)?;

    if let (Some(start), Some(end)) = (patch.start_time, patch.end_time) {
        if start >= end {
            return Err(
                CalendarError::InvalidInput("startTime must precede endTime".into()).into()
            );
        }
    }

    let updated = state.sync.adapter(provider)?.update_event(&user, &event_id, &patch).await?;
    Ok(Json(updated))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path((provider, event_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let provider = parse_provider(&provider)?;
    let user = user_id(&headers)?;

    state.sync.adapter(provider)?.delete_event(&user, &event_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictCheckRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub exclude_event_id: Option<String>,
}

pub async fn check_conflicts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ConflictCheckRequest>,
) -> Result<Json<ConflictCheck>, AppError> {
    let user = user_id(&headers)?;
    if body.start_time >= body.end_time {
        return Err(CalendarError::InvalidInput("startTime must precede endTime".into()).into());
    }

    let check = state
        .sync
        .check_new_event_conflicts(
            &user,
            body.start_time,
            body.end_time,
            body.exclude_event_id.as_deref(),
        )
        .await?;
    Ok(Json(check))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlotsRequest {
    /// Requested slot length in minutes.
    pub duration: i64,
    pub search_start: DateTime<Utc>,
    pub search_end: DateTime<Utc>,
}

pub async fn available_slots(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AvailableSlotsRequest>,
) -> Result<Json<Vec<AvailableSlot>>, AppError> {
    let user = user_id(&headers)?;
    if body.search_start >= body.search_end {
        return Err(
            CalendarError::InvalidInput("searchStart must precede searchEnd".into()).into()
        );
    }

    let slots = state
        .sync
        .find_available_slots(&user, body.duration, body.search_start, body.search_end)
        .await?;
    Ok(Json(slots))
}

pub async fn disconnect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let provider = parse_provider(&provider)?;
    let user = user_id(&headers)?;

    state.sync.adapter(provider)?.disconnect(&user).await?;
    info!(user_id = %user, %provider, "calendar integration disconnected");
    Ok(Json(json!({ "success": true })))
}
