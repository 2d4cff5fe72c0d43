pub mod calendar;

use axum::{
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;

use crate::state::AppState;

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/calendar/auth/{provider}", get(calendar::auth_url))
        .route("/calendar/callback/{provider}", post(calendar::oauth_callback))
        .route("/calendar/sync", post(calendar::sync))
        .route("/calendar/events/{provider}", post(calendar::create_event))
        .route(
            "/calendar/events/{provider}/{event_id}",
            put(calendar::update_event).delete(calendar::delete_event),
        )
        .route("/calendar/conflicts/check", post(calendar::check_conflicts))
        .route("/calendar/slots/available", post(calendar::available_slots))
        .route("/calendar/disconnect/{provider}", delete(calendar::disconnect))
        .with_state(state)
}
