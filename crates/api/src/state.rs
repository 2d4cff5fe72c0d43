use std::sync::Arc;

use jobtrail_core::CalendarSyncService;

/// Shared application state injected into all route handlers via axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<CalendarSyncService>,
}
