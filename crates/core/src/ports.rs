//! Port interfaces implemented by the infrastructure layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobtrail_domain::{
    CalendarEvent, CalendarIntegration, CalendarProvider, EventPatch, Notification, Result,
};

/// Capability set of one calendar provider (Google, Outlook).
///
/// Implementations hold no per-user mutable OAuth state: credentials are
/// loaded from the integration store on every call and refreshed in place
/// when expired, so adapter instances can be shared across concurrent
/// requests.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider this adapter talks to.
    fn provider(&self) -> CalendarProvider;

    /// Build the OAuth2 authorization URL, carrying `user_id` as the opaque
    /// `state` parameter.
    fn auth_url(&self, user_id: &str) -> Result<String>;

    /// Exchange an authorization code for tokens and upsert the integration
    /// row keyed by `(user_id, provider)`.
    async fn complete_auth(&self, code: &str, user_id: &str) -> Result<()>;

    /// Create an event; the returned canonical event is enriched with the
    /// provider-assigned `external_id` and a deep link in `metadata`.
    async fn create_event(&self, user_id: &str, event: &CalendarEvent) -> Result<CalendarEvent>;

    /// Fetch the existing provider event, merge only the supplied fields,
    /// and issue an update call.
    async fn update_event(
        &self,
        user_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CalendarEvent>;

    async fn delete_event(&self, user_id: &str, event_id: &str) -> Result<()>;

    /// List events in `[start, end)` in canonical form, capped at 250,
    /// ordered by start time, recurring events expanded by the provider.
    async fn sync_events(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;

    /// List events overlapping the interval, excluding all-day events
    /// (they never block scheduling).
    async fn busy_events(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;

    /// Deactivate the integration and clear stored tokens; idempotent.
    async fn disconnect(&self, user_id: &str) -> Result<()>;
}

/// Storage port for `CalendarIntegration` rows.
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    /// Insert or replace the row keyed by `(user_id, provider)`.
    async fn upsert(&self, integration: &CalendarIntegration) -> Result<()>;

    async fn find(
        &self,
        user_id: &str,
        provider: CalendarProvider,
    ) -> Result<Option<CalendarIntegration>>;

    /// All `is_active` integrations for one user.
    async fn active_for_user(&self, user_id: &str) -> Result<Vec<CalendarIntegration>>;

    /// Persist a rotated access token after a refresh exchange.
    async fn update_tokens(
        &self,
        user_id: &str,
        provider: CalendarProvider,
        access_token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Record a successful sync instant.
    async fn mark_synced(
        &self,
        user_id: &str,
        provider: CalendarProvider,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Clear tokens and set `is_active = false`, keeping the row for audit.
    async fn deactivate(&self, user_id: &str, provider: CalendarProvider) -> Result<()>;

    /// Distinct user ids with an active integration that has never synced
    /// or last synced before `cutoff`. Feeds the periodic sync job.
    async fn stale_active_user_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>>;
}

/// Storage port for canonical events.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Upsert synced events keyed by `(user_id, provider, external_id)`,
    /// updating mutable fields on existing rows. Returns the number of
    /// rows written.
    async fn upsert_synced(&self, user_id: &str, events: &[CalendarEvent]) -> Result<usize>;

    /// Persisted events for the user within `[start, end]`, ordered by
    /// start time ascending.
    async fn events_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;
}

/// Outbound notification channel consumed by external subscribers.
/// Publishing must never block or fail the sync path.
pub trait NotificationBus: Send + Sync {
    fn publish(&self, notification: Notification);
}
