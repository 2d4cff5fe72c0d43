//! Multi-provider sync orchestration.
//!
//! Fans one sync task out per active integration, isolates per-provider
//! failures, merges the returned events, runs conflict detection, and
//! reports a structured [`SyncStatus`]. A single provider's failure never
//! aborts the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use jobtrail_domain::{
    AvailableSlot, CalendarError, CalendarEvent, CalendarIntegration, CalendarProvider,
    ConflictCheck, EventStatus, Notification, ProviderSyncOutcome, Result, SyncIssue, SyncStatus,
};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

use crate::availability;
use crate::conflicts::{detect_conflicts, suggest_resolutions};
use crate::ports::{EventRepository, IntegrationRepository, NotificationBus, ProviderAdapter};

/// Default sync window when the caller supplies none: now + 3 months.
const DEFAULT_WINDOW_DAYS: i64 = 90;

/// Tuning knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct SyncServiceConfig {
    /// Bound on each adapter call so one hanging provider cannot stall the
    /// whole sync; a timeout counts as that provider failing.
    pub provider_timeout: StdDuration,
    /// Half-width of the window searched for alternative slots around a
    /// conflicting proposal.
    pub nearby_slot_days: i64,
    /// Cap on formatted alternative-slot suggestions.
    pub max_alternatives: usize,
}

impl Default for SyncServiceConfig {
    fn default() -> Self {
        Self {
            provider_timeout: StdDuration::from_secs(30),
            nearby_slot_days: 3,
            max_alternatives: 3,
        }
    }
}

type SyncLockKey = (String, CalendarProvider);

/// Calendar synchronization and scheduling service.
///
/// Holds one adapter per provider; dispatch is by [`CalendarProvider`]
/// value, never by string branching.
pub struct CalendarSyncService {
    adapters: HashMap<CalendarProvider, Arc<dyn ProviderAdapter>>,
    integrations: Arc<dyn IntegrationRepository>,
    events: Arc<dyn EventRepository>,
    bus: Arc<dyn NotificationBus>,
    config: SyncServiceConfig,
    // Serializes concurrent syncs of the same (user, provider) so a manual
    // trigger cannot race the scheduled job on the same upsert keys.
    sync_locks: DashMap<SyncLockKey, Arc<Mutex<()>>>,
}

impl CalendarSyncService {
    pub fn new(
        adapters: HashMap<CalendarProvider, Arc<dyn ProviderAdapter>>,
        integrations: Arc<dyn IntegrationRepository>,
        events: Arc<dyn EventRepository>,
        bus: Arc<dyn NotificationBus>,
        config: SyncServiceConfig,
    ) -> Self {
        Self { adapters, integrations, events, bus, config, sync_locks: DashMap::new() }
    }

    /// Look up the adapter registered for `provider`.
    pub fn adapter(&self, provider: CalendarProvider) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned().ok_or_else(|| {
            CalendarError::UnsupportedProvider(format!("no adapter registered for {provider}"))
        })
    }

    /// Synchronize every active integration of the user.
    ///
    /// Always returns a status: outer failures (e.g. the integration list
    /// cannot be loaded) flip `success` and append a `SYSTEM` issue instead
    /// of propagating.
    #[instrument(skip(self), fields(user_id))]
    pub async fn sync_all_calendars(
        &self,
        user_id: &str,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> SyncStatus {
        let started_at = Utc::now();
        let mut status = SyncStatus::begin(user_id, started_at);
        let (window_start, window_end) =
            window.unwrap_or((started_at, started_at + Duration::days(DEFAULT_WINDOW_DAYS)));

        let integrations = match self.integrations.active_for_user(user_id).await {
            Ok(list) => list,
            Err(err) => {
                error!(user_id, error = %err, "failed to load calendar integrations");
                status.success = false;
                status.errors.push(SyncIssue::system(err.to_string()));
                status.end_time = Some(Utc::now());
                return status;
            }
        };

        let tasks = integrations
            .into_iter()
            .map(|integration| self.sync_provider(integration, window_start, window_end));
        let results = join_all(tasks).await;

        let mut merged: Vec<CalendarEvent> = Vec::new();
        for (outcome, events) in results {
            if let Some(message) = &outcome.error {
                status.errors.push(SyncIssue::provider(outcome.provider, message.clone()));
            }
            status.providers.push(outcome);
            merged.extend(events);
        }

        status.total_events = merged.len();
        status.conflicts = detect_conflicts(&merged);

        self.bus.publish(Notification::CalendarSynced {
            user_id: user_id.to_string(),
            total_events: status.total_events,
            conflict_count: status.conflicts.len(),
        });

        info!(
            user_id,
            total_events = status.total_events,
            conflicts = status.conflicts.len(),
            providers = status.providers.len(),
            "calendar sync completed"
        );

        status.end_time = Some(Utc::now());
        status
    }

    /// Sync one integration; every failure mode collapses into a failed
    /// outcome so siblings are unaffected.
    async fn sync_provider(
        &self,
        integration: CalendarIntegration,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> (ProviderSyncOutcome, Vec<CalendarEvent>) {
        let provider = integration.provider;
        let user_id = integration.user_id;

        let Some(adapter) = self.adapters.get(&provider).cloned() else {
            warn!(user_id, %provider, "no adapter registered; skipping integration");
            return (ProviderSyncOutcome::failed(provider, "no adapter registered"), Vec::new());
        };

        let key = (user_id.clone(), provider);
        let lock = self.sync_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.sync_provider_locked(adapter, &user_id, provider, start, end).await
        };
        drop(lock);
        // The last holder evicts its registry entry so the map does not
        // grow with every user ever synced.
        self.sync_locks.remove_if(&key, |_, entry| Arc::strong_count(entry) == 1);
        result
    }

    async fn sync_provider_locked(
        &self,
        adapter: Arc<dyn ProviderAdapter>,
        user_id: &str,
        provider: CalendarProvider,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> (ProviderSyncOutcome, Vec<CalendarEvent>) {
        let fetched =
            match timeout(self.config.provider_timeout, adapter.sync_events(user_id, start, end))
                .await
            {
                Err(_) => {
                    warn!(user_id, %provider, timeout = ?self.config.provider_timeout, "provider sync timed out");
                    return (
                        ProviderSyncOutcome::failed(
                            provider,
                            format!(
                                "sync timed out after {}s",
                                self.config.provider_timeout.as_secs()
                            ),
                        ),
                        Vec::new(),
                    );
                }
                Ok(Err(err)) => {
                    error!(user_id, %provider, error = %err, "provider sync failed");
                    return (ProviderSyncOutcome::failed(provider, err.to_string()), Vec::new());
                }
                Ok(Ok(events)) => events,
            };

        if let Err(err) = self.events.upsert_synced(user_id, &fetched).await {
            error!(user_id, %provider, error = %err, "failed to persist synced events");
            return (
                ProviderSyncOutcome::failed(provider, format!("failed to persist events: {err}")),
                Vec::new(),
            );
        }

        let synced_at = Utc::now();
        if let Err(err) = self.integrations.mark_synced(user_id, provider, synced_at).await {
            // The events are stored; a stale last_synced_at only means the
            // hourly job may pick this user up again early.
            warn!(user_id, %provider, error = %err, "failed to record last_synced_at");
        }

        (ProviderSyncOutcome::succeeded(provider, fetched.len(), synced_at), fetched)
    }

    /// Check a proposed `[start, end]` interval against every connected
    /// calendar before an event is created or moved.
    ///
    /// Per-provider errors are logged and skipped; when conflicts remain,
    /// qualitative suggestions plus up to `max_alternatives` nearby free
    /// slots are attached.
    #[instrument(skip(self), fields(user_id))]
    pub async fn check_new_event_conflicts(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_event_id: Option<&str>,
    ) -> Result<ConflictCheck> {
        let integrations = self.integrations.active_for_user(user_id).await?;

        let mut conflicts: Vec<CalendarEvent> = Vec::new();
        for integration in integrations {
            let provider = integration.provider;
            let Some(adapter) = self.adapters.get(&provider).cloned() else {
                continue;
            };
            match timeout(self.config.provider_timeout, adapter.busy_events(user_id, start, end))
                .await
            {
                Ok(Ok(events)) => conflicts.extend(events.into_iter().filter(|e| !e.is_all_day)),
                Ok(Err(err)) => {
                    warn!(user_id, %provider, error = %err, "conflict check failed; skipping provider");
                }
                Err(_) => {
                    warn!(user_id, %provider, "conflict check timed out; skipping provider");
                }
            }
        }

        // When editing an existing event it must not conflict with itself.
        if let Some(exclude) = exclude_event_id {
            conflicts.retain(|e| {
                e.external_id.as_deref() != Some(exclude) && e.id.as_deref() != Some(exclude)
            });
        }

        let mut suggestions = Vec::new();
        if !conflicts.is_empty() {
            let proposed = proposed_event(start, end);
            suggestions = suggest_resolutions(&proposed, &conflicts);

            let nearby_start = start - Duration::days(self.config.nearby_slot_days);
            let nearby_end = start + Duration::days(self.config.nearby_slot_days);
            let duration_minutes = (end - start).num_minutes().max(1);
            match self.events.events_in_range(user_id, nearby_start, nearby_end).await {
                Ok(existing) => {
                    let alternatives = availability::find_available_slots(
                        &existing,
                        duration_minutes,
                        nearby_start,
                        nearby_end,
                    );
                    for slot in alternatives.into_iter().take(self.config.max_alternatives) {
                        suggestions.push(format!(
                            "Alternative time: {} - {}",
                            slot.start.format("%Y-%m-%d %H:%M"),
                            slot.end.format("%H:%M")
                        ));
                    }
                }
                Err(err) => {
                    warn!(user_id, error = %err, "could not search for alternative slots");
                }
            }
        }

        Ok(ConflictCheck { has_conflicts: !conflicts.is_empty(), conflicts, suggestions })
    }

    /// Free slots for the user within `[search_start, search_end]`, based
    /// on persisted events.
    pub async fn find_available_slots(
        &self,
        user_id: &str,
        duration_minutes: i64,
        search_start: DateTime<Utc>,
        search_end: DateTime<Utc>,
    ) -> Result<Vec<AvailableSlot>> {
        if duration_minutes <= 0 {
            return Err(CalendarError::InvalidInput(
                "slot duration must be positive".to_string(),
            ));
        }
        let events = self.events.events_in_range(user_id, search_start, search_end).await?;
        Ok(availability::find_available_slots(&events, duration_minutes, search_start, search_end))
    }

    fn sync_lock(&self, key: &SyncLockKey) -> Arc<Mutex<()>> {
        self.sync_locks.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// Placeholder base event representing the caller's proposed interval,
/// used to drive the suggestion generator.
fn proposed_event(start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
    CalendarEvent {
        id: None,
        external_id: None,
        provider: None,
        title: "Proposed event".to_string(),
        description: None,
        location: None,
        start_time: start,
        end_time: end,
        timezone: None,
        is_all_day: false,
        recurrence: None,
        attendees: Vec::new(),
        reminders: Vec::new(),
        status: EventStatus::Confirmed,
        created: None,
        updated: None,
        metadata: None,
    }
}
