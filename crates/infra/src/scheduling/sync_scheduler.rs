//! Cron-driven calendar synchronization.
//!
//! Every tick, users whose active integrations have not synced within the
//! staleness window are re-synced through [`CalendarSyncService`]. Join
//! handles are tracked, cancellation is explicit, and every asynchronous
//! operation is wrapped in a timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobtrail_core::{CalendarSyncService, IntegrationRepository};
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the periodic sync scheduler.
#[derive(Debug, Clone)]
pub struct CalendarSyncSchedulerConfig {
    /// Cron expression describing the execution schedule.
    pub cron_expression: String,
    /// Integrations older than this are considered stale and re-synced.
    pub stale_after: Duration,
    /// Timeout applied to one full tick (all users).
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for CalendarSyncSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 0 * * * *".into(), // top of every hour
            stale_after: Duration::from_secs(3600),
            job_timeout: Duration::from_secs(300),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Periodic calendar sync scheduler with explicit lifecycle management.
pub struct CalendarSyncScheduler {
    scheduler: Option<JobScheduler>,
    config: CalendarSyncSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    sync_service: Arc<CalendarSyncService>,
    integrations: Arc<dyn IntegrationRepository>,
}

impl CalendarSyncScheduler {
    pub fn new(
        config: CalendarSyncSchedulerConfig,
        sync_service: Arc<CalendarSyncService>,
        integrations: Arc<dyn IntegrationRepository>,
    ) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            sync_service,
            integrations,
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        let start_result = tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?;
        start_result.map_err(|source| SchedulerError::StartFailed { source })?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("calendar sync scheduler monitor cancelled");
        });
        self.monitor_handle = Some(handle);

        info!(cron = %self.config.cron_expression, "calendar sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let mut scheduler = match self.scheduler.take() {
            Some(scheduler) => scheduler,
            None => return Err(SchedulerError::NotRunning),
        };

        let stop_timeout = self.config.stop_timeout;
        let stop_result =
            tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
                .await
                .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?;
        stop_result.map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("calendar sync scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;

        let cron_expr = self.config.cron_expression.clone();
        let job_timeout = self.config.job_timeout;
        let stale_after = self.config.stale_after;
        let sync_service = self.sync_service.clone();
        let integrations = self.integrations.clone();

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let sync_service = sync_service.clone();
            let integrations = integrations.clone();

            Box::pin(async move {
                match tokio::time::timeout(
                    job_timeout,
                    Self::sync_stale_users(sync_service, integrations, stale_after),
                )
                .await
                {
                    Ok(()) => debug!("scheduled calendar sync tick finished"),
                    Err(elapsed) => {
                        warn!(timeout_secs = job_timeout.as_secs(), elapsed = ?elapsed, "scheduled calendar sync timed out");
                    }
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job_definition.guid();
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "registered calendar sync job");
        Ok(scheduler)
    }

    /// One tick: sync every user whose integrations are stale.
    async fn sync_stale_users(
        sync_service: Arc<CalendarSyncService>,
        integrations: Arc<dyn IntegrationRepository>,
        stale_after: Duration,
    ) {
        let cutoff = Utc::now() - chrono::Duration::from_std(stale_after).unwrap_or_default();

        let user_ids = match integrations.stale_active_user_ids(cutoff).await {
            Ok(ids) => ids,
            Err(err) => {
                error!(error = %err, "failed to list stale integrations");
                return;
            }
        };

        if user_ids.is_empty() {
            debug!("no stale calendar integrations");
            return;
        }

        info!(user_count = user_ids.len(), "starting scheduled calendar sync");

        let mut failures = 0;
        for user_id in &user_ids {
            let status = sync_service.sync_all_calendars(user_id, None).await;
            if !status.success || !status.errors.is_empty() {
                failures += 1;
                warn!(
                    user_id,
                    errors = status.errors.len(),
                    "scheduled calendar sync reported issues"
                );
            }
        }

        info!(total_users = user_ids.len(), failures, "scheduled calendar sync batch completed");
    }
}

/// Ensure scheduler tasks are cancelled when dropped.
impl Drop for CalendarSyncScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("CalendarSyncScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
