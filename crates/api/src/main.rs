mod config;
mod errors;
mod routes;
mod state;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use jobtrail_core::{CalendarSyncService, ProviderAdapter, SyncServiceConfig};
use jobtrail_domain::CalendarProvider;
use jobtrail_infra::{
    open_pool, BroadcastNotificationBus, CalendarSyncScheduler, CalendarSyncSchedulerConfig,
    GoogleCalendarAdapter, OAuthSettings, OutlookCalendarAdapter, SqliteEventRepository,
    SqliteIntegrationRepository,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Jobtrail API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite
    let pool = open_pool(Path::new(&config.database_path))?;
    let integrations = Arc::new(SqliteIntegrationRepository::new(pool.clone()));
    let events = Arc::new(SqliteEventRepository::new(pool));
    info!(path = %config.database_path, "database pool initialized");

    // One shared HTTP client across both provider adapters
    let http = reqwest::Client::new();

    let google = GoogleCalendarAdapter::new(
        http.clone(),
        OAuthSettings::google(
            &config.google_client_id,
            &config.google_client_secret,
            config.redirect_uri("google"),
        ),
        integrations.clone(),
    );
    let outlook = OutlookCalendarAdapter::new(
        http,
        OAuthSettings::outlook(
            &config.microsoft_client_id,
            &config.microsoft_client_secret,
            config.redirect_uri("outlook"),
        ),
        integrations.clone(),
    );

    let mut adapters: HashMap<CalendarProvider, Arc<dyn ProviderAdapter>> = HashMap::new();
    adapters.insert(CalendarProvider::Google, Arc::new(google));
    adapters.insert(CalendarProvider::Outlook, Arc::new(outlook));

    let sync = Arc::new(CalendarSyncService::new(
        adapters,
        integrations.clone(),
        events,
        Arc::new(BroadcastNotificationBus::default()),
        SyncServiceConfig::default(),
    ));

    // Hourly background sync for stale integrations
    let mut scheduler = CalendarSyncScheduler::new(
        CalendarSyncSchedulerConfig::default(),
        sync.clone(),
        integrations,
    );
    scheduler.start().await?;

    let app = build_router(AppState { sync })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    if let Err(err) = scheduler.stop().await {
        warn!(error = %err, "scheduler did not stop cleanly");
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
}
