//! # Jobtrail Infra
//!
//! Infrastructure layer: everything that touches the outside world.
//!
//! This crate contains:
//! - Provider adapters for Google Calendar and Microsoft Outlook
//! - OAuth2 token exchange and refresh
//! - SQLite-backed repositories for integrations and events
//! - The broadcast notification bus
//! - The periodic sync scheduler
//!
//! ## Architecture Principles
//! - Implements the port traits defined in `jobtrail-core`
//! - External failures are converted into `CalendarError` at the boundary
//! - No business logic; orchestration lives in `jobtrail-core`

pub mod calendar;
pub mod database;
pub mod errors;
pub mod notify;
pub mod scheduling;

pub use calendar::oauth::OAuthSettings;
pub use calendar::providers::{GoogleCalendarAdapter, OutlookCalendarAdapter};
pub use database::{
    open_pool, DbPool, SqliteEventRepository, SqliteIntegrationRepository,
};
pub use errors::InfraError;
pub use notify::BroadcastNotificationBus;
pub use scheduling::{CalendarSyncScheduler, CalendarSyncSchedulerConfig};
