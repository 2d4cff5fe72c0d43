//! # Jobtrail Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for providers, storage, notifications
//! - Conflict detection over canonical events
//! - Free-slot search within working hours
//! - The multi-provider sync orchestrator
//!
//! ## Architecture Principles
//! - Only depends on `jobtrail-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod availability;
pub mod conflicts;
pub mod ports;
pub mod sync;

pub use availability::find_available_slots;
pub use conflicts::{detect_conflicts, suggest_resolutions};
pub use ports::{EventRepository, IntegrationRepository, NotificationBus, ProviderAdapter};
pub use sync::{CalendarSyncService, SyncServiceConfig};
