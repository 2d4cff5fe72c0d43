//! # Jobtrail Domain
//!
//! Business domain types for the calendar synchronization service.
//!
//! This crate contains:
//! - Canonical calendar data types (events, integrations, providers)
//! - Sync reporting types (status, conflict groups, slots)
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other jobtrail crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{CalendarError, Result};
pub use types::calendar::{
    CalendarEvent, CalendarIntegration, CalendarProvider, EventPatch, EventStatus, Reminder,
    ReminderMethod, UNTITLED_EVENT,
};
pub use types::sync::{
    AvailableSlot, ConflictCheck, ConflictGroup, ConflictSeverity, IssueSource, Notification,
    ProviderSyncOutcome, SyncIssue, SyncStatus,
};
