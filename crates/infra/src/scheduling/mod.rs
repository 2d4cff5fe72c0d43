//! Background scheduling for periodic calendar synchronization.

pub mod error;
mod sync_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{CalendarSyncScheduler, CalendarSyncSchedulerConfig};
