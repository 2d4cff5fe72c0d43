//! Domain types and models

pub mod calendar;
pub mod sync;
