//! Show schedule: time-of-day show table and transition detection
//!
//! # Submodules
//!
//! - [`show`] - Show definitions, file format, validation
//! - [`engine`] - Active show and transition look-ahead
//! - [`error`] - Schedule configuration errors

pub mod engine;
pub mod error;
pub mod show;

pub use engine::{ScheduleEngine, ScheduleState, ScheduleSummary, Transition, DEFAULT_LOOKAHEAD_SECS};
pub use error::{ScheduleError, ScheduleResult};
pub use show::{format_minute, parse_time, Schedule, Show, DEFAULT_SHOW_ID};
