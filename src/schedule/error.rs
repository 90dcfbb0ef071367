//! Error types for the schedule module

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for schedule operations
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Malformed show schedule; fatal to the cycle until the file is fixed
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// Time is not a valid "HH:MM"
    #[error("Show '{show}' has invalid time '{value}', expected HH:MM")]
    InvalidTime { show: String, value: String },

    /// Start equals end
    #[error("Show '{show}' has a zero-length interval")]
    EmptyInterval { show: String },

    /// Two shows claim the same minute
    #[error("Shows '{first}' and '{second}' overlap")]
    Overlap { first: String, second: String },

    /// Two shows share an id
    #[error("Duplicate show id '{id}'")]
    DuplicateId { id: String },

    /// Schedule file could not be read
    #[error("Failed to read schedule {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Schedule file is not valid JSON
    #[error("Failed to parse schedule {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ScheduleError {
    /// Create an invalid time error
    pub fn invalid_time(show: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidTime {
            show: show.into(),
            value: value.into(),
        }
    }

    /// Create an overlap error
    pub fn overlap(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self::Overlap {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Name of the offending show, when the error is about one
    pub fn show(&self) -> Option<&str> {
        match self {
            Self::InvalidTime { show, .. } | Self::EmptyInterval { show } => Some(show),
            Self::Overlap { first, .. } => Some(first),
            Self::DuplicateId { id } => Some(id),
            Self::Io { .. } | Self::Parse { .. } => None,
        }
    }
}
