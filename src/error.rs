//! Unified error handling for the onair crate
//!
//! Each component owns a focused error type; this module folds them into a
//! single [`Error`] so the orchestration loop can apply one policy.
//!
//! # Architecture
//!
//! - [`OnAirErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use onair::error::{Error, OnAirErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(error = %err, "Cycle failed, retrying on next poll");
//!     } else {
//!         tracing::error!(category = err.category().as_str(), error = %err, "Cycle halted");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::collaborators::CollaboratorError;
pub use crate::queue::QueueError;
pub use crate::schedule::error::ScheduleError;
pub use crate::storage::StorageError;

/// Common trait for all onair error types
pub trait OnAirErrorTrait: std::error::Error {
    /// Check if this error clears up on its own (the next poll may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Show schedule configuration errors
    Schedule,
    /// Queue append failures
    Queue,
    /// Content, speech or context collaborator failures
    Collaborator,
    /// State store and file I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Queue => "queue",
            Self::Collaborator => "collaborator",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the onair crate
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed show schedule
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Queue could not be appended to
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Collaborator failure that escaped the cascade
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// State store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Forced repeat had nothing to repeat
    #[error("Music library is empty, nothing can be queued")]
    EmptyLibrary,

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl OnAirErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Schedule(_) => false,
            Self::Queue(e) => e.is_recoverable(),
            Self::Collaborator(e) => e.is_recoverable(),
            Self::Storage(e) => e.is_recoverable(),
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) | Self::Toml(_) => false,
            Self::Config(_) => false,
            Self::EmptyLibrary => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Schedule(_) => ErrorCategory::Schedule,
            Self::Queue(_) => ErrorCategory::Queue,
            Self::Collaborator(_) => ErrorCategory::Collaborator,
            Self::Storage(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Storage,
            Self::Toml(_) | Self::Config(_) => ErrorCategory::Config,
            Self::EmptyLibrary => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
