//! onair - Unattended radio orchestrator
//!
//! Decides what plays next on an automated station and feeds it to a
//! playback pipeline through an append-only queue file.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`schedule`] - Show schedule and the transition look-ahead engine
//! - [`library`] - Music library index
//! - [`resolver`] - Free text to library path (exact, alias, fuzzy)
//! - [`history`] - No-repeat window of recently played tracks
//! - [`pool`] - Per-show track pools
//! - [`queue`] - Queue file writer and low-watermark signal
//! - [`collaborators`] - Contracts and adapters for external services
//! - [`llm`] - LLM content source
//! - [`orchestrator`] - The polling loop and fallback cascade
//! - [`snapshot`] - Hot-reloaded station configuration
//! - [`storage`] - Atomic JSON state files and the wishlist
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use onair::config::Config;
//! use onair::orchestrator::setup::build_orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let mut orchestrator = build_orchestrator(&config)?;
//!     let (_tx, rx) = tokio::sync::watch::channel(false);
//!     orchestrator.run(rx).await?;
//!     Ok(())
//! }
//! ```

pub mod collaborators;
pub mod config;
pub mod error;
pub mod history;
pub mod library;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod pool;
pub mod queue;
pub mod resolver;
pub mod schedule;
pub mod snapshot;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, OnAirErrorTrait, Result};
    pub use crate::history::HistoryTracker;
    pub use crate::library::Library;
    pub use crate::models::{ItemKind, QueueItem, WishlistEntry};
    pub use crate::orchestrator::{CycleOutcome, CycleReport, Orchestrator};
    pub use crate::queue::QueueManager;
    pub use crate::resolver::{MatchTier, TrackResolver};
    pub use crate::schedule::{Schedule, ScheduleEngine};
}

// Direct re-exports for convenience
pub use models::{ItemKind, QueueItem};
