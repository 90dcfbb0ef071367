//! Orchestration Loop
//!
//! A single cooperative loop polls the low-queue signal every few seconds.
//! When it is raised, one cycle runs to completion before the next poll:
//!
//! ```text
//! Idle -> ScheduleCheck -> (SignationPending) -> SourceSelect
//!      -> ResolveAttempt(1..=5) -> Success | ForcedRepeat -> Enqueue -> Idle
//! ```
//!
//! History and pool state are owned by the loop and only mutated from it.
//! Collaborator calls are awaited with hard limits; an abandoned call
//! contributes nothing to the cycle.

pub mod cascade;
pub mod cycle;
pub mod setup;

pub use cascade::{AttemptFailure, AttemptRecord, Hit, Strategy};

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::collaborators::Collaborators;
use crate::error::{OnAirErrorTrait, Result};
use crate::history::{HistoryTracker, DEFAULT_HISTORY_CAPACITY};
use crate::models::QueueItem;
use crate::pool::PoolManager;
use crate::queue::QueueManager;
use crate::resolver::{MatchTier, ResolverConfig, TrackResolver};
use crate::schedule::{ScheduleEngine, DEFAULT_LOOKAHEAD_SECS};
use crate::snapshot::{SnapshotLoader, StationSnapshot};
use crate::storage::{JsonFile, Wishlist};

/// Upper bound on resolution attempts per cycle
pub const MAX_ATTEMPTS: u32 = 5;

// ============================================================================
// Settings
// ============================================================================

/// Loop tunables
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub poll_interval: Duration,
    /// Clamped to 1..=5
    pub max_attempts: u32,
    pub history_capacity: usize,
    pub lookahead_secs: u32,
    pub blocklist_size: usize,
    /// Language hint passed to speech synthesis
    pub language: String,
    pub resolver: ResolverConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            max_attempts: MAX_ATTEMPTS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            lookahead_secs: DEFAULT_LOOKAHEAD_SECS,
            blocklist_size: 5,
            language: "en".to_string(),
            resolver: ResolverConfig::default(),
        }
    }
}

/// Durable state locations
#[derive(Debug, Clone)]
pub struct StateFiles {
    pub history: JsonFile,
    pub pools: JsonFile,
    pub wishlist: Wishlist,
    pub pool_dir: PathBuf,
}

// ============================================================================
// Cycle Report
// ============================================================================

/// States a cycle passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    ScheduleCheck,
    SignationPending,
    SourceSelect,
    ResolveAttempt(u32),
    Success,
    ForcedRepeat,
    Enqueue,
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A fresh track was resolved; `tier` is `None` for an artist search hit
    Success {
        path: PathBuf,
        tier: Option<MatchTier>,
    },
    /// Every attempt failed and a recently played track was re-queued
    ForcedRepeat { path: PathBuf },
    /// Items held back by a failed queue write were delivered
    Redelivered { path: PathBuf },
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::ForcedRepeat { .. } => "forced_repeat",
            Self::Redelivered { .. } => "redelivered",
        }
    }

    /// Track that went to the queue
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Success { path, .. } | Self::ForcedRepeat { path } | Self::Redelivered { path } => {
                path
            }
        }
    }
}

/// What one cycle did
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    /// Effective show (the incoming one during a transition)
    pub show: String,
    pub power_save: bool,
    pub phases: Vec<CyclePhase>,
    pub attempts: Vec<AttemptRecord>,
    pub outcome: CycleOutcome,
    pub enqueued: Vec<QueueItem>,
}

impl CycleReport {
    /// Attempts that consumed budget
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Items held back by a failed queue write
#[derive(Debug, Clone)]
struct PendingDelivery {
    items: Vec<QueueItem>,
    track_id: String,
    show: String,
    handover: Option<String>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// The orchestration loop and the state it owns
pub struct Orchestrator {
    settings: OrchestratorSettings,
    engine: ScheduleEngine,
    resolver: TrackResolver,
    snapshots: SnapshotLoader,
    /// Snapshot the pools were last configured for
    configured_for: Option<Arc<StationSnapshot>>,
    queue: QueueManager,
    history: HistoryTracker,
    pools: PoolManager,
    files: StateFiles,
    collaborators: Collaborators,
    /// Transition whose handover (signation, intro) has been queued
    introduced: Option<String>,
    charts_day: Option<NaiveDate>,
    pending: Option<PendingDelivery>,
}

impl Orchestrator {
    /// Build an orchestrator, restoring history and pool state
    ///
    /// Unreadable state files are logged and replaced by empty state.
    pub fn new(
        settings: OrchestratorSettings,
        snapshots: SnapshotLoader,
        queue: QueueManager,
        files: StateFiles,
        collaborators: Collaborators,
    ) -> Self {
        let mut settings = settings;
        settings.max_attempts = settings.max_attempts.clamp(1, MAX_ATTEMPTS);

        let history = HistoryTracker::load(&files.history, settings.history_capacity)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "History unreadable, starting empty");
                HistoryTracker::new(settings.history_capacity)
            });
        let pools = PoolManager::restore(&files.pools, files.pool_dir.clone()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Pool state unreadable, re-seeding pools");
            PoolManager::new(files.pool_dir.clone())
        });

        Self {
            engine: ScheduleEngine::new(settings.lookahead_secs),
            resolver: TrackResolver::new(settings.resolver),
            settings,
            snapshots,
            configured_for: None,
            queue,
            history,
            pools,
            files,
            collaborators,
            introduced: None,
            charts_day: None,
            pending: None,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn history(&self) -> &HistoryTracker {
        &self.history
    }

    pub fn pools_mut(&mut self) -> &mut PoolManager {
        &mut self.pools
    }

    /// Whether a failed delivery is waiting to be retried
    pub fn has_pending_delivery(&self) -> bool {
        self.pending.is_some()
    }

    /// Run until `shutdown` flips to `true`
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            poll_secs = self.settings.poll_interval.as_secs_f64(),
            max_attempts = self.settings.max_attempts,
            "Orchestrator started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once(Local::now()).await {
                        Ok(Some(report)) => {
                            tracing::info!(
                                cycle_id = %report.cycle_id,
                                show = %report.show,
                                outcome = report.outcome.as_str(),
                                attempts = report.attempt_count(),
                                path = %report.outcome.path().display(),
                                "Cycle finished"
                            );
                        }
                        Ok(None) => {}
                        Err(e) if e.is_recoverable() => {
                            tracing::warn!(error = %e, "Cycle failed, retrying on next poll");
                        }
                        Err(e) => {
                            tracing::error!(
                                category = e.category().as_str(),
                                error = %e,
                                "Cycle halted"
                            );
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Orchestrator shutting down");
                    break;
                }
            }
        }

        self.persist();
        Ok(())
    }

    /// Check the signal once and run a cycle if it is raised
    ///
    /// The signal is acknowledged only after material reached the queue; a
    /// failed cycle leaves it raised so the next poll tries again.
    pub async fn poll_once(&mut self, now: DateTime<Local>) -> Result<Option<CycleReport>> {
        if !self.queue.low_watermark_reached() {
            return Ok(None);
        }

        let report = match self.pending.take() {
            Some(pending) => self.redeliver(pending).await?,
            None => self.run_cycle_at(now).await?,
        };

        self.queue.acknowledge()?;
        Ok(Some(report))
    }

    /// Retry a delivery that failed to reach the queue
    async fn redeliver(&mut self, pending: PendingDelivery) -> Result<CycleReport> {
        let result = self.queue.enqueue_batch(&pending.items).await;
        if let Err(e) = result {
            self.pending = Some(pending);
            return Err(e.into());
        }

        tracing::info!(
            items = pending.items.len(),
            track = %pending.track_id,
            "Held-back items delivered"
        );
        self.commit(&pending.track_id, pending.handover);

        Ok(CycleReport {
            cycle_id: Uuid::new_v4(),
            show: pending.show,
            power_save: false,
            phases: vec![CyclePhase::Enqueue],
            attempts: Vec::new(),
            outcome: CycleOutcome::Redelivered {
                path: PathBuf::from(&pending.track_id),
            },
            enqueued: pending.items,
        })
    }

    /// Record a delivered track and persist loop state
    fn commit(&mut self, track_id: &str, handover: Option<String>) {
        self.history.record(track_id);
        if handover.is_some() {
            self.introduced = handover;
        }
        self.persist();
    }

    /// Write history and pool state; failures are logged
    fn persist(&self) {
        if let Err(e) = self.history.save(&self.files.history) {
            tracing::warn!(error = %e, "Failed to persist history");
        }
        if let Err(e) = self.pools.save(&self.files.pools) {
            tracing::warn!(error = %e, "Failed to persist pool state");
        }
    }
}
