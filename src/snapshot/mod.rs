//! Station configuration snapshot
//!
//! Schedule, alias table and library are read-mostly inputs maintained by
//! operators. They are loaded together into an immutable
//! [`StationSnapshot`] shared behind an `Arc`; the loop swaps in a new
//! snapshot between cycles when a source file changes, never mid-cycle.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::Result;
use crate::library::Library;
use crate::resolver::AliasTable;
use crate::schedule::Schedule;

/// Everything a cycle reads but never writes
#[derive(Debug, Clone)]
pub struct StationSnapshot {
    pub schedule: Schedule,
    pub aliases: AliasTable,
    pub library: Library,
    pub loaded_at: DateTime<Utc>,
}

impl StationSnapshot {
    pub fn new(schedule: Schedule, aliases: AliasTable, library: Library) -> Self {
        Self {
            schedule,
            aliases,
            library,
            loaded_at: Utc::now(),
        }
    }
}

/// Source files of a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSources {
    pub schedule: PathBuf,
    pub aliases: PathBuf,
    pub library: PathBuf,
}

impl SnapshotSources {
    fn fingerprint(&self) -> [Option<SystemTime>; 3] {
        [
            modified(&self.schedule),
            modified(&self.aliases),
            modified(&self.library),
        ]
    }

    /// Load all three sources
    pub fn load(&self) -> Result<StationSnapshot> {
        let schedule = Schedule::load(&self.schedule)?;
        let aliases = AliasTable::load(&self.aliases)?;
        let library = Library::load(&self.library)?;
        Ok(StationSnapshot::new(schedule, aliases, library))
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Reloads the snapshot when any source file's modification time changes
#[derive(Debug)]
pub struct SnapshotLoader {
    sources: SnapshotSources,
    fingerprint: Option<[Option<SystemTime>; 3]>,
    current: Option<Arc<StationSnapshot>>,
}

impl SnapshotLoader {
    pub fn new(sources: SnapshotSources) -> Self {
        Self {
            sources,
            fingerprint: None,
            current: None,
        }
    }

    /// Loader seeded with an already built snapshot
    pub fn with_snapshot(sources: SnapshotSources, snapshot: StationSnapshot) -> Self {
        Self {
            fingerprint: Some(sources.fingerprint()),
            sources,
            current: Some(Arc::new(snapshot)),
        }
    }

    pub fn sources(&self) -> &SnapshotSources {
        &self.sources
    }

    pub fn current(&self) -> Option<Arc<StationSnapshot>> {
        self.current.clone()
    }

    /// Current snapshot, reloaded first if a source changed
    ///
    /// A failed reload keeps the previous snapshot and is retried once a
    /// source changes again. Without a previous snapshot the error is
    /// returned.
    pub fn refresh(&mut self) -> Result<Arc<StationSnapshot>> {
        let fingerprint = self.sources.fingerprint();
        if let Some(current) = &self.current {
            if self.fingerprint.as_ref() == Some(&fingerprint) {
                return Ok(Arc::clone(current));
            }
        }

        let result = self.sources.load();
        self.fingerprint = Some(fingerprint);

        match (result, &self.current) {
            (Ok(snapshot), _) => {
                tracing::info!(
                    shows = snapshot.schedule.shows().len(),
                    aliases = snapshot.aliases.len(),
                    tracks = snapshot.library.len(),
                    "Station snapshot loaded"
                );
                let snapshot = Arc::new(snapshot);
                self.current = Some(Arc::clone(&snapshot));
                Ok(snapshot)
            }
            (Err(e), Some(previous)) => {
                tracing::error!(error = %e, "Snapshot reload failed, keeping previous snapshot");
                Ok(Arc::clone(previous))
            }
            (Err(e), None) => {
                self.fingerprint = None;
                Err(e)
            }
        }
    }
}
