//! Pool Manager
//!
//! Per-show ordered lists of candidate suggestions, seeded from text files
//! (`<pool_dir>/<pool_ref>.txt`, one suggestion per line, `#` comments).
//!
//! Two pull modes:
//!
//! - [`PullMode::Rotate`]: the entry is taken from the front and re-appended
//!   to the back, so the list size never changes (power-save round-robin).
//! - [`PullMode::Discard`]: the entry is consumed; the list shrinks and is
//!   re-seeded from its files once empty (last-resort fallback source).
//!
//! Lists are persisted between cycles so rotation position survives restarts.

use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::schedule::Schedule;
use crate::storage::{JsonFile, StorageError};

/// How a pulled entry is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullMode {
    Rotate,
    Discard,
}

/// A candidate taken from a show's pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub track_suggestion: String,
    pub show_ref: String,
}

/// Persisted pool contents keyed by show id
pub type PoolState = BTreeMap<String, Vec<String>>;

/// Per-show candidate lists
#[derive(Debug, Clone)]
pub struct PoolManager {
    pool_dir: PathBuf,
    /// Pool file refs per show id
    refs: HashMap<String, Vec<String>>,
    pools: HashMap<String, VecDeque<String>>,
}

impl PoolManager {
    pub fn new(pool_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool_dir: pool_dir.into(),
            refs: HashMap::new(),
            pools: HashMap::new(),
        }
    }

    /// Restore persisted lists, then bind them to the schedule's shows
    pub fn load(
        store: &JsonFile,
        pool_dir: impl Into<PathBuf>,
        schedule: &Schedule,
    ) -> Result<Self, StorageError> {
        let mut manager = Self::restore(store, pool_dir)?;
        manager.configure(schedule);
        Ok(manager)
    }

    /// Restore persisted lists; they are bound to shows by the first
    /// [`Self::configure`] call
    pub fn restore(store: &JsonFile, pool_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let mut manager = Self::new(pool_dir);
        if let Some(state) = store.load::<PoolState>()? {
            manager.pools = state
                .into_iter()
                .map(|(show, entries)| (show, entries.into_iter().collect()))
                .collect();
        }
        Ok(manager)
    }

    /// Persist current list contents
    pub fn save(&self, store: &JsonFile) -> Result<(), StorageError> {
        store.save(&self.state())
    }

    /// Snapshot of all lists
    pub fn state(&self) -> PoolState {
        self.pools
            .iter()
            .map(|(show, entries)| (show.clone(), entries.iter().cloned().collect()))
            .collect()
    }

    /// Bind pool refs to the schedule's shows
    ///
    /// Lists of shows whose refs changed, or that no longer exist, are
    /// dropped and re-seeded on next use.
    pub fn configure(&mut self, schedule: &Schedule) {
        let refs: HashMap<String, Vec<String>> = schedule
            .all_shows()
            .map(|show| (show.id.clone(), show.pool_refs.clone()))
            .collect();

        self.pools.retain(|show, _| refs.contains_key(show));
        if !self.refs.is_empty() {
            self.pools
                .retain(|show, _| self.refs.get(show) == refs.get(show));
        }
        self.refs = refs;
    }

    /// Next entry of a show's pool
    pub fn next(&mut self, show: &str, mode: PullMode) -> Option<PoolEntry> {
        self.next_matching(show, mode, |_| true)
    }

    /// First entry of a show's pool accepted by `accept`
    ///
    /// Entries ahead of the match keep their positions.
    pub fn next_matching<F>(&mut self, show: &str, mode: PullMode, accept: F) -> Option<PoolEntry>
    where
        F: Fn(&str) -> bool,
    {
        self.ensure_seeded(show);

        let pool = self.pools.get_mut(show)?;
        let index = pool.iter().position(|entry| accept(entry))?;
        let suggestion = pool.remove(index)?;
        if mode == PullMode::Rotate {
            pool.push_back(suggestion.clone());
        }

        tracing::debug!(
            show,
            suggestion = %suggestion,
            mode = ?mode,
            remaining = pool.len(),
            "Pulled pool entry"
        );

        Some(PoolEntry {
            track_suggestion: suggestion,
            show_ref: show.to_string(),
        })
    }

    /// Current list length for a show, seeding it if needed
    pub fn len(&mut self, show: &str) -> usize {
        self.ensure_seeded(show);
        self.pools.get(show).map_or(0, VecDeque::len)
    }

    /// Current entries of a show's pool, front first
    pub fn entries(&mut self, show: &str) -> Vec<String> {
        self.ensure_seeded(show);
        self.pools
            .get(show)
            .map(|pool| pool.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn ensure_seeded(&mut self, show: &str) {
        if self.pools.get(show).is_some_and(|pool| !pool.is_empty()) {
            return;
        }
        let Some(refs) = self.refs.get(show) else {
            return;
        };

        let entries = seed_from_files(&self.pool_dir, refs);
        tracing::info!(show, entries = entries.len(), "Seeded pool");
        self.pools.insert(show.to_string(), entries.into_iter().collect());
    }
}

/// Read and merge the pool files for `refs`, dropping duplicates
fn seed_from_files(pool_dir: &Path, refs: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for pool_ref in refs {
        if pool_ref.is_empty() || pool_ref.contains(['/', '\\']) || pool_ref.contains("..") {
            tracing::warn!(pool_ref = %pool_ref, "Ignoring invalid pool reference");
            continue;
        }

        let path = pool_dir.join(format!("{pool_ref}.txt"));
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Pool file unavailable");
                continue;
            }
        };

        for line in parse_pool_lines(&content) {
            if seen.insert(line.to_lowercase()) {
                entries.push(line);
            }
        }
    }

    entries
}

/// Suggestions in a pool file: blank lines and `#` comments skipped,
/// chart-position annotations removed
pub fn parse_pool_lines(content: &str) -> Vec<String> {
    static ANNOTATION_RE: OnceLock<Regex> = OnceLock::new();
    let annotation_re = ANNOTATION_RE.get_or_init(|| {
        Regex::new(r"(?i)\s*\(currently at #\d+[^)]*\)\s*$").expect("Invalid regex pattern")
    });

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| annotation_re.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
