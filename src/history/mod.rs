//! History Tracker
//!
//! A fixed-capacity ring of recently played tracks. The orchestrator consults
//! it to reject repeats and persists it between cycles so restarts keep the
//! no-repeat window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::storage::{JsonFile, StorageError};

/// Default ring capacity
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// A played track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Library path of the track
    pub track_id: String,
    pub played_at: DateTime<Utc>,
}

/// Ring buffer of the last N played tracks, oldest at the front
#[derive(Debug, Clone)]
pub struct HistoryTracker {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryTracker {
    /// Create an empty tracker
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Build a tracker from stored entries, keeping only the newest `capacity`
    pub fn from_entries(entries: Vec<HistoryEntry>, capacity: usize) -> Self {
        let mut tracker = Self::new(capacity);
        for entry in entries {
            tracker.push(entry);
        }
        tracker
    }

    /// Load from the state store, starting empty if nothing was saved
    pub fn load(store: &JsonFile, capacity: usize) -> Result<Self, StorageError> {
        let entries: Vec<HistoryEntry> = store.load()?.unwrap_or_default();
        let tracker = Self::from_entries(entries, capacity);
        tracing::debug!(
            entries = tracker.len(),
            capacity = capacity,
            "History loaded"
        );
        Ok(tracker)
    }

    /// Persist the ring, oldest first
    pub fn save(&self, store: &JsonFile) -> Result<(), StorageError> {
        let entries: Vec<&HistoryEntry> = self.entries.iter().collect();
        store.save(&entries)
    }

    /// True when the track is inside the no-repeat window
    pub fn contains(&self, track_id: &str) -> bool {
        self.entries.iter().any(|e| e.track_id == track_id)
    }

    /// Record a play now
    pub fn record(&mut self, track_id: impl Into<String>) {
        self.record_at(track_id, Utc::now());
    }

    /// Record a play at a given time
    ///
    /// A track already in the ring moves to the newest position, so the ring
    /// always holds distinct tracks.
    pub fn record_at(&mut self, track_id: impl Into<String>, played_at: DateTime<Utc>) {
        self.push(HistoryEntry {
            track_id: track_id.into(),
            played_at,
        });
    }

    fn push(&mut self, entry: HistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        self.entries.retain(|e| e.track_id != entry.track_id);
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Most recently played track
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Up to `n` most recent tracks, newest first
    pub fn recent(&self, n: usize) -> Vec<&str> {
        self.entries
            .iter()
            .rev()
            .take(n)
            .map(|e| e.track_id.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
