// Core data structures shared by the orchestrator components

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of playable unit written to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Synthesized spoken segment
    Announcement,
    /// Show stinger played at a transition
    Signation,
    /// Music track from the library
    Track,
}

impl ItemKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Announcement => "announcement",
            Self::Signation => "signation",
            Self::Track => "track",
        }
    }
}

/// One entry in the playback queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub kind: ItemKind,
    pub path: PathBuf,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueItem {
    /// Create an item stamped with the current time
    pub fn new(kind: ItemKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            enqueued_at: Utc::now(),
        }
    }

    /// Shorthand for a track item
    pub fn track(path: impl Into<PathBuf>) -> Self {
        Self::new(ItemKind::Track, path)
    }

    /// Line written to the queue file
    pub fn queue_line(&self) -> String {
        self.path.display().to_string()
    }
}

/// Who asked for a track that could not be found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestSource {
    Dj,
    Listener,
}

impl fmt::Display for RequestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dj => write!(f, "dj"),
            Self::Listener => write!(f, "listener"),
        }
    }
}

/// Append-only record of an unresolvable suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub requested_text: String,
    pub requested_at: DateTime<Utc>,
    pub source: RequestSource,
}

impl WishlistEntry {
    pub fn new(requested_text: impl Into<String>, source: RequestSource) -> Self {
        Self {
            requested_text: requested_text.into(),
            requested_at: Utc::now(),
            source,
        }
    }
}

/// A pending request left by the listener-facing server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerRequest {
    pub text: String,
    pub received_at: DateTime<Local>,
}

/// Where a candidate suggestion came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuggestionSource {
    /// The content-generation collaborator
    ContentSource,
    /// A show pool
    Pool { show: String },
    /// A direct library search
    Library,
}

impl fmt::Display for SuggestionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentSource => write!(f, "content_source"),
            Self::Pool { show } => write!(f, "pool:{show}"),
            Self::Library => write!(f, "library"),
        }
    }
}
