//! Track Resolver
//!
//! Maps free-text suggestions ("Artist - Title", possibly decorated or
//! misspelled) to concrete library files. Tiers are tried strictly in order
//! and the first hit wins:
//!
//! 1. **Exact**: normalized suggestion equals a normalized library entry
//! 2. **Alias**: suggestion is listed in the alias table and its target exists
//! 3. **Fuzzy**: decoration-stripped similarity above a threshold, gated by
//!    length ratio; ties go to the shortest library path
//!
//! The resolver never falls back to other suggestions; that sequencing
//! belongs to the orchestrator's cascade.

pub mod alias;
pub mod normalize;
pub mod similarity;

pub use alias::AliasTable;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use crate::library::{Library, LibraryEntry};
use normalize::{normalize, strip_decorations};
use similarity::{length_ratio, similarity};

/// Default minimum similarity for the fuzzy tier
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

/// Default minimum shorter/longer length ratio for the fuzzy tier
pub const DEFAULT_MIN_LENGTH_RATIO: f64 = 0.6;

/// Which tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Exact,
    Alias,
    Fuzzy,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Alias => "alias",
            Self::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub path: PathBuf,
    pub tier: MatchTier,
    /// 1.0 for exact and alias hits, the similarity for fuzzy hits
    pub score: f64,
}

impl Resolution {
    fn from_entry(entry: &LibraryEntry, tier: MatchTier, score: f64) -> Self {
        Self {
            path: entry.path.clone(),
            tier,
            score,
        }
    }

    /// Path as stored in history and written to the queue
    pub fn track_id(&self) -> String {
        self.path.display().to_string()
    }
}

/// Tunables for the fuzzy tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum similarity in `(0, 1]`
    pub fuzzy_threshold: f64,

    /// Minimum shorter/longer length ratio in `(0, 1]`
    pub min_length_ratio: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            min_length_ratio: DEFAULT_MIN_LENGTH_RATIO,
        }
    }
}

/// Tiered suggestion-to-file resolver
#[derive(Debug, Clone, Default)]
pub struct TrackResolver {
    config: ResolverConfig,
}

impl TrackResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a suggestion against the library; `None` means NotFound
    pub fn resolve(
        &self,
        suggestion: &str,
        library: &Library,
        aliases: &AliasTable,
    ) -> Option<Resolution> {
        let normalized = normalize(suggestion);
        if normalized.is_empty() {
            return None;
        }

        if let Some(entry) = library.find_exact(&normalized) {
            tracing::debug!(suggestion, path = %entry.path.display(), "Exact match");
            return Some(Resolution::from_entry(entry, MatchTier::Exact, 1.0));
        }

        if let Some(target) = aliases.lookup(suggestion) {
            match library.find_target(target) {
                Some(entry) => {
                    tracing::debug!(suggestion, target, path = %entry.path.display(), "Alias match");
                    return Some(Resolution::from_entry(entry, MatchTier::Alias, 1.0));
                }
                None => {
                    tracing::warn!(suggestion, target, "Alias target is not in the library");
                }
            }
        }

        let resolution = self.fuzzy(suggestion, library);
        match &resolution {
            Some(r) => tracing::debug!(
                suggestion,
                path = %r.path.display(),
                score = r.score,
                "Fuzzy match"
            ),
            None => tracing::debug!(suggestion, "No match in any tier"),
        }
        resolution
    }

    fn fuzzy(&self, suggestion: &str, library: &Library) -> Option<Resolution> {
        let stripped = strip_decorations(suggestion);
        if stripped.is_empty() {
            return None;
        }

        let mut best: Option<(&LibraryEntry, f64)> = None;
        for entry in library.entries() {
            if entry.stripped.is_empty() {
                continue;
            }
            if length_ratio(&stripped, &entry.stripped) < self.config.min_length_ratio {
                continue;
            }

            let score = similarity(&stripped, &entry.stripped);
            if score < self.config.fuzzy_threshold {
                continue;
            }

            let better = match best {
                None => true,
                Some((current, current_score)) => {
                    compare_candidates(entry, score, current, current_score) == Ordering::Less
                }
            };
            if better {
                best = Some((entry, score));
            }
        }

        best.map(|(entry, score)| Resolution::from_entry(entry, MatchTier::Fuzzy, score))
    }
}

/// Higher score first, then shorter path, then lexicographic path
fn compare_candidates(a: &LibraryEntry, a_score: f64, b: &LibraryEntry, b_score: f64) -> Ordering {
    b_score
        .partial_cmp(&a_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.path.as_os_str().len().cmp(&b.path.as_os_str().len()))
        .then_with(|| a.path.cmp(&b.path))
}
