//! Fallback cascade
//!
//! Candidates are produced by an escalating ladder of strategies and checked
//! against the resolver and the history ring. At most `max_attempts`
//! candidates are evaluated per cycle. A strategy that cannot apply (no
//! content source in power-save, no artist to search for, empty pools) is
//! skipped without spending an attempt; a collaborator failure spends one.
//! When the budget or the ladder runs out, the most recently played track is
//! forced back into the queue.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use crate::collaborators::{call_with_timeout, CollaboratorError, ContentRequest};
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{RequestSource, SuggestionSource, WishlistEntry};
use crate::pool::{PoolEntry, PullMode};
use crate::resolver::normalize::{normalize, normalized_artist, split_artist_title};
use crate::resolver::MatchTier;
use crate::schedule::{Show, DEFAULT_SHOW_ID};
use crate::snapshot::StationSnapshot;

use super::{CyclePhase, Orchestrator};

/// Escalation ladder, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Content source, or the show pool in power-save
    Primary,
    /// Ask the content source again, telling it the last pick failed
    ReRequest,
    /// Any library track by the failed suggestion's artist
    SameArtist,
    /// Show pool entry by another artist
    PoolAlternate,
    /// Ask the content source for a different artist
    DifferentArtist,
    /// Any pool entry, show pool then default pool
    AnyPool,
}

impl Strategy {
    pub const LADDER: [Strategy; 6] = [
        Self::Primary,
        Self::ReRequest,
        Self::SameArtist,
        Self::PoolAlternate,
        Self::DifferentArtist,
        Self::AnyPool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::ReRequest => "re_request",
            Self::SameArtist => "same_artist",
            Self::PoolAlternate => "pool_alternate",
            Self::DifferentArtist => "different_artist",
            Self::AnyPool => "any_pool",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate that made it into the queue
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub path: PathBuf,
    /// Resolver tier; `None` when the track came from an artist search
    pub tier: Option<MatchTier>,
}

/// Why an attempt did not produce a track
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    /// No tier matched the suggestion
    Unresolved,
    /// The match is inside the no-repeat window
    Repeat { path: PathBuf },
    /// The collaborator failed, timed out or answered nonsense
    Collaborator(CollaboratorError),
}

/// One spent attempt
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    /// 1-based
    pub number: u32,
    pub strategy: Strategy,
    pub suggestion: Option<String>,
    pub source: Option<SuggestionSource>,
    pub result: std::result::Result<Hit, AttemptFailure>,
}

/// What the cascade settled on
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Selection {
    Fresh {
        hit: Hit,
        source: SuggestionSource,
        announcement: Option<String>,
    },
    ForcedRepeat {
        path: PathBuf,
    },
}

/// Inputs fixed for the whole cascade
pub(crate) struct CascadeInput<'a> {
    pub snapshot: &'a StationSnapshot,
    /// Effective show
    pub show: &'a Show,
    pub power_save: bool,
    /// Base content request; `None` in power-save
    pub request: Option<&'a ContentRequest>,
    pub listener_request: bool,
}

/// Cascade result plus its attempt log
pub(crate) struct CascadeOutput {
    pub selection: Selection,
    pub attempts: Vec<AttemptRecord>,
}

enum Candidate {
    Suggestion {
        text: String,
        source: SuggestionSource,
        announcement: Option<String>,
    },
    Artist {
        artist: String,
    },
}

enum Sourcing {
    Skip(&'static str),
    Failed(CollaboratorError),
    Found(Candidate),
}

/// Mutable cascade bookkeeping
#[derive(Default)]
struct Progress {
    /// Most recent suggestion that failed to produce a track
    last_failed: Option<String>,
    /// Most recent failed suggestion made by the content source itself
    last_rejected: Option<String>,
    wished: HashSet<String>,
}

impl Progress {
    fn failed_artist(&self) -> Option<String> {
        self.last_failed.as_deref().and_then(normalized_artist)
    }
}

impl Orchestrator {
    pub(crate) async fn cascade(
        &mut self,
        input: &CascadeInput<'_>,
        phases: &mut Vec<CyclePhase>,
    ) -> Result<CascadeOutput> {
        let mode = if input.power_save {
            PullMode::Rotate
        } else {
            PullMode::Discard
        };
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut progress = Progress::default();

        for strategy in Strategy::LADDER {
            if attempts.len() as u32 >= self.settings.max_attempts {
                break;
            }

            let candidate = match self.source(strategy, input, mode, &progress).await {
                Sourcing::Skip(reason) => {
                    tracing::debug!(strategy = %strategy, reason, "Strategy skipped");
                    continue;
                }
                Sourcing::Failed(error) => {
                    let number = attempts.len() as u32 + 1;
                    phases.push(CyclePhase::ResolveAttempt(number));
                    tracing::warn!(attempt = number, strategy = %strategy, error = %error, "Attempt failed");
                    attempts.push(AttemptRecord {
                        number,
                        strategy,
                        suggestion: None,
                        source: Some(SuggestionSource::ContentSource),
                        result: Err(AttemptFailure::Collaborator(error)),
                    });
                    continue;
                }
                Sourcing::Found(candidate) => candidate,
            };

            let number = attempts.len() as u32 + 1;
            phases.push(CyclePhase::ResolveAttempt(number));

            let (suggestion, source, announcement, result) = match candidate {
                Candidate::Suggestion {
                    text,
                    source,
                    announcement,
                } => {
                    let result = self.evaluate_suggestion(&text, input.snapshot);
                    (Some(text), Some(source), announcement, result)
                }
                Candidate::Artist { artist } => {
                    let result = self.evaluate_artist(&artist, input.snapshot);
                    (Some(artist), Some(SuggestionSource::Library), None, result)
                }
            };

            match &result {
                Ok(hit) => {
                    tracing::info!(
                        attempt = number,
                        strategy = %strategy,
                        suggestion = suggestion.as_deref().unwrap_or_default(),
                        tier = hit.tier.map_or("artist", |t| t.as_str()),
                        path = %hit.path.display(),
                        "Attempt resolved"
                    );
                    if let Some(tier) = hit.tier {
                        metrics::record_resolution(tier.as_str());
                    }
                }
                Err(failure) => {
                    tracing::info!(
                        attempt = number,
                        strategy = %strategy,
                        suggestion = suggestion.as_deref().unwrap_or_default(),
                        failure = ?failure,
                        "Attempt failed"
                    );
                    if strategy != Strategy::SameArtist {
                        progress.last_failed = suggestion.clone();
                    }
                    if source == Some(SuggestionSource::ContentSource) {
                        progress.last_rejected = suggestion.clone();
                    }
                    if matches!(failure, AttemptFailure::Unresolved) {
                        if let (Some(text), Some(source)) = (&suggestion, &source) {
                            let requester = if strategy == Strategy::Primary && input.listener_request {
                                RequestSource::Listener
                            } else {
                                RequestSource::Dj
                            };
                            if *source != SuggestionSource::Library {
                                self.wish(text, requester, &mut progress);
                            }
                        }
                    }
                }
            }

            let hit = result.clone().ok();
            attempts.push(AttemptRecord {
                number,
                strategy,
                suggestion,
                source: source.clone(),
                result,
            });

            if let (Some(hit), Some(source)) = (hit, source) {
                phases.push(CyclePhase::Success);
                return Ok(CascadeOutput {
                    selection: Selection::Fresh {
                        hit,
                        source,
                        announcement,
                    },
                    attempts,
                });
            }
        }

        let path = self.forced_repeat(input.snapshot)?;
        phases.push(CyclePhase::ForcedRepeat);
        tracing::warn!(
            attempts = attempts.len(),
            path = %path.display(),
            "Cascade exhausted, forcing a repeat"
        );
        Ok(CascadeOutput {
            selection: Selection::ForcedRepeat { path },
            attempts,
        })
    }

    /// Produce the candidate for a strategy
    async fn source(
        &mut self,
        strategy: Strategy,
        input: &CascadeInput<'_>,
        mode: PullMode,
        progress: &Progress,
    ) -> Sourcing {
        let show_id = input.show.id.as_str();

        match strategy {
            Strategy::Primary => match input.request {
                Some(request) => self.ask(request).await,
                None => match self.pools.next(show_id, mode) {
                    Some(entry) => pool_candidate(entry),
                    None => Sourcing::Skip("show pool is empty"),
                },
            },
            Strategy::ReRequest => {
                let Some(request) = input.request else {
                    return Sourcing::Skip("content source unavailable in power-save");
                };
                let instructions = match &progress.last_failed {
                    Some(failed) => format!(
                        "\"{failed}\" is not available or was played recently. Suggest a different track."
                    ),
                    None => "The previous request failed. Suggest a track.".to_string(),
                };
                self.ask(&request.with_instructions(instructions)).await
            }
            Strategy::SameArtist => match progress.failed_artist() {
                Some(artist) if !artist.is_empty() => Sourcing::Found(Candidate::Artist { artist }),
                _ => Sourcing::Skip("no artist to search for"),
            },
            Strategy::PoolAlternate => {
                let failed_artist = progress.failed_artist();
                let entry = self.pools.next_matching(show_id, mode, |suggestion| {
                    match (&failed_artist, normalized_artist(suggestion)) {
                        (Some(failed), Some(artist)) => *failed != artist,
                        _ => true,
                    }
                });
                match entry {
                    Some(entry) => pool_candidate(entry),
                    None => Sourcing::Skip("no alternate pool entry"),
                }
            }
            Strategy::DifferentArtist => {
                let Some(request) = input.request else {
                    return Sourcing::Skip("content source unavailable in power-save");
                };
                let instructions = match progress
                    .last_rejected
                    .as_deref()
                    .and_then(split_artist_title)
                {
                    Some((artist, _)) => {
                        format!("Suggest a track by a different artist than {artist}.")
                    }
                    None => "Suggest a track by a completely different artist.".to_string(),
                };
                self.ask(&request.with_instructions(instructions)).await
            }
            Strategy::AnyPool => {
                let entry = self.pools.next(show_id, mode).or_else(|| {
                    if show_id == DEFAULT_SHOW_ID {
                        None
                    } else {
                        self.pools.next(DEFAULT_SHOW_ID, mode)
                    }
                });
                match entry {
                    Some(entry) => pool_candidate(entry),
                    None => Sourcing::Skip("all pools are empty"),
                }
            }
        }
    }

    /// Ask the content source with its time limit
    async fn ask(&self, request: &ContentRequest) -> Sourcing {
        let content = &self.collaborators.content;
        let limit = self.collaborators.timeouts.content;

        match call_with_timeout(content.name(), limit, content.suggest(request)).await {
            Ok(response) => Sourcing::Found(Candidate::Suggestion {
                text: response.track.clone(),
                announcement: response.announcement_text().map(str::to_string),
                source: SuggestionSource::ContentSource,
            }),
            Err(e) => {
                metrics::record_collaborator_failure(e.name(), e.kind());
                Sourcing::Failed(e)
            }
        }
    }

    /// Resolve a suggestion and apply the no-repeat rule
    fn evaluate_suggestion(
        &self,
        suggestion: &str,
        snapshot: &StationSnapshot,
    ) -> std::result::Result<Hit, AttemptFailure> {
        let resolution = self
            .resolver
            .resolve(suggestion, &snapshot.library, &snapshot.aliases)
            .ok_or(AttemptFailure::Unresolved)?;

        if self.history.contains(&resolution.track_id()) {
            return Err(AttemptFailure::Repeat {
                path: resolution.path,
            });
        }
        Ok(Hit {
            path: resolution.path,
            tier: Some(resolution.tier),
        })
    }

    /// First track by `artist` outside the no-repeat window
    fn evaluate_artist(
        &self,
        artist: &str,
        snapshot: &StationSnapshot,
    ) -> std::result::Result<Hit, AttemptFailure> {
        let entries = snapshot.library.by_artist(artist);
        let Some(first) = entries.first() else {
            return Err(AttemptFailure::Unresolved);
        };

        match entries
            .iter()
            .find(|entry| !self.history.contains(&entry.track_id()))
        {
            Some(entry) => Ok(Hit {
                path: entry.path.clone(),
                tier: None,
            }),
            None => Err(AttemptFailure::Repeat {
                path: first.path.clone(),
            }),
        }
    }

    /// Track to replay when nothing fresh could be found
    fn forced_repeat(&self, snapshot: &StationSnapshot) -> Result<PathBuf> {
        if let Some(last) = self.history.last() {
            return Ok(PathBuf::from(&last.track_id));
        }
        snapshot
            .library
            .first()
            .map(|entry| entry.path.clone())
            .ok_or(Error::EmptyLibrary)
    }

    /// Log an unresolvable suggestion once per cycle
    fn wish(&self, text: &str, source: RequestSource, progress: &mut Progress) {
        if !progress.wished.insert(normalize(text)) {
            return;
        }
        let entry = WishlistEntry::new(text.trim(), source);
        match self.files.wishlist.append(&entry) {
            Ok(()) => {
                metrics::record_wishlist_entry();
                tracing::info!(requested = %entry.requested_text, source = %source, "Added to wishlist");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to write wishlist entry"),
        }
    }
}

fn pool_candidate(entry: PoolEntry) -> Sourcing {
    Sourcing::Found(Candidate::Suggestion {
        text: entry.track_suggestion,
        source: SuggestionSource::Pool {
            show: entry.show_ref,
        },
        announcement: None,
    })
}
