//! External collaborator contracts
//!
//! The orchestrator talks to every I/O-bound leaf service through a narrow
//! async trait so the cascade can be driven by scripted fakes in tests:
//!
//! - [`ContentSource`] - suggests the next track (LLM)
//! - [`SpeechSynthesizer`] - renders announcement text to audio
//! - [`ContextProvider`] - news or weather text for the content request
//! - [`ChartsRefresher`] - daily charts/pool refresh side job
//! - [`ListenerProbe`] - current listener count
//! - [`RequestInbox`] - pending listener request
//!
//! Every call returns an explicit `Result`; a call that outlives its limit
//! is dropped by [`call_with_timeout`] and any late result is discarded.

pub mod command;
pub mod content;
pub mod context;
pub mod listeners;
pub mod speech;

pub use command::{run_command, CommandSpec};
pub use content::{ContentRequest, ContentResponse, ShowContext};
pub use context::CommandCollaborator;
pub use listeners::{FileRequestInbox, IcecastProbe};
pub use speech::{AnnouncementSlots, CommandSynthesizer, FallbackSynthesizer};

use async_trait::async_trait;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::ListenerRequest;

/// Collaborator failures; all of them are recovered by the cascade
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// No answer within the limit
    #[error("{name} timed out after {seconds}s")]
    Timeout { name: String, seconds: u64 },

    /// The call failed outright (transport, exit status, error marker)
    #[error("{name} failed: {reason}")]
    Failed { name: String, reason: String },

    /// An answer arrived but could not be used
    #[error("{name} returned a malformed response: {reason}")]
    Malformed { name: String, reason: String },
}

impl CollaboratorError {
    /// Create a timeout error
    pub fn timeout(name: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            name: name.into(),
            seconds,
        }
    }

    /// Create a failure error
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-response error
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Collaborator that produced the error
    pub fn name(&self) -> &str {
        match self {
            Self::Timeout { name, .. } | Self::Failed { name, .. } | Self::Malformed { name, .. } => {
                name
            }
        }
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Failed { .. } => "failed",
            Self::Malformed { .. } => "malformed",
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Failed { .. } => true,
            Self::Malformed { .. } => true,
        }
    }
}

/// Run a collaborator call with a hard limit
pub async fn call_with_timeout<T, F>(
    name: &str,
    limit: Duration,
    call: F,
) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                collaborator = name,
                limit_secs = limit.as_secs_f64(),
                "Collaborator call abandoned"
            );
            Err(CollaboratorError::timeout(name, limit.as_secs()))
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Source of track suggestions
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &str {
        "content"
    }

    async fn suggest(&self, request: &ContentRequest) -> Result<ContentResponse, CollaboratorError>;
}

/// Text-to-speech renderer
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str {
        "speech"
    }

    /// Render `text` and return the path of the audio segment
    async fn synthesize(&self, text: &str, language: &str) -> Result<PathBuf, CollaboratorError>;
}

/// Supplier of context text (news, weather)
#[async_trait]
pub trait ContextProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<String, CollaboratorError>;
}

/// Daily charts refresh job
#[async_trait]
pub trait ChartsRefresher: Send + Sync {
    async fn refresh(&self) -> Result<(), CollaboratorError>;
}

/// Streaming server listener counter
#[async_trait]
pub trait ListenerProbe: Send + Sync {
    async fn listener_count(&self) -> Result<u32, CollaboratorError>;
}

/// Pending listener request, consumed on read
#[async_trait]
pub trait RequestInbox: Send + Sync {
    async fn take(&self) -> Result<Option<ListenerRequest>, CollaboratorError>;
}

/// Per-collaborator time limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollaboratorTimeouts {
    pub content: Duration,
    /// Whole speech chain, fallback voice included
    pub speech: Duration,
    pub context: Duration,
    pub probe: Duration,
    pub charts: Duration,
}

impl Default for CollaboratorTimeouts {
    fn default() -> Self {
        Self {
            content: Duration::from_secs(30),
            speech: Duration::from_secs(240),
            context: Duration::from_secs(20),
            probe: Duration::from_secs(3),
            charts: Duration::from_secs(300),
        }
    }
}

/// The set of collaborators wired into an orchestrator
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentSource>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    pub news: Option<Arc<dyn ContextProvider>>,
    pub weather: Option<Arc<dyn ContextProvider>>,
    pub charts: Option<Arc<dyn ChartsRefresher>>,
    pub listeners: Option<Arc<dyn ListenerProbe>>,
    pub inbox: Option<Arc<dyn RequestInbox>>,
    pub timeouts: CollaboratorTimeouts,
}

impl Collaborators {
    /// Only a content source; everything optional left out
    pub fn new(content: Arc<dyn ContentSource>) -> Self {
        Self {
            content,
            speech: None,
            news: None,
            weather: None,
            charts: None,
            listeners: None,
            inbox: None,
            timeouts: CollaboratorTimeouts::default(),
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_news(mut self, news: Arc<dyn ContextProvider>) -> Self {
        self.news = Some(news);
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn ContextProvider>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_charts(mut self, charts: Arc<dyn ChartsRefresher>) -> Self {
        self.charts = Some(charts);
        self
    }

    pub fn with_listeners(mut self, probe: Arc<dyn ListenerProbe>) -> Self {
        self.listeners = Some(probe);
        self
    }

    pub fn with_inbox(mut self, inbox: Arc<dyn RequestInbox>) -> Self {
        self.inbox = Some(inbox);
        self
    }

    pub fn with_timeouts(mut self, timeouts: CollaboratorTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}
