//! Test fixtures for integration tests
//!
//! Provides a throwaway station on disk and scripted collaborators

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use onair::collaborators::{
    ChartsRefresher, CollaboratorError, Collaborators, ContentRequest, ContentResponse,
    ContentSource, ListenerProbe, SpeechSynthesizer,
};
use onair::config::Config;
use onair::history::HistoryTracker;
use onair::orchestrator::setup::{snapshot_sources, state_files};
use onair::orchestrator::{Orchestrator, OrchestratorSettings};
use onair::queue::{FileSignal, LowWatermark, QueueManager};
use onair::snapshot::SnapshotLoader;
use onair::storage::JsonFile;
use onair::utils::retry::RetryConfig;

/// Library playlist used by most tests
pub const LIBRARY: &str = "\
# test library
/music/Daft Punk - Around the World.mp3
/music/Daft Punk - One More Time.mp3
/music/Massive Attack - Teardrop.mp3
/music/Portishead - Glory Box.mp3
/music/Nina Simone - Feeling Good.mp3
/music/Miles Davis - So What.mp3
/music/Radiohead - Karma Police.mp3
/music/Bonobo - Kerala.mp3
/music/Falco - Rock Me Amadeus.mp3
";

/// Morning until noon, then a one-hour jazz show
pub const SCHEDULE: &str = r#"{
    "defaults": {"name": "Freeform", "signation": "/jingles/default.mp3"},
    "shows": [
        {"id": "morning", "name": "Morning Drive", "start": "06:00", "end": "12:00",
         "music_style": "upbeat electronic", "pools": ["morning"],
         "signation": "/jingles/morning.mp3"},
        {"id": "jazz", "name": "Jazz Hour", "start": "12:00", "end": "13:00",
         "music_style": "jazz and soul", "pools": ["jazz"],
         "signation": "/jingles/jazz.mp3", "news_enabled": true}
    ]
}"#;

pub const ALIASES: &str = r#"{
    "Falco - Amadeus": "Falco - Rock Me Amadeus.mp3",
    "DP - Around The World": "/music/Daft Punk - Around the World.mp3"
}"#;

pub const MORNING_POOL: &str = "\
Daft Punk - One More Time
Massive Attack - Teardrop (currently at #3)
";

pub const JAZZ_POOL: &str = "\
Miles Davis - So What
Nina Simone - Feeling Good
";

pub const DEFAULT_POOL: &str = "\
Bonobo - Kerala
Radiohead - Karma Police
";

/// Local time on a fixed weekday
pub fn at(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 3, 2, hour, minute, second)
        .unwrap()
}

// ============================================================================
// Station
// ============================================================================

/// A station laid out in a temporary directory
pub struct Station {
    pub dir: TempDir,
    pub config: Config,
}

impl Station {
    pub fn new() -> Self {
        Self::with_library(LIBRARY)
    }

    pub fn with_library(library: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        let mut config = Config::default();
        config.paths.library = root.join("playlist.txt");
        config.paths.queue = root.join("queue.txt");
        config.paths.signal = root.join("queue_low.signal");
        config.paths.schedule = root.join("schedule.json");
        config.paths.aliases = root.join("aliases.json");
        config.paths.pool_dir = root.join("pools");
        config.paths.history = root.join("history.json");
        config.paths.pool_state = root.join("pool_state.json");
        config.paths.wishlist = root.join("wishlist.jsonl");
        config.paths.listener_request = root.join("listener_request.txt");
        config.paths.announcements = root.join("announcements");

        std::fs::write(&config.paths.library, library).unwrap();
        std::fs::write(&config.paths.schedule, SCHEDULE).unwrap();
        std::fs::write(&config.paths.aliases, ALIASES).unwrap();
        std::fs::create_dir_all(&config.paths.pool_dir).unwrap();
        std::fs::write(config.paths.pool_dir.join("morning.txt"), MORNING_POOL).unwrap();
        std::fs::write(config.paths.pool_dir.join("jazz.txt"), JAZZ_POOL).unwrap();
        std::fs::write(config.paths.pool_dir.join("default.txt"), DEFAULT_POOL).unwrap();

        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Pretend the playback pipeline ran low
    pub fn raise_signal(&self) {
        FileSignal::new(&self.config.paths.signal).raise().unwrap();
    }

    pub fn signal_raised(&self) -> bool {
        FileSignal::new(&self.config.paths.signal).is_raised()
    }

    /// Lines currently in the queue file
    pub fn queue_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.config.paths.queue)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Persist a play history before the orchestrator is built
    pub fn seed_history(&self, tracks: &[&str]) {
        let mut history = HistoryTracker::new(self.config.orchestrator.history_capacity);
        for track in tracks {
            history.record(*track);
        }
        history
            .save(&JsonFile::new(&self.config.paths.history))
            .unwrap();
    }

    /// Leave a listener request the way the listener-facing server does
    pub fn leave_request(&self, text: &str) {
        std::fs::write(&self.config.paths.listener_request, text).unwrap();
    }

    pub fn orchestrator(&self, collaborators: Collaborators) -> Orchestrator {
        self.orchestrator_with(OrchestratorSettings::from(&self.config), collaborators)
    }

    pub fn orchestrator_with(
        &self,
        settings: OrchestratorSettings,
        collaborators: Collaborators,
    ) -> Orchestrator {
        let signal = Arc::new(FileSignal::new(&self.config.paths.signal));
        let queue = QueueManager::new(&self.config.paths.queue, signal)
            .with_retry(RetryConfig::with_delays(0, 1, 1));

        Orchestrator::new(
            settings,
            SnapshotLoader::new(snapshot_sources(&self.config)),
            queue,
            state_files(&self.config),
            collaborators,
        )
    }
}

// ============================================================================
// Scripted collaborators
// ============================================================================

/// Content source answering from a script, recording every request
#[derive(Default)]
pub struct ScriptedContent {
    answers: Mutex<VecDeque<Result<ContentResponse, CollaboratorError>>>,
    requests: Mutex<Vec<ContentRequest>>,
    delay: Option<Duration>,
}

impl ScriptedContent {
    pub fn new<I>(tracks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let answers = tracks
            .into_iter()
            .map(|track| Ok(ContentResponse::new(track)))
            .collect();
        Self {
            answers: Mutex::new(answers),
            ..Self::default()
        }
    }

    pub fn from_answers(answers: Vec<Result<ContentResponse, CollaboratorError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            ..Self::default()
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ContentRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentSource for ScriptedContent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn suggest(&self, request: &ContentRequest) -> Result<ContentResponse, CollaboratorError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CollaboratorError::failed("scripted", "script exhausted")))
    }
}

/// Speech that always renders to the same file, or always fails
pub struct ScriptedSpeech {
    output: Option<PathBuf>,
    texts: Mutex<Vec<String>>,
}

impl ScriptedSpeech {
    pub fn rendering_to(output: impl Into<PathBuf>) -> Self {
        Self {
            output: Some(output.into()),
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            output: None,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSpeech {
    async fn synthesize(&self, text: &str, _language: &str) -> Result<PathBuf, CollaboratorError> {
        self.texts.lock().unwrap().push(text.to_string());
        self.output
            .clone()
            .ok_or_else(|| CollaboratorError::failed("speech", "voice offline"))
    }
}

/// Listener probe with a fixed answer; `None` fails
pub struct FixedListeners(pub Option<u32>);

#[async_trait]
impl ListenerProbe for FixedListeners {
    async fn listener_count(&self) -> Result<u32, CollaboratorError> {
        self.0
            .ok_or_else(|| CollaboratorError::failed("listeners", "status page unreachable"))
    }
}

/// Charts job that only counts its runs
#[derive(Default)]
pub struct CountingCharts {
    runs: AtomicUsize,
}

impl CountingCharts {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChartsRefresher for CountingCharts {
    async fn refresh(&self) -> Result<(), CollaboratorError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
