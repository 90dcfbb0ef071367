//! Configuration management for the onair orchestrator
//!
//! This module handles loading and validating configuration from a TOML
//! file and `ONAIR_*` environment variables. Every section has defaults so a
//! partial file is enough.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::collaborators::{CollaboratorTimeouts, CommandSpec};
use crate::error::{Error, Result};
use crate::llm::LlmConfig;
use crate::resolver::ResolverConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Station identity used in announcements
    pub station: StationConfig,

    /// Files shared with the playback pipeline and state files
    pub paths: PathsConfig,

    /// Loop and cascade tunables
    pub orchestrator: OrchestratorConfig,

    /// Fuzzy matching tunables
    pub resolver: ResolverConfig,

    /// Content source
    pub llm: LlmConfig,

    /// Speech synthesis
    pub tts: TtsConfig,

    /// News, weather, charts and listener probe
    pub collaborators: CollaboratorsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Prometheus endpoint
    pub metrics: MetricsConfig,
}

/// Station identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub name: String,
    pub dj_name: String,
    /// Language hint for announcements and speech synthesis
    pub language: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            name: String::from("OnAir Radio"),
            dj_name: String::from("Alex"),
            language: String::from("en"),
        }
    }
}

/// File locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Playlist file, one absolute audio path per line
    pub library: PathBuf,
    /// Queue file consumed by the playback pipeline
    pub queue: PathBuf,
    /// Low-queue signal marker file
    pub signal: PathBuf,
    /// Show schedule (JSON)
    pub schedule: PathBuf,
    /// Alias table (JSON)
    pub aliases: PathBuf,
    /// Directory of `<pool_ref>.txt` files
    pub pool_dir: PathBuf,
    pub history: PathBuf,
    pub pool_state: PathBuf,
    pub wishlist: PathBuf,
    /// Inbox written by the listener-facing server
    pub listener_request: PathBuf,
    /// Directory for announcement slot files
    pub announcements: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            library: PathBuf::from("data/playlist.txt"),
            queue: PathBuf::from("data/queue.txt"),
            signal: PathBuf::from("data/queue_low.signal"),
            schedule: PathBuf::from("data/schedule.json"),
            aliases: PathBuf::from("data/aliases.json"),
            pool_dir: PathBuf::from("data/pools"),
            history: PathBuf::from("data/history.json"),
            pool_state: PathBuf::from("data/pool_state.json"),
            wishlist: PathBuf::from("data/wishlist.jsonl"),
            listener_request: PathBuf::from("data/listener_request.txt"),
            announcements: PathBuf::from("data/announcements"),
        }
    }
}

impl PathsConfig {
    /// Anchor every relative path at `base`; absolute paths are kept
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.library,
            &mut self.queue,
            &mut self.signal,
            &mut self.schedule,
            &mut self.aliases,
            &mut self.pool_dir,
            &mut self.history,
            &mut self.pool_state,
            &mut self.wishlist,
            &mut self.listener_request,
            &mut self.announcements,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Orchestration loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Seconds between signal polls
    pub poll_interval_secs: u64,

    /// Resolution attempts per cycle before a forced repeat (1..=5)
    pub max_attempts: u32,

    /// No-repeat window
    pub history_capacity: usize,

    /// Seconds before a show change at which the handover is prepared
    pub transition_lookahead_secs: u32,

    /// Recently played tracks sent to the content source as a blocklist
    pub blocklist_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            max_attempts: 5,
            history_capacity: 50,
            transition_lookahead_secs: 240,
            blocklist_size: 5,
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Primary voice command; no command means no announcements
    pub primary: Option<CommandSpec>,

    /// Local fallback voice command
    pub fallback: Option<CommandSpec>,

    /// Upper bound per voice
    pub timeout_secs: u64,

    /// Number of rotating announcement files
    pub slots: usize,

    /// A slot is reused only once its audio is this old
    pub slot_min_age_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            primary: None,
            fallback: None,
            timeout_secs: 120,
            slots: 10,
            slot_min_age_secs: 1800,
        }
    }
}

/// Side collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorsConfig {
    pub news: Option<CommandSpec>,
    pub weather: Option<CommandSpec>,
    pub charts: Option<CommandSpec>,

    /// Icecast `status-json.xsl` URL
    pub listener_status_url: Option<String>,

    /// Limit for news and weather commands
    pub timeout_secs: u64,

    pub probe_timeout_secs: u64,

    pub charts_timeout_secs: u64,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            news: None,
            weather: None,
            charts: None,
            listener_status_url: None,
            timeout_secs: 20,
            probe_timeout_secs: 3,
            charts_timeout_secs: 300,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Address for `/metrics`, e.g. "127.0.0.1:9464"; unset disables it
    pub listen: Option<String>,
}

impl Config {
    /// Load configuration from environment variables over the defaults
    ///
    /// Relative paths are anchored at the working directory.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.absolutize_paths()?;
        Ok(config)
    }

    /// Load configuration from a file
    ///
    /// Relative paths in the file are anchored at the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::with_source(format!("Failed to read config file: {}", path.display()), e)
        })?;

        let mut config: Self = toml::from_str(&content)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let base = std::path::absolute(dir).map_err(|e| {
            Error::with_source(format!("Cannot resolve config directory {}", dir.display()), e)
        })?;
        config.paths.resolve_relative_to(&base);
        Ok(config)
    }

    /// Anchor any remaining relative path at the working directory
    pub fn absolutize_paths(&mut self) -> Result<()> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::with_source("Cannot read the working directory", e))?;
        self.paths.resolve_relative_to(&cwd);
        Ok(())
    }

    /// Override fields from `ONAIR_*` and `OLLAMA_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.llm.apply_env();

        if let Ok(v) = std::env::var("ONAIR_STATION_NAME") {
            self.station.name = v;
        }
        if let Ok(v) = std::env::var("ONAIR_DJ_NAME") {
            self.station.dj_name = v;
        }
        if let Ok(v) = std::env::var("ONAIR_LANGUAGE") {
            self.station.language = v;
        }

        if let Ok(v) = std::env::var("ONAIR_LIBRARY") {
            self.paths.library = v.into();
        }
        if let Ok(v) = std::env::var("ONAIR_QUEUE_FILE") {
            self.paths.queue = v.into();
        }
        if let Ok(v) = std::env::var("ONAIR_SIGNAL_FILE") {
            self.paths.signal = v.into();
        }
        if let Ok(v) = std::env::var("ONAIR_SCHEDULE_FILE") {
            self.paths.schedule = v.into();
        }
        if let Ok(v) = std::env::var("ONAIR_POOL_DIR") {
            self.paths.pool_dir = v.into();
        }

        if let Some(v) = env_parse("ONAIR_POLL_INTERVAL")? {
            self.orchestrator.poll_interval_secs = v;
        }
        if let Some(v) = env_parse("ONAIR_MAX_ATTEMPTS")? {
            self.orchestrator.max_attempts = v;
        }
        if let Some(v) = env_parse("ONAIR_FUZZY_THRESHOLD")? {
            self.resolver.fuzzy_threshold = v;
        }

        if let Ok(v) = std::env::var("ONAIR_LISTENER_STATUS_URL") {
            self.collaborators.listener_status_url = Some(v);
        }
        if let Ok(v) = std::env::var("ONAIR_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("ONAIR_LOG_FORMAT") {
            self.logging.format = v;
        }
        if let Ok(v) = std::env::var("ONAIR_METRICS_LISTEN") {
            self.metrics.listen = Some(v);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.poll_interval_secs == 0 {
            return Err(Error::config("poll_interval_secs must be greater than 0"));
        }

        if !(1..=5).contains(&self.orchestrator.max_attempts) {
            return Err(Error::config("max_attempts must be between 1 and 5"));
        }

        if self.orchestrator.history_capacity == 0 {
            return Err(Error::config("history_capacity must be greater than 0"));
        }

        for (name, value) in [
            ("fuzzy_threshold", self.resolver.fuzzy_threshold),
            ("min_length_ratio", self.resolver.min_length_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::config(format!("{name} must be in (0, 1], got {value}")));
            }
        }

        if self.tts.slots == 0 {
            return Err(Error::config("tts.slots must be greater than 0"));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(Error::config(format!(
                "logging.format must be 'text' or 'json', got '{}'",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Get poll interval as Duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.orchestrator.poll_interval_secs)
    }

    /// Per-collaborator limits
    #[must_use]
    pub fn collaborator_timeouts(&self) -> CollaboratorTimeouts {
        let voices = 1 + u64::from(self.tts.fallback.is_some());
        CollaboratorTimeouts {
            content: Duration::from_secs(self.llm.timeout_secs),
            speech: Duration::from_secs(self.tts.timeout_secs * voices),
            context: Duration::from_secs(self.collaborators.timeout_secs),
            probe: Duration::from_secs(self.collaborators.probe_timeout_secs),
            charts: Duration::from_secs(self.collaborators.charts_timeout_secs),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::config(format!("{name} has an invalid value: '{raw}'"))),
        Err(_) => Ok(None),
    }
}
