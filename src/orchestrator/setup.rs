//! Wiring an orchestrator from configuration

use std::sync::Arc;
use std::time::Duration;

use crate::collaborators::{
    AnnouncementSlots, Collaborators, CommandCollaborator, CommandSynthesizer, FallbackSynthesizer,
    FileRequestInbox, IcecastProbe, SpeechSynthesizer,
};
use crate::config::Config;
use crate::error::Result;
use crate::llm::LlmClient;
use crate::queue::{FileSignal, QueueManager};
use crate::snapshot::{SnapshotLoader, SnapshotSources};
use crate::storage::{JsonFile, Wishlist};

use super::{Orchestrator, OrchestratorSettings, StateFiles};

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_attempts: config.orchestrator.max_attempts,
            history_capacity: config.orchestrator.history_capacity,
            lookahead_secs: config.orchestrator.transition_lookahead_secs,
            blocklist_size: config.orchestrator.blocklist_size,
            language: config.station.language.clone(),
            resolver: config.resolver,
        }
    }
}

/// State file locations from the configured paths
pub fn state_files(config: &Config) -> StateFiles {
    StateFiles {
        history: JsonFile::new(&config.paths.history),
        pools: JsonFile::new(&config.paths.pool_state),
        wishlist: Wishlist::new(&config.paths.wishlist),
        pool_dir: config.paths.pool_dir.clone(),
    }
}

/// Snapshot sources from the configured paths
pub fn snapshot_sources(config: &Config) -> SnapshotSources {
    SnapshotSources {
        schedule: config.paths.schedule.clone(),
        aliases: config.paths.aliases.clone(),
        library: config.paths.library.clone(),
    }
}

/// Queue writer bound to the signal marker file
pub fn queue_manager(config: &Config) -> QueueManager {
    let signal = Arc::new(FileSignal::new(&config.paths.signal));
    QueueManager::new(&config.paths.queue, signal)
}

/// Speech chain: primary voice with an optional fallback voice
///
/// Returns `None` when no primary voice command is configured.
pub fn speech_chain(config: &Config) -> Option<Arc<dyn SpeechSynthesizer>> {
    let primary = config.tts.primary.clone()?;
    let per_voice = Duration::from_secs(config.tts.timeout_secs);
    let slots = Arc::new(AnnouncementSlots::new(
        &config.paths.announcements,
        config.tts.slots,
        Duration::from_secs(config.tts.slot_min_age_secs),
    ));

    let primary: Arc<dyn SpeechSynthesizer> = Arc::new(CommandSynthesizer::new(
        "tts",
        primary,
        Arc::clone(&slots),
        per_voice,
    ));
    let fallback = config.tts.fallback.clone().map(|spec| {
        Arc::new(CommandSynthesizer::new("tts-fallback", spec, slots, per_voice))
            as Arc<dyn SpeechSynthesizer>
    });

    Some(Arc::new(FallbackSynthesizer::new(primary, fallback, per_voice)))
}

/// Every collaborator the configuration enables
pub fn build_collaborators(config: &Config) -> Result<Collaborators> {
    let timeouts = config.collaborator_timeouts();
    let llm = LlmClient::new(config.llm.clone(), config.station.clone())?;

    let mut collaborators = Collaborators::new(Arc::new(llm))
        .with_inbox(Arc::new(FileRequestInbox::new(&config.paths.listener_request)))
        .with_timeouts(timeouts);

    if let Some(speech) = speech_chain(config) {
        collaborators = collaborators.with_speech(speech);
    }
    if let Some(spec) = config.collaborators.news.clone() {
        collaborators = collaborators.with_news(Arc::new(CommandCollaborator::new(
            "news",
            spec,
            timeouts.context,
        )));
    }
    if let Some(spec) = config.collaborators.weather.clone() {
        collaborators = collaborators.with_weather(Arc::new(CommandCollaborator::new(
            "weather",
            spec,
            timeouts.context,
        )));
    }
    if let Some(spec) = config.collaborators.charts.clone() {
        collaborators = collaborators.with_charts(Arc::new(CommandCollaborator::new(
            "charts",
            spec,
            timeouts.charts,
        )));
    }
    if let Some(url) = &config.collaborators.listener_status_url {
        collaborators = collaborators.with_listeners(Arc::new(IcecastProbe::new(
            url.clone(),
            timeouts.probe,
        )?));
    }

    tracing::debug!(
        speech = collaborators.speech.is_some(),
        news = collaborators.news.is_some(),
        weather = collaborators.weather.is_some(),
        charts = collaborators.charts.is_some(),
        listeners = collaborators.listeners.is_some(),
        "Collaborators wired"
    );

    Ok(collaborators)
}

/// Build a ready-to-run orchestrator
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let collaborators = build_collaborators(config)?;
    Ok(Orchestrator::new(
        OrchestratorSettings::from(config),
        SnapshotLoader::new(snapshot_sources(config)),
        queue_manager(config),
        state_files(config),
        collaborators,
    ))
}
