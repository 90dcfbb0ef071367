//! End-to-end cycle tests
//!
//! Each test lays out a station on disk, wires scripted collaborators and
//! drives the orchestrator through `poll_once`/`run_cycle_at`, then checks
//! the queue file, history, pools and wishlist.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone};

use onair::collaborators::{Collaborators, ContentResponse};
use onair::models::{ItemKind, RequestSource, SuggestionSource};
use onair::orchestrator::{AttemptFailure, CycleOutcome, CyclePhase, Strategy};
use onair::resolver::MatchTier;
use onair::storage::Wishlist;

use super::fixtures::{at, CountingCharts, FixedListeners, ScriptedContent, ScriptedSpeech, Station};

// ============================================================================
// Resolution Tiers
// ============================================================================

#[tokio::test]
async fn test_alias_resolves_without_exact_match() {
    let station = Station::new();
    station.raise_signal();
    let content = Arc::new(ScriptedContent::new(["Falco - Amadeus"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content.clone()));

    let report = orchestrator.poll_once(at(9, 0, 0)).await.unwrap().unwrap();

    assert_eq!(
        report.outcome,
        CycleOutcome::Success {
            path: PathBuf::from("/music/Falco - Rock Me Amadeus.mp3"),
            tier: Some(MatchTier::Alias),
        }
    );
    assert_eq!(report.attempt_count(), 1);
    assert_eq!(station.queue_lines(), vec!["/music/Falco - Rock Me Amadeus.mp3"]);
    assert!(orchestrator
        .history()
        .contains("/music/Falco - Rock Me Amadeus.mp3"));
    assert!(!station.signal_raised());
}

#[tokio::test]
async fn test_exact_match_beats_fuzzy() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new(["daft punk  -  one more time"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content));

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    assert_eq!(
        report.outcome,
        CycleOutcome::Success {
            path: PathBuf::from("/music/Daft Punk - One More Time.mp3"),
            tier: Some(MatchTier::Exact),
        }
    );
}

#[tokio::test]
async fn test_fuzzy_match_for_decorated_suggestion() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new(["Radiohead - Karma Police (Remastered)"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content));

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    match report.outcome {
        CycleOutcome::Success { path, tier } => {
            assert_eq!(path, PathBuf::from("/music/Radiohead - Karma Police.mp3"));
            assert_eq!(tier, Some(MatchTier::Fuzzy));
        }
        other => panic!("expected a fuzzy hit, got {other:?}"),
    }
}

// ============================================================================
// Signal Handling
// ============================================================================

#[tokio::test]
async fn test_nothing_happens_without_signal() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new(["Bonobo - Kerala"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content.clone()));

    let report = orchestrator.poll_once(at(9, 0, 0)).await.unwrap();

    assert!(report.is_none());
    assert_eq!(content.calls(), 0);
    assert!(station.queue_lines().is_empty());
}

// ============================================================================
// Power-save
// ============================================================================

#[tokio::test]
async fn test_power_save_pulls_from_pool_without_content_source() {
    let station = Station::new();
    station.raise_signal();
    let content = Arc::new(ScriptedContent::new(["Miles Davis - So What"]));
    let speech = Arc::new(ScriptedSpeech::rendering_to("/tts/slot_0.mp3"));
    let collaborators = Collaborators::new(content.clone())
        .with_speech(speech.clone())
        .with_listeners(Arc::new(FixedListeners(Some(0))));
    let mut orchestrator = station.orchestrator(collaborators);

    let report = orchestrator.poll_once(at(9, 0, 0)).await.unwrap().unwrap();

    assert!(report.power_save);
    assert_eq!(content.calls(), 0);
    assert!(speech.texts().is_empty());
    assert_eq!(
        report.outcome,
        CycleOutcome::Success {
            path: PathBuf::from("/music/Daft Punk - One More Time.mp3"),
            tier: Some(MatchTier::Exact),
        }
    );
    assert_eq!(
        report.attempts[0].source,
        Some(SuggestionSource::Pool {
            show: "morning".to_string()
        })
    );
    assert_eq!(station.queue_lines(), vec!["/music/Daft Punk - One More Time.mp3"]);

    // rotated, not consumed
    let pool_after = orchestrator.pools_mut().entries("morning");
    assert_eq!(
        pool_after,
        vec!["Massive Attack - Teardrop", "Daft Punk - One More Time"]
    );
    assert!(!station.signal_raised());
}

#[tokio::test]
async fn test_unknown_listener_count_is_not_power_save() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new(["Bonobo - Kerala"]));
    let collaborators =
        Collaborators::new(content.clone()).with_listeners(Arc::new(FixedListeners(None)));
    let mut orchestrator = station.orchestrator(collaborators);

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    assert!(!report.power_save);
    assert_eq!(content.calls(), 1);
}

#[tokio::test]
async fn test_listener_request_overrides_power_save() {
    let station = Station::new();
    station.leave_request("Portishead - Glory Box");
    let content = Arc::new(ScriptedContent::new(["Portishead - Glory Box"]));
    let collaborators = Collaborators::new(content.clone())
        .with_listeners(Arc::new(FixedListeners(Some(0))))
        .with_inbox(Arc::new(onair::collaborators::FileRequestInbox::new(
            &station.config.paths.listener_request,
        )));
    let mut orchestrator = station.orchestrator(collaborators);

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    assert!(!report.power_save);
    let requests = content.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].listener_input.as_deref(),
        Some("Portishead - Glory Box")
    );
    assert_eq!(
        report.outcome.path(),
        &PathBuf::from("/music/Portishead - Glory Box.mp3")
    );
    // consumed on read
    assert!(!station.config.paths.listener_request.exists());
}

// ============================================================================
// Cascade
// ============================================================================

#[tokio::test]
async fn test_cascade_ends_in_forced_repeat() {
    let station = Station::new();
    station.seed_history(&[
        "/music/Massive Attack - Teardrop.mp3",
        "/music/Daft Punk - One More Time.mp3",
    ]);
    let content = Arc::new(ScriptedContent::new([
        "Unknown Band - Nowhere Song",
        "Unknown Band - Nowhere Song",
        "Massive Attack - Teardrop",
    ]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content.clone()));

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    let strategies: Vec<Strategy> = report.attempts.iter().map(|a| a.strategy).collect();
    assert_eq!(
        strategies,
        vec![
            Strategy::Primary,
            Strategy::ReRequest,
            Strategy::SameArtist,
            Strategy::PoolAlternate,
            Strategy::DifferentArtist,
        ]
    );
    assert_eq!(report.attempts[0].result, Err(AttemptFailure::Unresolved));
    assert_eq!(report.attempts[2].result, Err(AttemptFailure::Unresolved));
    assert!(matches!(
        report.attempts[3].result,
        Err(AttemptFailure::Repeat { .. })
    ));
    assert!(matches!(
        report.attempts[4].result,
        Err(AttemptFailure::Repeat { .. })
    ));

    assert_eq!(
        report.outcome,
        CycleOutcome::ForcedRepeat {
            path: PathBuf::from("/music/Daft Punk - One More Time.mp3"),
        }
    );
    assert!(report.phases.contains(&CyclePhase::ForcedRepeat));
    assert_eq!(station.queue_lines(), vec!["/music/Daft Punk - One More Time.mp3"]);

    // retries name what the content source suggested, not pool entries
    let requests = content.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[1]
        .instructions
        .as_deref()
        .unwrap()
        .contains("Unknown Band - Nowhere Song"));
    let different = requests[2].instructions.as_deref().unwrap();
    assert!(different.contains("different artist than Unknown Band"));
    assert!(!different.contains("Daft Punk"));

    // one wishlist entry despite two identical misses
    let wishes = Wishlist::new(&station.config.paths.wishlist).entries().unwrap();
    assert_eq!(wishes.len(), 1);
    assert_eq!(wishes[0].requested_text, "Unknown Band - Nowhere Song");
    assert_eq!(wishes[0].source, RequestSource::Dj);
}

#[tokio::test]
async fn test_same_artist_search_finds_unplayed_track() {
    let station = Station::new();
    station.seed_history(&["/music/Daft Punk - One More Time.mp3"]);
    let content = Arc::new(ScriptedContent::new([
        "Daft Punk - Harder Better Faster Stronger",
        "Daft Punk - One More Time",
    ]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content));

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    assert_eq!(report.attempt_count(), 3);
    assert_eq!(report.attempts[2].strategy, Strategy::SameArtist);
    assert_eq!(
        report.outcome,
        CycleOutcome::Success {
            path: PathBuf::from("/music/Daft Punk - Around the World.mp3"),
            tier: None,
        }
    );
}

#[tokio::test]
async fn test_attempts_never_exceed_budget() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new(Vec::<String>::new()));
    let mut settings = onair::orchestrator::OrchestratorSettings::from(&station.config);
    settings.max_attempts = 2;

    // empty pools so only the content source could help
    for pool in ["morning", "jazz", "default"] {
        std::fs::write(
            station.config.paths.pool_dir.join(format!("{pool}.txt")),
            "",
        )
        .unwrap();
    }
    let mut orchestrator = station.orchestrator_with(settings, Collaborators::new(content));

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    assert_eq!(report.attempt_count(), 2);
    assert!(report
        .attempts
        .iter()
        .all(|a| matches!(a.result, Err(AttemptFailure::Collaborator(_)))));
    // empty history: the first library track is replayed
    assert_eq!(
        report.outcome,
        CycleOutcome::ForcedRepeat {
            path: PathBuf::from("/music/Daft Punk - Around the World.mp3"),
        }
    );
}

#[tokio::test]
async fn test_attempt_budget_is_clamped_to_five() {
    let station = Station::new();
    let mut settings = onair::orchestrator::OrchestratorSettings::from(&station.config);
    settings.max_attempts = 12;
    let content = Arc::new(ScriptedContent::new(Vec::<String>::new()));
    let orchestrator = station.orchestrator_with(settings, Collaborators::new(content));

    assert_eq!(orchestrator.settings().max_attempts, 5);
}

#[tokio::test]
async fn test_listener_request_miss_goes_to_wishlist_as_listener() {
    let station = Station::new();
    station.leave_request("Ghost Artist - Phantom Tune");
    let content = Arc::new(ScriptedContent::new([
        "Ghost Artist - Phantom Tune",
        "Bonobo - Kerala",
    ]));
    let collaborators = Collaborators::new(content).with_inbox(Arc::new(
        onair::collaborators::FileRequestInbox::new(&station.config.paths.listener_request),
    ));
    let mut orchestrator = station.orchestrator(collaborators);

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    assert_eq!(
        report.outcome.path(),
        &PathBuf::from("/music/Bonobo - Kerala.mp3")
    );
    let wishes = Wishlist::new(&station.config.paths.wishlist).entries().unwrap();
    assert_eq!(wishes.len(), 1);
    assert_eq!(wishes[0].source, RequestSource::Listener);
}

// ============================================================================
// Announcements
// ============================================================================

#[tokio::test]
async fn test_announcement_is_queued_before_track() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::from_answers(vec![Ok(
        ContentResponse::new("Nina Simone - Feeling Good")
            .with_announcement("Here is a classic from Nina Simone."),
    )]));
    let speech = Arc::new(ScriptedSpeech::rendering_to("/tts/slot_3.mp3"));
    let mut orchestrator =
        station.orchestrator(Collaborators::new(content).with_speech(speech.clone()));

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    assert_eq!(speech.texts(), vec!["Here is a classic from Nina Simone."]);
    let kinds: Vec<ItemKind> = report.enqueued.iter().map(|i| i.kind).collect();
    assert_eq!(kinds, vec![ItemKind::Announcement, ItemKind::Track]);
    assert_eq!(
        station.queue_lines(),
        vec!["/tts/slot_3.mp3", "/music/Nina Simone - Feeling Good.mp3"]
    );
}

#[tokio::test]
async fn test_failed_speech_queues_track_alone() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::from_answers(vec![Ok(
        ContentResponse::new("Bonobo - Kerala").with_announcement("Something calm."),
    )]));
    let mut orchestrator = station
        .orchestrator(Collaborators::new(content).with_speech(Arc::new(ScriptedSpeech::failing())));

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    assert!(matches!(report.outcome, CycleOutcome::Success { .. }));
    assert_eq!(station.queue_lines(), vec!["/music/Bonobo - Kerala.mp3"]);
}

// ============================================================================
// State
// ============================================================================

#[tokio::test]
async fn test_history_survives_restart() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new(["Bonobo - Kerala"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content));
    orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();
    drop(orchestrator);

    let content = Arc::new(ScriptedContent::new(["Bonobo - Kerala", "Radiohead - Karma Police"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content));
    assert!(orchestrator.history().contains("/music/Bonobo - Kerala.mp3"));

    let report = orchestrator.run_cycle_at(at(9, 5, 0)).await.unwrap();
    assert!(matches!(
        report.attempts[0].result,
        Err(AttemptFailure::Repeat { .. })
    ));
    assert_eq!(
        report.outcome.path(),
        &PathBuf::from("/music/Radiohead - Karma Police.mp3")
    );
}

#[tokio::test]
async fn test_blocklist_carries_recent_tracks() {
    let station = Station::new();
    station.seed_history(&[
        "/music/Bonobo - Kerala.mp3",
        "/music/Miles Davis - So What.mp3",
    ]);
    let content = Arc::new(ScriptedContent::new(["Portishead - Glory Box"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content.clone()));

    orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    let request = &content.requests()[0];
    assert_eq!(request.last_track.as_deref(), Some("Miles Davis - So What"));
    assert_eq!(
        request.blocklist,
        vec!["Miles Davis - So What", "Bonobo - Kerala"]
    );
    assert_eq!(request.show_context.show_id, "morning");
}

// ============================================================================
// Side Jobs
// ============================================================================

#[tokio::test]
async fn test_charts_refresh_runs_once_per_day() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new([
        "Bonobo - Kerala",
        "Radiohead - Karma Police",
        "Portishead - Glory Box",
    ]));
    let charts = Arc::new(CountingCharts::default());
    let mut orchestrator =
        station.orchestrator(Collaborators::new(content).with_charts(charts.clone()));

    orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();
    orchestrator.run_cycle_at(at(9, 3, 0)).await.unwrap();
    let next_day = Local.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();
    orchestrator.run_cycle_at(next_day).await.unwrap();

    // the job is spawned; give it a chance to run
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(charts.runs(), 2);
}
