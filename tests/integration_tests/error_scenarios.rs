//! Error scenario integration tests
//!
//! Tests various failure modes and error handling:
//! 1. Queue write failures and redelivery
//! 2. Collaborator timeouts
//! 3. Empty or missing library
//! 4. Broken configuration files at runtime
//! 5. Corrupt state files

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use onair::collaborators::{CollaboratorError, CollaboratorTimeouts, Collaborators};
use onair::error::{Error, ErrorCategory, OnAirErrorTrait};
use onair::orchestrator::{AttemptFailure, CycleOutcome, Strategy};

use super::fixtures::{at, ScriptedContent, Station};

// ============================================================================
// Queue Errors
// ============================================================================

#[tokio::test]
async fn test_queue_failure_holds_items_and_redelivers() {
    let mut station = Station::new();
    station.config.paths.queue = station.root().join("spool/queue.txt");
    station.raise_signal();

    let content = Arc::new(ScriptedContent::new(["Bonobo - Kerala"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content.clone()));

    // the spool directory does not exist yet
    let err = orchestrator.poll_once(at(9, 0, 0)).await.unwrap_err();
    assert!(matches!(err, Error::Queue(_)));
    assert!(orchestrator.has_pending_delivery());
    assert!(station.signal_raised());
    assert!(orchestrator.history().is_empty());

    std::fs::create_dir_all(station.root().join("spool")).unwrap();
    let report = orchestrator.poll_once(at(9, 0, 3)).await.unwrap().unwrap();

    assert_eq!(
        report.outcome,
        CycleOutcome::Redelivered {
            path: PathBuf::from("/music/Bonobo - Kerala.mp3"),
        }
    );
    // the content source was not asked again
    assert_eq!(content.calls(), 1);
    assert!(!orchestrator.has_pending_delivery());
    assert!(!station.signal_raised());
    assert!(orchestrator.history().contains("/music/Bonobo - Kerala.mp3"));
    assert_eq!(
        std::fs::read_to_string(station.root().join("spool/queue.txt")).unwrap(),
        "/music/Bonobo - Kerala.mp3\n"
    );
}

// ============================================================================
// Collaborator Errors
// ============================================================================

#[tokio::test]
async fn test_content_timeout_spends_attempts_then_pool_answers() {
    let station = Station::new();
    let content = Arc::new(
        ScriptedContent::new(["Bonobo - Kerala", "Bonobo - Kerala"]).slow(Duration::from_millis(300)),
    );
    let timeouts = CollaboratorTimeouts {
        content: Duration::from_millis(20),
        ..CollaboratorTimeouts::default()
    };
    let mut orchestrator =
        station.orchestrator(Collaborators::new(content).with_timeouts(timeouts));

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    assert_eq!(report.attempt_count(), 3);
    for attempt in &report.attempts[..2] {
        assert!(matches!(
            attempt.result,
            Err(AttemptFailure::Collaborator(CollaboratorError::Timeout { .. }))
        ));
    }
    assert_eq!(report.attempts[2].strategy, Strategy::PoolAlternate);
    assert_eq!(
        report.outcome.path(),
        &PathBuf::from("/music/Daft Punk - One More Time.mp3")
    );
}

#[tokio::test]
async fn test_malformed_answer_counts_as_failed_attempt() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::from_answers(vec![
        Err(CollaboratorError::malformed("scripted", "missing track")),
        Ok(onair::collaborators::ContentResponse::new("Bonobo - Kerala")),
    ]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content));

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();

    assert_eq!(report.attempt_count(), 2);
    assert!(matches!(
        report.attempts[0].result,
        Err(AttemptFailure::Collaborator(CollaboratorError::Malformed { .. }))
    ));
    assert_eq!(
        report.outcome.path(),
        &PathBuf::from("/music/Bonobo - Kerala.mp3")
    );
}

// ============================================================================
// Library Errors
// ============================================================================

#[tokio::test]
async fn test_empty_library_cannot_force_a_repeat() {
    let station = Station::with_library("# nothing yet\n");
    station.raise_signal();
    let content = Arc::new(ScriptedContent::new(Vec::<String>::new()));
    let mut orchestrator = station.orchestrator(Collaborators::new(content));

    let err = orchestrator.poll_once(at(9, 0, 0)).await.unwrap_err();

    assert!(matches!(err, Error::EmptyLibrary));
    assert!(!err.is_recoverable());
    assert!(station.signal_raised());
    assert!(station.queue_lines().is_empty());
}

#[tokio::test]
async fn test_missing_library_fails_cycle() {
    let station = Station::new();
    std::fs::remove_file(&station.config.paths.library).unwrap();
    let content = Arc::new(ScriptedContent::new(["Bonobo - Kerala"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content.clone()));

    assert!(orchestrator.run_cycle_at(at(9, 0, 0)).await.is_err());
    assert_eq!(content.calls(), 0);
}

// ============================================================================
// Runtime Reloads
// ============================================================================

#[tokio::test]
async fn test_overlapping_schedule_halts_cycle_before_any_decision() {
    let station = Station::new();
    std::fs::write(
        &station.config.paths.schedule,
        r#"{"shows": [
            {"id": "morning", "name": "Morning", "start": "06:00", "end": "12:00"},
            {"id": "brunch", "name": "Brunch", "start": "11:00", "end": "13:00"}
        ]}"#,
    )
    .unwrap();
    station.raise_signal();

    let content = Arc::new(ScriptedContent::new(["Bonobo - Kerala"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content.clone()));

    let err = orchestrator.poll_once(at(9, 0, 0)).await.unwrap_err();

    assert!(matches!(err, Error::Schedule(_)));
    assert_eq!(err.category(), ErrorCategory::Schedule);
    assert!(!err.is_recoverable());
    assert_eq!(content.calls(), 0);
    assert!(station.queue_lines().is_empty());
    assert!(station.signal_raised());
    assert!(!orchestrator.has_pending_delivery());
}

#[tokio::test]
async fn test_broken_schedule_edit_keeps_previous_schedule() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new(["Bonobo - Kerala", "Radiohead - Karma Police"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content));

    let first = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();
    assert_eq!(first.show, "morning");

    std::fs::write(&station.config.paths.schedule, "{ \"shows\": [ broken").unwrap();
    let file = std::fs::File::options()
        .write(true)
        .open(&station.config.paths.schedule)
        .unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    let second = orchestrator.run_cycle_at(at(9, 3, 0)).await.unwrap();
    assert_eq!(second.show, "morning");
}

#[tokio::test]
async fn test_library_edit_is_picked_up_between_cycles() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new([
        "Air - La Femme D'Argent",
        "Air - La Femme D'Argent",
    ]));
    let mut settings = onair::orchestrator::OrchestratorSettings::from(&station.config);
    settings.max_attempts = 1;
    let mut orchestrator = station.orchestrator_with(settings, Collaborators::new(content));

    let first = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();
    assert!(matches!(first.outcome, CycleOutcome::ForcedRepeat { .. }));

    let mut library = std::fs::read_to_string(&station.config.paths.library).unwrap();
    library.push_str("/music/Air - La Femme D'Argent.mp3\n");
    std::fs::write(&station.config.paths.library, library).unwrap();
    let file = std::fs::File::options()
        .write(true)
        .open(&station.config.paths.library)
        .unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    let second = orchestrator.run_cycle_at(at(9, 3, 0)).await.unwrap();
    assert_eq!(
        second.outcome.path(),
        &PathBuf::from("/music/Air - La Femme D'Argent.mp3")
    );
}

// ============================================================================
// State Files
// ============================================================================

#[tokio::test]
async fn test_corrupt_state_files_start_empty() {
    let station = Station::new();
    std::fs::write(&station.config.paths.history, "not json").unwrap();
    std::fs::write(&station.config.paths.pool_state, "{ truncated").unwrap();

    let content = Arc::new(ScriptedContent::new(["Bonobo - Kerala"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content));
    assert!(orchestrator.history().is_empty());

    let report = orchestrator.run_cycle_at(at(9, 0, 0)).await.unwrap();
    assert!(matches!(report.outcome, CycleOutcome::Success { .. }));

    // overwritten with valid state
    let saved = std::fs::read_to_string(&station.config.paths.history).unwrap();
    assert!(saved.contains("Bonobo - Kerala"));
}
