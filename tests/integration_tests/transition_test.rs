//! Show transition tests
//!
//! The look-ahead window is 240 seconds: a cycle that runs inside it works
//! for the incoming show and queues its signation first, exactly once per
//! boundary.

use std::path::PathBuf;
use std::sync::Arc;

use onair::collaborators::{Collaborators, ContentResponse};
use onair::models::ItemKind;
use onair::orchestrator::CyclePhase;

use super::fixtures::{at, FixedListeners, ScriptedContent, ScriptedSpeech, Station};

fn kinds(report: &onair::orchestrator::CycleReport) -> Vec<ItemKind> {
    report.enqueued.iter().map(|item| item.kind).collect()
}

#[tokio::test]
async fn test_lookahead_window_switches_to_incoming_show() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::from_answers(vec![Ok(
        ContentResponse::new("Miles Davis - So What")
            .with_announcement("Welcome to the Jazz Hour."),
    )]));
    let speech = Arc::new(ScriptedSpeech::rendering_to("/tts/slot_1.mp3"));
    let mut orchestrator =
        station.orchestrator(Collaborators::new(content.clone()).with_speech(speech));

    // exactly four minutes before noon
    let report = orchestrator.run_cycle_at(at(11, 56, 0)).await.unwrap();

    assert_eq!(report.show, "jazz");
    assert!(report.phases.contains(&CyclePhase::SignationPending));
    assert_eq!(
        kinds(&report),
        vec![ItemKind::Signation, ItemKind::Announcement, ItemKind::Track]
    );
    assert_eq!(
        station.queue_lines(),
        vec![
            "/jingles/jazz.mp3",
            "/tts/slot_1.mp3",
            "/music/Miles Davis - So What.mp3"
        ]
    );

    let request = &content.requests()[0];
    assert_eq!(request.show_context.show_id, "jazz");
    assert!(request.show_context.introduce);
}

#[tokio::test]
async fn test_one_second_outside_window_stays_on_current_show() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new(["Bonobo - Kerala"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content.clone()));

    let report = orchestrator.run_cycle_at(at(11, 55, 59)).await.unwrap();

    assert_eq!(report.show, "morning");
    assert!(!report.phases.contains(&CyclePhase::SignationPending));
    assert_eq!(kinds(&report), vec![ItemKind::Track]);
    assert!(!content.requests()[0].show_context.introduce);
}

#[tokio::test]
async fn test_signation_only_once_per_boundary() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new([
        "Miles Davis - So What",
        "Nina Simone - Feeling Good",
    ]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content.clone()));

    let first = orchestrator.run_cycle_at(at(11, 57, 0)).await.unwrap();
    let second = orchestrator.run_cycle_at(at(11, 59, 0)).await.unwrap();

    assert_eq!(kinds(&first), vec![ItemKind::Signation, ItemKind::Track]);
    assert_eq!(kinds(&second), vec![ItemKind::Track]);
    assert_eq!(second.show, "jazz");

    let requests = content.requests();
    assert!(requests[0].show_context.introduce);
    assert!(!requests[1].show_context.introduce);
}

#[tokio::test]
async fn test_power_save_transition_keeps_signation_and_uses_incoming_pool() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new(Vec::<String>::new()));
    let speech = Arc::new(ScriptedSpeech::rendering_to("/tts/slot_2.mp3"));
    let collaborators = Collaborators::new(content.clone())
        .with_speech(speech.clone())
        .with_listeners(Arc::new(FixedListeners(Some(0))));
    let mut orchestrator = station.orchestrator(collaborators);

    let report = orchestrator.run_cycle_at(at(11, 58, 30)).await.unwrap();

    assert!(report.power_save);
    assert_eq!(content.calls(), 0);
    assert!(speech.texts().is_empty());
    assert_eq!(kinds(&report), vec![ItemKind::Signation, ItemKind::Track]);
    assert_eq!(
        report.outcome.path(),
        &PathBuf::from("/music/Miles Davis - So What.mp3")
    );
}

#[tokio::test]
async fn test_transition_into_default_show_uses_default_signation() {
    let station = Station::new();
    let content = Arc::new(ScriptedContent::new(["Bonobo - Kerala"]));
    let mut orchestrator = station.orchestrator(Collaborators::new(content));

    let report = orchestrator.run_cycle_at(at(12, 57, 0)).await.unwrap();

    assert_eq!(report.show, "default");
    assert_eq!(
        station.queue_lines(),
        vec!["/jingles/default.mp3", "/music/Bonobo - Kerala.mp3"]
    );
}
