//! Controller state machine integration tests.
//!
//! These drive an [`ExtractionController`] over a scripted engine and check
//! the visible state, the busy window and what reached the engine.

mod common;

use audio_extractor::{
    ControllerState, EngineSession, ExtractionController, ExtractionStrategy, ExtractorConfig,
    MediaInput, StateKind,
};
use common::{Event, FakeEngine, RecordingObserver, events, journal};

fn controller(engine: FakeEngine) -> ExtractionController<FakeEngine> {
    ExtractionController::new(EngineSession::new(engine), ExtractorConfig::new())
}

fn video(name: &str) -> MediaInput {
    MediaInput::new(name, b"\x00\x00\x00\x18ftypisom".to_vec())
}

fn position(events: &[Event], wanted: &Event) -> usize {
    events
        .iter()
        .position(|event| event == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not found in {events:?}"))
}

#[test]
fn busy_only_while_extracting() {
    let journal = journal();
    let mut controller = controller(FakeEngine::with_audio("aac").journaled(&journal))
        .with_observer(RecordingObserver::new(&journal));

    assert!(!controller.is_busy());
    let clip = controller.handle(video("clip.mp4")).cloned();
    assert!(!controller.is_busy());
    assert!(clip.is_some_and(|clip| clip.is_playable()));

    let events = events(&journal);
    let start = position(
        &events,
        &Event::Transition(StateKind::LoadingEngine, StateKind::Extracting),
    );
    let end = position(&events, &Event::Transition(StateKind::Extracting, StateKind::Ready));
    let execs: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, event)| matches!(event, Event::Exec(_)))
        .map(|(index, _)| index)
        .collect();

    assert_eq!(execs.len(), 2, "probe plus one conversion: {events:?}");
    assert!(execs.iter().all(|&index| start < index && index < end));
    assert!(position(&events, &Event::Load) < start);
    assert_eq!(
        events.first(),
        Some(&Event::Transition(StateKind::Idle, StateKind::LoadingEngine))
    );
}

#[test]
fn load_failure_never_reaches_extracting() {
    let journal = journal();
    let mut controller = controller(FakeEngine::failing_to_load(1).journaled(&journal))
        .with_observer(RecordingObserver::new(&journal));

    assert!(controller.handle(video("clip.mp4")).is_none());
    assert!(matches!(controller.state(), ControllerState::Error(reason) if reason.contains("artifact fetch failed")));
    assert!(!controller.is_busy());

    let events = events(&journal);
    assert_eq!(
        events,
        vec![
            Event::Transition(StateKind::Idle, StateKind::LoadingEngine),
            Event::Load,
            Event::Transition(StateKind::LoadingEngine, StateKind::Error),
        ]
    );
}

#[test]
fn next_request_retries_failed_load() {
    let mut controller = controller(FakeEngine::failing_to_load(1));

    assert!(controller.handle(video("clip.mp4")).is_none());
    assert_eq!(controller.state().kind(), StateKind::Error);

    let clip = controller.handle(video("clip.mp4")).cloned();
    assert_eq!(clip.and_then(|clip| clip.mime()), Some("audio/aac"));
    assert_eq!(controller.session().load_attempts(), 2);
    assert_eq!(controller.session().engine().load_count, 2);
}

#[test]
fn engine_loads_once_across_requests() {
    let journal = journal();
    let mut controller = controller(FakeEngine::with_audio("mp3").journaled(&journal))
        .with_observer(RecordingObserver::new(&journal));

    assert!(controller.handle(video("first.mp4")).is_some());
    assert!(controller.handle(video("second.avi")).is_some());

    assert_eq!(controller.session().load_attempts(), 1);
    let events = events(&journal);
    assert_eq!(events.iter().filter(|event| **event == Event::Load).count(), 1);
    assert!(events.contains(&Event::Transition(StateKind::Ready, StateKind::Extracting)));
}

#[test]
fn no_audio_codec_yields_nothing() {
    let mut controller = controller(FakeEngine::without_audio());

    assert!(controller.handle(video("silent.mp4")).is_none());
    assert_eq!(controller.state(), &ControllerState::Idle);
    assert!(controller.result().is_none());

    let engine = controller.session().engine();
    assert_eq!(engine.executed.len(), 1, "only the probe runs");
    assert!(engine.files.is_empty());
}

#[test]
fn failed_invocation_returns_to_idle() {
    let mut engine = FakeEngine::with_audio("opus");
    engine.fail_exec = true;
    let mut controller = controller(engine);

    assert!(controller.handle(video("clip.webm")).is_none());
    assert_eq!(controller.state(), &ControllerState::Idle);
    assert!(!controller.is_busy());
    assert!(controller.session().engine().files.is_empty());
}

#[test]
fn audio_context_strategy_yields_empty_clip() {
    let journal = journal();
    let mut controller = controller(FakeEngine::with_audio("aac").journaled(&journal))
        .with_observer(RecordingObserver::new(&journal));
    controller.set_strategy(ExtractionStrategy::AudioContext);

    for name in ["clip.mp4", "README"] {
        let clip = controller.handle(video(name)).cloned();
        let clip = clip.expect("the stub always produces a clip");
        assert!(clip.is_empty());
        assert!(!clip.is_playable());
    }

    assert_eq!(controller.session().load_attempts(), 0);
    assert!(
        events(&journal)
            .iter()
            .all(|event| matches!(event, Event::Transition(_, StateKind::Ready)))
    );
}

#[test]
fn strategy_comes_from_config() {
    let config = ExtractorConfig::new().with_strategy(ExtractionStrategy::AudioContext);
    let controller = ExtractionController::new(EngineSession::new(FakeEngine::default()), config);
    assert_eq!(controller.strategy(), ExtractionStrategy::AudioContext);
}

#[test]
fn input_without_extension_is_ignored() {
    let journal = journal();
    let mut controller = controller(FakeEngine::with_audio("aac").journaled(&journal))
        .with_observer(RecordingObserver::new(&journal));

    assert!(controller.handle(video("clip")).is_none());
    assert_eq!(controller.state(), &ControllerState::Idle);
    assert!(events(&journal).is_empty());
}

#[test]
fn ignored_input_does_not_return_previous_clip() {
    let mut controller = controller(FakeEngine::with_audio("aac"));
    assert!(controller.handle(video("clip.mp4")).is_some());

    assert!(controller.handle(video("README")).is_none());
    assert_eq!(controller.state().kind(), StateKind::Ready);
    assert_eq!(controller.session().engine().executed.len(), 2);
}

#[test]
fn ready_result_is_replaced_by_next_request() {
    let mut controller = controller(FakeEngine::with_audio("aac"));
    assert!(controller.handle(video("clip.mp4")).is_some());

    controller.set_strategy(ExtractionStrategy::AudioContext);
    let clip = controller.handle(video("clip.mp4")).cloned();
    assert_eq!(clip.map(|clip| clip.is_playable()), Some(false));
}

#[test]
fn shutdown_turns_requests_into_errors() {
    let mut controller = controller(FakeEngine::with_audio("aac"));
    assert!(controller.handle(video("clip.mp4")).is_some());

    controller.shutdown();
    assert!(controller.handle(video("clip.mp4")).is_none());
    assert_eq!(controller.state().kind(), StateKind::Error);
}
