//! Engine session lifecycle tests.

mod common;

use audio_extractor::{EngineSession, EngineState, ExtractorError};
use common::FakeEngine;

#[test]
fn ensure_ready_is_idempotent() {
    let mut session = EngineSession::new(FakeEngine::default());
    assert_eq!(session.state(), &EngineState::Unloaded);

    session.ensure_ready().unwrap();
    session.ensure_ready().unwrap();
    session.ensure_ready().unwrap();

    assert!(session.is_ready());
    assert_eq!(session.load_attempts(), 1);
    assert_eq!(session.engine().load_count, 1);
}

#[test]
fn failed_load_is_retried_from_scratch() {
    let mut session = EngineSession::new(FakeEngine::failing_to_load(2));

    for attempt in 1..=2 {
        let error = session.ensure_ready().unwrap_err();
        assert!(matches!(error, ExtractorError::EngineLoad(_)));
        assert!(matches!(session.state(), EngineState::Failed(_)));
        assert_eq!(session.load_attempts(), attempt);
        assert!(!session.engine().loaded);
    }

    session.ensure_ready().unwrap();
    assert_eq!(session.state(), &EngineState::Ready);
    assert_eq!(session.load_attempts(), 3);
}

#[test]
fn engine_access_requires_a_loaded_engine() {
    let mut session = EngineSession::new(FakeEngine::failing_to_load(1));
    assert!(matches!(session.engine_mut(), Err(ExtractorError::EngineNotReady)));

    assert!(session.ensure_ready().is_err());
    assert!(matches!(session.engine_mut(), Err(ExtractorError::EngineNotReady)));

    session.ensure_ready().unwrap();
    assert!(session.engine_mut().is_ok());
}

#[test]
fn shutdown_is_final() {
    let mut session = EngineSession::new(FakeEngine::default());
    session.ensure_ready().unwrap();

    session.shutdown();
    session.shutdown();

    assert_eq!(session.state(), &EngineState::Shutdown);
    assert!(!session.engine().loaded);
    assert!(matches!(session.ensure_ready(), Err(ExtractorError::EngineShutdown)));
    assert!(matches!(session.engine_mut(), Err(ExtractorError::EngineShutdown)));
    assert_eq!(session.load_attempts(), 1);
}
