//! Extraction controller.
//!
//! [`ExtractionController`] owns an [`EngineSession`], the selected
//! [`ExtractionStrategy`] and the visible extraction state. It reacts to a
//! selected file ([`handle`](ExtractionController::handle)) by driving the
//! session and the extractor in sequence, and exposes the resulting clip.
//!
//! The state is an explicit machine:
//!
//! ```text
//!            engine not loaded           load ok
//!  Idle ───────────────────────▶ LoadingEngine ──────▶ Extracting ──clip──▶ Ready
//!   ▲ │      engine loaded              │                 │  ▲                 │
//!   │ └─────────────────────────────────┼─────────────────┘  │                 │
//!   │                                   └─load failed─▶ Error │                 │
//!   └───────────────── failure or no result ─────────────────┘                 │
//!                       (Ready and Error accept new requests like Idle) ◀──────┘
//! ```
//!
//! Extraction failures are logged and swallowed: the caller sees no clip and
//! a controller that is no longer busy. Nothing is retried automatically; the
//! next [`handle`](ExtractionController::handle) call retries a failed engine
//! load. `handle` takes `&mut self`, so two extractions can never overlap.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
    time::Instant,
};

use crate::{
    config::ExtractorConfig,
    engine::Engine,
    error::ExtractorError,
    extract,
    media::MediaInput,
    session::EngineSession,
    strategy::{AudioClip, ExtractionStrategy},
};

/// Visible state of a controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// Nothing happening, no result.
    #[default]
    Idle,
    /// The engine is being loaded for an engine-backed request.
    LoadingEngine,
    /// An extraction is running.
    Extracting,
    /// The last request produced this clip.
    Ready(AudioClip),
    /// The engine failed to load for the last request.
    Error(String),
}

/// Payload-free discriminant of [`ControllerState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    /// [`ControllerState::Idle`].
    Idle,
    /// [`ControllerState::LoadingEngine`].
    LoadingEngine,
    /// [`ControllerState::Extracting`].
    Extracting,
    /// [`ControllerState::Ready`].
    Ready,
    /// [`ControllerState::Error`].
    Error,
}

impl ControllerState {
    /// Discriminant of this state.
    pub fn kind(&self) -> StateKind {
        match self {
            ControllerState::Idle => StateKind::Idle,
            ControllerState::LoadingEngine => StateKind::LoadingEngine,
            ControllerState::Extracting => StateKind::Extracting,
            ControllerState::Ready(_) => StateKind::Ready,
            ControllerState::Error(_) => StateKind::Error,
        }
    }
}

impl StateKind {
    /// Whether the controller may move from `self` to `next`.
    pub fn can_transition_to(self, next: StateKind) -> bool {
        use StateKind::*;

        match (self, next) {
            (Idle | Ready | Error, LoadingEngine | Extracting | Ready) => true,
            (LoadingEngine, Extracting | Error) => true,
            (Extracting, Ready | Idle) => true,
            (Idle | Ready | Error, Idle | Error) => false,
            (LoadingEngine, Idle | LoadingEngine | Ready) => false,
            (Extracting, LoadingEngine | Extracting | Error) => false,
        }
    }
}

/// Receives every state change of a controller.
///
/// Implementations must be [`Send`] and [`Sync`] so a controller can be moved
/// to a worker thread together with its observers.
pub trait StateObserver: Send + Sync {
    /// Called after the controller moved from `from` to `to`.
    fn on_transition(&self, from: StateKind, to: StateKind);
}

/// Drives strategy selection, engine loading and extraction for one user.
///
/// # Example
///
/// ```no_run
/// use audio_extractor::{
///     EngineSession, ExtractionController, ExtractorConfig, MediaInput, NativeEngine,
/// };
///
/// let session = EngineSession::new(NativeEngine::new());
/// let mut controller = ExtractionController::new(session, ExtractorConfig::new());
///
/// let input = MediaInput::from_path("clip.mp4")?;
/// if let Some(clip) = controller.handle(input) {
///     clip.save("clip.aac")?;
/// }
/// # Ok::<(), audio_extractor::ExtractorError>(())
/// ```
pub struct ExtractionController<E: Engine> {
    session: EngineSession<E>,
    config: ExtractorConfig,
    strategy: ExtractionStrategy,
    state: ControllerState,
    observers: Vec<Arc<dyn StateObserver>>,
}

impl<E: Engine> Debug for ExtractionController<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractionController")
            .field("session", &self.session)
            .field("strategy", &self.strategy)
            .field("state", &self.state.kind())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl<E: Engine> ExtractionController<E> {
    /// Create an idle controller. The initial strategy comes from `config`.
    pub fn new(session: EngineSession<E>, config: ExtractorConfig) -> Self {
        Self {
            session,
            strategy: config.strategy(),
            config,
            state: ControllerState::Idle,
            observers: Vec::new(),
        }
    }

    /// Register an observer for state changes.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn StateObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Select the strategy used by the next [`handle`](Self::handle) call.
    pub fn set_strategy(&mut self, strategy: ExtractionStrategy) {
        log::debug!("Strategy set to {strategy}");
        self.strategy = strategy;
    }

    /// Currently selected strategy.
    pub fn strategy(&self) -> ExtractionStrategy {
        self.strategy
    }

    /// Current state.
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Whether an extraction is running. Only true in
    /// [`ControllerState::Extracting`].
    pub fn is_busy(&self) -> bool {
        self.state == ControllerState::Extracting
    }

    /// The clip of the last successful request, if any.
    pub fn result(&self) -> Option<&AudioClip> {
        match &self.state {
            ControllerState::Ready(clip) => Some(clip),
            _ => None,
        }
    }

    /// The owned engine session.
    pub fn session(&self) -> &EngineSession<E> {
        &self.session
    }

    /// Extraction settings.
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Release the engine. Later engine-backed requests end in
    /// [`ControllerState::Error`].
    pub fn shutdown(&mut self) {
        self.session.shutdown();
    }

    /// Extract audio from `input` with the selected strategy.
    ///
    /// Returns the clip this request produced, or `None` if it produced
    /// nothing playable. An input the engine cannot take (no file extension)
    /// is ignored: the state is left as it was and `None` is returned.
    /// Failures never propagate: they are logged and leave the controller
    /// idle (or in [`ControllerState::Error`] for an engine load failure).
    pub fn handle(&mut self, input: MediaInput) -> Option<&AudioClip> {
        let strategy = self.strategy;
        let started = Instant::now();

        let settled = self.drive(strategy, &input).unwrap_or_else(|error| {
            log::error!("Extraction request for {} aborted: {error}", input.name());
            false
        });

        log::info!(
            "audio extraction - {strategy}: {:.3}s",
            started.elapsed().as_secs_f64()
        );
        if settled { self.result() } else { None }
    }

    /// Run one request. Returns whether the request moved the controller to
    /// a new settled state.
    fn drive(
        &mut self,
        strategy: ExtractionStrategy,
        input: &MediaInput,
    ) -> Result<bool, ExtractorError> {
        if !strategy.uses_engine() {
            log::debug!("{strategy} strategy yields an empty clip");
            self.transition(ControllerState::Ready(AudioClip::empty()))?;
            return Ok(true);
        }

        if input.extension().is_none() {
            log::warn!("{} has no file extension, ignoring", input.name());
            return Ok(false);
        }

        if !self.session.is_ready() {
            self.transition(ControllerState::LoadingEngine)?;
            if let Err(error) = self.session.ensure_ready() {
                self.transition(ControllerState::Error(error.to_string()))?;
                return Ok(true);
            }
        }

        self.transition(ControllerState::Extracting)?;
        let next = match extract::run(&mut self.session, input, &self.config) {
            Ok(Some(clip)) => {
                log::info!("Extracted {} bytes ({:?})", clip.len(), clip.mime());
                ControllerState::Ready(clip)
            }
            Ok(None) => {
                log::warn!("No audio extracted from {}", input.name());
                ControllerState::Idle
            }
            Err(error) => {
                log::error!("Failed to extract audio: {error}");
                ControllerState::Idle
            }
        };
        self.transition(next)?;
        Ok(true)
    }

    /// Move to `next`, notifying observers.
    ///
    /// # Errors
    ///
    /// [`ExtractorError::InvalidTransition`] if the two states are not
    /// connected; the state is left unchanged.
    fn transition(&mut self, next: ControllerState) -> Result<(), ExtractorError> {
        let from = self.state.kind();
        let to = next.kind();
        if !from.can_transition_to(to) {
            return Err(ExtractorError::InvalidTransition { from, to });
        }

        log::trace!("controller: {from:?} -> {to:?}");
        self.state = next;
        for observer in &self.observers {
            observer.on_transition(from, to);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::StateKind::{self, *};

    const ALL: [StateKind; 5] = [Idle, LoadingEngine, Extracting, Ready, Error];

    #[test]
    fn busy_state_only_settles_through_ready_or_idle() {
        let reachable: Vec<StateKind> = ALL
            .into_iter()
            .filter(|&next| Extracting.can_transition_to(next))
            .collect();
        assert_eq!(reachable, [Idle, Ready]);
    }

    #[test]
    fn loading_leads_to_extracting_or_error() {
        let reachable: Vec<StateKind> = ALL
            .into_iter()
            .filter(|&next| LoadingEngine.can_transition_to(next))
            .collect();
        assert_eq!(reachable, [Extracting, Error]);
    }

    #[test]
    fn settled_states_accept_new_requests() {
        for from in [Idle, Ready, Error] {
            assert!(from.can_transition_to(LoadingEngine));
            assert!(from.can_transition_to(Extracting));
            assert!(from.can_transition_to(Ready));
            assert!(!from.can_transition_to(Error));
            assert!(!from.can_transition_to(Idle));
        }
    }
}
