//! Explicitly owned engine session.
//!
//! An [`EngineSession`] wraps one [`Engine`] and tracks whether it has been
//! loaded. Loading is lazy and idempotent: [`ensure_ready`] loads the engine
//! the first time and returns immediately afterwards. A failed load is
//! remembered, logged and reported, and the next call retries from scratch.
//! [`shutdown`] releases the engine for good.
//!
//! [`ensure_ready`]: EngineSession::ensure_ready
//! [`shutdown`]: EngineSession::shutdown

use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::{engine::Engine, error::ExtractorError};

/// Lifecycle state of an engine session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// Never loaded.
    Unloaded,
    /// Loaded and usable.
    Ready,
    /// The last load attempt failed with this reason.
    Failed(String),
    /// Released by [`EngineSession::shutdown`].
    Shutdown,
}

/// An engine plus its readiness.
///
/// # Example
///
/// ```no_run
/// use audio_extractor::{EngineSession, NativeEngine};
///
/// let mut session = EngineSession::new(NativeEngine::new());
/// session.ensure_ready()?;
/// session.ensure_ready()?; // no second load
/// assert_eq!(session.load_attempts(), 1);
/// session.shutdown();
/// # Ok::<(), audio_extractor::ExtractorError>(())
/// ```
pub struct EngineSession<E: Engine> {
    engine: E,
    state: EngineState,
    load_attempts: u32,
}

impl<E: Engine> Debug for EngineSession<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("EngineSession")
            .field("engine", &self.engine.name())
            .field("state", &self.state)
            .field("load_attempts", &self.load_attempts)
            .finish()
    }
}

impl<E: Engine> EngineSession<E> {
    /// Wrap an engine that has not been loaded yet.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: EngineState::Unloaded,
            load_attempts: 0,
        }
    }

    /// Load the engine unless it is already loaded.
    ///
    /// # Errors
    ///
    /// - [`ExtractorError::EngineLoad`] if loading fails. The session stays
    ///   not-ready and a later call tries again.
    /// - [`ExtractorError::EngineShutdown`] after [`shutdown`](Self::shutdown).
    pub fn ensure_ready(&mut self) -> Result<(), ExtractorError> {
        match &self.state {
            EngineState::Ready => return Ok(()),
            EngineState::Shutdown => return Err(ExtractorError::EngineShutdown),
            EngineState::Failed(reason) => {
                log::info!("Retrying {} engine load after failure: {reason}", self.engine.name());
            }
            EngineState::Unloaded => {}
        }

        self.load_attempts += 1;
        log::debug!(
            "Loading {} engine (attempt {})",
            self.engine.name(),
            self.load_attempts
        );

        match self.engine.load() {
            Ok(()) => {
                log::info!("{} engine ready", self.engine.name());
                self.state = EngineState::Ready;
                Ok(())
            }
            Err(error) => {
                log::error!("Failed to load {} engine: {error}", self.engine.name());
                self.engine.unload();
                let reason = error.to_string();
                self.state = EngineState::Failed(reason.clone());
                match error {
                    ExtractorError::EngineLoad(_) => Err(error),
                    _ => Err(ExtractorError::EngineLoad(reason)),
                }
            }
        }
    }

    /// Whether the engine is loaded.
    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// How many times the engine's loader has run.
    pub fn load_attempts(&self) -> u32 {
        self.load_attempts
    }

    /// The wrapped engine, for read-only inspection.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The wrapped engine, once it is loaded.
    ///
    /// # Errors
    ///
    /// [`ExtractorError::EngineNotReady`] before a successful
    /// [`ensure_ready`](Self::ensure_ready), or
    /// [`ExtractorError::EngineShutdown`] after [`shutdown`](Self::shutdown).
    pub fn engine_mut(&mut self) -> Result<&mut E, ExtractorError> {
        match self.state {
            EngineState::Ready => Ok(&mut self.engine),
            EngineState::Shutdown => Err(ExtractorError::EngineShutdown),
            EngineState::Unloaded | EngineState::Failed(_) => Err(ExtractorError::EngineNotReady),
        }
    }

    /// Release the engine. Every later call fails with
    /// [`ExtractorError::EngineShutdown`].
    pub fn shutdown(&mut self) {
        if self.state != EngineState::Shutdown {
            log::debug!("Shutting down {} engine", self.engine.name());
            self.engine.unload();
            self.state = EngineState::Shutdown;
        }
    }
}

impl<E: Engine> Drop for EngineSession<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
