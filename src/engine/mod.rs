//! The transcoding engine abstraction.
//!
//! An [`Engine`] is an FFmpeg that the crate drives the way a user drives the
//! `ffmpeg` executable: files are placed in a scratch filesystem by name, a
//! command is issued as an argument list, and the result is read back by
//! name. Two implementations ship with the crate:
//!
//! - [`NativeEngine`] runs in-process on the linked FFmpeg libraries.
//! - [`CommandEngine`] spawns an external `ffmpeg` (and `ffprobe`).
//!
//! Engines are not used directly by callers; an
//! [`EngineSession`](crate::EngineSession) owns one and guarantees it is
//! loaded before any file or command operation reaches it.

pub mod command;
pub mod native;

pub use command::CommandEngine;
pub use native::NativeEngine;

use crate::{error::ExtractorError, invocation::Invocation, probe::StructuredProbe};

/// Result of one engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Human-readable diagnostic text the engine produced (stream summaries,
    /// warnings). Not a stable format.
    pub diagnostics: String,
}

/// A media transcoding engine driven by `ffmpeg`-style invocations.
pub trait Engine {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Initialise the engine and its scratch filesystem.
    ///
    /// Called by [`EngineSession::ensure_ready`](crate::EngineSession::ensure_ready)
    /// until it succeeds once. A failed load must leave the engine in a state
    /// where `load` can be called again.
    fn load(&mut self) -> Result<(), ExtractorError>;

    /// Release the scratch filesystem and anything `load` acquired.
    fn unload(&mut self) {}

    /// Place `data` in the scratch filesystem under `name`.
    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), ExtractorError>;

    /// Read `name` back from the scratch filesystem.
    fn read_file(&mut self, name: &str) -> Result<Vec<u8>, ExtractorError>;

    /// Remove `name` from the scratch filesystem. Missing files are ignored.
    fn delete_file(&mut self, name: &str) -> Result<(), ExtractorError>;

    /// Run one invocation against files in the scratch filesystem.
    ///
    /// A probe invocation (no output) succeeds as long as the input can be
    /// read; its findings are in [`ExecOutput::diagnostics`].
    fn exec(&mut self, invocation: &Invocation) -> Result<ExecOutput, ExtractorError>;

    /// Report the codec of the best audio stream of `name` through a
    /// structured query, if the engine has one.
    fn probe_audio_codec(&mut self, _name: &str) -> Result<StructuredProbe, ExtractorError> {
        Ok(StructuredProbe::Unavailable)
    }
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load(&mut self) -> Result<(), ExtractorError> {
        (**self).load()
    }

    fn unload(&mut self) {
        (**self).unload()
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), ExtractorError> {
        (**self).write_file(name, data)
    }

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>, ExtractorError> {
        (**self).read_file(name)
    }

    fn delete_file(&mut self, name: &str) -> Result<(), ExtractorError> {
        (**self).delete_file(name)
    }

    fn exec(&mut self, invocation: &Invocation) -> Result<ExecOutput, ExtractorError> {
        (**self).exec(invocation)
    }

    fn probe_audio_codec(&mut self, name: &str) -> Result<StructuredProbe, ExtractorError> {
        (**self).probe_audio_codec(name)
    }
}
