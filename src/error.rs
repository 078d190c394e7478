//! Error types for the `audio-extractor` crate.
//!
//! This module defines [`ExtractorError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry the context needed to
//! diagnose a failed extraction: the file involved, the engine step that
//! failed, and upstream FFmpeg messages.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use serde_json::Error as JsonError;
use thiserror::Error;

use crate::controller::StateKind;

/// The unified error type for all `audio-extractor` operations.
///
/// Every public method that can fail returns `Result<T, ExtractorError>`.
/// The [`ExtractionController`](crate::ExtractionController) is the only
/// place errors are swallowed; everything below it propagates them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractorError {
    /// A file could not be opened or read.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was being opened.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The engine failed to initialise.
    #[error("Failed to load engine: {0}")]
    EngineLoad(String),

    /// An engine operation was attempted before the engine was loaded.
    #[error("Engine is not loaded")]
    EngineNotReady,

    /// The session was shut down and can no longer be used.
    #[error("Engine session has been shut down")]
    EngineShutdown,

    /// A required FFmpeg component (encoder, muxer, filter) is missing from
    /// the linked build.
    #[error("FFmpeg component not available: {0}")]
    MissingComponent(String),

    /// The input does not contain an audio stream.
    #[error("No audio stream found in file")]
    NoAudioStream,

    /// An engine invocation failed.
    #[error("Engine invocation failed: {0}")]
    Invocation(String),

    /// An argument list contained a flag the engine contract does not accept.
    #[error("Unsupported engine argument: {0}")]
    UnsupportedArgument(String),

    /// A bitrate string such as `192k` could not be parsed.
    #[error("Invalid bitrate: {0}")]
    InvalidBitrate(String),

    /// Audio data could not be decoded.
    #[error("Failed to decode audio: {0}")]
    AudioDecodeError(String),

    /// Audio data could not be encoded to the target codec.
    #[error("Failed to encode audio: {0}")]
    AudioEncodeError(String),

    /// Packet-level stream copy failed.
    #[error("Stream copy error: {0}")]
    StreamCopyError(String),

    /// FFmpeg filter graph setup or processing failed.
    #[error("Filter graph error: {0}")]
    FilterGraphError(String),

    /// The controller was asked to move between two states that are not
    /// connected.
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// State the controller was in.
        from: StateKind,
        /// State that was requested.
        to: StateKind,
    },

    /// An extraction strategy name was not recognised.
    #[error("Unknown extraction strategy: {0}")]
    UnknownStrategy(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// Structured probe output could not be parsed.
    #[error("Failed to parse probe output: {0}")]
    ProbeOutput(#[from] JsonError),
}

impl From<FfmpegError> for ExtractorError {
    fn from(error: FfmpegError) -> Self {
        ExtractorError::FfmpegError(error.to_string())
    }
}
