//! Extraction strategies and their result.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    str::FromStr,
};

use crate::error::ExtractorError;

/// How audio is pulled out of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExtractionStrategy {
    /// Probe the audio codec, then stream copy or re-encode through the
    /// engine.
    #[default]
    Ffmpeg,
    /// Placeholder for decoding straight to PCM through an audio graph.
    /// Not implemented: always yields an empty, non-playable clip.
    AudioContext,
}

impl ExtractionStrategy {
    /// Every strategy, in display order.
    pub const ALL: [ExtractionStrategy; 2] =
        [ExtractionStrategy::Ffmpeg, ExtractionStrategy::AudioContext];

    /// Whether this strategy needs a loaded engine.
    pub fn uses_engine(self) -> bool {
        matches!(self, ExtractionStrategy::Ffmpeg)
    }
}

impl Display for ExtractionStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ExtractionStrategy::Ffmpeg => write!(f, "ffmpeg"),
            ExtractionStrategy::AudioContext => write!(f, "audio_context"),
        }
    }
}

impl FromStr for ExtractionStrategy {
    type Err = ExtractorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "ffmpeg" | "engine" => Ok(ExtractionStrategy::Ffmpeg),
            "audio_context" | "audio-context" | "audiocontext" | "stub" => {
                Ok(ExtractionStrategy::AudioContext)
            }
            other => Err(ExtractorError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Extracted audio: encoded bytes plus their MIME type.
///
/// A clip is playable when it has both content and a MIME type. The
/// `audio_context` strategy produces [`AudioClip::empty`], which is neither.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioClip {
    bytes: Vec<u8>,
    mime: Option<&'static str>,
}

impl AudioClip {
    /// A clip of `bytes` encoded as `mime`.
    pub fn new(bytes: Vec<u8>, mime: &'static str) -> Self {
        Self {
            bytes,
            mime: Some(mime),
        }
    }

    /// The empty, non-playable clip.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Encoded audio bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type, e.g. `audio/aac`.
    pub fn mime(&self) -> Option<&'static str> {
        self.mime
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the clip has no content.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the clip can be handed to a player.
    pub fn is_playable(&self) -> bool {
        !self.bytes.is_empty() && self.mime.is_some()
    }

    /// Conventional file extension for the clip's MIME type.
    pub fn file_extension(&self) -> Option<&'static str> {
        self.mime.and_then(extension_for_mime)
    }

    /// Write the clip to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ExtractorError> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// MIME type of an audio container, by file extension.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "aac" => Some("audio/aac"),
        "mp3" => Some("audio/mpeg"),
        "m4a" | "mp4" => Some("audio/mp4"),
        "ogg" | "oga" | "opus" => Some("audio/ogg"),
        "flac" => Some("audio/flac"),
        "wav" => Some("audio/wav"),
        "mka" => Some("audio/x-matroska"),
        "webm" => Some("audio/webm"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "audio/aac" => Some("aac"),
        "audio/mpeg" => Some("mp3"),
        "audio/mp4" => Some("m4a"),
        "audio/ogg" => Some("ogg"),
        "audio/flac" => Some("flac"),
        "audio/wav" => Some("wav"),
        "audio/x-matroska" => Some("mka"),
        "audio/webm" => Some("webm"),
        _ => None,
    }
}
