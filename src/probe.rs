//! Audio codec detection.
//!
//! Choosing between stream copy and re-encode needs one fact about the
//! input: the codec of its audio stream. Engines are asked for it in two
//! ways, in order:
//!
//! 1. **Structured probe** via [`Engine::probe_audio_codec`]. The in-process
//!    engine reads the codec parameters of the best audio stream; the
//!    command engine asks `ffprobe` for JSON.
//! 2. **Diagnostic scrape** via [`scrape_audio_codec`]. A probe-only
//!    invocation (`-hide_banner -i input.ext`) makes the engine print its
//!    stream summary, and the first `Audio: <codec>` token is taken.
//!
//! The scrape is a known-fragile heuristic: it depends on FFmpeg's
//! human-readable log format, on the log level being at least `info`, and on
//! the first audio line belonging to the stream that will be mapped. It is
//! only used when no structured answer is available.
//!
//! [`Engine::probe_audio_codec`]: crate::Engine::probe_audio_codec

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ExtractorError;

static AUDIO_CODEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Audio: (\w+)").expect("audio codec pattern is valid"));

/// Answer of a structured probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredProbe {
    /// The engine has no structured probe; fall back to the diagnostic scrape.
    Unavailable,
    /// The input has no audio stream.
    NoAudio,
    /// Codec name of the best audio stream, e.g. `aac`.
    Codec(String),
}

/// Where a detected codec came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeSource {
    /// A structured engine query.
    Structured,
    /// Pattern matching over diagnostic text.
    Diagnostics,
}

/// A detected audio codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedCodec {
    /// FFmpeg codec name, lowercase.
    pub name: String,
    /// How the codec was found.
    pub source: ProbeSource,
}

/// Extract the first audio codec name from FFmpeg diagnostic output.
///
/// Looks for the `Audio: <codec>` token FFmpeg prints in its stream summary,
/// e.g. `Stream #0:1(und): Audio: aac (LC) (mp4a / 0x6134706D), 48000 Hz`.
///
/// # Example
///
/// ```
/// use audio_extractor::scrape_audio_codec;
///
/// let log = "  Stream #0:1[0x2](und): Audio: opus, 48000 Hz, stereo, fltp";
/// assert_eq!(scrape_audio_codec(log).as_deref(), Some("opus"));
/// assert_eq!(scrape_audio_codec("Stream #0:0: Video: h264"), None);
/// ```
pub fn scrape_audio_codec(diagnostics: &str) -> Option<String> {
    AUDIO_CODEC
        .captures(diagnostics)
        .and_then(|captures| captures.get(1))
        .map(|codec| codec.as_str().to_ascii_lowercase())
}

/// Read the first stream's `codec_name` from `ffprobe -of json` output.
///
/// Returns [`StructuredProbe::NoAudio`] when the stream list is empty or
/// missing.
///
/// # Errors
///
/// Returns [`ExtractorError::ProbeOutput`] if `text` is not valid JSON.
pub fn parse_ffprobe_json(text: &str) -> Result<StructuredProbe, ExtractorError> {
    let document: Value = serde_json::from_str(text)?;
    let codec = document
        .get("streams")
        .and_then(Value::as_array)
        .and_then(|streams| streams.first())
        .and_then(|stream| stream.get("codec_name"))
        .and_then(Value::as_str);

    Ok(match codec {
        Some(name) => StructuredProbe::Codec(name.to_ascii_lowercase()),
        None => StructuredProbe::NoAudio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MKV_PROBE: &str = "\
Input #0, matroska,webm, from 'input.mkv':
  Duration: 00:00:05.02, start: 0.000000, bitrate: 1035 kb/s
  Stream #0:0: Video: h264 (High), yuv420p(progressive), 1280x720, 30 fps
  Stream #0:1(eng): Audio: opus, 48000 Hz, stereo, fltp (default)
At least one output file must be specified";

    #[test]
    fn scrapes_first_audio_stream() {
        assert_eq!(scrape_audio_codec(MKV_PROBE).as_deref(), Some("opus"));
    }

    #[test]
    fn scrape_takes_the_first_match_only() {
        let log = "Stream #0:1: Audio: aac (LC)\nStream #0:2: Audio: ac3";
        assert_eq!(scrape_audio_codec(log).as_deref(), Some("aac"));
    }

    #[test]
    fn scrape_without_audio_line_is_none() {
        let log = "Input #0, mov,mp4, from 'input.mp4':\n  Stream #0:0: Video: h264";
        assert_eq!(scrape_audio_codec(log), None);
        assert_eq!(scrape_audio_codec(""), None);
    }

    #[test]
    fn parses_ffprobe_codec() {
        let json = r#"{"programs": [], "streams": [{"codec_name": "AAC"}]}"#;
        assert_eq!(
            parse_ffprobe_json(json).unwrap(),
            StructuredProbe::Codec("aac".to_string())
        );
    }

    #[test]
    fn ffprobe_without_streams_means_no_audio() {
        assert_eq!(parse_ffprobe_json(r#"{"streams": []}"#).unwrap(), StructuredProbe::NoAudio);
        assert_eq!(parse_ffprobe_json("{}").unwrap(), StructuredProbe::NoAudio);
    }

    #[test]
    fn ffprobe_garbage_is_an_error() {
        assert!(matches!(
            parse_ffprobe_json("not json"),
            Err(ExtractorError::ProbeOutput(_))
        ));
    }
}
