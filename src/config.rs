//! Extraction configuration.
//!
//! [`ExtractorConfig`] is a builder for the decisions the engine-backed
//! strategy makes once the input's audio codec is known: which codecs are
//! copied as they are, and what everything else is re-encoded to.
//!
//! # Example
//!
//! ```
//! use audio_extractor::ExtractorConfig;
//!
//! let config = ExtractorConfig::new()
//!     .with_copy_codecs(["aac", "mp3", "opus"])
//!     .with_bitrate(128_000);
//! assert!(config.copies("opus"));
//! assert_eq!(config.bitrate(), 128_000);
//! ```

use crate::strategy::ExtractionStrategy;

/// Codecs copied without re-encoding by default. Both play directly in
/// common players.
pub const DEFAULT_COPY_CODECS: [&str; 2] = ["aac", "mp3"];

/// Encoder used when the source codec is not in the copy list.
pub const DEFAULT_ENCODER: &str = "aac";

/// Target bitrate of a re-encode, in bits per second.
pub const DEFAULT_BITRATE: usize = 192_000;

/// Settings for audio extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub(crate) strategy: ExtractionStrategy,
    pub(crate) copy_codecs: Vec<String>,
    pub(crate) encoder: String,
    pub(crate) encode_extension: String,
    pub(crate) bitrate: usize,
    pub(crate) structured_probe: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorConfig {
    /// Defaults: `ffmpeg` strategy, copy AAC and MP3, otherwise AAC at
    /// 192 kbit/s in an ADTS `.aac` file, structured probe first.
    pub fn new() -> Self {
        Self {
            strategy: ExtractionStrategy::default(),
            copy_codecs: DEFAULT_COPY_CODECS.iter().map(|codec| codec.to_string()).collect(),
            encoder: DEFAULT_ENCODER.to_string(),
            encode_extension: "aac".to_string(),
            bitrate: DEFAULT_BITRATE,
            structured_probe: true,
        }
    }

    /// Initial strategy of a controller built from this config.
    #[must_use]
    pub fn with_strategy(mut self, strategy: ExtractionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replace the list of codecs that are stream-copied.
    #[must_use]
    pub fn with_copy_codecs<I, S>(mut self, codecs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.copy_codecs = codecs
            .into_iter()
            .map(|codec| codec.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    /// Re-encode with `encoder` into a file with `extension`, e.g.
    /// `("libmp3lame", "mp3")`.
    #[must_use]
    pub fn with_encoder(mut self, encoder: impl Into<String>, extension: impl Into<String>) -> Self {
        self.encoder = encoder.into();
        self.encode_extension = extension.into().trim_start_matches('.').to_ascii_lowercase();
        self
    }

    /// Target bitrate of a re-encode in bits per second. Clamped to a
    /// minimum of 8 kbit/s.
    #[must_use]
    pub fn with_bitrate(mut self, bits_per_second: usize) -> Self {
        self.bitrate = bits_per_second.max(8_000);
        self
    }

    /// Whether to ask the engine for a structured probe before scraping
    /// diagnostics. Defaults to `true`.
    #[must_use]
    pub fn with_structured_probe(mut self, enabled: bool) -> Self {
        self.structured_probe = enabled;
        self
    }

    /// Initial strategy.
    pub fn strategy(&self) -> ExtractionStrategy {
        self.strategy
    }

    /// Whether `codec` is stream-copied.
    pub fn copies(&self, codec: &str) -> bool {
        self.copy_codecs
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(codec))
    }

    /// Encoder used for re-encodes.
    pub fn encoder(&self) -> &str {
        &self.encoder
    }

    /// Output extension used for re-encodes.
    pub fn encode_extension(&self) -> &str {
        &self.encode_extension
    }

    /// Re-encode bitrate in bits per second.
    pub fn bitrate(&self) -> usize {
        self.bitrate
    }

    /// Whether the structured probe is tried first.
    pub fn structured_probe(&self) -> bool {
        self.structured_probe
    }
}
