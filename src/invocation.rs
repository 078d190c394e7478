//! The engine invocation contract.
//!
//! Engines are driven by an argument list in `ffmpeg` command-line syntax,
//! e.g. `-i input.mp4 -map 0:a -c:a copy output.aac`. The exact flags are a
//! compatibility surface with the external executable, so the crate never
//! assembles them by hand: an [`Invocation`] is built from typed parts and
//! rendered with [`Invocation::to_args`], and argument lists coming from
//! outside are read back with [`Invocation::parse`].
//!
//! Only the subset of flags needed for audio extraction is accepted:
//!
//! | Flag | Meaning |
//! |------|---------|
//! | `-hide_banner` | Suppress the build banner in diagnostics |
//! | `-y` | Overwrite the output file |
//! | `-i <name>` | Input file (exactly one) |
//! | `-vn` | Drop video streams |
//! | `-map 0:a` | Select every audio stream of the input |
//! | `-c:a <codec>` / `-acodec <codec>` | `copy` or an encoder name |
//! | `-b:a <rate>` | Target bitrate, e.g. `192k` |
//!
//! A trailing bare word is the output file. An invocation without an output
//! is a probe: the engine only reports what it found in the input.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::ExtractorError;

/// What to do with the selected audio stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCodecChoice {
    /// Stream copy: move encoded packets into the new container untouched.
    Copy,
    /// Decode and encode with the named encoder.
    Encode {
        /// FFmpeg encoder name, e.g. `aac`.
        codec: String,
        /// Target bitrate in bits per second. `None` uses the encoder default.
        bitrate: Option<usize>,
    },
}

impl AudioCodecChoice {
    /// Whether this choice re-encodes the stream.
    pub fn is_copy(&self) -> bool {
        matches!(self, AudioCodecChoice::Copy)
    }
}

/// A single engine command, typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Workspace name of the input file.
    pub input: String,
    /// Workspace name of the output file. `None` makes this a probe.
    pub output: Option<String>,
    /// Codec handling for the audio stream. Always set when `output` is.
    pub audio: Option<AudioCodecChoice>,
    /// `-map 0:a`.
    pub map_audio: bool,
    /// `-vn`.
    pub drop_video: bool,
    /// `-hide_banner`.
    pub hide_banner: bool,
    /// `-y`.
    pub overwrite: bool,
}

impl Invocation {
    /// A probe-only invocation: `-hide_banner -i <input>`.
    ///
    /// The engine reads the input's stream summary into its diagnostics and
    /// produces no output file.
    pub fn probe(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: None,
            audio: None,
            map_audio: false,
            drop_video: false,
            hide_banner: true,
            overwrite: false,
        }
    }

    /// `-i <input> -map 0:a -c:a copy <output>`.
    pub fn stream_copy(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: Some(output.into()),
            audio: Some(AudioCodecChoice::Copy),
            map_audio: true,
            drop_video: false,
            hide_banner: false,
            overwrite: false,
        }
    }

    /// `-i <input> -map 0:a -c:a <codec> -b:a <bitrate> <output>`.
    pub fn re_encode(
        input: impl Into<String>,
        output: impl Into<String>,
        codec: impl Into<String>,
        bitrate: Option<usize>,
    ) -> Self {
        Self {
            input: input.into(),
            output: Some(output.into()),
            audio: Some(AudioCodecChoice::Encode {
                codec: codec.into(),
                bitrate,
            }),
            map_audio: true,
            drop_video: false,
            hide_banner: false,
            overwrite: false,
        }
    }

    /// Add `-y` so an existing output is replaced.
    #[must_use]
    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Whether this invocation only probes the input.
    pub fn is_probe(&self) -> bool {
        self.output.is_none()
    }

    /// Render the argument list in `ffmpeg` command-line syntax.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.hide_banner {
            args.push("-hide_banner".to_string());
        }
        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-i".to_string());
        args.push(self.input.clone());
        if self.drop_video {
            args.push("-vn".to_string());
        }
        if self.map_audio {
            args.push("-map".to_string());
            args.push("0:a".to_string());
        }
        match &self.audio {
            Some(AudioCodecChoice::Copy) => {
                args.push("-c:a".to_string());
                args.push("copy".to_string());
            }
            Some(AudioCodecChoice::Encode { codec, bitrate }) => {
                args.push("-c:a".to_string());
                args.push(codec.clone());
                if let Some(bitrate) = bitrate {
                    args.push("-b:a".to_string());
                    args.push(format_bitrate(*bitrate));
                }
            }
            None => {}
        }
        if let Some(output) = &self.output {
            args.push(output.clone());
        }
        args
    }

    /// Parse an argument list in `ffmpeg` command-line syntax.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::UnsupportedArgument`] for flags outside the
    /// accepted subset, a missing flag value, a missing `-i`, more than one
    /// input or output, or an output without `-c:a`. Returns
    /// [`ExtractorError::InvalidBitrate`] for a malformed `-b:a` value.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, ExtractorError> {
        let mut input: Option<String> = None;
        let mut output: Option<String> = None;
        let mut codec: Option<String> = None;
        let mut bitrate: Option<usize> = None;
        let mut map_audio = false;
        let mut drop_video = false;
        let mut hide_banner = false;
        let mut overwrite = false;

        let mut tokens = args.iter().map(|arg| arg.as_ref());
        while let Some(token) = tokens.next() {
            match token {
                "-hide_banner" => hide_banner = true,
                "-y" => overwrite = true,
                "-vn" => drop_video = true,
                "-i" => {
                    let value = flag_value(token, tokens.next())?;
                    if input.replace(value.to_string()).is_some() {
                        return Err(ExtractorError::UnsupportedArgument(
                            "only one -i input is supported".to_string(),
                        ));
                    }
                }
                "-map" => {
                    let value = flag_value(token, tokens.next())?;
                    if value != "0:a" {
                        return Err(ExtractorError::UnsupportedArgument(format!(
                            "-map {value} (only 0:a is supported)"
                        )));
                    }
                    map_audio = true;
                }
                "-c:a" | "-acodec" => {
                    codec = Some(flag_value(token, tokens.next())?.to_string());
                }
                "-b:a" => {
                    bitrate = Some(parse_bitrate(flag_value(token, tokens.next())?)?);
                }
                flag if flag.starts_with('-') => {
                    return Err(ExtractorError::UnsupportedArgument(flag.to_string()));
                }
                name => {
                    if output.replace(name.to_string()).is_some() {
                        return Err(ExtractorError::UnsupportedArgument(format!(
                            "unexpected second output {name}"
                        )));
                    }
                }
            }
        }

        let input = input.ok_or_else(|| {
            ExtractorError::UnsupportedArgument("missing -i input".to_string())
        })?;

        let audio = match (codec, &output) {
            (None, None) => None,
            (None, Some(_)) => {
                return Err(ExtractorError::UnsupportedArgument(
                    "an output requires -c:a".to_string(),
                ));
            }
            (Some(codec), _) if codec == "copy" => {
                if bitrate.is_some() {
                    log::warn!("Ignoring -b:a for a stream copy");
                }
                Some(AudioCodecChoice::Copy)
            }
            (Some(codec), _) => Some(AudioCodecChoice::Encode { codec, bitrate }),
        };

        Ok(Self {
            input,
            output,
            audio,
            map_audio,
            drop_video,
            hide_banner,
            overwrite,
        })
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.to_args().join(" "))
    }
}

fn flag_value<'a>(flag: &str, value: Option<&'a str>) -> Result<&'a str, ExtractorError> {
    value.ok_or_else(|| ExtractorError::UnsupportedArgument(format!("{flag} requires a value")))
}

/// Parse a bitrate such as `192k`, `1M` or `128000` into bits per second.
///
/// # Errors
///
/// Returns [`ExtractorError::InvalidBitrate`] for anything else, including
/// zero.
pub fn parse_bitrate(value: &str) -> Result<usize, ExtractorError> {
    let trimmed = value.trim();
    let (digits, multiplier) = match trimmed.char_indices().last() {
        Some((index, 'k' | 'K')) => (&trimmed[..index], 1_000),
        Some((index, 'm' | 'M')) => (&trimmed[..index], 1_000_000),
        _ => (trimmed, 1),
    };
    digits
        .parse::<usize>()
        .ok()
        .and_then(|number| number.checked_mul(multiplier))
        .filter(|&bits| bits > 0)
        .ok_or_else(|| ExtractorError::InvalidBitrate(value.to_string()))
}

/// Render a bitrate the way `ffmpeg` users write it: `192000` → `192k`.
pub fn format_bitrate(bits_per_second: usize) -> String {
    if bits_per_second >= 1_000 && bits_per_second % 1_000 == 0 {
        format!("{}k", bits_per_second / 1_000)
    } else {
        bits_per_second.to_string()
    }
}
