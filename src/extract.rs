//! Engine-backed audio extraction.
//!
//! One extraction is a short, fixed sequence against an
//! [`EngineSession`]:
//!
//! 1. write the input into the engine workspace as `input.<ext>`;
//! 2. detect the audio codec ([`detect_codec`]);
//! 3. plan a single invocation ([`plan_for`]): stream copy when the codec is
//!    in the copy list, re-encode otherwise;
//! 4. run it, read the output back and wrap it as an [`AudioClip`];
//! 5. remove the input and output from the workspace, whatever happened.
//!
//! An input without an extension, or without a detectable audio codec,
//! produces no clip. That is `Ok(None)`, not an error.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::{
    config::ExtractorConfig,
    engine::Engine,
    error::ExtractorError,
    invocation::Invocation,
    media::MediaInput,
    probe::{DetectedCodec, ProbeSource, StructuredProbe, scrape_audio_codec},
    session::EngineSession,
    strategy::{AudioClip, mime_for_extension},
};

/// The invocation chosen for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPlan {
    /// Detected source codec.
    pub codec: DetectedCodec,
    /// Command to run.
    pub invocation: Invocation,
    /// Workspace name of the output file.
    pub output: String,
    /// MIME type of the output file.
    pub mime: &'static str,
}

impl ExtractionPlan {
    /// Whether the plan copies the stream rather than re-encoding it.
    pub fn is_stream_copy(&self) -> bool {
        self.invocation
            .audio
            .as_ref()
            .is_some_and(|choice| choice.is_copy())
    }
}

impl Display for ExtractionPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mode = if self.is_stream_copy() { "copy" } else { "re-encode" };
        write!(f, "{} → {} ({mode}): {}", self.codec.name, self.mime, self.invocation)
    }
}

/// Container extension able to hold a copied stream of `codec`.
pub fn copy_extension(codec: &str) -> &'static str {
    match codec {
        "aac" => "aac",
        "mp3" => "mp3",
        "opus" | "vorbis" => "ogg",
        "flac" => "flac",
        "alac" => "m4a",
        pcm if pcm.starts_with("pcm_") => "wav",
        _ => "mka",
    }
}

/// Choose the invocation for an input whose audio codec is `codec`.
pub fn plan_for(codec: &DetectedCodec, input_name: &str, config: &ExtractorConfig) -> ExtractionPlan {
    let (invocation, extension) = if config.copies(&codec.name) {
        let extension = copy_extension(&codec.name);
        (
            Invocation::stream_copy(input_name, format!("output.{extension}")),
            extension.to_string(),
        )
    } else {
        let extension = config.encode_extension().to_string();
        (
            Invocation::re_encode(
                input_name,
                format!("output.{extension}"),
                config.encoder(),
                Some(config.bitrate()),
            ),
            extension,
        )
    };

    ExtractionPlan {
        codec: codec.clone(),
        output: format!("output.{extension}"),
        mime: mime_for_extension(&extension).unwrap_or("application/octet-stream"),
        invocation,
    }
}

/// Find the audio codec of the workspace file `input_name`.
///
/// Tries the engine's structured probe first (when enabled in `config`),
/// then scrapes the diagnostics of a probe-only invocation. A structured
/// probe that fails is logged and skipped.
pub fn detect_codec<E: Engine + ?Sized>(
    engine: &mut E,
    input_name: &str,
    config: &ExtractorConfig,
) -> Result<Option<DetectedCodec>, ExtractorError> {
    if config.structured_probe() {
        match engine.probe_audio_codec(input_name) {
            Ok(StructuredProbe::Codec(name)) => {
                return Ok(Some(DetectedCodec {
                    name,
                    source: ProbeSource::Structured,
                }));
            }
            Ok(StructuredProbe::NoAudio) => return Ok(None),
            Ok(StructuredProbe::Unavailable) => {}
            Err(error) => {
                log::warn!("Structured probe failed, scraping diagnostics instead: {error}");
            }
        }
    }

    let output = engine.exec(&Invocation::probe(input_name))?;
    log::trace!("probe diagnostics:\n{}", output.diagnostics);
    Ok(scrape_audio_codec(&output.diagnostics).map(|name| DetectedCodec {
        name,
        source: ProbeSource::Diagnostics,
    }))
}

/// Extract the audio of `input` through the session's engine.
///
/// Loads the engine first if needed.
///
/// # Errors
///
/// - [`ExtractorError::EngineLoad`] if the engine cannot be loaded.
/// - [`ExtractorError::Invocation`] if the engine fails or produces an empty
///   output, plus whatever the engine reports for file and codec failures.
pub fn run<E: Engine>(
    session: &mut EngineSession<E>,
    input: &MediaInput,
    config: &ExtractorConfig,
) -> Result<Option<AudioClip>, ExtractorError> {
    with_input(session, input, |engine, input_name| {
        let Some(codec) = detect_codec(engine, input_name, config)? else {
            log::warn!("No audio codec detected in {input_name}");
            return Ok(None);
        };
        log::info!("Detected audio codec {} ({:?})", codec.name, codec.source);

        let plan = plan_for(&codec, input_name, config);
        execute_plan(engine, &plan).map(Some)
    })
}

/// Detect the codec of `input` and return the plan [`run`] would execute,
/// without executing it.
pub fn inspect<E: Engine>(
    session: &mut EngineSession<E>,
    input: &MediaInput,
    config: &ExtractorConfig,
) -> Result<Option<ExtractionPlan>, ExtractorError> {
    with_input(session, input, |engine, input_name| {
        Ok(detect_codec(engine, input_name, config)?
            .map(|codec| plan_for(&codec, input_name, config)))
    })
}

/// Place `input` in the workspace, run `body`, and remove the input again.
fn with_input<E, T, F>(
    session: &mut EngineSession<E>,
    input: &MediaInput,
    body: F,
) -> Result<Option<T>, ExtractorError>
where
    E: Engine,
    F: FnOnce(&mut E, &str) -> Result<Option<T>, ExtractorError>,
{
    session.ensure_ready()?;

    let Some(input_name) = input.workspace_name() else {
        log::warn!("{} has no file extension, nothing to extract", input.name());
        return Ok(None);
    };

    let engine = session.engine_mut()?;
    log::info!(
        "Extracting audio from {} ({} bytes) with the {} engine",
        input.name(),
        input.len(),
        engine.name()
    );
    engine.write_file(&input_name, input.bytes())?;

    let result = body(&mut *engine, &input_name);

    if let Err(error) = engine.delete_file(&input_name) {
        log::warn!("Failed to remove {input_name} from the engine workspace: {error}");
    }
    result
}

fn execute_plan<E: Engine + ?Sized>(
    engine: &mut E,
    plan: &ExtractionPlan,
) -> Result<AudioClip, ExtractorError> {
    // A leftover from an earlier failed run would make the engine refuse.
    engine.delete_file(&plan.output)?;

    log::info!("Running {}", plan.invocation);
    let result = engine.exec(&plan.invocation).and_then(|output| {
        log::debug!("engine diagnostics:\n{}", output.diagnostics);
        engine.read_file(&plan.output)
    });

    if let Err(error) = engine.delete_file(&plan.output) {
        log::warn!("Failed to remove {} from the engine workspace: {error}", plan.output);
    }

    let bytes = result?;
    if bytes.is_empty() {
        return Err(ExtractorError::Invocation(format!(
            "engine produced an empty {}",
            plan.output
        )));
    }

    log::info!("Extracted {} bytes of {}", bytes.len(), plan.mime);
    Ok(AudioClip::new(bytes, plan.mime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::AudioCodecChoice;

    fn detected(name: &str) -> DetectedCodec {
        DetectedCodec {
            name: name.to_string(),
            source: ProbeSource::Diagnostics,
        }
    }

    #[test]
    fn aac_is_copied_into_adts() {
        let plan = plan_for(&detected("aac"), "input.mp4", &ExtractorConfig::new());
        assert!(plan.is_stream_copy());
        assert_eq!(plan.output, "output.aac");
        assert_eq!(plan.mime, "audio/aac");
        assert_eq!(
            plan.invocation.to_args(),
            ["-i", "input.mp4", "-map", "0:a", "-c:a", "copy", "output.aac"]
        );
    }

    #[test]
    fn mp3_is_copied_as_mpeg() {
        let plan = plan_for(&detected("mp3"), "input.avi", &ExtractorConfig::new());
        assert!(plan.is_stream_copy());
        assert_eq!(plan.output, "output.mp3");
        assert_eq!(plan.mime, "audio/mpeg");
    }

    #[test]
    fn opus_is_re_encoded_to_aac_192k() {
        let plan = plan_for(&detected("opus"), "input.mkv", &ExtractorConfig::new());
        assert!(!plan.is_stream_copy());
        assert_eq!(plan.mime, "audio/aac");
        assert_eq!(
            plan.invocation.audio,
            Some(AudioCodecChoice::Encode {
                codec: "aac".to_string(),
                bitrate: Some(192_000)
            })
        );
        assert_eq!(
            plan.invocation.to_string(),
            "-i input.mkv -map 0:a -c:a aac -b:a 192k output.aac"
        );
    }

    #[test]
    fn configured_copy_codec_uses_matching_container() {
        let config = ExtractorConfig::new().with_copy_codecs(["opus", "flac", "pcm_s16le", "ac3"]);
        assert_eq!(plan_for(&detected("opus"), "input.webm", &config).output, "output.ogg");
        assert_eq!(plan_for(&detected("flac"), "input.mkv", &config).mime, "audio/flac");
        assert_eq!(plan_for(&detected("pcm_s16le"), "input.mov", &config).output, "output.wav");
        assert_eq!(plan_for(&detected("ac3"), "input.mkv", &config).mime, "audio/x-matroska");
    }

    #[test]
    fn custom_encoder_target() {
        let config = ExtractorConfig::new()
            .with_encoder("libmp3lame", "mp3")
            .with_bitrate(128_000);
        let plan = plan_for(&detected("vorbis"), "input.webm", &config);
        assert_eq!(plan.mime, "audio/mpeg");
        assert_eq!(
            plan.invocation.to_string(),
            "-i input.webm -map 0:a -c:a libmp3lame -b:a 128k output.mp3"
        );
    }
}
