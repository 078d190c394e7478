//! In-process engine on the linked FFmpeg libraries.
//!
//! [`NativeEngine`] interprets an [`Invocation`] with `ffmpeg-next` instead of
//! handing it to an executable:
//!
//! - a probe opens the input and renders a stream summary in the same
//!   `Stream #0:N: Audio: <codec>` shape the `ffmpeg` tool prints;
//! - `-c:a copy` copies the audio packets into a new container without
//!   decoding them (equivalent to `ffmpeg -i in -map 0:a -c:a copy out`);
//! - `-c:a <encoder>` runs decode → filter graph → encode. The filter graph
//!   converts sample format, layout and rate for the encoder and re-chunks
//!   frames to the encoder's fixed frame size.
//!
//! Video, subtitle and data streams are never carried into the output, with
//! or without `-vn`. The output container is chosen from the output file
//! extension.

use std::{
    ffi::CString,
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    ChannelLayout, Packet, Rational,
    codec::{self, Id, context::Context as CodecContext},
    decoder::Audio as AudioDecoder,
    encoder::Audio as AudioEncoder,
    filter::Graph as FilterGraph,
    format::{self, Sample, context::Input, context::Output, sample::Type as SampleType},
    frame::Audio as AudioFrame,
    media::Type,
};

use crate::{
    engine::{Engine, ExecOutput},
    error::ExtractorError,
    ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level},
    invocation::{AudioCodecChoice, Invocation},
    probe::StructuredProbe,
    workspace::Workspace,
};

/// Filters every re-encode needs.
const REQUIRED_FILTERS: [&str; 3] = ["abuffer", "abuffersink", "anull"];

/// Muxers for the two stream-copy outputs, `output.aac` and `output.mp3`.
const REQUIRED_MUXERS: [&str; 2] = ["adts", "mp3"];

/// Engine running on the FFmpeg libraries linked into this process.
///
/// # Example
///
/// ```no_run
/// use audio_extractor::{Engine, Invocation, NativeEngine};
///
/// let mut engine = NativeEngine::new();
/// engine.load()?;
/// engine.write_file("input.mp4", &std::fs::read("clip.mp4")?)?;
/// engine.exec(&Invocation::stream_copy("input.mp4", "output.aac"))?;
/// let audio = engine.read_file("output.aac")?;
/// # Ok::<(), audio_extractor::ExtractorError>(())
/// ```
#[derive(Debug)]
pub struct NativeEngine {
    workspace: Option<Workspace>,
    scratch_parent: Option<PathBuf>,
    log_level: Option<FfmpegLogLevel>,
    required_encoders: Vec<String>,
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine {
    /// Create an engine that requires the `aac` encoder and keeps its
    /// scratch files in the system temporary directory.
    pub fn new() -> Self {
        Self {
            workspace: None,
            scratch_parent: None,
            log_level: None,
            required_encoders: vec!["aac".to_string()],
        }
    }

    /// Keep scratch files under `parent`.
    #[must_use]
    pub fn with_scratch_dir<P: AsRef<Path>>(mut self, parent: P) -> Self {
        self.scratch_parent = Some(parent.as_ref().to_path_buf());
        self
    }

    /// Apply `level` to the FFmpeg libraries when the engine loads.
    #[must_use]
    pub fn with_log_level(mut self, level: FfmpegLogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Fail loading unless the named encoder is available.
    #[must_use]
    pub fn with_required_encoder(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.required_encoders.contains(&name) {
            self.required_encoders.push(name);
        }
        self
    }

    fn workspace(&self) -> Result<&Workspace, ExtractorError> {
        self.workspace.as_ref().ok_or(ExtractorError::EngineNotReady)
    }

    fn check_components(&self) -> Result<(), ExtractorError> {
        for name in &self.required_encoders {
            if ffmpeg_next::encoder::find_by_name(name).is_none() {
                return Err(ExtractorError::MissingComponent(format!("encoder '{name}'")));
            }
        }
        for name in REQUIRED_FILTERS {
            if ffmpeg_next::filter::find(name).is_none() {
                return Err(ExtractorError::MissingComponent(format!("filter '{name}'")));
            }
        }
        for name in REQUIRED_MUXERS {
            if !muxer_available(name) {
                return Err(ExtractorError::MissingComponent(format!("muxer '{name}'")));
            }
        }
        Ok(())
    }
}

impl Engine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn load(&mut self) -> Result<(), ExtractorError> {
        ffmpeg_next::init().map_err(|error| {
            ExtractorError::EngineLoad(format!("FFmpeg initialisation failed: {error}"))
        })?;
        if let Some(level) = self.log_level {
            set_ffmpeg_log_level(level);
        }
        self.check_components()
            .map_err(|error| ExtractorError::EngineLoad(error.to_string()))?;

        let workspace = match &self.scratch_parent {
            Some(parent) => Workspace::new_in(parent),
            None => Workspace::new(),
        }
        .map_err(|error| ExtractorError::EngineLoad(error.to_string()))?;
        self.workspace = Some(workspace);
        Ok(())
    }

    fn unload(&mut self) {
        self.workspace = None;
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), ExtractorError> {
        self.workspace()?.write(name, data)
    }

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>, ExtractorError> {
        self.workspace()?.read(name)
    }

    fn delete_file(&mut self, name: &str) -> Result<(), ExtractorError> {
        self.workspace()?.remove(name)
    }

    fn exec(&mut self, invocation: &Invocation) -> Result<ExecOutput, ExtractorError> {
        let workspace = self.workspace()?;
        let input_path = workspace.resolve(&invocation.input)?;
        log::debug!("native engine: {invocation}");

        let input_context = open_input(&input_path)?;
        let mut diagnostics = describe_input(&invocation.input, &input_context);
        drop(input_context);

        let Some(output) = &invocation.output else {
            return Ok(ExecOutput { diagnostics });
        };

        let output_path = workspace.resolve(output)?;
        if output_path.exists() && !invocation.overwrite {
            return Err(ExtractorError::Invocation(format!(
                "output {output} already exists (pass -y to overwrite)"
            )));
        }

        let result = match &invocation.audio {
            Some(AudioCodecChoice::Copy) => {
                copy_audio(&input_path, &output_path, invocation.map_audio)
            }
            Some(AudioCodecChoice::Encode { codec, bitrate }) => {
                encode_audio(&input_path, &output_path, codec, *bitrate)
            }
            None => Err(ExtractorError::UnsupportedArgument(
                "an output requires -c:a".to_string(),
            )),
        };

        if let Err(error) = result {
            // A failed muxer leaves a truncated file behind.
            if let Err(cleanup) = std::fs::remove_file(&output_path)
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                log::warn!("Failed to remove partial output {output}: {cleanup}");
            }
            return Err(error);
        }

        diagnostics.push_str(&format!("\nOutput #0, to '{output}'"));
        Ok(ExecOutput { diagnostics })
    }

    fn probe_audio_codec(&mut self, name: &str) -> Result<StructuredProbe, ExtractorError> {
        let path = self.workspace()?.resolve(name)?;
        let input_context = open_input(&path)?;
        let probe = match input_context.streams().best(Type::Audio) {
            Some(stream) => StructuredProbe::Codec(stream.parameters().id().name().to_string()),
            None => StructuredProbe::NoAudio,
        };
        Ok(probe)
    }
}

/// Whether the linked FFmpeg build has the muxer with short name `name`.
fn muxer_available(name: &str) -> bool {
    let Ok(short_name) = CString::new(name) else {
        return false;
    };
    // SAFETY: `av_guess_format` only reads the NUL-terminated name and returns
    // a pointer into FFmpeg's static muxer table, or null. The pointer is not
    // dereferenced.
    let muxer = unsafe {
        ffmpeg_next::ffi::av_guess_format(short_name.as_ptr(), std::ptr::null(), std::ptr::null())
    };
    !muxer.is_null()
}

fn open_input(path: &Path) -> Result<Input, ExtractorError> {
    format::input(&path).map_err(|error| ExtractorError::FileOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

/// Render a stream summary shaped like the `ffmpeg` tool's input dump.
fn describe_input(name: &str, input_context: &Input) -> String {
    let mut lines = vec![format!(
        "Input #0, {}, from '{name}':",
        input_context.format().name()
    )];

    let duration_microseconds = input_context.duration();
    if duration_microseconds > 0 {
        lines.push(format!(
            "  Duration: {:.2}s",
            duration_microseconds as f64 / 1_000_000.0
        ));
    }

    for stream in input_context.streams() {
        let parameters = stream.parameters();
        let kind = match parameters.medium() {
            Type::Video => "Video",
            Type::Audio => "Audio",
            Type::Subtitle => "Subtitle",
            Type::Data => "Data",
            Type::Attachment => "Attachment",
            _ => "Unknown",
        };
        lines.push(format!(
            "  Stream #0:{}: {kind}: {}",
            stream.index(),
            parameters.id().name()
        ));
    }

    lines.join("\n")
}

/// Copy audio packets into a new container without decoding them.
///
/// With `all_audio` every audio stream is mapped (`-map 0:a`); otherwise only
/// the best one is.
fn copy_audio(
    input_path: &Path,
    output_path: &Path,
    all_audio: bool,
) -> Result<(), ExtractorError> {
    let mut input_context = open_input(input_path)?;
    let best_audio = input_context
        .streams()
        .best(Type::Audio)
        .map(|stream| stream.index())
        .ok_or(ExtractorError::NoAudioStream)?;

    let mut output_context = format::output(&output_path).map_err(|error| {
        ExtractorError::StreamCopyError(format!("Failed to create output: {error}"))
    })?;

    // input stream index → output stream index
    let mut stream_map: Vec<Option<usize>> = Vec::new();
    let mut output_stream_count = 0_usize;

    for stream in input_context.streams() {
        let include = stream.parameters().medium() == Type::Audio
            && (all_audio || stream.index() == best_audio);

        if include {
            let mut output_stream =
                output_context.add_stream(ffmpeg_next::encoder::find(Id::None))?;
            output_stream.set_parameters(stream.parameters());
            // Let the muxer pick a tag valid for its container.
            unsafe {
                (*output_stream.parameters().as_mut_ptr()).codec_tag = 0;
            }
            stream_map.push(Some(output_stream_count));
            output_stream_count += 1;
        } else {
            stream_map.push(None);
        }
    }

    output_context
        .write_header()
        .map_err(|error| ExtractorError::StreamCopyError(error.to_string()))?;

    for (stream, mut packet) in input_context.packets() {
        let Some(output_index) = stream_map.get(stream.index()).copied().flatten() else {
            continue;
        };

        let output_time_base = output_context
            .stream(output_index)
            .ok_or_else(|| {
                ExtractorError::StreamCopyError(format!("missing output stream {output_index}"))
            })?
            .time_base();

        packet.set_stream(output_index);
        packet.rescale_ts(stream.time_base(), output_time_base);
        packet.set_position(-1);
        packet
            .write_interleaved(&mut output_context)
            .map_err(|error| ExtractorError::StreamCopyError(error.to_string()))?;
    }

    output_context
        .write_trailer()
        .map_err(|error| ExtractorError::StreamCopyError(error.to_string()))?;
    Ok(())
}

/// Decode the best audio stream and encode it with `codec_name`.
fn encode_audio(
    input_path: &Path,
    output_path: &Path,
    codec_name: &str,
    bitrate: Option<usize>,
) -> Result<(), ExtractorError> {
    let mut input_context = open_input(input_path)?;

    let (stream_index, input_time_base, decoder_context) = {
        let stream = input_context
            .streams()
            .best(Type::Audio)
            .ok_or(ExtractorError::NoAudioStream)?;
        (
            stream.index(),
            stream.time_base(),
            CodecContext::from_parameters(stream.parameters())?,
        )
    };

    let decoder = decoder_context
        .decoder()
        .audio()
        .map_err(|error| ExtractorError::AudioDecodeError(error.to_string()))?;

    let output_codec = ffmpeg_next::encoder::find_by_name(codec_name)
        .ok_or_else(|| ExtractorError::MissingComponent(format!("encoder '{codec_name}'")))?;

    let sample_format = output_codec
        .audio()
        .ok()
        .and_then(|audio_codec| audio_codec.formats())
        .and_then(|mut formats| formats.next())
        .unwrap_or(Sample::I16(SampleType::Packed));

    let channel_layout = if decoder.channel_layout().is_empty() {
        ChannelLayout::default(i32::from(decoder.channels()))
    } else {
        decoder.channel_layout()
    };
    let sample_rate = decoder.rate();

    let mut output_context = format::output(&output_path).map_err(|error| {
        ExtractorError::AudioEncodeError(format!("Failed to create output: {error}"))
    })?;
    let global_header = output_context
        .format()
        .flags()
        .contains(format::flag::Flags::GLOBAL_HEADER);

    let mut encoder_context = CodecContext::new()
        .encoder()
        .audio()
        .map_err(|error| ExtractorError::AudioEncodeError(error.to_string()))?;
    encoder_context.set_rate(sample_rate as i32);
    encoder_context.set_channel_layout(channel_layout);
    encoder_context.set_format(sample_format);
    encoder_context.set_time_base(Rational(1, sample_rate as i32));
    if let Some(bits_per_second) = bitrate {
        encoder_context.set_bit_rate(bits_per_second);
    }
    if global_header {
        encoder_context.set_flags(codec::flag::Flags::GLOBAL_HEADER);
    }

    let encoder = encoder_context
        .open_as(output_codec)
        .map_err(|error| ExtractorError::AudioEncodeError(error.to_string()))?;
    let encoder_time_base = Rational(1, sample_rate as i32);

    {
        let mut output_stream = output_context.add_stream(output_codec)?;
        output_stream.set_parameters(&encoder);
        output_stream.set_time_base(encoder_time_base);
    }

    output_context
        .write_header()
        .map_err(|error| ExtractorError::AudioEncodeError(error.to_string()))?;

    let output_time_base = output_context
        .stream(0)
        .ok_or_else(|| ExtractorError::AudioEncodeError("missing output stream".to_string()))?
        .time_base();

    let variable_frame_size = output_codec
        .capabilities()
        .contains(codec::capabilities::Capabilities::VARIABLE_FRAME_SIZE);
    let graph = build_filter_graph(
        &decoder,
        channel_layout,
        input_time_base,
        &encoder,
        variable_frame_size,
    )?;

    let mut pipeline = AudioPipeline {
        decoder,
        graph,
        encoder,
        encoder_time_base,
        output_time_base,
        decoded: AudioFrame::empty(),
        filtered: AudioFrame::empty(),
        encoded: Packet::empty(),
        samples_written: 0,
    };

    for (stream, packet) in input_context.packets() {
        if stream.index() != stream_index {
            continue;
        }
        pipeline.push_packet(&packet, &mut output_context)?;
    }
    pipeline.finish(&mut output_context)?;

    output_context
        .write_trailer()
        .map_err(|error| ExtractorError::AudioEncodeError(error.to_string()))?;
    Ok(())
}

/// Build `abuffer → anull → abuffersink`, with the sink constrained to the
/// encoder's sample format, layout and rate. FFmpeg inserts the conversion
/// filters needed to satisfy those constraints.
fn build_filter_graph(
    decoder: &AudioDecoder,
    channel_layout: ChannelLayout,
    input_time_base: Rational,
    encoder: &AudioEncoder,
    variable_frame_size: bool,
) -> Result<FilterGraph, ExtractorError> {
    let filter_error = |stage: &str, error: ffmpeg_next::Error| {
        ExtractorError::FilterGraphError(format!("{stage}: {error}"))
    };

    let mut graph = FilterGraph::new();

    let buffer_args = format!(
        "time_base={}/{}:sample_rate={}:sample_fmt={}:channel_layout=0x{:x}",
        input_time_base.numerator(),
        input_time_base.denominator(),
        decoder.rate(),
        decoder.format().name(),
        channel_layout.bits(),
    );

    let abuffer = ffmpeg_next::filter::find("abuffer")
        .ok_or_else(|| ExtractorError::MissingComponent("filter 'abuffer'".to_string()))?;
    graph
        .add(&abuffer, "in", &buffer_args)
        .map_err(|error| filter_error("Failed to add abuffer filter", error))?;

    let abuffersink = ffmpeg_next::filter::find("abuffersink")
        .ok_or_else(|| ExtractorError::MissingComponent("filter 'abuffersink'".to_string()))?;
    graph
        .add(&abuffersink, "out", "")
        .map_err(|error| filter_error("Failed to add abuffersink filter", error))?;

    {
        let mut sink = graph
            .get("out")
            .ok_or_else(|| ExtractorError::FilterGraphError("Filter 'out' not found".to_string()))?;
        sink.set_sample_format(encoder.format());
        sink.set_channel_layout(encoder.channel_layout());
        sink.set_sample_rate(encoder.rate());
    }

    graph
        .output("in", 0)
        .map_err(|error| filter_error("Filter graph output error", error))?
        .input("out", 0)
        .map_err(|error| filter_error("Filter graph input error", error))?
        .parse("anull")
        .map_err(|error| filter_error("Filter graph parse error", error))?;

    graph
        .validate()
        .map_err(|error| filter_error("Filter graph validation", error))?;

    if !variable_frame_size {
        graph
            .get("out")
            .ok_or_else(|| ExtractorError::FilterGraphError("Filter 'out' not found".to_string()))?
            .sink()
            .set_frame_size(encoder.frame_size());
    }

    Ok(graph)
}

/// Decoder, filter graph and encoder of one re-encode, with their scratch
/// frames.
struct AudioPipeline {
    decoder: AudioDecoder,
    graph: FilterGraph,
    encoder: AudioEncoder,
    encoder_time_base: Rational,
    output_time_base: Rational,
    decoded: AudioFrame,
    filtered: AudioFrame,
    encoded: Packet,
    /// Output timestamps are assigned from this running sample count.
    samples_written: i64,
}

impl AudioPipeline {
    fn push_packet(&mut self, packet: &Packet, output: &mut Output) -> Result<(), ExtractorError> {
        self.decoder
            .send_packet(packet)
            .map_err(|error| ExtractorError::AudioDecodeError(error.to_string()))?;
        self.drain_decoder(output)
    }

    fn finish(&mut self, output: &mut Output) -> Result<(), ExtractorError> {
        let _ = self.decoder.send_eof();
        self.drain_decoder(output)?;

        self.graph
            .get("in")
            .ok_or_else(|| ExtractorError::FilterGraphError("Filter 'in' not found".to_string()))?
            .source()
            .flush()
            .map_err(|error| ExtractorError::FilterGraphError(error.to_string()))?;
        self.drain_filter(output)?;

        let _ = self.encoder.send_eof();
        self.drain_encoder(output)
    }

    fn drain_decoder(&mut self, output: &mut Output) -> Result<(), ExtractorError> {
        while self.decoder.receive_frame(&mut self.decoded).is_ok() {
            let timestamp = self.decoded.timestamp();
            self.decoded.set_pts(timestamp);
            self.graph
                .get("in")
                .ok_or_else(|| {
                    ExtractorError::FilterGraphError("Filter 'in' not found".to_string())
                })?
                .source()
                .add(&self.decoded)
                .map_err(|error| {
                    ExtractorError::FilterGraphError(format!("Failed to feed filter: {error}"))
                })?;
            self.drain_filter(output)?;
        }
        Ok(())
    }

    fn drain_filter(&mut self, output: &mut Output) -> Result<(), ExtractorError> {
        loop {
            let received = self
                .graph
                .get("out")
                .ok_or_else(|| {
                    ExtractorError::FilterGraphError("Filter 'out' not found".to_string())
                })?
                .sink()
                .frame(&mut self.filtered)
                .is_ok();
            if !received {
                return Ok(());
            }

            self.filtered.set_pts(Some(self.samples_written));
            self.samples_written += self.filtered.samples() as i64;

            self.encoder
                .send_frame(&self.filtered)
                .map_err(|error| ExtractorError::AudioEncodeError(error.to_string()))?;
            self.drain_encoder(output)?;
        }
    }

    fn drain_encoder(&mut self, output: &mut Output) -> Result<(), ExtractorError> {
        while self.encoder.receive_packet(&mut self.encoded).is_ok() {
            self.encoded.set_stream(0);
            self.encoded
                .rescale_ts(self.encoder_time_base, self.output_time_base);
            self.encoded
                .write_interleaved(output)
                .map_err(|error| ExtractorError::AudioEncodeError(error.to_string()))?;
        }
        Ok(())
    }
}
