use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use audio_extractor::{
    AudioClip, CommandEngine, ControllerState, Engine, EngineSession, ExtractionController,
    ExtractionStrategy, ExtractorConfig, FfmpegLogLevel, MediaInput, NativeEngine, StateKind,
    StateObserver, extract, invocation::parse_bitrate,
};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  audio-extractor extract input.mp4\n  audio-extractor extract input.mkv --out track.aac --engine command --verbose\n  audio-extractor probe input.webm --json\n  audio-extractor completions zsh > _audio-extractor";

#[derive(Debug, Parser)]
#[command(
    name = "audio-extractor",
    version,
    about = "Extract the audio track of a video file",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum EngineKind {
    /// FFmpeg libraries linked into this binary.
    #[default]
    Native,
    /// External `ffmpeg` and `ffprobe` executables.
    Command,
}

#[derive(Debug, Args, Clone, Default)]
struct EngineOptions {
    /// Engine that runs the invocation.
    #[arg(long, value_enum, default_value_t = EngineKind::Native)]
    engine: EngineKind,

    /// Path of the `ffmpeg` executable (command engine).
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Path of the `ffprobe` executable (command engine).
    #[arg(long)]
    ffprobe: Option<PathBuf>,

    /// Skip `ffprobe` and detect the codec from `ffmpeg` diagnostics only.
    #[arg(long)]
    no_ffprobe: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract the audio track to a file.
    #[command(
        about = "Extract the audio track",
        after_help = "Examples:\n  audio-extractor extract input.mp4\n  audio-extractor extract input.mkv --out audio.aac --bitrate 128k"
    )]
    Extract {
        /// Input video path.
        input: PathBuf,

        /// Extraction strategy: ffmpeg | audio_context.
        #[arg(long, default_value = "ffmpeg")]
        strategy: String,

        /// Output file path. Defaults to the input stem with the extension
        /// of the extracted audio.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Bitrate used when the audio has to be re-encoded, e.g. 192k.
        #[arg(long, default_value = "192k")]
        bitrate: String,

        #[command(flatten)]
        engine: EngineOptions,

        /// Output a machine-readable JSON summary.
        #[arg(long)]
        json: bool,
    },

    /// Detect the audio codec and print the planned invocation.
    #[command(
        about = "Detect the audio codec",
        after_help = "Examples:\n  audio-extractor probe input.mp4\n  audio-extractor probe input.mkv --engine command --json"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,

        #[command(flatten)]
        engine: EngineOptions,

        /// Output machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn build_engine(options: &EngineOptions, log_level: Option<FfmpegLogLevel>) -> Box<dyn Engine> {
    match options.engine {
        EngineKind::Native => {
            let mut engine = NativeEngine::new();
            if let Some(level) = log_level {
                engine = engine.with_log_level(level);
            }
            Box::new(engine)
        }
        EngineKind::Command => {
            let mut engine = CommandEngine::new();
            if let Some(ffmpeg) = &options.ffmpeg {
                engine = engine.with_ffmpeg(ffmpeg);
            }
            if options.no_ffprobe {
                engine = engine.with_ffprobe(None::<PathBuf>);
            } else if let Some(ffprobe) = &options.ffprobe {
                engine = engine.with_ffprobe(Some(ffprobe));
            }
            if let Some(level) = log_level {
                engine = engine.with_log_level(level);
            }
            Box::new(engine)
        }
    }
}

fn default_output_path(input: &Path, clip: &AudioClip) -> PathBuf {
    let extension = clip.file_extension().unwrap_or("aac");
    input.with_extension(extension)
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn apply_global_options(
    global: &GlobalOptions,
) -> Result<Option<FfmpegLogLevel>, Box<dyn std::error::Error>> {
    if global.verbose {
        init_logging()?;
    }

    let Some(level) = &global.log_level else {
        return Ok(None);
    };
    let parsed = level
        .parse::<FfmpegLogLevel>()
        .map_err(|_| format!("unsupported --log-level: {level}"))?;
    Ok(Some(parsed))
}

/// Route the crate's `info` records and above to stderr. `RUST_LOG`
/// directives are applied on top.
fn init_logging() -> Result<(), log::SetLoggerError> {
    env_logger::Builder::new()
        .filter_module("audio_extractor", LevelFilter::Info)
        .format_target(false)
        .parse_default_env()
        .try_init()
}

/// Spinner shown while the engine loads and the extraction runs.
struct BusySpinner {
    bar: ProgressBar,
}

impl BusySpinner {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner:.green} {msg} {elapsed:.dim}")?);
        Ok(Self { bar })
    }
}

impl StateObserver for BusySpinner {
    fn on_transition(&self, _from: StateKind, to: StateKind) {
        match to {
            StateKind::LoadingEngine => {
                self.bar.enable_steady_tick(Duration::from_millis(100));
                self.bar.set_message("loading engine");
            }
            StateKind::Extracting => {
                self.bar.enable_steady_tick(Duration::from_millis(100));
                self.bar.set_message("extracting audio");
            }
            StateKind::Idle | StateKind::Ready | StateKind::Error => {
                self.bar.finish_and_clear();
            }
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let log_level = apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Extract {
            input,
            strategy,
            out,
            bitrate,
            engine,
            json,
        } => {
            let strategy = strategy.parse::<ExtractionStrategy>()?;
            let config = ExtractorConfig::new()
                .with_strategy(strategy)
                .with_bitrate(parse_bitrate(&bitrate)?);

            if let Some(out) = &out {
                ensure_writable_path(out, cli.global.overwrite)?;
            }
            let media = MediaInput::from_path(&input)?;
            if !media.is_video() {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("{} does not look like a video file", input.display()).yellow()
                );
            }

            let session = EngineSession::new(build_engine(&engine, log_level));
            let mut controller = ExtractionController::new(session, config);
            if !json {
                controller = controller.with_observer(Arc::new(BusySpinner::new()?));
            }

            controller.handle(media);

            let clip = match controller.state() {
                ControllerState::Ready(clip) if clip.is_playable() => clip,
                ControllerState::Error(reason) => {
                    return Err(format!("extraction unavailable: {reason}").into());
                }
                _ => {
                    if json {
                        let payload = json!({
                            "input": input.display().to_string(),
                            "strategy": strategy.to_string(),
                            "output": null,
                        });
                        println!("{}", serde_json::to_string_pretty(&payload)?);
                    } else {
                        eprintln!(
                            "{} {}",
                            "warning:".yellow().bold(),
                            format!("no playable audio extracted from {}", input.display())
                                .yellow()
                        );
                    }
                    return Ok(());
                }
            };

            let output_path = match out {
                Some(out) => out,
                None => {
                    let path = default_output_path(&input, clip);
                    ensure_writable_path(&path, cli.global.overwrite)?;
                    path
                }
            };
            if let Some(parent) = output_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            clip.save(&output_path)?;

            if json {
                let payload = json!({
                    "input": input.display().to_string(),
                    "strategy": strategy.to_string(),
                    "output": output_path.display().to_string(),
                    "mime": clip.mime(),
                    "bytes": clip.len(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {} ({}, {} bytes)",
                    "saved".green().bold(),
                    output_path.display(),
                    clip.mime().unwrap_or("unknown"),
                    clip.len()
                );
            }
        }
        Commands::Probe {
            input,
            engine,
            json,
        } => {
            let media = MediaInput::from_path(&input)?;
            let config = ExtractorConfig::new();
            let mut session = EngineSession::new(build_engine(&engine, log_level));
            let plan = extract::inspect(&mut session, &media, &config)?;
            session.shutdown();

            if json {
                let payload = json!({
                    "input": input.display().to_string(),
                    "codec": plan.as_ref().map(|plan| plan.codec.name.clone()),
                    "source": plan.as_ref().map(|plan| format!("{:?}", plan.codec.source).to_ascii_lowercase()),
                    "stream_copy": plan.as_ref().map(|plan| plan.is_stream_copy()),
                    "mime": plan.as_ref().map(|plan| plan.mime),
                    "arguments": plan.as_ref().map(|plan| plan.invocation.to_args()),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if let Some(plan) = plan {
                println!("Codec: {} ({:?})", plan.codec.name, plan.codec.source);
                println!(
                    "Mode: {}",
                    if plan.is_stream_copy() { "stream copy" } else { "re-encode" }
                );
                println!("Output: {}", plan.mime);
                println!("Arguments: {}", plan.invocation);
            } else {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("no audio codec detected in {}", input.display()).yellow()
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "audio-extractor", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
