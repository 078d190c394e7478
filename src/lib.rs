//! # audio-extractor
//!
//! Pull the audio track out of a video file, fast when possible.
//!
//! `audio-extractor` probes the input's audio codec and then runs a single
//! media-tool invocation: a lossless stream copy when the codec already plays
//! everywhere (AAC, MP3), a re-encode to AAC at 192 kbit/s otherwise. The
//! invocation runs against an [`Engine`]: either FFmpeg linked in-process via
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) ([`NativeEngine`]),
//! or the `ffmpeg`/`ffprobe` executables ([`CommandEngine`]).
//!
//! ## Quick Start
//!
//! ### Extract Audio
//!
//! ```no_run
//! use audio_extractor::{EngineSession, ExtractorConfig, MediaInput, NativeEngine, extract};
//!
//! let mut session = EngineSession::new(NativeEngine::new());
//! let input = MediaInput::from_path("input.mp4")?;
//!
//! if let Some(clip) = extract::run(&mut session, &input, &ExtractorConfig::new())? {
//!     clip.save(format!("input.{}", clip.file_extension().unwrap_or("aac")))?;
//! }
//! # Ok::<(), audio_extractor::ExtractorError>(())
//! ```
//!
//! ### Drive It Like a UI
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use audio_extractor::{
//!     CommandEngine, EngineSession, ExtractionController, ExtractionStrategy, ExtractorConfig,
//!     MediaInput, StateKind, StateObserver,
//! };
//!
//! struct Busy;
//!
//! impl StateObserver for Busy {
//!     fn on_transition(&self, _from: StateKind, to: StateKind) {
//!         println!("busy: {}", to == StateKind::Extracting);
//!     }
//! }
//!
//! let session = EngineSession::new(CommandEngine::new());
//! let mut controller =
//!     ExtractionController::new(session, ExtractorConfig::new()).with_observer(Arc::new(Busy));
//!
//! controller.set_strategy(ExtractionStrategy::Ffmpeg);
//! let clip = controller.handle(MediaInput::from_path("input.mkv")?);
//! println!("playable: {}", clip.is_some_and(|clip| clip.is_playable()));
//! # Ok::<(), audio_extractor::ExtractorError>(())
//! ```
//!
//! ## Features
//!
//! - **Codec-aware extraction**: stream copy for playable codecs, re-encode
//!   for the rest
//! - **Two engines**: in-process FFmpeg libraries or external executables
//! - **Lazy, retryable engine loading** through [`EngineSession`]
//! - **Explicit controller state machine** with observers for busy
//!   indicators
//! - **Typed invocations**: [`Invocation`] renders and parses the exact
//!   `ffmpeg` argument syntax
//!
//! ## Requirements
//!
//! [`NativeEngine`] needs the FFmpeg development libraries at build time.
//! [`CommandEngine`] needs `ffmpeg` (and optionally `ffprobe`) on `PATH` at
//! run time.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod extract;
pub mod ffmpeg;
pub mod invocation;
pub mod media;
pub mod probe;
pub mod session;
pub mod strategy;
pub mod workspace;

pub use config::ExtractorConfig;
pub use controller::{ControllerState, ExtractionController, StateKind, StateObserver};
pub use engine::{CommandEngine, Engine, ExecOutput, NativeEngine};
pub use error::ExtractorError;
pub use extract::ExtractionPlan;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use invocation::{AudioCodecChoice, Invocation};
pub use media::MediaInput;
pub use probe::{DetectedCodec, ProbeSource, StructuredProbe, parse_ffprobe_json, scrape_audio_codec};
pub use session::{EngineSession, EngineState};
pub use strategy::{AudioClip, ExtractionStrategy};
pub use workspace::Workspace;
