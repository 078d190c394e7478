//! Shared test doubles.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    f64::consts::TAU,
    path::{Path, PathBuf},
    process::Command,
    sync::{Arc, Mutex},
};

use audio_extractor::{
    Engine, ExecOutput, ExtractorError, Invocation, MediaInput, StateKind, StateObserver,
    StructuredProbe,
};

/// Ordered record of engine calls and controller transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Load,
    Exec(Vec<String>),
    Transition(StateKind, StateKind),
}

pub type Journal = Arc<Mutex<Vec<Event>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(journal: &Journal) -> Vec<Event> {
    journal.lock().unwrap().clone()
}

/// Stream summary as FFmpeg prints it for an input with one audio stream.
pub fn diagnostics_with_audio(codec: &str) -> String {
    format!(
        "Input #0, matroska,webm, from 'input.mkv':\n  Duration: 00:00:05.00, start: 0.000000, bitrate: 812 kb/s\n  Stream #0:0: Video: vp9 (Profile 0), yuv420p(tv), 640x360, 30 fps\n  Stream #0:1(eng): Audio: {codec}, 48000 Hz, stereo, fltp (default)\n"
    )
}

/// Stream summary of a silent video.
pub fn diagnostics_without_audio() -> String {
    "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'input.mp4':\n  Stream #0:0[0x1](und): Video: h264 (High) (avc1 / 0x31637661), yuv420p, 640x360\n"
        .to_string()
}

/// Scripted in-memory engine.
#[derive(Debug)]
pub struct FakeEngine {
    /// Number of load attempts that fail before one succeeds.
    pub failing_loads: u32,
    pub load_count: u32,
    pub loaded: bool,
    pub files: HashMap<String, Vec<u8>>,
    /// Diagnostics returned by probe invocations.
    pub diagnostics: String,
    /// Answer of the structured probe.
    pub structured: StructuredProbe,
    /// Bytes written to the output of a conversion invocation.
    pub output: Vec<u8>,
    /// Fail every conversion invocation.
    pub fail_exec: bool,
    pub executed: Vec<Vec<String>>,
    pub journal: Option<Journal>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            failing_loads: 0,
            load_count: 0,
            loaded: false,
            files: HashMap::new(),
            diagnostics: String::new(),
            structured: StructuredProbe::Unavailable,
            output: b"\xFF\xF1\x50\x80\x02\x1F\xFC".to_vec(),
            fail_exec: false,
            executed: Vec::new(),
            journal: None,
        }
    }
}

impl FakeEngine {
    /// An engine whose probe reports an audio stream of `codec`.
    pub fn with_audio(codec: &str) -> Self {
        Self {
            diagnostics: diagnostics_with_audio(codec),
            ..Self::default()
        }
    }

    pub fn without_audio() -> Self {
        Self {
            diagnostics: diagnostics_without_audio(),
            ..Self::default()
        }
    }

    pub fn failing_to_load(times: u32) -> Self {
        Self {
            failing_loads: times,
            ..Self::with_audio("aac")
        }
    }

    pub fn journaled(mut self, journal: &Journal) -> Self {
        self.journal = Some(Arc::clone(journal));
        self
    }

    fn record(&self, event: Event) {
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(event);
        }
    }

    fn require_loaded(&self) -> Result<(), ExtractorError> {
        if self.loaded {
            Ok(())
        } else {
            Err(ExtractorError::EngineNotReady)
        }
    }
}

impl Engine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn load(&mut self) -> Result<(), ExtractorError> {
        self.load_count += 1;
        self.record(Event::Load);
        if self.load_count <= self.failing_loads {
            return Err(ExtractorError::EngineLoad("artifact fetch failed".to_string()));
        }
        self.loaded = true;
        Ok(())
    }

    fn unload(&mut self) {
        self.loaded = false;
        self.files.clear();
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), ExtractorError> {
        self.require_loaded()?;
        self.files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>, ExtractorError> {
        self.require_loaded()?;
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| ExtractorError::FileOpen {
                path: PathBuf::from(name),
                reason: "no such file".to_string(),
            })
    }

    fn delete_file(&mut self, name: &str) -> Result<(), ExtractorError> {
        self.require_loaded()?;
        self.files.remove(name);
        Ok(())
    }

    fn exec(&mut self, invocation: &Invocation) -> Result<ExecOutput, ExtractorError> {
        self.require_loaded()?;
        let args = invocation.to_args();
        self.record(Event::Exec(args.clone()));
        self.executed.push(args);

        if !self.files.contains_key(&invocation.input) {
            return Err(ExtractorError::Invocation(format!(
                "{}: No such file or directory",
                invocation.input
            )));
        }
        let Some(output) = &invocation.output else {
            return Ok(ExecOutput {
                diagnostics: self.diagnostics.clone(),
            });
        };
        if self.fail_exec {
            return Err(ExtractorError::Invocation("Conversion failed!".to_string()));
        }
        self.files.insert(output.clone(), self.output.clone());
        Ok(ExecOutput::default())
    }

    fn probe_audio_codec(&mut self, _name: &str) -> Result<StructuredProbe, ExtractorError> {
        self.require_loaded()?;
        Ok(self.structured.clone())
    }
}

/// Observer that appends every transition to a journal.
#[derive(Debug)]
pub struct RecordingObserver {
    journal: Journal,
}

impl RecordingObserver {
    pub fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::clone(journal),
        })
    }
}

impl StateObserver for RecordingObserver {
    fn on_transition(&self, from: StateKind, to: StateKind) {
        self.journal
            .lock()
            .unwrap()
            .push(Event::Transition(from, to));
    }
}

/// Whether an `ffmpeg` executable is on `PATH`.
pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .args(["-hide_banner", "-version"])
        .output()
        .is_ok_and(|output| output.status.success())
}

/// Render one second of a 440 Hz tone with `codec` into `name` under
/// `directory`. `None` when the local `ffmpeg` cannot produce it.
pub fn tone(directory: &Path, name: &str, codec: &str) -> Option<MediaInput> {
    let path = directory.join(name);
    let status = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
        .arg("sine=frequency=440:duration=1")
        .args(["-c:a", codec])
        .arg(&path)
        .status()
        .ok()?;
    if !status.success() {
        return None;
    }
    Some(MediaInput::from_path(&path).expect("Failed to read generated input"))
}

/// One second of a 440 Hz tone as a 16-bit mono 44.1 kHz PCM WAV file.
pub fn wav_tone(name: &str) -> MediaInput {
    const SAMPLE_RATE: u32 = 44_100;

    let samples: Vec<u8> = (0..SAMPLE_RATE)
        .flat_map(|index| {
            let phase = TAU * 440.0 * f64::from(index) / f64::from(SAMPLE_RATE);
            ((phase.sin() * 0.5 * f64::from(i16::MAX)) as i16).to_le_bytes()
        })
        .collect();
    let data_length = samples.len() as u32;

    let mut bytes = Vec::with_capacity(44 + samples.len());
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_length).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1_u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    bytes.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    bytes.extend_from_slice(&2_u16.to_le_bytes());
    bytes.extend_from_slice(&16_u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_length.to_le_bytes());
    bytes.extend_from_slice(&samples);

    MediaInput::new(name, bytes)
}

/// Concatenated raw AAC payloads of an ADTS stream, headers stripped.
pub fn adts_payloads(mut bytes: &[u8]) -> Vec<u8> {
    let mut payloads = Vec::new();
    while !bytes.is_empty() {
        assert!(bytes.len() >= 7, "truncated ADTS header");
        assert_eq!((bytes[0], bytes[1] & 0xF6), (0xFF, 0xF0), "ADTS sync word");
        let header_length = if bytes[1] & 0x01 == 1 { 7 } else { 9 };
        let frame_length = (usize::from(bytes[3] & 0x03) << 11)
            | (usize::from(bytes[4]) << 3)
            | (usize::from(bytes[5]) >> 5);
        payloads.extend_from_slice(&bytes[header_length..frame_length]);
        bytes = &bytes[frame_length..];
    }
    payloads
}
