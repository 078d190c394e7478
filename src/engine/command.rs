//! Engine backed by external `ffmpeg` and `ffprobe` executables.
//!
//! Invocations are passed through verbatim (`Invocation::to_args`) with the
//! scratch workspace as working directory, so the argument list seen by the
//! executable is exactly the one the crate planned. Standard input is closed;
//! an `ffmpeg` that would prompt before overwriting fails instead.

use std::{
    path::{Path, PathBuf},
    process::{Command, Output as ProcessOutput, Stdio},
};

use crate::{
    engine::{Engine, ExecOutput},
    error::ExtractorError,
    ffmpeg::FfmpegLogLevel,
    invocation::Invocation,
    probe::{StructuredProbe, parse_ffprobe_json},
    workspace::Workspace,
};

/// Engine that spawns `ffmpeg` for every invocation.
///
/// `ffprobe` is optional. When it is configured and answers `-version`, it
/// serves [`Engine::probe_audio_codec`]; otherwise codec detection falls
/// back to scraping `ffmpeg`'s diagnostics.
#[derive(Debug)]
pub struct CommandEngine {
    ffmpeg: PathBuf,
    ffprobe: Option<PathBuf>,
    ffprobe_available: bool,
    log_level: Option<FfmpegLogLevel>,
    scratch_parent: Option<PathBuf>,
    workspace: Option<Workspace>,
}

impl Default for CommandEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandEngine {
    /// Use `ffmpeg` and `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: Some(PathBuf::from("ffprobe")),
            ffprobe_available: false,
            log_level: None,
            scratch_parent: None,
            workspace: None,
        }
    }

    /// Use the `ffmpeg` executable at `path`.
    #[must_use]
    pub fn with_ffmpeg<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.ffmpeg = path.as_ref().to_path_buf();
        self
    }

    /// Use the `ffprobe` executable at `path`, or none at all.
    #[must_use]
    pub fn with_ffprobe<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        self.ffprobe = path.map(|path| path.as_ref().to_path_buf());
        self
    }

    /// Pass `-loglevel` to `ffmpeg` for output-producing invocations.
    ///
    /// Probe invocations always run at FFmpeg's default level so the stream
    /// summary is printed.
    #[must_use]
    pub fn with_log_level(mut self, level: FfmpegLogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Keep scratch files under `parent`.
    #[must_use]
    pub fn with_scratch_dir<P: AsRef<Path>>(mut self, parent: P) -> Self {
        self.scratch_parent = Some(parent.as_ref().to_path_buf());
        self
    }

    fn workspace(&self) -> Result<&Workspace, ExtractorError> {
        self.workspace.as_ref().ok_or(ExtractorError::EngineNotReady)
    }

    fn run(&self, program: &Path, args: &[String]) -> Result<ProcessOutput, ExtractorError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(workspace) = &self.workspace {
            command.current_dir(workspace.root());
        }
        command.output().map_err(|error| {
            ExtractorError::Invocation(format!("failed to spawn {}: {error}", program.display()))
        })
    }

    fn check_version(&self, program: &Path) -> Result<(), ExtractorError> {
        let output = self.run(program, &["-hide_banner".to_string(), "-version".to_string()])?;
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(first_line) = stdout.lines().next() {
                log::debug!("{first_line}");
            }
            Ok(())
        } else {
            Err(ExtractorError::Invocation(format!(
                "{} -version exited with {}",
                program.display(),
                output.status
            )))
        }
    }
}

impl Engine for CommandEngine {
    fn name(&self) -> &str {
        "command"
    }

    fn load(&mut self) -> Result<(), ExtractorError> {
        self.check_version(&self.ffmpeg)
            .map_err(|error| ExtractorError::EngineLoad(error.to_string()))?;

        self.ffprobe_available = match &self.ffprobe {
            Some(ffprobe) => match self.check_version(ffprobe) {
                Ok(()) => true,
                Err(error) => {
                    log::warn!("ffprobe unavailable, codec detection will scrape diagnostics: {error}");
                    false
                }
            },
            None => false,
        };

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
        self.ffprobe_available = false;
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
        self.workspace()?;

        let mut args = Vec::new();
        if let Some(level) = self.log_level.filter(|_| !invocation.is_probe()) {
            args.push("-loglevel".to_string());
            args.push(level.as_flag_value().to_string());
        }
        args.extend(invocation.to_args());
        log::debug!("{} {}", self.ffmpeg.display(), args.join(" "));

        let output = self.run(&self.ffmpeg, &args)?;
        let diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();

        // ffmpeg exits non-zero when no output is given; a probe only needs
        // the diagnostics.
        if !invocation.is_probe() && !output.status.success() {
            let reason = diagnostics
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no diagnostics");
            return Err(ExtractorError::Invocation(format!(
                "ffmpeg exited with {}: {reason}",
                output.status
            )));
        }

        Ok(ExecOutput { diagnostics })
    }

    fn probe_audio_codec(&mut self, name: &str) -> Result<StructuredProbe, ExtractorError> {
        self.workspace()?.resolve(name)?;
        let Some(ffprobe) = self.ffprobe.as_ref().filter(|_| self.ffprobe_available) else {
            return Ok(StructuredProbe::Unavailable);
        };

        let args = [
            "-v",
            "error",
            "-select_streams",
            "a:0",
            "-show_entries",
            "stream=codec_name",
            "-of",
            "json",
            name,
        ]
        .map(str::to_string);
        let output = self.run(ffprobe, &args)?;
        if !output.status.success() {
            return Err(ExtractorError::Invocation(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_ffprobe_json(&String::from_utf8_lossy(&output.stdout))
    }
}
