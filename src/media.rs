//! Input media buffers.

use std::path::{Path, PathBuf};

use crate::error::ExtractorError;

/// Extensions accepted as video input, mirroring a `video/*` file filter.
const VIDEO_EXTENSIONS: [&str; 14] = [
    "3gp", "avi", "flv", "m2ts", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "ogv", "ts", "webm",
    "wmv",
];

/// A named input file held in memory.
///
/// The name only matters for its extension, which tells the engine which
/// demuxer to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInput {
    name: String,
    bytes: Vec<u8>,
}

impl MediaInput {
    /// Wrap `bytes` under `name`.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::FileOpen`] if the file cannot be read.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ExtractorError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|error| ExtractorError::FileOpen {
            path: PathBuf::from(path),
            reason: error.to_string(),
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(Self { name, bytes })
    }

    /// Original file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File content.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercase extension after the last `.`, if there is a non-empty one.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, extension)| extension)
            .filter(|extension| !extension.is_empty())
            .map(str::to_ascii_lowercase)
    }

    /// Whether the extension names a common video container.
    pub fn is_video(&self) -> bool {
        self.extension()
            .is_some_and(|extension| VIDEO_EXTENSIONS.contains(&extension.as_str()))
    }

    /// Scratch name the engine stores this input under: `input.<ext>`.
    pub fn workspace_name(&self) -> Option<String> {
        self.extension().map(|extension| format!("input.{extension}"))
    }
}
