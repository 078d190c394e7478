//! Scratch filesystem shared between the crate and an engine.
//!
//! Engines work on named files (`input.mp4`, `output.aac`) rather than on
//! buffers. A [`Workspace`] is a private temporary directory that holds those
//! files for the lifetime of one engine session. Names are flat: anything
//! containing a path separator or `..` is rejected so an invocation can never
//! reach outside the directory.

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use tempfile::TempDir;

use crate::error::ExtractorError;

/// A private scratch directory with flat file names.
///
/// The directory and everything in it is deleted when the workspace is
/// dropped.
#[derive(Debug)]
pub struct Workspace {
    directory: TempDir,
}

impl Workspace {
    /// Create a workspace in the system temporary directory.
    pub fn new() -> Result<Self, ExtractorError> {
        Self::with_prefix("audio-extractor-")
    }

    /// Create a workspace whose directory name starts with `prefix`.
    pub fn with_prefix(prefix: &str) -> Result<Self, ExtractorError> {
        let directory = tempfile::Builder::new().prefix(prefix).tempdir()?;
        log::debug!("Created engine workspace at {}", directory.path().display());
        Ok(Self { directory })
    }

    /// Create a workspace under `parent` instead of the system temporary
    /// directory.
    pub fn new_in<P: AsRef<Path>>(parent: P) -> Result<Self, ExtractorError> {
        let directory = tempfile::Builder::new()
            .prefix("audio-extractor-")
            .tempdir_in(parent)?;
        Ok(Self { directory })
    }

    /// Root directory of the workspace.
    pub fn root(&self) -> &Path {
        self.directory.path()
    }

    /// Resolve a flat file name to its absolute path inside the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::Invocation`] if `name` is empty or is not a
    /// single normal path component.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ExtractorError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root().join(name)),
            _ => Err(ExtractorError::Invocation(format!(
                "invalid workspace file name: {name:?}"
            ))),
        }
    }

    /// Write `data` to `name`, replacing any previous content.
    pub fn write(&self, name: &str, data: &[u8]) -> Result<(), ExtractorError> {
        let path = self.resolve(name)?;
        fs::write(&path, data)?;
        log::trace!("Wrote {} bytes to workspace file {name}", data.len());
        Ok(())
    }

    /// Read the full content of `name`.
    pub fn read(&self, name: &str) -> Result<Vec<u8>, ExtractorError> {
        let path = self.resolve(name)?;
        fs::read(&path).map_err(|error| ExtractorError::FileOpen {
            path,
            reason: error.to_string(),
        })
    }

    /// Remove `name`. Removing a file that does not exist is not an error.
    pub fn remove(&self, name: &str) -> Result<(), ExtractorError> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    /// Whether `name` currently exists in the workspace.
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok_and(|path| path.is_file())
    }
}
