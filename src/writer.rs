use crate::error::{Error, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Persists the filtered guide with an atomic replace.
pub(crate) struct OutputWriter {
    path: PathBuf,
}

impl OutputWriter {
    /// Creates a writer targeting `path`.
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Writes `content` to the destination, replacing any existing file.
    ///
    /// # Process
    ///
    /// 1. Creates the parent directory if needed
    /// 2. Writes content to a sibling temporary file
    /// 3. Syncs the temporary file to disk
    /// 4. Renames it over the destination
    ///
    /// The destination is never left half-written.
    ///
    /// # Errors
    ///
    /// Returns an error if any filesystem operation fails.
    pub(crate) fn write(&self, content: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let temp_path = self.temp_path()?;
        if let Err(e) = write_synced(&temp_path, content) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, &self.path).map_err(|e| Error::io(&self.path, e))?;

        debug!("Wrote {} bytes to {}", content.len(), self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let filename = self
            .path
            .file_name()
            .ok_or_else(|| Error::config("Invalid output path"))?
            .to_string_lossy();

        Ok(self.path.with_file_name(format!("{filename}.tmp")))
    }
}

fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
    file.write_all(content).map_err(|e| Error::io(path, e))?;
    file.sync_all().map_err(|e| Error::io(path, e))
}
