//! Local version marker: the version this host believes it is running.
//!
//! Lives on the host's own disk, outside the shared store. The file is
//! opened for the duration of a single read or write. A missing file means
//! the host was never provisioned and reads as the empty string.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Default location of the marker file.
pub const DEFAULT_MARKER_PATH: &str = "/etc/current_version";

#[derive(Debug, Clone)]
pub struct LocalVersionMarker {
    path: PathBuf,
}

impl Default for LocalVersionMarker {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_PATH)
    }
}

impl LocalVersionMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the marker, trimmed. Absent marker → `""`.
    pub fn read(&self) -> std::io::Result<String> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(e),
        };
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(contents.trim().to_string())
    }

    /// Overwrite the marker verbatim and return what was written.
    pub fn write(&self, value: &str) -> std::io::Result<String> {
        let mut file = File::create(&self.path)?;
        file.write_all(value.as_bytes())?;
        file.flush()?;
        debug!(path = ?self.path, %value, "local version recorded");
        Ok(value.to_string())
    }
}
