//! The disk collaborator seam.
//!
//! The core never touches the filesystem directly. It asks a
//! [`FileService`] for text blobs (configuration today, player profiles
//! in the surrounding server) and gets back the contents or "not there".
//! Whatever caching or batching happens underneath is the service's
//! business.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::RwLock;

/// Errors a file service can report.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// The underlying I/O operation failed.
    #[error("file I/O failed for {path}: {source}")]
    Io {
        /// The path involved.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Read and write text blobs by path.
pub trait FileService: Send + Sync {
    /// Read a whole file. `Ok(None)` means it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`FileError`] if the file exists but cannot be read.
    fn read_text(&self, path: &str) -> Result<Option<String>, FileError>;

    /// Replace a file's contents.
    ///
    /// # Errors
    ///
    /// Returns [`FileError`] if the file cannot be written.
    fn write_text(&self, path: &str, contents: &str) -> Result<(), FileError>;
}

/// File service backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileService;

impl FileService for LocalFileService {
    fn read_text(&self, path: &str) -> Result<Option<String>, FileError> {
        match std::fs::read_to_string(Path::new(path)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(FileError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }

    fn write_text(&self, path: &str, contents: &str) -> Result<(), FileError> {
        std::fs::write(Path::new(path), contents).map_err(|source| FileError::Io {
            path: path.to_owned(),
            source,
        })
    }
}

/// In-memory file service, for tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryFileService {
    /// Path -> contents.
    files: RwLock<BTreeMap<String, String>>,
}

impl MemoryFileService {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileService for MemoryFileService {
    fn read_text(&self, path: &str) -> Result<Option<String>, FileError> {
        Ok(self.files.read().get(path).cloned())
    }

    fn write_text(&self, path: &str, contents: &str) -> Result<(), FileError> {
        self.files
            .write()
            .insert(path.to_owned(), contents.to_owned());
        Ok(())
    }
}
