//! File-backed snapshot store.
//!
//! The whole snapshot lives in one document on disk. Writes go to a
//! sibling temporary file that is flushed, synced, and then renamed over
//! the target, so a crash mid-write leaves the previous document intact.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "json")]
use crate::JsonCodec;
use crate::{Snapshot, SnapshotCodec, SnapshotStore, StoreError};

/// A [`SnapshotStore`] that keeps the snapshot in a single file.
#[derive(Debug, Clone)]
pub struct FileStore<C: SnapshotCodec> {
    path: PathBuf,
    codec: C,
}

/// The default file store: a pretty-printed JSON document.
#[cfg(feature = "json")]
pub type JsonFileStore = FileStore<JsonCodec>;

#[cfg(feature = "json")]
impl FileStore<JsonCodec> {
    /// Creates a JSON file store at `path`. Nothing is touched on disk
    /// until the first load or save.
    pub fn json(path: impl Into<PathBuf>) -> Self {
        Self::new(path, JsonCodec)
    }
}

impl<C: SnapshotCodec> FileStore<C> {
    /// Creates a file store at `path` using `codec`.
    pub fn new(path: impl Into<PathBuf>, codec: C) -> Self {
        Self {
            path: path.into(),
            codec,
        }
    }

    /// The document this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<file name>.tmp` next to the target, so the final `rename` stays
    /// on the same filesystem.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomically(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        let written = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }
}

impl<C: SnapshotCodec> SnapshotStore for FileStore<C> {
    fn read(&self) -> Result<Option<Snapshot>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        self.codec.decode(&bytes).map(Some)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let bytes = self.codec.encode(snapshot)?;
        self.write_atomically(&bytes)
            .map_err(|e| StoreError::io(&self.path, e))?;
        tracing::debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            "snapshot saved"
        );
        Ok(())
    }
}
