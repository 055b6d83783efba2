//! Error types for the storage layer.
//!
//! Each idlink crate defines its own error enum. A `StoreError` always
//! means the problem is in getting a snapshot to or from the backend,
//! never a business-rule violation.

use std::path::PathBuf;

/// Errors that can occur while persisting or reading a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading, writing, or renaming the snapshot file failed.
    ///
    /// The path is kept so the log line says which file was involved.
    #[error("snapshot i/o failed on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization failed (turning a snapshot into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, wrong shape, or a
    /// truncated file.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The backend refused the operation outright.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
