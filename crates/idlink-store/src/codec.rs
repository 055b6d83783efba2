//! Codec trait and implementations for the snapshot document.
//!
//! Backends don't care HOW a snapshot becomes bytes. They hold something
//! that implements [`SnapshotCodec`] and call it at the load/save
//! boundary, so the encoding can change without touching any store.

use crate::{Snapshot, StoreError};

/// Converts a [`Snapshot`] to bytes and back.
///
/// `Send + Sync + 'static` because the codec lives inside a store that is
/// shared with async tasks for the lifetime of the process.
pub trait SnapshotCodec: Send + Sync + 'static {
    /// Serializes a snapshot into bytes.
    ///
    /// # Errors
    /// Returns `StoreError::Encode` if serialization fails.
    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>, StoreError>;

    /// Deserializes bytes back into a snapshot.
    ///
    /// # Errors
    /// Returns `StoreError::Decode` if the bytes are malformed, truncated,
    /// or don't have the snapshot's shape.
    fn decode(&self, data: &[u8]) -> Result<Snapshot, StoreError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`SnapshotCodec`] that writes pretty-printed JSON.
///
/// ## Example
///
/// ```rust
/// use idlink_store::{JsonCodec, Snapshot, SnapshotCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Snapshot::default()).unwrap();
/// let decoded = codec.decode(&bytes).unwrap();
/// assert!(decoded.is_empty());
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl SnapshotCodec for JsonCodec {
    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec_pretty(snapshot).map_err(StoreError::Encode)
    }

    fn decode(&self, data: &[u8]) -> Result<Snapshot, StoreError> {
        serde_json::from_slice(data).map_err(StoreError::Decode)
    }
}
