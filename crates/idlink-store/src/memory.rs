//! In-memory snapshot store.
//!
//! Handy for tests and for embedding idlink where persistence is handled
//! elsewhere. Clones share the same storage, so a test can keep one
//! handle, give another to a session manager, and later "restart" by
//! opening a new manager on the same handle.
//!
//! Like [`FileStore`](crate::FileStore), it keeps the encoded document
//! rather than the snapshot value, so a restart goes through the codec.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[cfg(feature = "json")]
use crate::JsonCodec;
use crate::{Snapshot, SnapshotCodec, SnapshotStore, StoreError};

#[derive(Default)]
struct Inner {
    document: Option<Vec<u8>>,
    saves: usize,
    fail_saves: bool,
}

/// A [`SnapshotStore`] that keeps the last saved document in memory.
#[derive(Clone)]
pub struct MemoryStore {
    codec: Arc<dyn SnapshotCodec>,
    inner: Arc<Mutex<Inner>>,
}

#[cfg(feature = "json")]
impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_codec(JsonCodec)
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryStore")
            .field("document_len", &inner.document.as_ref().map(Vec::len))
            .field("saves", &inner.saves)
            .field("fail_saves", &inner.fail_saves)
            .finish()
    }
}

#[cfg(feature = "json")]
impl MemoryStore {
    /// Creates an empty JSON store (nothing persisted yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a JSON store that already holds `snapshot`, as if a
    /// previous process had saved it.
    pub fn with_snapshot(snapshot: &Snapshot) -> Result<Self, StoreError> {
        let store = Self::new();
        let document = store.codec.encode(snapshot)?;
        store.lock().document = Some(document);
        Ok(store)
    }
}

impl MemoryStore {
    /// Creates an empty store that encodes with `codec`.
    pub fn with_codec(codec: impl SnapshotCodec) -> Self {
        Self {
            codec: Arc::new(codec),
            inner: Arc::default(),
        }
    }

    /// Replaces the stored document with raw `bytes`, valid or not.
    pub fn put_document(&self, bytes: impl Into<Vec<u8>>) {
        self.lock().document = Some(bytes.into());
    }

    /// The raw document from the last successful save.
    pub fn document(&self) -> Option<Vec<u8>> {
        self.lock().document.clone()
    }

    /// Makes every following `save` fail with
    /// [`StoreError::Unavailable`] until switched off again.
    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// The stored document decoded, if there is one and it decodes.
    pub fn saved(&self) -> Option<Snapshot> {
        self.read().ok().flatten()
    }

    /// How many saves have succeeded so far.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The critical sections never panic, so a poisoned lock still
        // holds consistent data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotStore for MemoryStore {
    fn read(&self) -> Result<Option<Snapshot>, StoreError> {
        let document = self.lock().document.clone();
        document.map(|bytes| self.codec.decode(&bytes)).transpose()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let document = self.codec.encode(snapshot)?;
        let mut inner = self.lock();
        if inner.fail_saves {
            return Err(StoreError::Unavailable("saves disabled".into()));
        }
        inner.document = Some(document);
        inner.saves += 1;
        Ok(())
    }
}
