//! The [`SnapshotStore`] trait: whole-snapshot load/save.

use crate::{Snapshot, StoreError};

/// A backend that persists a whole [`Snapshot`] at a time.
///
/// Implementors provide [`read`](Self::read) and [`save`](Self::save);
/// the self-healing [`load`](Self::load) is built on top of them.
///
/// `save` takes a borrowed point-in-time view. The caller keeps its own
/// copy and keeps mutating it; the store never holds on to the snapshot.
pub trait SnapshotStore: Send + Sync + 'static {
    /// Reads the persisted snapshot.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    ///
    /// # Errors
    /// Any error reading or decoding the stored document.
    fn read(&self) -> Result<Option<Snapshot>, StoreError>;

    /// Serializes `snapshot` and overwrites the stored document.
    ///
    /// Either the whole write lands or the prior content stays as it was.
    ///
    /// # Errors
    /// Encoding or backend failures. The caller's in-memory copy is
    /// unaffected either way.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Loads the persisted snapshot, falling back to an empty one.
    ///
    /// A missing or unreadable document is treated as "no prior state":
    /// an empty snapshot is written back immediately so the next start
    /// finds a valid document. This never fails.
    fn load(&self) -> Snapshot {
        let reason = match self.read() {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    links = snapshot.links.len(),
                    pending = snapshot.pending_sessions.len(),
                    "snapshot loaded"
                );
                return snapshot;
            }
            Ok(None) => "no existing snapshot",
            Err(e) => {
                tracing::warn!(error = %e, "snapshot unreadable, starting empty");
                "unreadable snapshot"
            }
        };

        let snapshot = Snapshot::default();
        if let Err(e) = self.save(&snapshot) {
            tracing::error!(error = %e, reason, "failed to write default snapshot");
        } else {
            tracing::info!(reason, "wrote default snapshot");
        }
        snapshot
    }
}
