//! Durable storage for idlink.
//!
//! This crate defines the records the verification flow works with and
//! the machinery that keeps them on stable storage:
//!
//! - **Types** ([`IdentityLink`], [`PendingSession`], [`Snapshot`],
//!   [`ExternalId`]): the data that gets persisted.
//! - **Codec** ([`SnapshotCodec`] trait, [`JsonCodec`]): how a snapshot
//!   is converted to/from bytes.
//! - **Stores** ([`SnapshotStore`] trait, [`FileStore`], [`MemoryStore`]):
//!   whole-snapshot load/save against a backend.
//! - **Errors** ([`StoreError`]): what can go wrong while persisting.
//!
//! # Architecture
//!
//! The store has no view of its own. The session layer owns the maps in
//! memory and hands a [`Snapshot`] to the store only at load/save time.
//!
//! ```text
//! Session Manager (owns maps) → Snapshot → SnapshotStore → disk
//! ```

mod codec;
mod error;
mod file;
mod memory;
mod store;
mod types;

pub use codec::SnapshotCodec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::StoreError;
#[cfg(feature = "json")]
pub use file::JsonFileStore;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::SnapshotStore;
pub use types::{ExternalId, IdentityLink, PendingSession, Snapshot, PLACEHOLDER_GAME_ID_PREFIX};
