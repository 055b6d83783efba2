//! Integration tests for the file-backed snapshot store.
//!
//! Each test works in its own temporary directory, so they can run in
//! parallel without stepping on each other's data files.

use std::fs;

use chrono::{DateTime, Utc};
use idlink_store::{
    ExternalId, FileStore, IdentityLink, PendingSession, Snapshot, SnapshotStore,
    StoreError,
};

// =========================================================================
// Helpers
// =========================================================================

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn populated_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::default();
    snapshot.links.insert(
        ExternalId::from("u1"),
        IdentityLink {
            external_id: ExternalId::from("u1"),
            game_username: "Alice".into(),
            game_id: "12345".into(),
            verified_at: at(1_700_000_000),
        },
    );
    snapshot.pending_sessions.insert(
        ExternalId::from("u2"),
        PendingSession {
            external_id: ExternalId::from("u2"),
            code: "0042".into(),
            claimed_game_username: "Bob".into(),
            created_at: at(1_700_000_500),
        },
    );
    snapshot
}

// =========================================================================
// load()
// =========================================================================

#[test]
fn test_load_missing_file_returns_empty_and_creates_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let store = FileStore::json(&path);

    let snapshot = store.load();

    assert!(snapshot.is_empty());
    assert!(path.exists(), "default snapshot should be written back");
    assert_eq!(store.read().unwrap(), Some(Snapshot::default()));
}

#[test]
fn test_load_corrupt_file_self_heals() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    fs::write(&path, b"{ this is not json").unwrap();
    let store = FileStore::json(&path);

    let snapshot = store.load();

    assert!(snapshot.is_empty());
    // The corrupt document was replaced by a valid empty one.
    assert_eq!(store.read().unwrap(), Some(Snapshot::default()));
}

#[test]
fn test_load_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state").join("data.json");
    let store = FileStore::json(&path);

    store.load();

    assert!(path.exists());
}

#[test]
fn test_read_corrupt_file_returns_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    fs::write(&path, b"[]").unwrap();
    let store = FileStore::json(&path);

    assert!(matches!(store.read(), Err(StoreError::Decode(_))));
}

// =========================================================================
// save() → load() round trip (simulated restart)
// =========================================================================

#[test]
fn test_save_then_load_reproduces_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let original = populated_snapshot();

    FileStore::json(&path).save(&original).unwrap();
    // A fresh store instance stands in for a restarted process.
    let reloaded = FileStore::json(&path).load();

    assert_eq!(reloaded, original);
}

#[test]
fn test_save_overwrites_previous_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let store = FileStore::json(&path);

    store.save(&populated_snapshot()).unwrap();
    store.save(&Snapshot::default()).unwrap();

    assert_eq!(store.load(), Snapshot::default());
}

#[test]
fn test_save_leaves_no_temp_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");

    FileStore::json(&path).save(&populated_snapshot()).unwrap();

    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("data.json")]);
}

// =========================================================================
// save() failures
// =========================================================================

#[test]
fn test_failed_save_keeps_prior_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let store = FileStore::json(&path);
    let original = populated_snapshot();
    store.save(&original).unwrap();

    // A directory squatting on the temp path makes the write fail
    // before the rename.
    fs::create_dir(dir.path().join("data.json.tmp")).unwrap();
    let result = store.save(&Snapshot::default());

    assert!(matches!(result, Err(StoreError::Io { .. })));
    assert_eq!(store.read().unwrap(), Some(original));
}

#[test]
fn test_save_under_a_file_returns_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"").unwrap();
    let store = FileStore::json(blocker.join("data.json"));

    let err = store.save(&Snapshot::default()).unwrap_err();

    assert!(matches!(err, StoreError::Io { .. }));
    assert!(err.to_string().contains("data.json"));
}
