//! Mock collaborators and a hand-driven clock shared by the integration
//! tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use idlink::prelude::*;
use tokio::sync::Notify;

// =========================================================================
// Clock
// =========================================================================

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )))
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.0.lock().unwrap() += by;
    }

    pub fn as_fn(&self) -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
        let clock = self.clone();
        move || clock.now()
    }
}

// =========================================================================
// Collaborators
// =========================================================================

/// Resolves a fixed set of usernames.
#[derive(Default)]
pub struct StaticDirectory(HashMap<String, String>);

impl StaticDirectory {
    pub fn with(mut self, username: &str, game_id: &str) -> Self {
        self.0.insert(username.to_string(), game_id.to_string());
        self
    }
}

impl GameDirectory for StaticDirectory {
    async fn resolve(&self, username: &str) -> Result<Option<String>, CollaboratorError> {
        Ok(self.0.get(username).cloned())
    }
}

/// A directory whose platform is down.
pub struct DownDirectory;

impl GameDirectory for DownDirectory {
    async fn resolve(&self, _username: &str) -> Result<Option<String>, CollaboratorError> {
        Err(CollaboratorError::Unavailable("connection refused".into()))
    }
}

/// Lets a test hold a directory lookup open while it does something else.
#[derive(Clone, Default)]
pub struct LookupGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl LookupGate {
    /// Waits until a lookup has started and is blocked on the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets one blocked (or the next) lookup finish.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// A [`StaticDirectory`] whose lookups wait for [`LookupGate::release`].
pub struct GatedDirectory {
    gate: LookupGate,
    inner: StaticDirectory,
}

impl GatedDirectory {
    pub fn new(gate: LookupGate, inner: StaticDirectory) -> Self {
        Self { gate, inner }
    }
}

impl GameDirectory for GatedDirectory {
    async fn resolve(&self, username: &str) -> Result<Option<String>, CollaboratorError> {
        self.gate.entered.notify_one();
        self.gate.release.notified().await;
        self.inner.resolve(username).await
    }
}

/// Records every nickname change, optionally refusing them.
#[derive(Clone, Default)]
pub struct RecordingNicknames {
    calls: Arc<Mutex<Vec<(ExternalId, Option<String>)>>>,
    deny: bool,
}

impl RecordingNicknames {
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(ExternalId, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl NicknameSync for RecordingNicknames {
    async fn set_nickname(
        &self,
        external_id: &ExternalId,
        nickname: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        self.calls
            .lock()
            .unwrap()
            .push((external_id.clone(), nickname.map(str::to_string)));
        if self.deny {
            Err(CollaboratorError::PermissionDenied("missing Manage Nicknames".into()))
        } else {
            Ok(())
        }
    }
}

// =========================================================================
// Helpers
// =========================================================================

pub fn id(raw: &str) -> ExternalId {
    ExternalId::from(raw)
}

pub fn mins(m: i64) -> TimeDelta {
    TimeDelta::minutes(m)
}

/// A service over a fresh memory store with no collaborators.
pub fn plain_service(clock: &TestClock) -> LinkService<MemoryStore> {
    LinkService::builder(MemoryStore::new())
        .clock(clock.as_fn())
        .build()
}
