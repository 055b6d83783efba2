//! Record types persisted by idlink.
//!
//! Everything in this module ends up in the snapshot document, so the
//! serde attributes here define the on-disk format.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of the game ID stored when the game-platform lookup could not
/// resolve the claimed username. `IdentityLink::game_id` then reads
/// `unresolved-<external_id>`.
pub const PLACEHOLDER_GAME_ID_PREFIX: &str = "unresolved-";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable chat-platform identifier of a user.
///
/// Serialized as a plain string, so it also works as a map key in the
/// snapshot document.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ExternalId(pub String);

impl ExternalId {
    /// Wraps a raw chat-platform identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExternalId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ExternalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// IdentityLink
// ---------------------------------------------------------------------------

/// A confirmed binding between a chat identity and a game identity.
///
/// Only a successful code match creates one; only an explicit logout
/// removes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLink {
    /// The chat user this link belongs to.
    pub external_id: ExternalId,

    /// The game username the user claimed when starting verification.
    pub game_username: String,

    /// Stable game-platform ID, or a placeholder starting with
    /// [`PLACEHOLDER_GAME_ID_PREFIX`] when the lookup was unavailable.
    pub game_id: String,

    /// When the code was confirmed.
    pub verified_at: DateTime<Utc>,
}

impl IdentityLink {
    /// The game ID recorded for `external_id` when no real one is known.
    pub fn placeholder_game_id(external_id: &ExternalId) -> String {
        format!("{PLACEHOLDER_GAME_ID_PREFIX}{external_id}")
    }

    /// Returns `true` if `game_id` is a placeholder rather than a
    /// resolved game-platform ID.
    pub fn has_placeholder_game_id(&self) -> bool {
        self.game_id.starts_with(PLACEHOLDER_GAME_ID_PREFIX)
    }
}

// ---------------------------------------------------------------------------
// PendingSession
// ---------------------------------------------------------------------------

/// An in-flight verification attempt, gated by a short numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSession {
    /// The chat user who asked to be verified.
    pub external_id: ExternalId,

    /// Fixed-width numeric code relayed to the user out-of-band.
    pub code: String,

    /// User-supplied game username. Unverified until the code matches.
    pub claimed_game_username: String,

    /// When the code was issued.
    pub created_at: DateTime<Utc>,
}

impl PendingSession {
    /// Returns `true` once more than `ttl` has passed since issuance.
    ///
    /// A session issued "in the future" (clock skew after a restart) has
    /// a negative age and is never expired by this check.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.created_at) > ttl
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of both maps, the unit of load/save.
///
/// `BTreeMap` keeps the document ordered by ID, so two saves of the same
/// state produce the same bytes. `#[serde(default)]` lets a document that
/// is missing one of the maps still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Confirmed links, keyed by chat ID.
    #[serde(default)]
    pub links: BTreeMap<ExternalId, IdentityLink>,

    /// In-flight verification attempts, keyed by chat ID.
    #[serde(default)]
    pub pending_sessions: BTreeMap<ExternalId, PendingSession>,
}

impl Snapshot {
    /// Returns `true` if neither map has any entry.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.pending_sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
