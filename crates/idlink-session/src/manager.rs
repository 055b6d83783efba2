//! The session manager: owns the verification state of every identity.
//!
//! Each identity is in one of three states:
//!
//! ```text
//!              start_verification()            confirm_verification()
//!   [Unlinked] ───────────────────→ [Pending] ───────────────────────→ [Linked]
//!       ↑                              │                                  │
//!       └──────── sweep_expired() ─────┘                                  │
//!       └──────────────────────────── logout() ───────────────────────────┘
//! ```
//!
//! Every mutating operation ends by saving the full snapshot through the
//! store, so the state on disk always reflects the last completed
//! operation.
//!
//! # Concurrency note
//!
//! `SessionManager` is NOT thread-safe by itself. It takes `&mut self` for
//! every mutation and is meant to be owned by one task or wrapped in a
//! mutex by the layer above. Nothing in here awaits, so an operation
//! always runs to completion before the next one starts.

use chrono::{DateTime, Utc};
use idlink_store::{ExternalId, IdentityLink, PendingSession, Snapshot, SnapshotStore};
use rand::Rng;

use crate::{RestartPolicy, VerificationConfig, VerificationError};

/// Random draws attempted before falling back to walking the code range.
const MAX_CODE_DRAWS: usize = 16;

/// Manages identity links and pending verifications.
///
/// Generic over the store so tests can run against
/// [`MemoryStore`](idlink_store::MemoryStore) and production against a
/// [`FileStore`](idlink_store::FileStore).
pub struct SessionManager<S: SnapshotStore> {
    /// Both maps. The store only ever sees a borrow of this at save time.
    state: Snapshot,

    /// Code lifetime, width, and restart policy.
    config: VerificationConfig,

    store: S,
}

impl<S: SnapshotStore> SessionManager<S> {
    /// Loads the persisted snapshot from `store` and starts managing it.
    ///
    /// A missing or corrupt snapshot yields an empty manager (see
    /// [`SnapshotStore::load`]).
    pub fn open(store: S, config: VerificationConfig) -> Self {
        let state = store.load();
        tracing::info!(
            links = state.links.len(),
            pending = state.pending_sessions.len(),
            "session manager opened"
        );
        Self {
            state,
            config: config.validated(),
            store,
        }
    }

    /// Starts (or restarts) verification of `external_id` as
    /// `claimed_game_username` and returns the code to relay.
    ///
    /// # Errors
    /// - [`VerificationError::AlreadyLinked`]: the identity has a link
    /// - [`VerificationError::AlreadyPending`]: a live session exists and
    ///   the restart policy is `Reject`
    /// - [`VerificationError::Store`]: the new session is live in memory
    ///   but could not be persisted
    pub fn start_verification(
        &mut self,
        external_id: ExternalId,
        claimed_game_username: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<String, VerificationError> {
        if self.state.links.contains_key(&external_id) {
            return Err(VerificationError::AlreadyLinked(external_id));
        }

        let replaced = match self.state.pending_sessions.get(&external_id) {
            Some(existing) => {
                let live = !existing.is_expired(now, self.config.code_expiration);
                if live && self.config.restart_policy == RestartPolicy::Reject {
                    return Err(VerificationError::AlreadyPending(external_id));
                }
                true
            }
            None => false,
        };

        let code = self.issue_code(&external_id);
        let session = PendingSession {
            external_id: external_id.clone(),
            code: code.clone(),
            claimed_game_username: claimed_game_username.into(),
            created_at: now,
        };
        tracing::info!(
            %external_id,
            game_username = %session.claimed_game_username,
            replaced,
            "verification started"
        );
        self.state.pending_sessions.insert(external_id, session);

        self.persist()?;
        Ok(code)
    }

    /// Matches `submitted_code` against the live pending sessions and,
    /// when it belongs to `external_id`, turns that session into a link.
    ///
    /// `resolved_game_id` is the game-platform ID looked up for the
    /// claimed username, if any. Without one the link gets a placeholder.
    ///
    /// Expired sessions are evicted first, so a stale code never matches.
    ///
    /// # Errors
    /// - [`VerificationError::Expired`]: the caller's own code just expired
    /// - [`VerificationError::NotYourCode`]: the code belongs to someone else
    /// - [`VerificationError::InvalidCode`]: no live session has this code
    /// - [`VerificationError::Store`]: linked in memory, not persisted
    pub fn confirm_verification(
        &mut self,
        external_id: &ExternalId,
        submitted_code: &str,
        resolved_game_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<IdentityLink, VerificationError> {
        let submitted_code = submitted_code.trim();
        let swept = self.evict_expired(now);

        let session = match self.match_code(external_id, submitted_code, &swept) {
            Ok(session) => session,
            Err(e) => {
                // The lazy sweep still changed state; keep disk in step.
                if !swept.is_empty() {
                    self.persist_quietly();
                }
                tracing::debug!(%external_id, error = %e, "confirmation rejected");
                return Err(e);
            }
        };

        self.state.pending_sessions.remove(external_id);

        let game_id = resolved_game_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| IdentityLink::placeholder_game_id(external_id));
        let link = IdentityLink {
            external_id: external_id.clone(),
            game_username: session.claimed_game_username,
            game_id,
            verified_at: now,
        };
        tracing::info!(
            %external_id,
            game_username = %link.game_username,
            placeholder_id = link.has_placeholder_game_id(),
            "identity linked"
        );
        self.state.links.insert(external_id.clone(), link.clone());

        self.persist()?;
        Ok(link)
    }

    /// Removes the link of `external_id` and returns it.
    ///
    /// Any pending session of the same identity is left alone.
    ///
    /// # Errors
    /// - [`VerificationError::NotLinked`]: nothing to remove
    /// - [`VerificationError::Store`]: unlinked in memory, not persisted
    pub fn logout(
        &mut self,
        external_id: &ExternalId,
    ) -> Result<IdentityLink, VerificationError> {
        let link = self
            .state
            .links
            .remove(external_id)
            .ok_or_else(|| VerificationError::NotLinked(external_id.clone()))?;

        tracing::info!(%external_id, game_username = %link.game_username, "identity unlinked");

        self.persist()?;
        Ok(link)
    }

    /// Evicts every pending session older than the code lifetime and
    /// returns how many were removed.
    ///
    /// Only writes to the store when something was removed. A failed
    /// write is logged; the eviction stands either way.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let removed = self.evict_expired(now).len();
        if removed > 0 {
            tracing::info!(removed, "expired verifications swept");
            self.persist_quietly();
        }
        removed
    }

    /// Looks up the link of an identity.
    pub fn get_link(&self, external_id: &ExternalId) -> Option<&IdentityLink> {
        self.state.links.get(external_id)
    }

    /// Looks up the pending session of an identity.
    ///
    /// This is a plain lookup: a session past its lifetime is still
    /// returned until a sweep evicts it.
    pub fn get_pending(&self, external_id: &ExternalId) -> Option<&PendingSession> {
        self.state.pending_sessions.get(external_id)
    }

    /// Number of linked identities.
    pub fn link_count(&self) -> usize {
        self.state.links.len()
    }

    /// Number of pending sessions (including not-yet-swept stale ones).
    pub fn pending_count(&self) -> usize {
        self.state.pending_sessions.len()
    }

    /// The current in-memory state.
    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    /// The active (validated) configuration.
    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Writes the current state to the store.
    ///
    /// # Errors
    /// [`VerificationError::Store`] if the backend rejects the write.
    pub fn persist(&self) -> Result<(), VerificationError> {
        self.store.save(&self.state).map_err(|e| {
            tracing::error!(error = %e, "failed to persist verification state");
            VerificationError::Store(e)
        })
    }

    // -- internals --------------------------------------------------------

    /// Persist where the caller has no error channel for it.
    fn persist_quietly(&self) {
        // `persist` already logged the failure.
        let _ = self.persist();
    }

    /// Removes expired pending sessions and hands them back.
    fn evict_expired(&mut self, now: DateTime<Utc>) -> Vec<PendingSession> {
        let ttl = self.config.code_expiration;
        let mut expired = Vec::new();
        self.state.pending_sessions.retain(|_, session| {
            if session.is_expired(now, ttl) {
                expired.push(session.clone());
                false
            } else {
                true
            }
        });
        for session in &expired {
            tracing::debug!(external_id = %session.external_id, "pending verification expired");
        }
        expired
    }

    /// Resolves a submitted code to the caller's pending session.
    ///
    /// The caller's own session is checked first, so a code shared with
    /// another identity can never shadow it.
    fn match_code(
        &self,
        external_id: &ExternalId,
        code: &str,
        swept: &[PendingSession],
    ) -> Result<PendingSession, VerificationError> {
        if let Some(own) = self.state.pending_sessions.get(external_id) {
            if own.code == code {
                return Ok(own.clone());
            }
        }

        if swept
            .iter()
            .any(|s| &s.external_id == external_id && s.code == code)
        {
            return Err(VerificationError::Expired);
        }

        if self.state.pending_sessions.values().any(|s| s.code == code) {
            return Err(VerificationError::NotYourCode);
        }

        Err(VerificationError::InvalidCode)
    }

    /// Draws a code no pending session currently holds, the caller's own
    /// included, so a restart always invalidates the previous code.
    ///
    /// Random draws that keep colliding mean the code space is nearly full;
    /// the range is then walked in order for the first free code. With
    /// every code in use, the result duplicates another identity's code but
    /// still never repeats the caller's.
    fn issue_code(&self, external_id: &ExternalId) -> String {
        let pending = &self.state.pending_sessions;
        let taken = |code: &str| pending.values().any(|s| s.code == code);

        for _ in 0..MAX_CODE_DRAWS {
            let code = generate_code(&self.config);
            if !taken(&code) {
                return code;
            }
        }

        let width = self.config.code_digit_width;
        if let Some(code) = self
            .config
            .code_range()
            .map(|value| format_code(value, width))
            .find(|code| !taken(code))
        {
            return code;
        }

        tracing::warn!(
            %external_id,
            pending = pending.len(),
            "every code is in use, issuing a duplicate"
        );
        let previous = pending.get(external_id).map(|s| s.code.as_str());
        self.config
            .code_range()
            .map(|value| format_code(value, width))
            .find(|code| Some(code.as_str()) != previous)
            .unwrap_or_else(|| generate_code(&self.config))
    }
}

/// Draws a uniformly random code of exactly `code_digit_width` digits.
fn generate_code(config: &VerificationConfig) -> String {
    let value = rand::rng().random_range(config.code_range());
    format_code(value, config.code_digit_width)
}

fn format_code(value: u32, width: u32) -> String {
    let width = width as usize;
    format!("{value:0width$}")
}

// =========================================================================
// Tests
// =========================================================================
