//! `LinkService` builder and shared service handle.
//!
//! This is the entry point for embedding idlink. It ties together all the
//! layers: store → session manager → collaborators → sweeper.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use idlink_session::{
    CollaboratorError, GameDirectory, NicknameSync, NoDirectory, NoNicknames, SessionManager,
    VerificationConfig,
};
use idlink_store::{ExternalId, IdentityLink, PendingSession, SnapshotStore};
use idlink_sweep::{SweepConfig, SweepControl, SweepMetrics, SweepScheduler, run_sweeper};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::LinkError;

/// Source of "now" for every time-dependent operation.
type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Outcome of a best-effort call to the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// The platform accepted the change.
    Applied,
    /// No collaborator is configured for it.
    Skipped,
    /// The platform refused or failed; the reason is kept for the reply.
    Failed(String),
}

impl SideEffect {
    fn from_result(result: Result<(), CollaboratorError>) -> Self {
        match result {
            Ok(()) => Self::Applied,
            Err(CollaboratorError::Unsupported) => Self::Skipped,
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    /// Whether the side effect took place.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// A successful confirmation.
#[derive(Debug, Clone)]
pub struct Confirmation {
    /// The link that was just created.
    pub link: IdentityLink,
    /// Whether the chat nickname now shows the game username.
    pub nickname: SideEffect,
}

/// A successful logout.
#[derive(Debug, Clone)]
pub struct Logout {
    /// The link that was removed.
    pub link: IdentityLink,
    /// Whether the chat nickname was reset.
    pub nickname: SideEffect,
}

/// Shared service state behind every [`LinkService`] clone.
///
/// The manager is behind an async `Mutex` so exactly one operation
/// touches the maps at a time. Collaborators live outside it.
struct ServiceState<S: SnapshotStore, D, N> {
    manager: Mutex<SessionManager<S>>,
    directory: D,
    nicknames: N,
    verification: VerificationConfig,
    sweep: SweepConfig,
    clock: Clock,
}

/// Builder for configuring a [`LinkService`].
///
/// # Example
///
/// ```rust,no_run
/// use idlink::prelude::*;
///
/// let service = LinkService::builder(FileStore::json("data.json"))
///     .verification_config(VerificationConfig {
///         code_digit_width: 6,
///         ..Default::default()
///     })
///     .build();
/// ```
pub struct LinkServiceBuilder<S, D = NoDirectory, N = NoNicknames> {
    store: S,
    directory: D,
    nicknames: N,
    verification: VerificationConfig,
    sweep: SweepConfig,
    clock: Clock,
}

impl<S, D, N> LinkServiceBuilder<S, D, N>
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    /// Sets the code lifetime, width and restart policy.
    pub fn verification_config(mut self, config: VerificationConfig) -> Self {
        self.verification = config;
        self
    }

    /// Sets the expiration sweeper configuration.
    pub fn sweep_config(mut self, config: SweepConfig) -> Self {
        self.sweep = config;
        self
    }

    /// Uses `directory` to resolve game usernames to game IDs.
    pub fn directory<D2: GameDirectory>(self, directory: D2) -> LinkServiceBuilder<S, D2, N> {
        LinkServiceBuilder {
            store: self.store,
            directory,
            nicknames: self.nicknames,
            verification: self.verification,
            sweep: self.sweep,
            clock: self.clock,
        }
    }

    /// Uses `nicknames` to mirror game usernames into chat nicknames.
    pub fn nicknames<N2: NicknameSync>(self, nicknames: N2) -> LinkServiceBuilder<S, D, N2> {
        LinkServiceBuilder {
            store: self.store,
            directory: self.directory,
            nicknames,
            verification: self.verification,
            sweep: self.sweep,
            clock: self.clock,
        }
    }

    /// Replaces the wall clock. Tests use this to step through expiry.
    pub fn clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Loads the persisted state and builds the service.
    ///
    /// Never fails: a missing or unreadable snapshot starts empty.
    pub fn build(self) -> LinkService<S, D, N> {
        let verification = self.verification.validated();
        let manager = SessionManager::open(self.store, verification.clone());

        LinkService {
            state: Arc::new(ServiceState {
                manager: Mutex::new(manager),
                directory: self.directory,
                nicknames: self.nicknames,
                verification,
                sweep: self.sweep.validated(),
                clock: self.clock,
            }),
        }
    }
}

/// The verification service.
///
/// Cheap to clone; every clone shares the same state. Call
/// [`spawn_sweeper`](Self::spawn_sweeper) once to start periodic
/// expiration and [`shutdown`](Self::shutdown) before exiting.
///
/// # Blocking saves
///
/// Every mutating operation saves the whole snapshot through
/// [`SnapshotStore::save`] while holding the state lock, and that call is
/// synchronous. With [`FileStore`](idlink_store::FileStore) this is a
/// small file write plus `fsync` on the calling Tokio worker. That is
/// fine for a chat bot's traffic; run the service on the multi-threaded
/// runtime so a slow disk stalls one worker rather than the whole
/// process, or use a store whose `save` only hands the bytes off.
pub struct LinkService<S: SnapshotStore, D = NoDirectory, N = NoNicknames> {
    state: Arc<ServiceState<S, D, N>>,
}

impl<S: SnapshotStore, D, N> Clone for LinkService<S, D, N> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: SnapshotStore> LinkService<S> {
    /// Creates a builder around `store`, with no collaborators.
    ///
    /// `store` is called synchronously on async workers; see
    /// [Blocking saves](LinkService#blocking-saves).
    pub fn builder(store: S) -> LinkServiceBuilder<S> {
        LinkServiceBuilder {
            store,
            directory: NoDirectory,
            nicknames: NoNicknames,
            verification: VerificationConfig::default(),
            sweep: SweepConfig::default(),
            clock: Arc::new(Utc::now),
        }
    }
}

impl<S, D, N> LinkService<S, D, N>
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    /// Starts (or restarts) verification and returns the code to relay.
    pub async fn start_verification(
        &self,
        external_id: ExternalId,
        game_username: impl Into<String>,
    ) -> Result<String, LinkError> {
        let now = self.now();
        let mut manager = self.state.manager.lock().await;
        Ok(manager.start_verification(external_id, game_username, now)?)
    }

    /// Confirms `code` for `external_id` and links the identity.
    ///
    /// The game ID is looked up and the nickname updated without holding
    /// the state lock. Neither can fail the confirmation: a failed lookup
    /// falls back to a placeholder ID, a failed nickname change is
    /// reported in [`Confirmation::nickname`].
    pub async fn confirm_verification(
        &self,
        external_id: &ExternalId,
        code: &str,
    ) -> Result<Confirmation, LinkError> {
        let code = code.trim();

        let claimed = self.claimed_username(external_id, code).await;
        let resolved = match &claimed {
            Some(username) => self.resolve_game_id(external_id, username).await,
            None => None,
        };

        let link = {
            let mut manager = self.state.manager.lock().await;
            // The session may have been restarted while the lookup ran.
            let unchanged = manager
                .get_pending(external_id)
                .filter(|s| s.code == code)
                .map(|s| s.claimed_game_username.as_str())
                == claimed.as_deref();
            let resolved = if unchanged { resolved } else { None };
            manager.confirm_verification(external_id, code, resolved, self.now())?
        };

        let nickname = self
            .sync_nickname(external_id, Some(&link.game_username))
            .await;
        Ok(Confirmation { link, nickname })
    }

    /// Unlinks `external_id` and resets its nickname.
    pub async fn logout(&self, external_id: &ExternalId) -> Result<Logout, LinkError> {
        let link = {
            let mut manager = self.state.manager.lock().await;
            manager.logout(external_id)?
        };

        let nickname = self.sync_nickname(external_id, None).await;
        Ok(Logout { link, nickname })
    }

    /// The link of `external_id`, if any.
    pub async fn get_link(&self, external_id: &ExternalId) -> Option<IdentityLink> {
        self.state.manager.lock().await.get_link(external_id).cloned()
    }

    /// The pending session of `external_id`, if any. Stale sessions are
    /// returned until a sweep removes them; see [`is_live`](Self::is_live).
    pub async fn get_pending(&self, external_id: &ExternalId) -> Option<PendingSession> {
        self.state
            .manager
            .lock()
            .await
            .get_pending(external_id)
            .cloned()
    }

    /// Whether `session` is still within the code lifetime right now.
    pub fn is_live(&self, session: &PendingSession) -> bool {
        !session.is_expired(self.now(), self.state.verification.code_expiration)
    }

    /// Evicts expired pending sessions and returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.now();
        self.state.manager.lock().await.sweep_expired(now)
    }

    /// Number of linked identities.
    pub async fn link_count(&self) -> usize {
        self.state.manager.lock().await.link_count()
    }

    /// Number of pending sessions.
    pub async fn pending_count(&self) -> usize {
        self.state.manager.lock().await.pending_count()
    }

    /// How long an issued code stays valid.
    pub fn code_expiration(&self) -> Duration {
        self.state.verification.code_expiration
    }

    /// The current time according to the service clock.
    pub fn now(&self) -> DateTime<Utc> {
        (self.state.clock)()
    }

    /// Starts the periodic expiration sweeper on the current runtime.
    ///
    /// The sweeper only calls [`sweep_expired`](Self::sweep_expired). Pause,
    /// resume or stop it through the returned [`SweeperHandle`].
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        let (control_tx, control_rx) = watch::channel(SweepControl::Run);
        let scheduler = SweepScheduler::new(self.state.sweep.clone());
        let service = self.clone();

        let task = tokio::spawn(run_sweeper(scheduler, control_rx, move || {
            let service = service.clone();
            async move { service.sweep_expired().await }
        }));

        SweeperHandle {
            control: control_tx,
            task,
        }
    }

    /// Writes the final state to the store.
    ///
    /// Stop the sweeper first so nothing mutates state afterwards.
    pub async fn shutdown(&self) -> Result<(), LinkError> {
        let manager = self.state.manager.lock().await;
        manager.persist()?;
        tracing::info!(
            links = manager.link_count(),
            pending = manager.pending_count(),
            "link service shut down"
        );
        Ok(())
    }

    // -- collaborators ----------------------------------------------------

    /// The username claimed by the caller's live session, when `code` is
    /// that session's code.
    async fn claimed_username(&self, external_id: &ExternalId, code: &str) -> Option<String> {
        let manager = self.state.manager.lock().await;
        manager
            .get_pending(external_id)
            .filter(|s| s.code == code && self.is_live(s))
            .map(|s| s.claimed_game_username.clone())
    }

    async fn resolve_game_id(&self, external_id: &ExternalId, username: &str) -> Option<String> {
        match self.state.directory.resolve(username).await {
            Ok(Some(game_id)) => Some(game_id),
            Ok(None) => {
                tracing::debug!(%external_id, game_username = %username, "game username not resolved");
                None
            }
            Err(e) => {
                tracing::warn!(
                    %external_id,
                    game_username = %username,
                    error = %e,
                    "game id lookup failed, using placeholder"
                );
                None
            }
        }
    }

    async fn sync_nickname(&self, external_id: &ExternalId, nickname: Option<&str>) -> SideEffect {
        let effect =
            SideEffect::from_result(self.state.nicknames.set_nickname(external_id, nickname).await);
        if let SideEffect::Failed(reason) = &effect {
            tracing::warn!(%external_id, error = %reason, "could not update nickname");
        }
        effect
    }
}

/// Handle to a running expiration sweeper.
pub struct SweeperHandle {
    control: watch::Sender<SweepControl>,
    task: JoinHandle<SweepMetrics>,
}

impl SweeperHandle {
    /// Holds sweeps until [`resume`](Self::resume). Lazy eviction on
    /// confirm keeps working meanwhile.
    pub fn pause(&self) {
        self.set(SweepControl::Pause);
    }

    /// Restarts sweeping; the next sweep is one interval away.
    pub fn resume(&self) {
        self.set(SweepControl::Run);
    }

    pub fn is_paused(&self) -> bool {
        *self.control.borrow() == SweepControl::Pause
    }

    /// Signals the sweeper to stop and waits for it. Returns its metrics.
    pub async fn stop(self) -> SweepMetrics {
        self.set(SweepControl::Stop);
        match self.task.await {
            Ok(metrics) => metrics,
            Err(e) => {
                tracing::error!(error = %e, "sweeper task failed");
                SweepMetrics::default()
            }
        }
    }

    /// Whether the sweeper task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    fn set(&self, state: SweepControl) {
        // Wakes the sweeper only on an actual change.
        self.control.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }
}
