//! Error types for the session layer.

use idlink_store::{ExternalId, StoreError};

/// Errors returned by the verification state machine.
///
/// Every variant except `Store` is a business-rule outcome the caller is
/// expected to report back to the user. None of them is fatal.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The identity is already linked. It must log out before it can
    /// link a different game account.
    #[error("{0} is already linked")]
    AlreadyLinked(ExternalId),

    /// A verification is already in flight for this identity and the
    /// restart policy is `Reject`.
    #[error("{0} already has a pending verification")]
    AlreadyPending(ExternalId),

    /// No live pending session carries the submitted code.
    #[error("invalid verification code")]
    InvalidCode,

    /// The code exists but was issued to a different identity.
    #[error("verification code was issued to another user")]
    NotYourCode,

    /// The code was the caller's own, but it outlived the expiration
    /// window and has been evicted.
    #[error("verification code expired")]
    Expired,

    /// Logout was requested for an identity that has no link.
    #[error("{0} is not linked")]
    NotLinked(ExternalId),

    /// The state change was applied in memory but could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures reported by external collaborators (game-platform lookup,
/// chat-platform nickname changes).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached or timed out.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The platform refused the action (e.g. missing nickname permission).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// This collaborator is not configured.
    #[error("not supported")]
    Unsupported,

    /// Anything else the collaborator reported.
    #[error("{0}")]
    Failed(String),
}
