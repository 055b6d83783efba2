//! Unified error type for idlink.

use idlink_session::VerificationError;

/// Top-level error returned by [`LinkService`](crate::LinkService).
///
/// Collaborator failures never surface here: lookups fall back to the
/// placeholder game id and nickname changes are reported as a
/// [`SideEffect`](crate::SideEffect). Snapshot save failures arrive as
/// [`VerificationError::Store`].
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// A verification rule rejected the request, or its result could not
    /// be saved.
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl LinkError {
    /// The verification outcome behind this error, if it is one.
    pub fn as_verification(&self) -> Option<&VerificationError> {
        match self {
            Self::Verification(e) => Some(e),
        }
    }

    /// Whether this error means the state could not be persisted, as
    /// opposed to a rule rejecting the request.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::Verification(VerificationError::Store(_)))
    }
}
