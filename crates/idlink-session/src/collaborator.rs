//! Hooks for the platforms on either side of a link.
//!
//! idlink doesn't talk to a game platform or a chat platform itself.
//! Instead it defines two traits the embedding application implements:
//!
//! - [`GameDirectory`]: resolve a game username to a stable game ID.
//! - [`NicknameSync`]: mirror the linked game username into the user's
//!   chat nickname.
//!
//! Both are best-effort. A failing collaborator never fails the
//! verification itself.

use idlink_store::ExternalId;

use crate::CollaboratorError;

/// Resolves game usernames to stable game-platform IDs.
///
/// # Example
///
/// ```rust
/// use idlink_session::{CollaboratorError, GameDirectory};
///
/// /// Knows exactly one player.
/// struct FixedDirectory;
///
/// impl GameDirectory for FixedDirectory {
///     async fn resolve(
///         &self,
///         username: &str,
///     ) -> Result<Option<String>, CollaboratorError> {
///         Ok((username == "Alice").then(|| "1001".to_string()))
///     }
/// }
/// ```
pub trait GameDirectory: Send + Sync + 'static {
    /// Looks up `username` on the game platform.
    ///
    /// # Returns
    /// - `Ok(Some(id))`: the stable game ID
    /// - `Ok(None)`: the platform has no such user
    /// - `Err(_)`: the lookup itself failed
    fn resolve(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, CollaboratorError>> + Send;
}

/// Changes a user's display name on the chat platform.
pub trait NicknameSync: Send + Sync + 'static {
    /// Sets the nickname of `external_id`. `None` resets it to the
    /// platform default.
    fn set_nickname(
        &self,
        external_id: &ExternalId,
        nickname: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), CollaboratorError>> + Send;
}

/// A [`GameDirectory`] that never resolves anything. Links confirmed
/// with it carry a placeholder game ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDirectory;

impl GameDirectory for NoDirectory {
    async fn resolve(
        &self,
        _username: &str,
    ) -> Result<Option<String>, CollaboratorError> {
        Ok(None)
    }
}

/// A [`NicknameSync`] for deployments without nickname management.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNicknames;

impl NicknameSync for NoNicknames {
    async fn set_nickname(
        &self,
        _external_id: &ExternalId,
        _nickname: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Unsupported)
    }
}
