//! Verification session management for idlink.
//!
//! This crate owns the verification state machine for each chat identity:
//!
//! 1. **Issuing codes**: a user asks to be linked to a game username and
//!    receives a short numeric code ([`SessionManager::start_verification`])
//! 2. **Matching codes**: the user relays the code back and the pending
//!    session becomes an identity link
//!    ([`SessionManager::confirm_verification`])
//! 3. **Expiration**: codes older than the configured lifetime are
//!    evicted ([`SessionManager::sweep_expired`])
//!
//! It also defines the hooks for the outside world the flow depends on
//! ([`GameDirectory`], [`NicknameSync`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Service layer (above)  ← serializes access, calls collaborators
//!     ↕
//! Session layer (this crate)  ← unlinked / pending / linked per identity
//!     ↕
//! Store layer (below)  ← persists whole snapshots
//! ```

#![allow(async_fn_in_trait)]

mod collaborator;
mod config;
mod error;
mod manager;

pub use collaborator::{GameDirectory, NicknameSync, NoDirectory, NoNicknames};
pub use config::{RestartPolicy, VerificationConfig};
pub use error::{CollaboratorError, VerificationError};
pub use manager::SessionManager;
