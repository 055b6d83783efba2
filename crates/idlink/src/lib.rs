//! # idlink
//!
//! Link chat-platform identities to game accounts with short-lived
//! numeric verification codes.
//!
//! A user asks the chat bot to verify them as a game username and gets a
//! code. The game shows the player the same code, the user types it back
//! into chat, and the two identities are linked. Links and in-flight
//! verifications survive restarts.
//!
//! The crate ties the layers together:
//!
//! ```text
//! commands / api  ← chat and game-client adapters
//!     ↕
//! LinkService     ← serializes access, calls collaborators, runs the sweeper
//!     ↕
//! SessionManager  ← verification state machine (idlink-session)
//!     ↕
//! SnapshotStore   ← whole-snapshot persistence (idlink-store)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use idlink::prelude::*;
//!
//! # async fn run() -> Result<(), LinkError> {
//! let service = LinkService::builder(FileStore::json("data.json")).build();
//! let sweeper = service.spawn_sweeper();
//!
//! let alice = ExternalId::from("chat-user-1");
//! let code = service.start_verification(alice.clone(), "Alice").await?;
//! service.confirm_verification(&alice, &code).await?;
//!
//! sweeper.stop().await;
//! service.shutdown().await
//! # }
//! ```

pub mod api;
pub mod commands;
mod error;
mod service;

pub use error::LinkError;
pub use service::{Confirmation, LinkService, LinkServiceBuilder, Logout, SideEffect, SweeperHandle};

pub mod prelude {
    pub use crate::commands::{ChatCommand, Reply, handle_command, handle_message};
    pub use crate::{
        Confirmation, LinkError, LinkService, LinkServiceBuilder, Logout, SideEffect,
        SweeperHandle,
    };
    pub use idlink_session::{
        CollaboratorError, GameDirectory, NicknameSync, NoDirectory, NoNicknames, RestartPolicy,
        VerificationConfig, VerificationError,
    };
    pub use idlink_store::{
        ExternalId, FileStore, IdentityLink, MemoryStore, PendingSession, SnapshotStore,
        StoreError,
    };
    pub use idlink_sweep::{SweepConfig, SweepMetrics};
}
