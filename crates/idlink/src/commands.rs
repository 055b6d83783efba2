//! Chat command adapter.
//!
//! Turns slash commands typed by a chat user into [`LinkService`] calls
//! and renders the outcome as a [`Reply`]. Transport-agnostic: the chat
//! integration supplies the caller's [`ExternalId`] and delivers the
//! reply however its platform does.
//!
//! Supported commands:
//!
//! | Command              | Effect                                  |
//! |----------------------|-----------------------------------------|
//! | `/verify <username>` | start verification, reply with the code |
//! | `/confirm <code>`    | link the identity                       |
//! | `/logout`            | remove the link                         |
//! | `/status`            | show the caller's current state         |

use std::time::Duration;

use idlink_session::{GameDirectory, NicknameSync, VerificationError};
use idlink_store::{ExternalId, SnapshotStore};

use crate::{LinkError, LinkService, SideEffect};

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Start verification as `username`.
    Verify { username: String },
    /// Confirm with a code.
    Confirm { code: String },
    /// Remove the caller's link.
    Logout,
    /// Show the caller's link or pending verification.
    Status,
}

/// Why a line could not be parsed as a [`ChatCommand`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The line doesn't start with `/`; it's ordinary chat.
    #[error("not a command")]
    NotACommand,

    #[error("unknown command `/{0}`")]
    Unknown(String),

    #[error("`/{command}` needs a <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
}

impl ChatCommand {
    /// Parses one line of chat input. Extra trailing words are ignored.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let body = input
            .trim()
            .strip_prefix('/')
            .ok_or(ParseError::NotACommand)?;
        let mut words = body.split_whitespace();
        let name = words.next().ok_or(ParseError::NotACommand)?;

        match name.to_ascii_lowercase().as_str() {
            "verify" => {
                let username = words.next().ok_or(ParseError::MissingArgument {
                    command: "verify",
                    argument: "username",
                })?;
                Ok(Self::Verify {
                    username: username.to_string(),
                })
            }
            "confirm" => {
                let code = words.next().ok_or(ParseError::MissingArgument {
                    command: "confirm",
                    argument: "code",
                })?;
                Ok(Self::Confirm {
                    code: code.to_string(),
                })
            }
            "logout" => Ok(Self::Logout),
            "status" => Ok(Self::Status),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// Text to send back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Show only to the caller. Verification replies carry codes, so
    /// every reply produced here is ephemeral.
    pub ephemeral: bool,
}

impl Reply {
    fn private(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ephemeral: true,
        }
    }
}

/// Parses `input` and runs it. Returns `None` for ordinary chat lines.
pub async fn handle_message<S, D, N>(
    service: &LinkService<S, D, N>,
    caller: &ExternalId,
    input: &str,
) -> Option<Reply>
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    match ChatCommand::parse(input) {
        Ok(command) => Some(handle_command(service, caller, command).await),
        Err(ParseError::NotACommand) => None,
        Err(e) => Some(Reply::private(format!("{e}. {USAGE}"))),
    }
}

const USAGE: &str =
    "Available commands: `/verify <username>`, `/confirm <code>`, `/logout`, `/status`.";

/// Runs `command` on behalf of `caller` and renders the reply.
pub async fn handle_command<S, D, N>(
    service: &LinkService<S, D, N>,
    caller: &ExternalId,
    command: ChatCommand,
) -> Reply
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    match command {
        ChatCommand::Verify { username } => verify(service, caller, username).await,
        ChatCommand::Confirm { code } => confirm(service, caller, &code).await,
        ChatCommand::Logout => logout(service, caller).await,
        ChatCommand::Status => status(service, caller).await,
    }
}

async fn verify<S, D, N>(service: &LinkService<S, D, N>, caller: &ExternalId, username: String) -> Reply
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    match service.start_verification(caller.clone(), username).await {
        Ok(code) => Reply::private(format!(
            "Verification started! Please check your game screen for the verification code.\n\
             Enter `/confirm {code}` when you have the code.\n\
             This code will expire in {} minutes.",
            minutes(service.code_expiration())
        )),
        Err(LinkError::Verification(VerificationError::AlreadyLinked(_))) => {
            let username = service
                .get_link(caller)
                .await
                .map(|link| link.game_username)
                .unwrap_or_default();
            Reply::private(format!(
                "You are already verified as `{username}`. \
                 Use /logout first if you want to change accounts."
            ))
        }
        Err(LinkError::Verification(VerificationError::AlreadyPending(_))) => Reply::private(
            "You already have a verification in progress. \
             Use the code you were given, or wait for it to expire.",
        ),
        Err(e) => {
            tracing::error!(external_id = %caller, error = %e, "verify command failed");
            Reply::private(
                "An error occurred while processing your verification. Please try again later.",
            )
        }
    }
}

async fn confirm<S, D, N>(service: &LinkService<S, D, N>, caller: &ExternalId, code: &str) -> Reply
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    match service.confirm_verification(caller, code).await {
        Ok(confirmation) => {
            let username = &confirmation.link.game_username;
            let nickname = match confirmation.nickname {
                SideEffect::Applied => format!("\nI've updated your nickname to `{username}`."),
                SideEffect::Failed(_) => {
                    "\nI couldn't update your nickname - I may not have permission.".to_string()
                }
                SideEffect::Skipped => String::new(),
            };
            Reply::private(format!(
                "✅ Verification successful!\nYou are now verified as `{username}`.{nickname}"
            ))
        }
        Err(LinkError::Verification(VerificationError::InvalidCode)) => Reply::private(
            "❌ Invalid or expired verification code. \
             Please try again with a new code using `/verify`.",
        ),
        Err(LinkError::Verification(VerificationError::Expired)) => Reply::private(
            "❌ Your verification code has expired. Please start again using `/verify`.",
        ),
        Err(LinkError::Verification(VerificationError::NotYourCode)) => Reply::private(
            "❌ This code was not issued to you. Please use `/verify` to get your own code.",
        ),
        Err(e) => {
            tracing::error!(external_id = %caller, error = %e, "confirm command failed");
            Reply::private(
                "An error occurred while completing your verification. Please try again.",
            )
        }
    }
}

async fn logout<S, D, N>(service: &LinkService<S, D, N>, caller: &ExternalId) -> Reply
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    match service.logout(caller).await {
        Ok(logout) => Reply::private(format!(
            "You have been logged out. Your verification as `{}` has been removed.",
            logout.link.game_username
        )),
        Err(LinkError::Verification(VerificationError::NotLinked(_))) => {
            Reply::private("You are not currently verified.")
        }
        Err(e) => {
            tracing::error!(external_id = %caller, error = %e, "logout command failed");
            Reply::private("An error occurred while logging you out. Please try again later.")
        }
    }
}

async fn status<S, D, N>(service: &LinkService<S, D, N>, caller: &ExternalId) -> Reply
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    if let Some(link) = service.get_link(caller).await {
        return Reply::private(format!(
            "You are verified as `{}` since {}.",
            link.game_username,
            link.verified_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }

    match service.get_pending(caller).await {
        Some(pending) if service.is_live(&pending) => Reply::private(format!(
            "Your verification as `{}` is pending. \
             Enter `/confirm <code>` with the code shown in your game.",
            pending.claimed_game_username
        )),
        _ => Reply::private(
            "You are not currently verified. Use `/verify <username>` to start.",
        ),
    }
}

/// Whole minutes, rounded up so a 90 s lifetime doesn't read as "1".
fn minutes(duration: Duration) -> u64 {
    duration.as_secs().div_ceil(60)
}
