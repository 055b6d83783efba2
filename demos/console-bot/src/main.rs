//! Console stand-in for a chat bot and a game client.
//!
//! Each stdin line is either a chat message or a game-client query:
//!
//! ```text
//! u1 /verify Alice          chat user "u1" runs a command
//! @game code u1             game asks for u1's code
//! @game verified u1         game asks whether u1 is linked
//! @game health
//! ```
//!
//! Ctrl-C (or end of input) stops the sweeper and saves the state.

use std::path::PathBuf;
use std::time::Duration;

use idlink::api::{self, GetCodeRequest};
use idlink::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct DemoConfig {
    data_file: PathBuf,
    code_expiration: Duration,
    code_digit_width: u32,
    sweep_interval: Duration,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("./data.json"),
            code_expiration: Duration::from_secs(10 * 60),
            code_digit_width: 4,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl DemoConfig {
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values fall back to the defaults.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(n) => Some(n),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "ignoring non-numeric setting");
                    None
                }
            }
        };

        Self {
            data_file: lookup("IDLINK_DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
            code_expiration: number("CODE_EXPIRATION_MINUTES")
                .and_then(|m| {
                    let secs = m.checked_mul(60);
                    if secs.is_none() {
                        tracing::warn!(minutes = m, "ignoring out-of-range code expiration");
                    }
                    secs
                })
                .map(Duration::from_secs)
                .unwrap_or(defaults.code_expiration),
            code_digit_width: number("CODE_DIGIT_WIDTH")
                .and_then(|w| u32::try_from(w).ok())
                .unwrap_or(defaults.code_digit_width),
            sweep_interval: number("SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Line<'a> {
    Chat { user: &'a str, text: &'a str },
    GameCode(&'a str),
    GameVerified(&'a str),
    GameHealth,
    Blank,
    Unrecognized,
}

fn parse_line(line: &str) -> Line<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    let (who, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    if who != "@game" {
        return Line::Chat { user: who, text: rest };
    }
    let (query, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    match query {
        "code" => Line::GameCode(arg.trim()),
        "verified" => Line::GameVerified(arg.trim()),
        "health" => Line::GameHealth,
        _ => Line::Unrecognized,
    }
}

// ---------------------------------------------------------------------------
// Nicknames
// ---------------------------------------------------------------------------

/// Prints nickname changes instead of calling a chat platform.
struct ConsoleNicknames;

impl NicknameSync for ConsoleNicknames {
    async fn set_nickname(
        &self,
        external_id: &ExternalId,
        nickname: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        match nickname {
            Some(name) => println!("  [chat] {external_id} is now known as {name}"),
            None => println!("  [chat] {external_id} nickname reset"),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DemoConfig::from_env();
    tracing::info!(data_file = %config.data_file.display(), "starting console bot");

    let service = LinkService::builder(FileStore::json(&config.data_file))
        .nicknames(ConsoleNicknames)
        .verification_config(VerificationConfig {
            code_expiration: config.code_expiration,
            code_digit_width: config.code_digit_width,
            ..Default::default()
        })
        .sweep_config(SweepConfig::every(config.sweep_interval))
        .build();
    let sweeper = service.spawn_sweeper();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => dispatch(&service, &line).await,
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    let metrics = sweeper.stop().await;
    tracing::info!(
        sweeps = metrics.total_sweeps,
        removed = metrics.total_removed,
        "sweeper stopped"
    );
    service.shutdown().await?;
    Ok(())
}

async fn dispatch<S, D, N>(service: &LinkService<S, D, N>, line: &str)
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    match parse_line(line) {
        Line::Chat { user, text } => {
            if let Some(reply) = handle_message(service, &ExternalId::from(user), text).await {
                for line in reply.text.lines() {
                    println!("  [bot → {user}] {line}");
                }
            }
        }
        Line::GameCode(user) => {
            let request = GetCodeRequest {
                external_id: user.to_string(),
            };
            print_response(api::get_code(service, request).await);
        }
        Line::GameVerified(user) => print_response(api::is_verified(service, user).await),
        Line::GameHealth => print_response(api::health(service)),
        Line::Blank => {}
        Line::Unrecognized => println!("  queries: @game code <id> | @game verified <id> | @game health"),
    }
}

fn print_response(resp: api::ApiResponse) {
    println!("  [game] {} {}", resp.status, resp.body);
}
