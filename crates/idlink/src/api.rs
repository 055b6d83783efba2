//! Query handlers for the game client.
//!
//! The game shows a player their verification code and checks whether a
//! chat identity is linked. These handlers produce a status code and a
//! JSON body; mounting them on an HTTP server is left to the embedding
//! application.
//!
//! | Handler         | 200 body                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`health`]      | `{status, message, timestamp}`                        |
//! | [`get_code`]    | `{code, created_at}`                                  |
//! | [`is_verified`] | `{verified, game_username, game_id, verified_at}`     |
//!
//! Failures carry `{error: "..."}`.

use chrono::{DateTime, Utc};
use idlink_session::{GameDirectory, NicknameSync};
use idlink_store::{ExternalId, SnapshotStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LinkService;

/// A handler result: HTTP-style status plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok<T: Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(e) => {
                tracing::error!(error = %e, "failed to encode api response");
                Self::error(500, "Internal server error")
            }
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": message }),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Body of a code request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetCodeRequest {
    #[serde(default)]
    pub external_id: String,
}

#[derive(Serialize)]
struct Health<'a> {
    status: &'a str,
    message: &'a str,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct CodeBody<'a> {
    code: &'a str,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct VerifiedBody<'a> {
    verified: bool,
    game_username: &'a str,
    game_id: &'a str,
    verified_at: DateTime<Utc>,
}

/// Liveness probe.
pub fn health<S, D, N>(service: &LinkService<S, D, N>) -> ApiResponse
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    ApiResponse::ok(&Health {
        status: "OK",
        message: "Identity link API is running",
        timestamp: service.now(),
    })
}

/// The live verification code issued to `request.external_id`.
///
/// 400 without an id, 404 when nothing live is pending.
pub async fn get_code<S, D, N>(service: &LinkService<S, D, N>, request: GetCodeRequest) -> ApiResponse
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    let raw = request.external_id.trim();
    if raw.is_empty() {
        return ApiResponse::error(400, "Missing external_id in request body");
    }

    match service.get_pending(&ExternalId::from(raw)).await {
        Some(pending) if service.is_live(&pending) => ApiResponse::ok(&CodeBody {
            code: &pending.code,
            created_at: pending.created_at,
        }),
        _ => ApiResponse::error(404, "No pending verification found for this user"),
    }
}

/// Link details for `external_id`.
///
/// 400 without an id, 404 when the identity is not linked.
pub async fn is_verified<S, D, N>(service: &LinkService<S, D, N>, external_id: &str) -> ApiResponse
where
    S: SnapshotStore,
    D: GameDirectory,
    N: NicknameSync,
{
    let raw = external_id.trim();
    if raw.is_empty() {
        return ApiResponse::error(400, "Missing external_id parameter");
    }

    match service.get_link(&ExternalId::from(raw)).await {
        Some(link) => ApiResponse::ok(&VerifiedBody {
            verified: true,
            game_username: &link.game_username,
            game_id: &link.game_id,
            verified_at: link.verified_at,
        }),
        None => ApiResponse::error(404, "User not found or not verified"),
    }
}
