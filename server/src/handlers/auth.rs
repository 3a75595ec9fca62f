//! Authentication: the first frame on every socket.
//!
//! Consumes the bearer token minted by the external auth service, gates on
//! ban/timeout, and brings the player online. Called by the connection
//! manager before the session enters the active loop.

use common::protocol::{codes, AuthenticatePayload, ErrorCategory, ErrorPayload, Frame};

use crate::context::{RegisterError, ServerContext};
use crate::repository::PlayerRow;
use crate::store::players::PlayerRuntime;

/// Validate a CMD_AUTHENTICATE frame and register the player online.
pub fn authenticate(
    ctx: &ServerContext,
    frame: &Frame,
) -> Result<(PlayerRow, PlayerRuntime), ErrorPayload> {
    let payload: AuthenticatePayload = frame.parse_payload().map_err(|e| {
        ErrorPayload::new(codes::AUTH_FAILED, ErrorCategory::Validation, e)
    })?;

    let player_id = ctx
        .store
        .consume_auth_token(&payload.token)
        .map_err(|e| {
            log::error!("Token consume failed: {e}");
            ErrorPayload::new(
                codes::SYS_INTERNAL_ERROR,
                ErrorCategory::System,
                "Authentication backend unavailable",
            )
            .with_retry_after(5.0)
        })?
        .ok_or_else(|| {
            ErrorPayload::new(
                codes::AUTH_FAILED,
                ErrorCategory::Permission,
                "Invalid or expired token",
            )
        })?;

    ctx.register_online(player_id).map_err(|e| match e {
        RegisterError::NotFound => ErrorPayload::new(
            codes::AUTH_FAILED,
            ErrorCategory::Permission,
            "Unknown player account",
        ),
        RegisterError::Banned => ErrorPayload::new(
            codes::PLAYER_BANNED,
            ErrorCategory::Permission,
            "This account is banned",
        ),
        RegisterError::TimedOut => ErrorPayload::new(
            codes::PLAYER_TIMED_OUT,
            ErrorCategory::Permission,
            "This account is temporarily suspended",
        ),
        RegisterError::System(err) => {
            log::error!("Login of player {player_id} failed: {err}");
            ErrorPayload::new(
                codes::SYS_INTERNAL_ERROR,
                ErrorCategory::System,
                "Login failed",
            )
            .with_retry_after(5.0)
        }
    })
}
