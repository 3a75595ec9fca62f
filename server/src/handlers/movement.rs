//! CMD_MOVE: one-tile steps with server-side validation.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::protocol::{codes, ErrorCategory, ErrorPayload, Frame, MoveResultPayload, MovePayload};

use crate::context::ServerContext;
use crate::entities::EntityState;
use crate::handlers::{send_error, send_error_payload, send_internal_error, send_success};
use crate::session::Session;

pub fn handle_move(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    let payload: MovePayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(
                session,
                frame.id.clone(),
                codes::MOVE_BLOCKED,
                ErrorCategory::Validation,
                e,
            );
            return;
        }
    };

    // The client self-throttles, but the cooldown is enforced here too.
    let now_tick = ctx.current_tick();
    let cooldown = ctx.config.move_cooldown_ticks();
    let last = session.last_move_tick.load(Ordering::SeqCst);
    if last != 0 && now_tick.saturating_sub(last) < cooldown {
        let remaining_ticks = cooldown - now_tick.saturating_sub(last);
        let retry_after = remaining_ticks as f64 / f64::from(ctx.config.tick.hot_hz);
        send_error_payload(
            session,
            frame.id.clone(),
            ErrorPayload::new(
                codes::MOVE_RATE_LIMITED,
                ErrorCategory::Validation,
                "Moving too fast",
            )
            .with_retry_after(retry_after),
        );
        return;
    }

    let runtime = match ctx.store.get_player(session.player_id) {
        Ok(Some(rt)) => rt,
        Ok(None) => {
            send_error(
                session,
                frame.id.clone(),
                codes::PLAYER_NOT_ONLINE,
                ErrorCategory::Conflict,
                "No runtime state for this session",
            );
            return;
        }
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "move: reading player", &e);
            return;
        }
    };

    let (dx, dy) = payload.direction.offset();
    let target = (runtime.x + dx, runtime.y + dy);

    let Some(map) = ctx.maps.get(&runtime.map_id) else {
        send_internal_error(
            session,
            frame.id.clone(),
            "move",
            &format!("map '{}' not loaded", runtime.map_id),
        );
        return;
    };
    if map.is_blocked(target.0, target.1) {
        send_error(
            session,
            frame.id.clone(),
            codes::MOVE_BLOCKED,
            ErrorCategory::Validation,
            "That way is blocked",
        );
        return;
    }

    // Another player or a live entity on the tile blocks the step.
    match ctx.store.players_on_map(&runtime.map_id) {
        Ok(players) => {
            if players
                .iter()
                .any(|p| p.player_id != session.player_id && (p.x, p.y) == target)
            {
                send_error(
                    session,
                    frame.id.clone(),
                    codes::MOVE_OCCUPIED,
                    ErrorCategory::Conflict,
                    "Someone is standing there",
                );
                return;
            }
        }
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "move: listing players", &e);
            return;
        }
    }
    match ctx.store.map_entities(&runtime.map_id) {
        Ok(entities) => {
            if entities.iter().any(|e| {
                !matches!(e.state, EntityState::Dead | EntityState::Dying) && (e.x, e.y) == target
            }) {
                send_error(
                    session,
                    frame.id.clone(),
                    codes::MOVE_OCCUPIED,
                    ErrorCategory::Conflict,
                    "Something is standing there",
                );
                return;
            }
        }
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "move: listing entities", &e);
            return;
        }
    }

    if let Err(e) = ctx.store.set_player_position(
        session.player_id,
        target.0,
        target.1,
        &runtime.map_id,
        payload.direction,
    ) {
        send_internal_error(session, frame.id.clone(), "move: writing position", &e);
        return;
    }
    session.last_move_tick.store(now_tick, Ordering::SeqCst);

    // Observers learn about the step from the next hot-tick EVENT_GAME_UPDATE.
    send_success(
        session,
        frame.id.clone(),
        &MoveResultPayload {
            x: target.0,
            y: target.1,
            facing: payload.direction,
        },
    );
}
