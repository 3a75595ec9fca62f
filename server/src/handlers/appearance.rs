//! CMD_UPDATE_APPEARANCE: strict enum validation, durable write, visual
//! cache invalidation, and observer notification.

use std::sync::Arc;

use common::protocol::{codes, ErrorCategory, Frame, UpdateAppearancePayload};
use common::visual::VisualState;

use crate::context::ServerContext;
use crate::handlers::inventory::announce_visual_change;
use crate::handlers::{send_error, send_internal_error, send_success};
use crate::inventory;
use crate::session::Session;

pub fn handle_update_appearance(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    // Every field is a closed enum; an unknown value fails deserialization.
    let payload: UpdateAppearancePayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(
                session,
                frame.id.clone(),
                codes::APPEARANCE_INVALID,
                ErrorCategory::Validation,
                e,
            );
            return;
        }
    };

    if let Err(e) = ctx
        .repo
        .save_player_appearance(session.player_id, &payload.appearance)
    {
        send_internal_error(session, frame.id.clone(), "appearance: save", &e);
        return;
    }

    let equipment = match ctx.repo.load_equipment(session.player_id) {
        Ok(rows) => rows,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "appearance: load equipment", &e);
            return;
        }
    };
    let state = VisualState::new(payload.appearance, inventory::equipped_visuals(&equipment));
    let key = format!("player:{}", session.player_id);
    let hash = ctx.visuals.register_visual_state(&key, &state);

    if let Ok(Some(runtime)) = ctx.store.get_player(session.player_id) {
        announce_visual_change(
            ctx,
            session.player_id,
            &runtime.map_id,
            (runtime.x, runtime.y),
            &hash,
            &state,
        );
    }

    #[derive(serde::Serialize)]
    struct AppearanceResult {
        visual_hash: String,
    }
    send_success(session, frame.id.clone(), &AppearanceResult { visual_hash: hash });
}
