//! Pure read queries, answered with RESP_DATA.

use std::sync::Arc;

use common::protocol::{
    codes, ChunkUpdatePayload, ErrorCategory, Frame, MapChunksQueryPayload, MessageType,
};

use crate::context::ServerContext;
use crate::handlers::{send_data, send_error, send_internal_error};
use crate::map::TileMap;
use crate::session::Session;
use crate::visibility;

/// Largest chunk radius a single query may request.
const MAX_CHUNK_QUERY_RADIUS: i32 = 4;

pub fn handle_query(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    match frame.msg_type {
        MessageType::QueryInventory => match ctx.inventory_view(session.player_id) {
            Ok(view) => send_data(session, frame.id.clone(), &view),
            Err(e) => send_internal_error(session, frame.id.clone(), "query inventory", &e),
        },
        MessageType::QueryEquipment => match ctx.equipment_view(session.player_id) {
            Ok(view) => send_data(session, frame.id.clone(), &view),
            Err(e) => send_internal_error(session, frame.id.clone(), "query equipment", &e),
        },
        MessageType::QueryStats => match ctx.stats_view(session.player_id) {
            Ok(view) => send_data(session, frame.id.clone(), &view),
            Err(e) => send_internal_error(session, frame.id.clone(), "query stats", &e),
        },
        MessageType::QueryMapChunks => handle_map_chunks(ctx, session, frame),
        _ => unreachable!("dispatch only routes queries here"),
    }
}

fn handle_map_chunks(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    let payload: MapChunksQueryPayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(
                session,
                frame.id.clone(),
                codes::MAP_CHUNK_OUT_OF_RANGE,
                ErrorCategory::Validation,
                e,
            );
            return;
        }
    };

    if payload.radius < 0 || payload.radius > MAX_CHUNK_QUERY_RADIUS {
        send_error(
            session,
            frame.id.clone(),
            codes::MAP_CHUNK_OUT_OF_RANGE,
            ErrorCategory::Validation,
            format!("Chunk radius must be within 0..={MAX_CHUNK_QUERY_RADIUS}"),
        );
        return;
    }

    let runtime = match ctx.store.get_player(session.player_id) {
        Ok(Some(rt)) => rt,
        _ => {
            send_error(
                session,
                frame.id.clone(),
                codes::PLAYER_NOT_ONLINE,
                ErrorCategory::Conflict,
                "No runtime state for this session",
            );
            return;
        }
    };

    // The requested center must lie within the player's visible range.
    if !visibility::in_visible_range(
        (runtime.x, runtime.y),
        (payload.center_x, payload.center_y),
        ctx.visible_range(),
    ) {
        send_error(
            session,
            frame.id.clone(),
            codes::MAP_CHUNK_OUT_OF_RANGE,
            ErrorCategory::Validation,
            "Requested chunks are outside your view",
        );
        return;
    }

    let Some(map) = ctx.maps.get(&runtime.map_id) else {
        send_internal_error(
            session,
            frame.id.clone(),
            "query chunks",
            &format!("map '{}' not loaded", runtime.map_id),
        );
        return;
    };

    let (center_cx, center_cy) = TileMap::chunk_of(payload.center_x, payload.center_y);
    let mut chunks = Vec::new();
    for cy in (center_cy - payload.radius)..=(center_cy + payload.radius) {
        for cx in (center_cx - payload.radius)..=(center_cx + payload.radius) {
            if let Some(chunk) = map.chunk(cx, cy) {
                chunks.push(chunk);
            }
        }
    }

    send_data(
        session,
        frame.id.clone(),
        &ChunkUpdatePayload {
            map_id: runtime.map_id.clone(),
            chunks,
        },
    );
}
