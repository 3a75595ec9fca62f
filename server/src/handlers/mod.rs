//! Command and query handlers.
//!
//! One module per family; [`dispatch`] is the type-to-handler table the
//! session reader thread drives. Every handler decodes its typed payload
//! (validation is deserialization), applies effects through the context
//! services, and answers with RESP_SUCCESS / RESP_DATA / RESP_ERROR.

pub mod admin;
pub mod appearance;
pub mod auth;
pub mod chat;
pub mod combat;
pub mod inventory;
pub mod movement;
pub mod queries;

use std::sync::Arc;

use common::protocol::{codes, ErrorCategory, ErrorPayload, Frame, MessageType};
use serde::Serialize;

use crate::context::ServerContext;
use crate::session::Session;

/// Route one authenticated inbound frame to its handler.
pub fn dispatch(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    match frame.msg_type {
        MessageType::CmdMove => movement::handle_move(ctx, session, frame),
        MessageType::CmdChatSend => chat::handle_chat_send(ctx, session, frame),
        MessageType::CmdAttack => combat::handle_attack(ctx, session, frame),
        MessageType::CmdToggleAutoRetaliate => {
            combat::handle_toggle_auto_retaliate(ctx, session, frame)
        }
        MessageType::CmdInventoryMove => inventory::handle_inventory_move(ctx, session, frame),
        MessageType::CmdInventorySort => inventory::handle_inventory_sort(ctx, session, frame),
        MessageType::CmdItemDrop => inventory::handle_item_drop(ctx, session, frame),
        MessageType::CmdItemPickup => inventory::handle_item_pickup(ctx, session, frame),
        MessageType::CmdItemEquip => inventory::handle_item_equip(ctx, session, frame),
        MessageType::CmdItemUnequip => inventory::handle_item_unequip(ctx, session, frame),
        MessageType::CmdUpdateAppearance => {
            appearance::handle_update_appearance(ctx, session, frame)
        }
        MessageType::CmdAdminGive => admin::handle_admin_give(ctx, session, frame),
        MessageType::QueryInventory
        | MessageType::QueryEquipment
        | MessageType::QueryStats
        | MessageType::QueryMapChunks => queries::handle_query(ctx, session, frame),
        MessageType::CmdAuthenticate => {
            send_error(
                session,
                frame.id.clone(),
                codes::AUTH_FAILED,
                ErrorCategory::Validation,
                "Session is already authenticated",
            );
        }
        _ => {
            send_error(
                session,
                frame.id.clone(),
                codes::SYS_INTERNAL_ERROR,
                ErrorCategory::Validation,
                format!("Unhandled message type {}", frame.msg_type.as_str()),
            );
        }
    }
}

pub(crate) fn send_success<P: Serialize>(session: &Session, id: Option<String>, payload: &P) {
    match Frame::success(id, payload) {
        Ok(frame) => {
            session.send(frame);
        }
        Err(e) => log::error!("Encoding success response: {e}"),
    }
}

pub(crate) fn send_data<P: Serialize>(session: &Session, id: Option<String>, payload: &P) {
    match Frame::data(id, payload) {
        Ok(frame) => {
            session.send(frame);
        }
        Err(e) => log::error!("Encoding data response: {e}"),
    }
}

pub(crate) fn send_error(
    session: &Session,
    id: Option<String>,
    code: &str,
    category: ErrorCategory,
    message: impl Into<String>,
) {
    session.send(Frame::error(id, &ErrorPayload::new(code, category, message)));
}

pub(crate) fn send_error_payload(session: &Session, id: Option<String>, payload: ErrorPayload) {
    session.send(Frame::error(id, &payload));
}

/// Shorthand for the internal-failure reply used when a service call errors.
pub(crate) fn send_internal_error(session: &Session, id: Option<String>, context: &str, err: &str) {
    log::error!("{context}: {err}");
    send_error(
        session,
        id,
        codes::SYS_INTERNAL_ERROR,
        ErrorCategory::System,
        "Internal server error",
    );
}
