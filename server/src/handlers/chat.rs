//! CMD_CHAT_SEND: normalization, channel gating, and routing.

use std::sync::Arc;

use common::chat::ChatChannel;
use common::protocol::{codes, ChatMessagePayload, ChatSendPayload, ErrorCategory, Frame, MessageType};

use crate::chat as chat_service;
use crate::context::ServerContext;
use crate::handlers::{send_error, send_internal_error, send_success};
use crate::session::Session;

pub fn handle_chat_send(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    let payload: ChatSendPayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(session, frame.id.clone(), codes::CHAT_EMPTY, ErrorCategory::Validation, e);
            return;
        }
    };

    let limit = chat_service::channel_limit(&ctx.config.chat, payload.channel);
    let Some(message) = chat_service::normalize_message(&payload.message, limit) else {
        send_error(
            session,
            frame.id.clone(),
            codes::CHAT_EMPTY,
            ErrorCategory::Validation,
            "Message is empty",
        );
        return;
    };

    let event = ChatMessagePayload {
        channel: payload.channel,
        sender_id: session.player_id,
        sender_name: session.username.clone(),
        message,
        recipient: payload.recipient.clone(),
        timestamp: chrono::Utc::now().timestamp(),
    };

    match payload.channel {
        ChatChannel::Local => {
            let range = ctx.config.chat.local_chunk_radius * crate::map::CHUNK_SIZE;
            let nearby = match ctx.store.nearby_players(session.player_id, range) {
                Ok(nearby) => nearby,
                Err(e) => {
                    send_internal_error(session, frame.id.clone(), "chat: nearby players", &e);
                    return;
                }
            };
            let Ok(event_frame) = Frame::event(MessageType::EventChatMessage, &event) else {
                send_internal_error(session, frame.id.clone(), "chat", "encode failure");
                return;
            };
            for peer_runtime in nearby {
                if let Some(peer) = ctx.sessions.get(peer_runtime.player_id) {
                    peer.send(event_frame.clone());
                }
            }
            // The sender hears themselves too.
            session.send(event_frame);
        }
        ChatChannel::Global => {
            if !chat_service::global_allowed(&ctx.config.chat, session.role.as_str()) {
                send_error(
                    session,
                    frame.id.clone(),
                    codes::CHAT_NOT_ALLOWED,
                    ErrorCategory::Permission,
                    "You cannot speak on the global channel",
                );
                return;
            }
            let Ok(event_frame) = Frame::event(MessageType::EventChatMessage, &event) else {
                send_internal_error(session, frame.id.clone(), "chat", "encode failure");
                return;
            };
            for peer in ctx.sessions.all() {
                peer.send(event_frame.clone());
            }
        }
        ChatChannel::Dm => {
            let Some(recipient_name) = payload.recipient.as_deref() else {
                send_error(
                    session,
                    frame.id.clone(),
                    codes::PLAYER_NOT_ONLINE,
                    ErrorCategory::Validation,
                    "Direct messages need a recipient",
                );
                return;
            };
            let Some(recipient) = ctx.sessions.get_by_username(recipient_name) else {
                send_error(
                    session,
                    frame.id.clone(),
                    codes::PLAYER_NOT_ONLINE,
                    ErrorCategory::Validation,
                    format!("'{recipient_name}' is not online"),
                );
                return;
            };
            let Ok(event_frame) = Frame::event(MessageType::EventChatMessage, &event) else {
                send_internal_error(session, frame.id.clone(), "chat", "encode failure");
                return;
            };
            recipient.send(event_frame.clone());
            // Echo to the sender so both ends see the exchange.
            session.send(event_frame);
        }
    }

    // DMs stay between the two parties; everything else goes to the replay
    // history.
    if payload.channel != ChatChannel::Dm {
        ctx.chat.record(event);
    }
    send_success(session, frame.id.clone(), &serde_json::json!({}));
}
