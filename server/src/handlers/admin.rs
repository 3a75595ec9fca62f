//! CMD_ADMIN_GIVE: admin-only item grants.
//!
//! Validation order matters and is load-bearing for the error codes the
//! client shows: payload shape, then quantity, then caller role, then
//! target, then item, then capacity.

use std::sync::Arc;

use common::protocol::{
    codes, AdminGivePayload, ErrorCategory, Frame, MessageType, PlayerRole, StateSystems,
    StateUpdatePayload,
};

use crate::context::ServerContext;
use crate::handlers::{send_error, send_internal_error, send_success};
use crate::inventory;
use crate::items;
use crate::session::{DirtyFlags, Session};

const MAX_GIVE_QUANTITY: i64 = 1000;

/// Pre-flight checks in their load-bearing order: quantity first, then the
/// caller's role.
pub(crate) fn validate_give_request(
    quantity: i64,
    role: PlayerRole,
) -> Result<(), common::protocol::ErrorPayload> {
    use common::protocol::ErrorPayload;

    if !(1..=MAX_GIVE_QUANTITY).contains(&quantity) {
        return Err(ErrorPayload::new(
            codes::ADMIN_INVALID_QUANTITY,
            ErrorCategory::Validation,
            format!("Quantity must be between 1 and {MAX_GIVE_QUANTITY}"),
        ));
    }
    if role != PlayerRole::Admin {
        return Err(ErrorPayload::new(
            codes::ADMIN_NOT_AUTHORIZED,
            ErrorCategory::Permission,
            "You do not have permission to use this command",
        ));
    }
    Ok(())
}

pub fn handle_admin_give(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    let payload: AdminGivePayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(
                session,
                frame.id.clone(),
                codes::ADMIN_INVALID_QUANTITY,
                ErrorCategory::Validation,
                e,
            );
            return;
        }
    };

    if let Err(error) = validate_give_request(payload.quantity, session.role) {
        if error.error_code == codes::ADMIN_NOT_AUTHORIZED {
            log::warn!(
                "Non-admin {} ({}) attempted admin give",
                session.username,
                session.player_id
            );
        }
        crate::handlers::send_error_payload(session, frame.id.clone(), error);
        return;
    }

    let target = match ctx.repo.get_player_by_username(&payload.target_username) {
        Ok(Some(row)) => row,
        Ok(None) => {
            crate::handlers::send_error_payload(
                session,
                frame.id.clone(),
                common::protocol::ErrorPayload::new(
                    codes::ADMIN_PLAYER_NOT_FOUND,
                    ErrorCategory::Validation,
                    format!("Player '{}' not found", payload.target_username),
                )
                .with_details(rmpv::Value::Map(vec![(
                    rmpv::Value::String("target_username".into()),
                    rmpv::Value::String(payload.target_username.clone().into()),
                )])),
            );
            return;
        }
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "admin give: target lookup", &e);
            return;
        }
    };

    let Some(item) = items::item_by_name(&payload.item_name) else {
        crate::handlers::send_error_payload(
            session,
            frame.id.clone(),
            common::protocol::ErrorPayload::new(
                codes::ADMIN_ITEM_NOT_FOUND,
                ErrorCategory::Validation,
                format!("Item '{}' not found", payload.item_name),
            )
            .with_details(rmpv::Value::Map(vec![(
                rmpv::Value::String("item_name".into()),
                rmpv::Value::String(payload.item_name.clone().into()),
            )])),
        );
        return;
    };

    let lock = ctx.inv_locks.lock_for(target.player_id);
    let _guard = lock.lock();

    let mut rows = match ctx.repo.load_inventory(target.player_id) {
        Ok(rows) => rows,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "admin give: load", &e);
            return;
        }
    };
    let leftover = inventory::add_item(&mut rows, item, payload.quantity as u32);
    if leftover > 0 {
        send_error(
            session,
            frame.id.clone(),
            codes::ADMIN_INVENTORY_FULL,
            ErrorCategory::Validation,
            format!(
                "{}'s inventory cannot hold {} x {}",
                payload.target_username, payload.quantity, item.display_name
            ),
        );
        return;
    }
    if let Err(e) = ctx.repo.save_inventory(target.player_id, &rows) {
        send_internal_error(session, frame.id.clone(), "admin give: save", &e);
        return;
    }
    drop(_guard);

    log::info!(
        "Admin {} gave {} x {} to {}",
        session.username,
        payload.quantity,
        item.name,
        payload.target_username
    );

    #[derive(serde::Serialize)]
    struct GiveResult {
        message: String,
        target_player_id: i64,
        item_name: String,
        quantity: i64,
    }
    send_success(
        session,
        frame.id.clone(),
        &GiveResult {
            message: format!(
                "Gave {}x {} to {}",
                payload.quantity, item.display_name, payload.target_username
            ),
            target_player_id: target.player_id,
            item_name: item.display_name.to_string(),
            quantity: payload.quantity,
        },
    );

    // Push the new inventory to the target if they are online; offline
    // targets simply load it at next login.
    if let Some(target_session) = ctx.sessions.get(target.player_id) {
        target_session.mark_dirty(DirtyFlags::INVENTORY);
        let update = StateUpdatePayload::personal(StateSystems {
            inventory: Some(inventory::inventory_view(&rows)),
            equipment: None,
            stats: None,
        });
        if let Ok(event) = Frame::event(MessageType::EventStateUpdate, &update) {
            target_session.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::protocol::ErrorCategory;

    #[test]
    fn test_quantity_checked_before_role() {
        // A non-admin with a bad quantity sees the quantity error, matching
        // the validation order the client relies on.
        let err = validate_give_request(0, PlayerRole::Player).unwrap_err();
        assert_eq!(err.error_code, codes::ADMIN_INVALID_QUANTITY);
        assert_eq!(err.category, ErrorCategory::Validation);

        let err = validate_give_request(1001, PlayerRole::Admin).unwrap_err();
        assert_eq!(err.error_code, codes::ADMIN_INVALID_QUANTITY);
    }

    #[test]
    fn test_non_admin_rejected_with_permission_error() {
        let err = validate_give_request(1, PlayerRole::Player).unwrap_err();
        assert_eq!(err.error_code, codes::ADMIN_NOT_AUTHORIZED);
        assert_eq!(err.category, ErrorCategory::Permission);

        let err = validate_give_request(5, PlayerRole::Moderator).unwrap_err();
        assert_eq!(err.error_code, codes::ADMIN_NOT_AUTHORIZED);
    }

    #[test]
    fn test_admin_with_valid_quantity_passes() {
        assert!(validate_give_request(1, PlayerRole::Admin).is_ok());
        assert!(validate_give_request(1000, PlayerRole::Admin).is_ok());
    }
}
