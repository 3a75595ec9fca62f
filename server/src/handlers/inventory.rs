//! Inventory and equipment commands. Every mutation runs under the
//! player's inventory lock and ends by marking the session dirty so the
//! next warm tick carries the new state.

use std::sync::Arc;

use common::protocol::{
    codes, ErrorCategory, ErrorPayload, Frame, InventoryMovePayload, ItemDropPayload,
    ItemEquipPayload, ItemPickupPayload, ItemUnequipPayload, MessageType,
};
use common::skills::SkillType;

use crate::context::ServerContext;
use crate::handlers::{send_error, send_error_payload, send_internal_error, send_success};
use crate::inventory::{self, InventoryError};
use crate::session::{DirtyFlags, Session};
use crate::store::ground::{GroundItem, LOOT_PROTECTION_SECS};

fn error_payload(err: InventoryError) -> ErrorPayload {
    match err {
        InventoryError::InvalidSlot => ErrorPayload::new(
            codes::INV_INVALID_SLOT,
            ErrorCategory::Validation,
            "Invalid inventory slot",
        ),
        InventoryError::SlotEmpty => ErrorPayload::new(
            codes::INV_SLOT_EMPTY,
            ErrorCategory::Validation,
            "That slot is empty",
        ),
        InventoryError::Full => ErrorPayload::new(
            codes::INV_FULL,
            ErrorCategory::Conflict,
            "Inventory is full",
        ),
        InventoryError::UnknownItem => ErrorPayload::new(
            codes::SYS_INTERNAL_ERROR,
            ErrorCategory::System,
            "Unknown item in slot",
        ),
        InventoryError::NotEquippable => ErrorPayload::new(
            codes::ITEM_NOT_EQUIPPABLE,
            ErrorCategory::Validation,
            "That item cannot be equipped",
        ),
        InventoryError::RequirementsNotMet { skill, level } => ErrorPayload::new(
            codes::EQUIP_REQUIREMENTS_NOT_MET,
            ErrorCategory::Validation,
            format!("Requires {skill} level {level}"),
        ),
        InventoryError::HandsBlocked => ErrorPayload::new(
            codes::EQUIP_HANDS_BLOCKED,
            ErrorCategory::Conflict,
            "Your hands are full",
        ),
    }
}

pub fn handle_inventory_move(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    let payload: InventoryMovePayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(session, frame.id.clone(), codes::INV_INVALID_SLOT, ErrorCategory::Validation, e);
            return;
        }
    };

    let lock = ctx.inv_locks.lock_for(session.player_id);
    let _guard = lock.lock();

    let mut rows = match ctx.repo.load_inventory(session.player_id) {
        Ok(rows) => rows,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "inventory move: load", &e);
            return;
        }
    };
    if let Err(err) = inventory::move_item(&mut rows, payload.from_slot, payload.to_slot) {
        send_error_payload(session, frame.id.clone(), error_payload(err));
        return;
    }
    inventory::compact(&mut rows);
    if let Err(e) = ctx.repo.save_inventory(session.player_id, &rows) {
        send_internal_error(session, frame.id.clone(), "inventory move: save", &e);
        return;
    }

    session.mark_dirty(DirtyFlags::INVENTORY);
    send_success(session, frame.id.clone(), &inventory::inventory_view(&rows));
}

pub fn handle_inventory_sort(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    let lock = ctx.inv_locks.lock_for(session.player_id);
    let _guard = lock.lock();

    let mut rows = match ctx.repo.load_inventory(session.player_id) {
        Ok(rows) => rows,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "inventory sort: load", &e);
            return;
        }
    };
    inventory::sort_inventory(&mut rows);
    if let Err(e) = ctx.repo.save_inventory(session.player_id, &rows) {
        send_internal_error(session, frame.id.clone(), "inventory sort: save", &e);
        return;
    }

    session.mark_dirty(DirtyFlags::INVENTORY);
    send_success(session, frame.id.clone(), &inventory::inventory_view(&rows));
}

pub fn handle_item_drop(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    let payload: ItemDropPayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(session, frame.id.clone(), codes::INV_INVALID_SLOT, ErrorCategory::Validation, e);
            return;
        }
    };

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
            send_internal_error(session, frame.id.clone(), "item drop: reading player", &e);
            return;
        }
    };

    let lock = ctx.inv_locks.lock_for(session.player_id);
    let _guard = lock.lock();

    let mut rows = match ctx.repo.load_inventory(session.player_id) {
        Ok(rows) => rows,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "item drop: load", &e);
            return;
        }
    };
    let (item_name, quantity, _durability) =
        match inventory::remove_from_slot(&mut rows, payload.slot, payload.quantity) {
            Ok(result) => result,
            Err(err) => {
                send_error_payload(session, frame.id.clone(), error_payload(err));
                return;
            }
        };
    if let Err(e) = ctx.repo.save_inventory(session.player_id, &rows) {
        send_internal_error(session, frame.id.clone(), "item drop: save", &e);
        return;
    }

    let now_tick = ctx.current_tick();
    let hot_hz = u64::from(ctx.config.tick.hot_hz);
    let drop = GroundItem {
        ground_item_id: 0,
        item_name,
        map_id: runtime.map_id.clone(),
        x: runtime.x,
        y: runtime.y,
        quantity,
        dropper_player_id: Some(session.player_id),
        drop_tick: now_tick,
        protection_expires_tick: now_tick + LOOT_PROTECTION_SECS * hot_hz,
    };
    match ctx.store.drop_ground_item(drop) {
        Ok(_) => {
            session.mark_dirty(DirtyFlags::INVENTORY);
            send_success(session, frame.id.clone(), &inventory::inventory_view(&rows));
        }
        Err(e) => send_internal_error(session, frame.id.clone(), "item drop: store", &e),
    }
}

pub fn handle_item_pickup(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    let payload: ItemPickupPayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(session, frame.id.clone(), codes::PICKUP_NOT_FOUND, ErrorCategory::Validation, e);
            return;
        }
    };

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

    let ground = match ctx.store.get_ground_item(payload.ground_item_id) {
        Ok(Some(item)) => item,
        Ok(None) => {
            send_error(
                session,
                frame.id.clone(),
                codes::PICKUP_NOT_FOUND,
                ErrorCategory::Validation,
                "Nothing there to pick up",
            );
            return;
        }
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "pickup: reading item", &e);
            return;
        }
    };

    // Pickup requires standing on the item's tile.
    if ground.map_id != runtime.map_id || (ground.x, ground.y) != (runtime.x, runtime.y) {
        send_error(
            session,
            frame.id.clone(),
            codes::PICKUP_TOO_FAR,
            ErrorCategory::Validation,
            "You need to stand on the item",
        );
        return;
    }

    let now_tick = ctx.current_tick();
    if !ground.can_pickup(session.player_id, now_tick) {
        send_error(
            session,
            frame.id.clone(),
            codes::PICKUP_PROTECTED,
            ErrorCategory::Conflict,
            "That loot is still protected",
        );
        return;
    }

    let Some(item) = crate::items::item_by_name(&ground.item_name) else {
        send_internal_error(
            session,
            frame.id.clone(),
            "pickup",
            &format!("unknown ground item '{}'", ground.item_name),
        );
        return;
    };

    let lock = ctx.inv_locks.lock_for(session.player_id);
    let _guard = lock.lock();

    let mut rows = match ctx.repo.load_inventory(session.player_id) {
        Ok(rows) => rows,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "pickup: load", &e);
            return;
        }
    };
    let leftover = inventory::add_item(&mut rows, item, ground.quantity);
    if leftover == ground.quantity {
        send_error(
            session,
            frame.id.clone(),
            codes::INV_FULL,
            ErrorCategory::Conflict,
            "Inventory is full",
        );
        return;
    }
    if let Err(e) = ctx.repo.save_inventory(session.player_id, &rows) {
        send_internal_error(session, frame.id.clone(), "pickup: save", &e);
        return;
    }

    // Partial pickups leave the remainder on the ground.
    let result = if leftover > 0 {
        let mut remainder = ground.clone();
        remainder.quantity = leftover;
        ctx.store
            .remove_ground_item(ground.ground_item_id, &ground.map_id)
            .and_then(|_| ctx.store.drop_ground_item(remainder).map(|_| ()))
    } else {
        ctx.store
            .remove_ground_item(ground.ground_item_id, &ground.map_id)
    };
    if let Err(e) = result {
        log::error!("pickup: updating ground item {}: {e}", ground.ground_item_id);
    }

    session.mark_dirty(DirtyFlags::INVENTORY);
    send_success(session, frame.id.clone(), &inventory::inventory_view(&rows));
}

pub fn handle_item_equip(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    let payload: ItemEquipPayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(session, frame.id.clone(), codes::INV_INVALID_SLOT, ErrorCategory::Validation, e);
            return;
        }
    };

    let lock = ctx.inv_locks.lock_for(session.player_id);
    let _guard = lock.lock();

    let mut inv = match ctx.repo.load_inventory(session.player_id) {
        Ok(rows) => rows,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "equip: load inventory", &e);
            return;
        }
    };
    let mut eq = match ctx.repo.load_equipment(session.player_id) {
        Ok(rows) => rows,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "equip: load equipment", &e);
            return;
        }
    };

    let repo = &ctx.repo;
    let player_id = session.player_id;
    let skill_level = |skill: SkillType| -> u32 {
        repo.get_skill_xp(player_id, skill)
            .map(SkillType::level_for_xp)
            .unwrap_or(1)
    };
    if let Err(err) = inventory::equip_from_slot(&mut inv, &mut eq, payload.slot, skill_level) {
        send_error_payload(session, frame.id.clone(), error_payload(err));
        return;
    }

    if let Err(e) = ctx
        .repo
        .save_inventory(player_id, &inv)
        .and_then(|_| ctx.repo.save_equipment(player_id, &eq))
    {
        send_internal_error(session, frame.id.clone(), "equip: save", &e);
        return;
    }
    drop(_guard);

    after_equipment_change(ctx, session);
    send_success(session, frame.id.clone(), &inventory::equipment_view(&eq));
}

pub fn handle_item_unequip(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    let payload: ItemUnequipPayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(session, frame.id.clone(), codes::INV_INVALID_SLOT, ErrorCategory::Validation, e);
            return;
        }
    };

    let lock = ctx.inv_locks.lock_for(session.player_id);
    let _guard = lock.lock();

    let mut inv = match ctx.repo.load_inventory(session.player_id) {
        Ok(rows) => rows,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "unequip: load inventory", &e);
            return;
        }
    };
    let mut eq = match ctx.repo.load_equipment(session.player_id) {
        Ok(rows) => rows,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "unequip: load equipment", &e);
            return;
        }
    };

    if let Err(err) = inventory::unequip_slot(&mut inv, &mut eq, payload.slot) {
        send_error_payload(session, frame.id.clone(), error_payload(err));
        return;
    }
    if let Err(e) = ctx
        .repo
        .save_inventory(session.player_id, &inv)
        .and_then(|_| ctx.repo.save_equipment(session.player_id, &eq))
    {
        send_internal_error(session, frame.id.clone(), "unequip: save", &e);
        return;
    }
    drop(_guard);

    after_equipment_change(ctx, session);
    send_success(session, frame.id.clone(), &inventory::equipment_view(&eq));
}

/// Shared tail for equip/unequip: recompute vitals, refresh the visual
/// fingerprint, and tell observers.
fn after_equipment_change(ctx: &Arc<ServerContext>, session: &Arc<Session>) {
    let player_id = session.player_id;

    // Max HP can change through health bonuses.
    match (
        ctx.repo.load_equipment(player_id),
        ctx.repo.hitpoints_level(player_id),
        ctx.store.get_player(player_id),
    ) {
        (Ok(eq), Ok(hitpoints), Ok(Some(runtime))) => {
            let stats = inventory::total_stats(&eq);
            let max_hp = inventory::player_max_hp(hitpoints, &stats);
            let current = runtime.current_hp.min(max_hp);
            if let Err(e) = ctx.store.set_player_hp(player_id, current, max_hp) {
                log::error!("equip: updating vitals for {player_id}: {e}");
            }
        }
        _ => log::warn!("equip: could not recompute vitals for {player_id}"),
    }

    // New paperdoll fingerprint; observers that have not seen it get full
    // data with the next game update, but announce the change eagerly too.
    if let Ok(state) = ctx.player_visual_state(player_id) {
        let key = format!("player:{player_id}");
        let hash = ctx.visuals.register_visual_state(&key, &state);
        if let Ok(Some(runtime)) = ctx.store.get_player(player_id) {
            announce_visual_change(ctx, player_id, &runtime.map_id, (runtime.x, runtime.y), &hash, &state);
        }
    }

    session.mark_dirty(DirtyFlags::INVENTORY | DirtyFlags::EQUIPMENT | DirtyFlags::STATS);
}

/// Per-observer APPEARANCE_UPDATE: full state only for observers that have
/// not seen the fingerprint.
pub(crate) fn announce_visual_change(
    ctx: &Arc<ServerContext>,
    player_id: i64,
    map_id: &str,
    position: (i32, i32),
    hash: &str,
    state: &common::visual::VisualState,
) {
    use common::protocol::AppearanceUpdatePayload;

    let range = ctx.visible_range();
    let key = format!("player:{player_id}");
    for observer in ctx.sessions.on_map(map_id) {
        if observer.player_id == player_id {
            continue;
        }
        let observer_pos = match ctx.store.get_player(observer.player_id) {
            Ok(Some(rt)) => (rt.x, rt.y),
            _ => continue,
        };
        if !crate::visibility::in_visible_range(observer_pos, position, range) {
            continue;
        }
        let (_, full) = ctx.visuals.visual_for_observer(observer.player_id, &key, state);
        let payload = AppearanceUpdatePayload {
            player_id,
            visual_hash: hash.to_string(),
            visual_state: full,
        };
        if let Ok(event) = Frame::event(MessageType::EventAppearanceUpdate, &payload) {
            observer.send(event);
        }
    }
}
