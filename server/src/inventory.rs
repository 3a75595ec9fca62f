//! Inventory and equipment: slot arithmetic, stacking, equip validation,
//! and stat aggregation.
//!
//! The mutation functions are pure over row vectors; persistence and event
//! emission happen in the handlers. Concurrent commands touching the same
//! player serialize on a per-player lock from [`InventoryLocks`].

use std::collections::HashMap;
use std::sync::Arc;

use common::protocol::{
    EquipmentSlotView, EquipmentView, InventorySlotView, InventoryView,
};
use common::stats::ItemStats;
use common::visual::{EquipSlot, EquippedVisuals, SlotVisual};
use parking_lot::Mutex;

use crate::items::{self, ItemCategory, ItemDef};
use crate::repository::{EquipmentRow, InventoryRow};

/// Inventory capacity in slots.
pub const MAX_SLOTS: u8 = 28;

/// Failure modes for inventory/equipment mutations, mapped onto the wire
/// error taxonomy by the handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    InvalidSlot,
    SlotEmpty,
    Full,
    UnknownItem,
    NotEquippable,
    RequirementsNotMet { skill: &'static str, level: u32 },
    HandsBlocked,
}

/// Per-player mutation locks so concurrent handler commands on one player
/// serialize.
pub struct InventoryLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl InventoryLocks {
    pub fn new() -> InventoryLocks {
        InventoryLocks {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock_for(&self, player_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(player_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn forget(&self, player_id: i64) {
        self.locks.lock().remove(&player_id);
    }
}

impl Default for InventoryLocks {
    fn default() -> Self {
        InventoryLocks::new()
    }
}

fn slot_at(rows: &[InventoryRow], slot_index: u8) -> Option<usize> {
    rows.iter().position(|r| r.slot_index == slot_index)
}

fn first_free_slot(rows: &[InventoryRow]) -> Option<u8> {
    (0..MAX_SLOTS).find(|idx| slot_at(rows, *idx).is_none())
}

/// Add `quantity` of an item, filling existing stacks before opening new
/// slots. Returns the quantity that did not fit.
pub fn add_item(rows: &mut Vec<InventoryRow>, item: &ItemDef, quantity: u32) -> u32 {
    let mut remaining = quantity;

    if item.is_stackable() {
        for row in rows.iter_mut() {
            if remaining == 0 {
                break;
            }
            if row.item_name == item.name && row.quantity < item.max_stack_size {
                let space = item.max_stack_size - row.quantity;
                let moved = space.min(remaining);
                row.quantity += moved;
                remaining -= moved;
            }
        }
    }

    while remaining > 0 {
        let Some(free) = first_free_slot(rows) else {
            break;
        };
        let placed = if item.is_stackable() {
            item.max_stack_size.min(remaining)
        } else {
            1
        };
        rows.push(InventoryRow {
            slot_index: free,
            item_name: item.name.to_string(),
            quantity: placed,
            current_durability: item.max_durability,
        });
        remaining -= placed;
    }

    remaining
}

/// Move or merge between two slots. Merging applies when both slots hold the
/// same stackable item; otherwise occupied targets swap.
pub fn move_item(
    rows: &mut [InventoryRow],
    from_slot: u8,
    to_slot: u8,
) -> Result<(), InventoryError> {
    if from_slot >= MAX_SLOTS || to_slot >= MAX_SLOTS {
        return Err(InventoryError::InvalidSlot);
    }
    if from_slot == to_slot {
        return Ok(());
    }
    let from_idx = slot_at(rows, from_slot).ok_or(InventoryError::SlotEmpty)?;

    match slot_at(rows, to_slot) {
        None => {
            rows[from_idx].slot_index = to_slot;
            Ok(())
        }
        Some(to_idx) => {
            let same_item = rows[from_idx].item_name == rows[to_idx].item_name;
            let stackable = items::item_by_name(&rows[from_idx].item_name)
                .map(|i| i.is_stackable())
                .unwrap_or(false);
            if same_item && stackable {
                let max_stack = items::item_by_name(&rows[from_idx].item_name)
                    .map(|i| i.max_stack_size)
                    .unwrap_or(1);
                let space = max_stack.saturating_sub(rows[to_idx].quantity);
                let moved = space.min(rows[from_idx].quantity);
                rows[to_idx].quantity += moved;
                rows[from_idx].quantity -= moved;
                if rows[from_idx].quantity == 0 {
                    rows[from_idx].slot_index = u8::MAX;
                }
                Ok(())
            } else {
                rows[from_idx].slot_index = to_slot;
                rows[to_idx].slot_index = from_slot;
                Ok(())
            }
        }
    }
}

/// Drop emptied marker rows after a merge.
pub fn compact(rows: &mut Vec<InventoryRow>) {
    rows.retain(|r| r.quantity > 0 && r.slot_index < MAX_SLOTS);
}

/// Sort: merge stacks, then order by category then name, reassigning slots
/// from zero.
pub fn sort_inventory(rows: &mut Vec<InventoryRow>) {
    // Merge stackables into single logical piles.
    let mut piles: Vec<InventoryRow> = Vec::new();
    for row in rows.drain(..) {
        let stackable = items::item_by_name(&row.item_name)
            .map(|i| i.is_stackable())
            .unwrap_or(false);
        if stackable {
            if let Some(pile) = piles
                .iter_mut()
                .find(|p| p.item_name == row.item_name)
            {
                pile.quantity += row.quantity;
                continue;
            }
        }
        piles.push(row);
    }

    piles.sort_by(|a, b| {
        let cat_a = items::item_by_name(&a.item_name)
            .map(|i| i.category)
            .unwrap_or(ItemCategory::Misc);
        let cat_b = items::item_by_name(&b.item_name)
            .map(|i| i.category)
            .unwrap_or(ItemCategory::Misc);
        cat_a
            .cmp(&cat_b)
            .then_with(|| a.item_name.cmp(&b.item_name))
            .then_with(|| b.quantity.cmp(&a.quantity))
    });

    // Re-split piles that exceed a stack, then reassign slot indices.
    let mut out: Vec<InventoryRow> = Vec::new();
    for pile in piles {
        let max_stack = items::item_by_name(&pile.item_name)
            .map(|i| i.max_stack_size)
            .unwrap_or(1);
        let mut remaining = pile.quantity;
        while remaining > 0 {
            let placed = max_stack.min(remaining);
            out.push(InventoryRow {
                slot_index: out.len() as u8,
                item_name: pile.item_name.clone(),
                quantity: placed,
                current_durability: pile.current_durability,
            });
            remaining -= placed;
        }
    }
    *rows = out;
}

/// Remove up to `quantity` from a slot, returning (item name, removed,
/// durability of removed items).
pub fn remove_from_slot(
    rows: &mut Vec<InventoryRow>,
    slot_index: u8,
    quantity: Option<u32>,
) -> Result<(String, u32, Option<i32>), InventoryError> {
    if slot_index >= MAX_SLOTS {
        return Err(InventoryError::InvalidSlot);
    }
    let idx = slot_at(rows, slot_index).ok_or(InventoryError::SlotEmpty)?;
    let available = rows[idx].quantity;
    let removed = quantity.unwrap_or(available).min(available);
    if removed == 0 {
        return Err(InventoryError::SlotEmpty);
    }
    let name = rows[idx].item_name.clone();
    let durability = rows[idx].current_durability;
    rows[idx].quantity -= removed;
    if rows[idx].quantity == 0 {
        rows.remove(idx);
    }
    Ok((name, removed, durability))
}

fn equipped_at(rows: &[EquipmentRow], slot: EquipSlot) -> Option<usize> {
    rows.iter().position(|r| r.slot == slot)
}

/// Equip the item in an inventory slot. Atomically swaps with whatever was
/// in the target equipment slot; a two-handed weapon also requires the
/// off-hand to come along, which may need a second free inventory slot.
pub fn equip_from_slot(
    inventory: &mut Vec<InventoryRow>,
    equipment: &mut Vec<EquipmentRow>,
    slot_index: u8,
    skill_level: impl Fn(common::skills::SkillType) -> u32,
) -> Result<EquipSlot, InventoryError> {
    if slot_index >= MAX_SLOTS {
        return Err(InventoryError::InvalidSlot);
    }
    let inv_idx = slot_at(inventory, slot_index).ok_or(InventoryError::SlotEmpty)?;
    let item =
        items::item_by_name(&inventory[inv_idx].item_name).ok_or(InventoryError::UnknownItem)?;
    let target_slot = item.equipment_slot.ok_or(InventoryError::NotEquippable)?;

    if let Some(skill) = item.required_skill {
        if skill_level(skill) < item.required_level {
            return Err(InventoryError::RequirementsNotMet {
                skill: skill.as_str(),
                level: item.required_level,
            });
        }
    }

    // A two-handed weapon occupies main hand and forbids an off-hand; count
    // the inventory slots the displaced items will need.
    let displaced_off_hand = if item.is_two_handed {
        equipped_at(equipment, EquipSlot::OffHand)
    } else if target_slot == EquipSlot::OffHand {
        // Equipping an off-hand while a two-handed weapon is wielded is the
        // symmetric conflict.
        match equipped_at(equipment, EquipSlot::MainHand) {
            Some(main_idx) => {
                let main_item = items::item_by_name(&equipment[main_idx].item_name);
                if main_item.map(|i| i.is_two_handed).unwrap_or(false) {
                    return Err(InventoryError::HandsBlocked);
                }
                None
            }
            None => None,
        }
    } else {
        None
    };

    // The slot freed by the equipping item absorbs one displaced piece;
    // anything beyond that needs genuinely free inventory slots.
    let displaced_count = usize::from(equipped_at(equipment, target_slot).is_some())
        + usize::from(displaced_off_hand.is_some());
    let needed_free = displaced_count.saturating_sub(1);
    if needed_free > 0 {
        let free_slots = (0..MAX_SLOTS)
            .filter(|idx| slot_at(inventory, *idx).is_none())
            .count();
        if free_slots < needed_free {
            return Err(InventoryError::Full);
        }
    }

    // Pull the item out of the inventory.
    let inv_row = inventory.remove(inv_idx);
    let freed_slot = inv_row.slot_index;

    // Swap out the current occupant of the target slot.
    if let Some(eq_idx) = equipped_at(equipment, target_slot) {
        let old = equipment.remove(eq_idx);
        inventory.push(InventoryRow {
            slot_index: freed_slot,
            item_name: old.item_name,
            quantity: 1,
            current_durability: old.current_durability,
        });
    }

    // Displace the off-hand when a two-hander comes in.
    if let Some(off_idx) = displaced_off_hand {
        let off = equipment.remove(off_idx);
        let free = first_free_slot(inventory).ok_or(InventoryError::Full)?;
        inventory.push(InventoryRow {
            slot_index: free,
            item_name: off.item_name,
            quantity: 1,
            current_durability: off.current_durability,
        });
    }

    equipment.push(EquipmentRow {
        slot: target_slot,
        item_name: inv_row.item_name,
        current_durability: inv_row.current_durability,
    });

    Ok(target_slot)
}

/// Unequip a slot back into the inventory.
pub fn unequip_slot(
    inventory: &mut Vec<InventoryRow>,
    equipment: &mut Vec<EquipmentRow>,
    slot: EquipSlot,
) -> Result<(), InventoryError> {
    let eq_idx = equipped_at(equipment, slot).ok_or(InventoryError::SlotEmpty)?;
    let free = first_free_slot(inventory).ok_or(InventoryError::Full)?;
    let row = equipment.remove(eq_idx);
    inventory.push(InventoryRow {
        slot_index: free,
        item_name: row.item_name,
        quantity: 1,
        current_durability: row.current_durability,
    });
    Ok(())
}

/// Element-wise sum of equipped items' stat vectors.
pub fn total_stats(equipment: &[EquipmentRow]) -> ItemStats {
    let mut total = ItemStats::default();
    for row in equipment {
        if let Some(item) = items::item_by_name(&row.item_name) {
            total = total.add(&item.stats);
        }
    }
    total
}

/// Player max HP: hitpoints level (floor 10) plus equipment health bonus.
pub fn player_max_hp(hitpoints_level: u32, stats: &ItemStats) -> i32 {
    (hitpoints_level.max(10) as i32 + stats.health_bonus).max(1)
}

/// Paperdoll visuals for the visible equipment slots.
pub fn equipped_visuals(equipment: &[EquipmentRow]) -> EquippedVisuals {
    let mut visuals = EquippedVisuals::default();
    for row in equipment {
        if !row.slot.is_visible() {
            continue;
        }
        if let Some(item) = items::item_by_name(&row.item_name) {
            if let Some(sprite) = item.sprite_id {
                visuals.set_slot(
                    row.slot,
                    Some(SlotVisual {
                        sprite: sprite.to_string(),
                        tint: item.sprite_tint.map(str::to_string),
                    }),
                );
            }
        }
    }
    visuals
}

// ---------------------------------------------------------------------------
//  View builders
// ---------------------------------------------------------------------------

pub fn inventory_view(rows: &[InventoryRow]) -> InventoryView {
    let mut slots: Vec<InventorySlotView> = rows
        .iter()
        .filter_map(|row| {
            let item = items::item_by_name(&row.item_name)?;
            Some(InventorySlotView {
                slot: row.slot_index,
                item_name: item.name.to_string(),
                display_name: item.display_name.to_string(),
                quantity: row.quantity,
                max_stack_size: item.max_stack_size,
                rarity: item.rarity.as_str().to_string(),
                rarity_color: item.rarity.color().to_string(),
                current_durability: row.current_durability,
            })
        })
        .collect();
    slots.sort_by_key(|s| s.slot);
    let used = slots.len() as u8;
    InventoryView {
        slots,
        max_slots: MAX_SLOTS,
        used_slots: used,
        free_slots: MAX_SLOTS - used,
    }
}

pub fn equipment_view(rows: &[EquipmentRow]) -> EquipmentView {
    let slots = EquipSlot::ALL
        .into_iter()
        .map(|slot| {
            let row = rows.iter().find(|r| r.slot == slot);
            let item = row.and_then(|r| items::item_by_name(&r.item_name));
            EquipmentSlotView {
                slot,
                item_name: item.map(|i| i.name.to_string()),
                display_name: item.map(|i| i.display_name.to_string()),
                current_durability: row.and_then(|r| r.current_durability),
            }
        })
        .collect();
    EquipmentView {
        slots,
        total_stats: total_stats(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> Vec<InventoryRow> {
        Vec::new()
    }

    fn ore() -> &'static ItemDef {
        items::item_by_name("copper_ore").unwrap()
    }

    fn sword() -> &'static ItemDef {
        items::item_by_name("bronze_shortsword").unwrap()
    }

    #[test]
    fn test_stackable_items_stack() {
        let mut rows = empty();
        assert_eq!(add_item(&mut rows, ore(), 5), 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 5);

        // Second grant lands in the same slot.
        assert_eq!(add_item(&mut rows, ore(), 3), 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slot_index, 0);
        assert_eq!(rows[0].quantity, 8);
    }

    #[test]
    fn test_stack_overflow_opens_new_slot() {
        let mut rows = empty();
        // copper_ore stacks to 50.
        assert_eq!(add_item(&mut rows, ore(), 120), 0);
        assert_eq!(rows.len(), 3);
        let total: u32 = rows.iter().map(|r| r.quantity).sum();
        assert_eq!(total, 120);
        assert!(rows.iter().all(|r| r.quantity <= ore().max_stack_size));
    }

    #[test]
    fn test_non_stackable_one_per_slot() {
        let mut rows = empty();
        assert_eq!(add_item(&mut rows, sword(), 3), 0);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.quantity == 1));
        // Fresh gear carries full durability.
        assert!(rows.iter().all(|r| r.current_durability == Some(80)));
    }

    #[test]
    fn test_full_inventory_reports_leftover() {
        let mut rows = empty();
        let leftover = add_item(&mut rows, sword(), MAX_SLOTS as u32 + 2);
        assert_eq!(rows.len(), MAX_SLOTS as usize);
        assert_eq!(leftover, 2);
    }

    #[test]
    fn test_capacity_invariant() {
        let mut rows = empty();
        add_item(&mut rows, ore(), 50 * MAX_SLOTS as u32 + 7);
        let total: u32 = rows.iter().map(|r| r.quantity).sum();
        assert!(total <= MAX_SLOTS as u32 * ore().max_stack_size);
    }

    #[test]
    fn test_move_to_empty_and_swap() {
        let mut rows = empty();
        add_item(&mut rows, sword(), 1);
        add_item(&mut rows, ore(), 5);
        // sword in 0, ore in 1.
        move_item(&mut rows, 0, 10).unwrap();
        assert!(slot_at(&rows, 10).is_some());
        move_item(&mut rows, 1, 10).unwrap();
        // Swapped.
        let ten = &rows[slot_at(&rows, 10).unwrap()];
        assert_eq!(ten.item_name, "copper_ore");
        let one = &rows[slot_at(&rows, 1).unwrap()];
        assert_eq!(one.item_name, "bronze_shortsword");
    }

    #[test]
    fn test_move_merges_stacks() {
        let mut rows = vec![
            InventoryRow {
                slot_index: 0,
                item_name: "copper_ore".to_string(),
                quantity: 48,
                current_durability: None,
            },
            InventoryRow {
                slot_index: 1,
                item_name: "copper_ore".to_string(),
                quantity: 10,
                current_durability: None,
            },
        ];
        move_item(&mut rows, 1, 0).unwrap();
        compact(&mut rows);
        // 48 + 2 merged, 8 left behind.
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[slot_at(&rows, 0).unwrap()].quantity, 50);
        assert_eq!(rows[slot_at(&rows, 1).unwrap()].quantity, 8);
    }

    #[test]
    fn test_move_errors() {
        let mut rows = empty();
        assert_eq!(
            move_item(&mut rows, 0, 1),
            Err(InventoryError::SlotEmpty)
        );
        assert_eq!(
            move_item(&mut rows, 0, MAX_SLOTS),
            Err(InventoryError::InvalidSlot)
        );
    }

    #[test]
    fn test_sort_merges_and_orders() {
        let mut rows = vec![
            InventoryRow {
                slot_index: 9,
                item_name: "copper_ore".to_string(),
                quantity: 5,
                current_durability: None,
            },
            InventoryRow {
                slot_index: 2,
                item_name: "bronze_shortsword".to_string(),
                quantity: 1,
                current_durability: Some(70),
            },
            InventoryRow {
                slot_index: 20,
                item_name: "copper_ore".to_string(),
                quantity: 7,
                current_durability: None,
            },
        ];
        sort_inventory(&mut rows);
        assert_eq!(rows.len(), 2);
        // Weapon category sorts before resources.
        assert_eq!(rows[0].item_name, "bronze_shortsword");
        assert_eq!(rows[0].slot_index, 0);
        assert_eq!(rows[1].item_name, "copper_ore");
        assert_eq!(rows[1].quantity, 12);
    }

    #[test]
    fn test_remove_partial_and_full() {
        let mut rows = empty();
        add_item(&mut rows, ore(), 10);
        let (name, removed, _) = remove_from_slot(&mut rows, 0, Some(4)).unwrap();
        assert_eq!(name, "copper_ore");
        assert_eq!(removed, 4);
        assert_eq!(rows[0].quantity, 6);
        let (_, removed, _) = remove_from_slot(&mut rows, 0, None).unwrap();
        assert_eq!(removed, 6);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_equip_and_stat_totals() {
        let mut inv = empty();
        let mut eq = Vec::new();
        add_item(&mut inv, sword(), 1);
        let slot = equip_from_slot(&mut inv, &mut eq, 0, |_| 1).unwrap();
        assert_eq!(slot, EquipSlot::MainHand);
        assert!(inv.is_empty());
        let stats = total_stats(&eq);
        assert_eq!(stats.attack_bonus, 4);
        assert_eq!(stats.strength_bonus, 3);
    }

    #[test]
    fn test_equip_swaps_existing() {
        let mut inv = empty();
        let mut eq = Vec::new();
        add_item(&mut inv, items::item_by_name("copper_dagger").unwrap(), 1);
        add_item(&mut inv, sword(), 1);
        equip_from_slot(&mut inv, &mut eq, 0, |_| 1).unwrap();
        // Equipping the sword returns the dagger to the freed slot.
        equip_from_slot(&mut inv, &mut eq, 1, |_| 1).unwrap();
        assert_eq!(eq.len(), 1);
        assert_eq!(eq[0].item_name, "bronze_shortsword");
        assert_eq!(inv.len(), 1);
        assert_eq!(inv[0].item_name, "copper_dagger");
    }

    #[test]
    fn test_equip_level_requirement() {
        let mut inv = empty();
        let mut eq = Vec::new();
        add_item(&mut inv, items::item_by_name("iron_shortsword").unwrap(), 1);
        // iron_shortsword needs attack 5.
        let err = equip_from_slot(&mut inv, &mut eq, 0, |_| 1).unwrap_err();
        assert!(matches!(err, InventoryError::RequirementsNotMet { level: 5, .. }));
        assert!(equip_from_slot(&mut inv, &mut eq, 0, |_| 5).is_ok());
    }

    #[test]
    fn test_two_handed_displaces_off_hand() {
        let mut inv = empty();
        let mut eq = Vec::new();
        add_item(&mut inv, items::item_by_name("bronze_shield").unwrap(), 1);
        equip_from_slot(&mut inv, &mut eq, 0, |_| 1).unwrap();
        add_item(&mut inv, items::item_by_name("iron_greatsword").unwrap(), 1);
        equip_from_slot(&mut inv, &mut eq, 0, |_| 10).unwrap();
        // Shield came off; only the greatsword remains equipped.
        assert_eq!(eq.len(), 1);
        assert_eq!(eq[0].item_name, "iron_greatsword");
        assert_eq!(inv.len(), 1);
        assert_eq!(inv[0].item_name, "bronze_shield");
    }

    #[test]
    fn test_off_hand_blocked_by_two_hander() {
        let mut inv = empty();
        let mut eq = Vec::new();
        add_item(&mut inv, items::item_by_name("iron_greatsword").unwrap(), 1);
        equip_from_slot(&mut inv, &mut eq, 0, |_| 10).unwrap();
        add_item(&mut inv, items::item_by_name("bronze_shield").unwrap(), 1);
        let err = equip_from_slot(&mut inv, &mut eq, 0, |_| 10).unwrap_err();
        assert_eq!(err, InventoryError::HandsBlocked);
    }

    #[test]
    fn test_unequip_needs_space() {
        let mut inv = empty();
        let mut eq = vec![EquipmentRow {
            slot: EquipSlot::MainHand,
            item_name: "bronze_shortsword".to_string(),
            current_durability: Some(80),
        }];
        add_item(&mut inv, ore(), 50 * MAX_SLOTS as u32);
        assert_eq!(
            unequip_slot(&mut inv, &mut eq, EquipSlot::MainHand),
            Err(InventoryError::Full)
        );
        remove_from_slot(&mut inv, 0, None).unwrap();
        assert!(unequip_slot(&mut inv, &mut eq, EquipSlot::MainHand).is_ok());
        assert!(eq.is_empty());
    }

    #[test]
    fn test_max_hp_includes_health_bonus() {
        let stats = ItemStats {
            health_bonus: 5,
            ..ItemStats::default()
        };
        assert_eq!(player_max_hp(10, &stats), 15);
        assert_eq!(player_max_hp(3, &ItemStats::default()), 10);
    }

    #[test]
    fn test_equipped_visuals_only_visible_slots() {
        let eq = vec![
            EquipmentRow {
                slot: EquipSlot::MainHand,
                item_name: "bronze_shortsword".to_string(),
                current_durability: None,
            },
            EquipmentRow {
                slot: EquipSlot::Amulet,
                item_name: "silver_amulet".to_string(),
                current_durability: None,
            },
        ];
        let visuals = equipped_visuals(&eq);
        assert!(visuals.main_hand.is_some());
        // The amulet is not a visible slot and contributes no visual.
        assert!(!visuals.is_empty());
        assert!(!EquipSlot::Amulet.is_visible());
    }

    #[test]
    fn test_inventory_view_counts() {
        let mut rows = empty();
        add_item(&mut rows, ore(), 5);
        add_item(&mut rows, sword(), 1);
        let view = inventory_view(&rows);
        assert_eq!(view.used_slots, 2);
        assert_eq!(view.free_slots, MAX_SLOTS - 2);
        assert_eq!(view.slots[0].rarity, "common");
    }
}
