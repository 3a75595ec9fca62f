//! Cross-module flows over the durable tier: item grants stacking into
//! inventory rows, equipment swaps persisting, and stat totals reflecting
//! what is worn.

use common::skills::SkillType;
use common::visual::EquipSlot;
use server::inventory;
use server::items;
use server::repository::Repository;

fn setup() -> (Repository, i64) {
    let repo = Repository::open_in_memory().unwrap();
    repo.sync_items().unwrap();
    repo.sync_entities().unwrap();
    let player_id = repo
        .create_player("alice", "not-a-real-hash", "overworld", 50, 50)
        .unwrap();
    (repo, player_id)
}

/// Grant an item the way CMD_ADMIN_GIVE does: load rows, stack, save.
fn grant(repo: &Repository, player_id: i64, item_name: &str, quantity: u32) -> u32 {
    let item = items::item_by_name(item_name).unwrap();
    let mut rows = repo.load_inventory(player_id).unwrap();
    let leftover = inventory::add_item(&mut rows, item, quantity);
    repo.save_inventory(player_id, &rows).unwrap();
    leftover
}

#[test]
fn stackable_grants_merge_into_one_slot() {
    let (repo, player_id) = setup();

    assert_eq!(grant(&repo, player_id, "copper_ore", 5), 0);
    let rows = repo.load_inventory(player_id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, 5);
    let first_slot = rows[0].slot_index;

    assert_eq!(grant(&repo, player_id, "copper_ore", 3), 0);
    let rows = repo.load_inventory(player_id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].slot_index, first_slot);
    assert_eq!(rows[0].quantity, 8);
}

#[test]
fn non_stackable_grants_fill_distinct_slots() {
    let (repo, player_id) = setup();
    assert_eq!(grant(&repo, player_id, "bronze_shortsword", 3), 0);
    let rows = repo.load_inventory(player_id).unwrap();
    assert_eq!(rows.len(), 3);
    let mut slots: Vec<u8> = rows.iter().map(|r| r.slot_index).collect();
    slots.sort_unstable();
    slots.dedup();
    assert_eq!(slots.len(), 3, "each sword occupies its own slot");
}

#[test]
fn overfull_grant_reports_leftover_and_persists_what_fit() {
    let (repo, player_id) = setup();
    let leftover = grant(
        &repo,
        player_id,
        "bronze_shortsword",
        u32::from(inventory::MAX_SLOTS) + 4,
    );
    assert_eq!(leftover, 4);
    let rows = repo.load_inventory(player_id).unwrap();
    assert_eq!(rows.len(), usize::from(inventory::MAX_SLOTS));
}

#[test]
fn equip_swap_round_trips_through_database() {
    let (repo, player_id) = setup();
    grant(&repo, player_id, "bronze_shortsword", 1);
    grant(&repo, player_id, "bronze_shield", 1);

    let mut inv = repo.load_inventory(player_id).unwrap();
    let mut eq = repo.load_equipment(player_id).unwrap();
    let skill = |_: SkillType| 1u32;
    inventory::equip_from_slot(&mut inv, &mut eq, 0, skill).unwrap();
    inventory::equip_from_slot(&mut inv, &mut eq, 1, skill).unwrap();
    repo.save_inventory(player_id, &inv).unwrap();
    repo.save_equipment(player_id, &eq).unwrap();

    let eq = repo.load_equipment(player_id).unwrap();
    assert_eq!(eq.len(), 2);
    assert!(eq
        .iter()
        .any(|r| r.slot == EquipSlot::MainHand && r.item_name == "bronze_shortsword"));
    assert!(eq
        .iter()
        .any(|r| r.slot == EquipSlot::OffHand && r.item_name == "bronze_shield"));

    // Sword 4 atk / 3 str, shield 7 defence.
    let totals = inventory::total_stats(&eq);
    assert_eq!(totals.attack_bonus, 4);
    assert_eq!(totals.strength_bonus, 3);
    assert_eq!(totals.physical_defence_bonus, 7);

    // The inventory no longer holds the equipped pieces.
    assert!(repo.load_inventory(player_id).unwrap().is_empty());
}

#[test]
fn combat_xp_raises_levels_and_max_hp() {
    let (repo, player_id) = setup();
    assert_eq!(repo.hitpoints_level(player_id).unwrap(), 10);

    // 300 damage worth of hitpoints xp: 400 xp -> level 5, still floored
    // at 10 for vitals.
    repo.add_skill_xp(player_id, SkillType::Hitpoints, 400)
        .unwrap();
    assert_eq!(
        SkillType::level_for_xp(repo.get_skill_xp(player_id, SkillType::Hitpoints).unwrap()),
        5
    );
    assert_eq!(repo.hitpoints_level(player_id).unwrap(), 10);

    repo.add_skill_xp(player_id, SkillType::Hitpoints, 1100)
        .unwrap();
    assert_eq!(repo.hitpoints_level(player_id).unwrap(), 16);

    let eq = repo.load_equipment(player_id).unwrap();
    let stats = inventory::total_stats(&eq);
    assert_eq!(inventory::player_max_hp(16, &stats), 16);
}
