//! Entity template reference tables.
//!
//! Two template families: monsters render from animated sprite sheets and
//! carry innate combat bonuses; humanoid NPCs render through the paperdoll
//! system, so their appearance and equipment determine both visuals and
//! stats. Templates are synced to the `entities` table on startup.

use common::appearance::{presets, AppearanceData};
use common::skills::SkillType;
use common::stats::ItemStats;
use common::visual::{EquipSlot, EquippedVisuals, SlotVisual, VisualState};

use crate::items;

/// AI behavior pattern for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityBehavior {
    /// Wanders, flees if attacked.
    Passive,
    /// Wanders, attacks back if provoked.
    Neutral,
    /// Chases and attacks players within aggro range.
    Aggressive,
    /// Stationary or patrols; retaliates when attacked.
    Guard,
    /// Stationary, offers trade.
    Merchant,
    /// Stationary, offers dialogue.
    QuestGiver,
}

impl EntityBehavior {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityBehavior::Passive => "passive",
            EntityBehavior::Neutral => "neutral",
            EntityBehavior::Aggressive => "aggressive",
            EntityBehavior::Guard => "guard",
            EntityBehavior::Merchant => "merchant",
            EntityBehavior::QuestGiver => "quest_giver",
        }
    }

    /// Whether this behavior actively scans for targets.
    pub fn seeks_targets(self) -> bool {
        matches!(self, EntityBehavior::Aggressive | EntityBehavior::Guard)
    }

    /// Whether being attacked makes this entity fight back.
    pub fn retaliates(self) -> bool {
        !matches!(self, EntityBehavior::Passive | EntityBehavior::Merchant | EntityBehavior::QuestGiver)
    }
}

/// Runtime state of an entity instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Idle,
    Wander,
    Combat,
    Returning,
    Dying,
    Dead,
}

impl EntityState {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityState::Idle => "idle",
            EntityState::Wander => "wander",
            EntityState::Combat => "combat",
            EntityState::Returning => "returning",
            EntityState::Dying => "dying",
            EntityState::Dead => "dead",
        }
    }

    pub fn from_str(s: &str) -> Option<EntityState> {
        match s {
            "idle" => Some(EntityState::Idle),
            "wander" => Some(EntityState::Wander),
            "combat" => Some(EntityState::Combat),
            "returning" => Some(EntityState::Returning),
            "dying" => Some(EntityState::Dying),
            "dead" => Some(EntityState::Dead),
            _ => None,
        }
    }
}

/// Monster template: sprite-sheet rendering, innate combat stats.
#[derive(Debug, Clone)]
pub struct MonsterDef {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub behavior: EntityBehavior,
    pub sprite_sheet_id: &'static str,
    pub level: i32,
    pub xp_reward: u64,
    pub aggro_radius: i32,
    pub disengage_radius: i32,
    /// Seconds until respawn after death.
    pub respawn_time: u32,
    pub skills: &'static [(SkillType, u32)],
    pub bonuses: ItemStats,
}

/// Humanoid NPC template: paperdoll rendering, stats derived from equipment.
#[derive(Debug, Clone)]
pub struct HumanoidDef {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub behavior: EntityBehavior,
    pub is_attackable: bool,
    pub appearance: fn() -> AppearanceData,
    /// Slot -> item name of equipped gear.
    pub equipped_items: &'static [(EquipSlot, &'static str)],
    pub level: i32,
    pub xp_reward: u64,
    pub aggro_radius: i32,
    pub disengage_radius: i32,
    pub respawn_time: u32,
    pub skills: &'static [(SkillType, u32)],
    pub dialogue: &'static [&'static str],
    pub shop_id: Option<&'static str>,
}

/// A reference to either template family.
#[derive(Debug, Clone, Copy)]
pub enum EntityTemplate {
    Monster(&'static MonsterDef),
    Humanoid(&'static HumanoidDef),
}

impl EntityTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            EntityTemplate::Monster(m) => m.name,
            EntityTemplate::Humanoid(h) => h.name,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EntityTemplate::Monster(m) => m.display_name,
            EntityTemplate::Humanoid(h) => h.display_name,
        }
    }

    pub fn behavior(&self) -> EntityBehavior {
        match self {
            EntityTemplate::Monster(m) => m.behavior,
            EntityTemplate::Humanoid(h) => h.behavior,
        }
    }

    pub fn is_attackable(&self) -> bool {
        match self {
            EntityTemplate::Monster(_) => true,
            EntityTemplate::Humanoid(h) => h.is_attackable,
        }
    }

    pub fn level(&self) -> i32 {
        match self {
            EntityTemplate::Monster(m) => m.level,
            EntityTemplate::Humanoid(h) => h.level,
        }
    }

    pub fn xp_reward(&self) -> u64 {
        match self {
            EntityTemplate::Monster(m) => m.xp_reward,
            EntityTemplate::Humanoid(h) => h.xp_reward,
        }
    }

    pub fn aggro_radius(&self) -> i32 {
        match self {
            EntityTemplate::Monster(m) => m.aggro_radius,
            EntityTemplate::Humanoid(h) => h.aggro_radius,
        }
    }

    pub fn disengage_radius(&self) -> i32 {
        match self {
            EntityTemplate::Monster(m) => m.disengage_radius,
            EntityTemplate::Humanoid(h) => h.disengage_radius,
        }
    }

    pub fn respawn_time(&self) -> u32 {
        match self {
            EntityTemplate::Monster(m) => m.respawn_time,
            EntityTemplate::Humanoid(h) => h.respawn_time,
        }
    }

    pub fn skills(&self) -> &'static [(SkillType, u32)] {
        match self {
            EntityTemplate::Monster(m) => m.skills,
            EntityTemplate::Humanoid(h) => h.skills,
        }
    }

    pub fn skill_level(&self, skill: SkillType) -> u32 {
        self.skills()
            .iter()
            .find(|(s, _)| *s == skill)
            .map(|(_, lvl)| *lvl)
            .unwrap_or(1)
    }

    /// Max HP from the hitpoints skill; 10 when absent.
    pub fn max_hp(&self) -> i32 {
        self.skills()
            .iter()
            .find(|(s, _)| *s == SkillType::Hitpoints)
            .map(|(_, lvl)| *lvl as i32)
            .unwrap_or(10)
    }

    /// Combat stat bonuses: innate for monsters, equipment-derived for
    /// humanoids.
    pub fn bonuses(&self) -> ItemStats {
        match self {
            EntityTemplate::Monster(m) => m.bonuses,
            EntityTemplate::Humanoid(h) => {
                let mut total = ItemStats::default();
                for (_, item_name) in h.equipped_items {
                    if let Some(item) = items::item_by_name(item_name) {
                        total = total.add(&item.stats);
                    }
                }
                total
            }
        }
    }

    pub fn sprite_sheet_id(&self) -> Option<&'static str> {
        match self {
            EntityTemplate::Monster(m) => Some(m.sprite_sheet_id),
            EntityTemplate::Humanoid(_) => None,
        }
    }

    /// Paperdoll visual state for humanoids; None for monsters.
    pub fn visual_state(&self) -> Option<VisualState> {
        match self {
            EntityTemplate::Monster(_) => None,
            EntityTemplate::Humanoid(h) => {
                let mut equipment = EquippedVisuals::default();
                for (slot, item_name) in h.equipped_items {
                    if !slot.is_visible() {
                        continue;
                    }
                    if let Some(item) = items::item_by_name(item_name) {
                        if let Some(sprite) = item.sprite_id {
                            equipment.set_slot(
                                *slot,
                                Some(SlotVisual {
                                    sprite: sprite.to_string(),
                                    tint: item.sprite_tint.map(str::to_string),
                                }),
                            );
                        }
                    }
                }
                Some(VisualState::new((h.appearance)(), equipment))
            }
        }
    }
}

static GIANT_RAT: MonsterDef = MonsterDef {
    name: "giant_rat",
    display_name: "Giant Rat",
    description: "An overgrown vermin with sharp teeth.",
    behavior: EntityBehavior::Aggressive,
    sprite_sheet_id: "giant_rat",
    level: 1,
    xp_reward: 10,
    aggro_radius: 4,
    disengage_radius: 12,
    respawn_time: 30,
    skills: &[
        (SkillType::Attack, 3),
        (SkillType::Strength, 3),
        (SkillType::Defence, 2),
        (SkillType::Hitpoints, 8),
    ],
    bonuses: ItemStats {
        speed_bonus: 10,
        ..zero_stats()
    },
};

static FOREST_BEAR: MonsterDef = MonsterDef {
    name: "forest_bear",
    display_name: "Forest Bear",
    description: "A massive brown bear with powerful claws.",
    behavior: EntityBehavior::Aggressive,
    sprite_sheet_id: "bear",
    level: 15,
    xp_reward: 150,
    aggro_radius: 7,
    disengage_radius: 25,
    respawn_time: 120,
    skills: &[
        (SkillType::Attack, 20),
        (SkillType::Strength, 25),
        (SkillType::Defence, 15),
        (SkillType::Hitpoints, 60),
    ],
    bonuses: ItemStats {
        attack_bonus: 10,
        strength_bonus: 15,
        physical_defence_bonus: 5,
        speed_bonus: -10,
        ..zero_stats()
    },
};

static CAVE_BAT: MonsterDef = MonsterDef {
    name: "cave_bat",
    display_name: "Cave Bat",
    description: "A leathery bat that dislikes torchlight.",
    behavior: EntityBehavior::Neutral,
    sprite_sheet_id: "cave_bat",
    level: 3,
    xp_reward: 18,
    aggro_radius: 0,
    disengage_radius: 10,
    respawn_time: 25,
    skills: &[
        (SkillType::Attack, 5),
        (SkillType::Strength, 4),
        (SkillType::Defence, 6),
        (SkillType::Hitpoints, 12),
    ],
    bonuses: ItemStats {
        speed_bonus: 15,
        ..zero_stats()
    },
};

static GOBLIN: HumanoidDef = HumanoidDef {
    name: "goblin",
    display_name: "Goblin",
    description: "A small, green creature with a pointy nose.",
    behavior: EntityBehavior::Aggressive,
    is_attackable: true,
    appearance: presets::goblin,
    equipped_items: &[(EquipSlot::MainHand, "copper_dagger")],
    level: 2,
    xp_reward: 15,
    aggro_radius: 5,
    disengage_radius: 15,
    respawn_time: 30,
    skills: &[
        (SkillType::Attack, 5),
        (SkillType::Strength, 5),
        (SkillType::Defence, 5),
        (SkillType::Hitpoints, 10),
    ],
    dialogue: &[],
    shop_id: None,
};

static VILLAGE_GUARD: HumanoidDef = HumanoidDef {
    name: "village_guard",
    display_name: "Village Guard",
    description: "Keeps the peace in the village.",
    behavior: EntityBehavior::Guard,
    is_attackable: true,
    appearance: presets::guard,
    equipped_items: &[
        (EquipSlot::MainHand, "iron_shortsword"),
        (EquipSlot::Body, "bronze_platebody"),
        (EquipSlot::Legs, "bronze_platelegs"),
        (EquipSlot::Head, "bronze_helmet"),
        (EquipSlot::OffHand, "bronze_shield"),
        (EquipSlot::Feet, "leather_boots"),
        (EquipSlot::Hands, "leather_gloves"),
    ],
    level: 20,
    xp_reward: 0,
    aggro_radius: 8,
    disengage_radius: 20,
    respawn_time: 120,
    skills: &[
        (SkillType::Attack, 30),
        (SkillType::Strength, 30),
        (SkillType::Defence, 30),
        (SkillType::Hitpoints, 100),
    ],
    dialogue: &["Move along, citizen.", "I'm watching you."],
    shop_id: None,
};

static SHOPKEEPER_BOB: HumanoidDef = HumanoidDef {
    name: "shopkeeper_bob",
    display_name: "Bob",
    description: "A friendly general store owner.",
    behavior: EntityBehavior::Merchant,
    is_attackable: false,
    appearance: presets::shopkeeper,
    equipped_items: &[],
    level: 1,
    xp_reward: 0,
    aggro_radius: 0,
    disengage_radius: 0,
    respawn_time: 60,
    skills: &[(SkillType::Hitpoints, 10)],
    dialogue: &[
        "Welcome to Bob's General Store!",
        "Finest wares in the land.",
    ],
    shop_id: Some("general_store"),
};

static VILLAGE_ELDER: HumanoidDef = HumanoidDef {
    name: "village_elder",
    display_name: "Village Elder",
    description: "A wise old man standing by the fountain.",
    behavior: EntityBehavior::QuestGiver,
    is_attackable: false,
    appearance: presets::elder,
    equipped_items: &[],
    level: 5,
    xp_reward: 0,
    aggro_radius: 0,
    disengage_radius: 0,
    respawn_time: 60,
    skills: &[(SkillType::Hitpoints, 20)],
    dialogue: &[
        "Greetings, young adventurer.",
        "Dark times are upon us...",
        "The goblins in the forest have become restless.",
    ],
    shop_id: None,
};

const fn zero_stats() -> ItemStats {
    ItemStats {
        attack_bonus: 0,
        strength_bonus: 0,
        ranged_attack_bonus: 0,
        ranged_strength_bonus: 0,
        magic_attack_bonus: 0,
        magic_damage_bonus: 0,
        physical_defence_bonus: 0,
        magic_defence_bonus: 0,
        health_bonus: 0,
        speed_bonus: 0,
        mining_bonus: 0,
        woodcutting_bonus: 0,
        fishing_bonus: 0,
    }
}

static MONSTERS: &[&MonsterDef] = &[&GIANT_RAT, &FOREST_BEAR, &CAVE_BAT];
static HUMANOIDS: &[&HumanoidDef] = &[&GOBLIN, &VILLAGE_GUARD, &SHOPKEEPER_BOB, &VILLAGE_ELDER];

/// Every template in sync order (monsters first, then humanoids).
pub fn all_templates() -> impl Iterator<Item = EntityTemplate> {
    MONSTERS
        .iter()
        .map(|m| EntityTemplate::Monster(m))
        .chain(HUMANOIDS.iter().map(|h| EntityTemplate::Humanoid(h)))
}

/// Case-insensitive lookup by template name.
pub fn template_by_name(name: &str) -> Option<EntityTemplate> {
    let lower = name.to_lowercase();
    all_templates().find(|t| t.name() == lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert!(template_by_name("GOBLIN").is_some());
        assert!(template_by_name("goblin").is_some());
        assert!(template_by_name("dragon").is_none());
    }

    #[test]
    fn test_max_hp_from_hitpoints_skill() {
        let bear = template_by_name("forest_bear").unwrap();
        assert_eq!(bear.max_hp(), 60);
        // No hitpoints entry defaults to 10.
        let def = MonsterDef {
            skills: &[(SkillType::Attack, 5)],
            ..GIANT_RAT.clone()
        };
        let template = EntityTemplate::Monster(Box::leak(Box::new(def)));
        assert_eq!(template.max_hp(), 10);
    }

    #[test]
    fn test_humanoid_stats_derive_from_equipment() {
        let guard = template_by_name("village_guard").unwrap();
        let bonuses = guard.bonuses();
        // iron_shortsword(10 atk) and nothing else grants attack.
        assert_eq!(bonuses.attack_bonus, 10);
        // platebody(8) + platelegs(6) + helmet(3) + shield(7) + boots(1) + gloves(1)
        assert_eq!(bonuses.physical_defence_bonus, 26);
    }

    #[test]
    fn test_humanoid_visual_state_covers_visible_equipment() {
        let guard = template_by_name("village_guard").unwrap();
        let vs = guard.visual_state().unwrap();
        assert!(vs.equipment.main_hand.is_some());
        assert!(vs.equipment.body.is_some());
        assert!(vs.equipment.feet.is_some());
        assert_eq!(vs.compute_hash().len(), 12);
    }

    #[test]
    fn test_monsters_have_no_visual_state() {
        let rat = template_by_name("giant_rat").unwrap();
        assert!(rat.visual_state().is_none());
        assert_eq!(rat.sprite_sheet_id(), Some("giant_rat"));
    }

    #[test]
    fn test_non_attackable_npcs() {
        assert!(!template_by_name("shopkeeper_bob").unwrap().is_attackable());
        assert!(!template_by_name("village_elder").unwrap().is_attackable());
        assert!(template_by_name("village_guard").unwrap().is_attackable());
    }

    #[test]
    fn test_zero_aggro_disables_seeking() {
        let bat = template_by_name("cave_bat").unwrap();
        assert_eq!(bat.aggro_radius(), 0);
        assert!(!bat.behavior().seeks_targets());
        assert!(bat.behavior().retaliates());
    }
}
