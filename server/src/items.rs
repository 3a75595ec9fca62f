//! Compile-time item reference table.
//!
//! Items are defined in code and mirrored to the `items` table on startup so
//! external tooling can join against them. Runtime code always reads this
//! table, never the database copy.

use common::skills::SkillType;
use common::stats::ItemStats;
use common::visual::EquipSlot;

/// Broad item grouping used for sorting and client display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ItemCategory {
    Weapon,
    Armor,
    Tool,
    Consumable,
    Resource,
    Currency,
    Misc,
}

impl ItemCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemCategory::Weapon => "weapon",
            ItemCategory::Armor => "armor",
            ItemCategory::Tool => "tool",
            ItemCategory::Consumable => "consumable",
            ItemCategory::Resource => "resource",
            ItemCategory::Currency => "currency",
            ItemCategory::Misc => "misc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }

    /// Hex color used by the client to tint item names.
    pub fn color(self) -> &'static str {
        match self {
            Rarity::Common => "#ffffff",
            Rarity::Uncommon => "#1eff00",
            Rarity::Rare => "#0070dd",
            Rarity::Epic => "#a335ee",
            Rarity::Legendary => "#ff8000",
        }
    }
}

/// One row of the item reference table.
#[derive(Debug, Clone)]
pub struct ItemDef {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub category: ItemCategory,
    pub rarity: Rarity,
    pub equipment_slot: Option<EquipSlot>,
    pub max_stack_size: u32,
    pub is_two_handed: bool,
    pub max_durability: Option<i32>,
    pub required_skill: Option<SkillType>,
    pub required_level: u32,
    pub is_tradeable: bool,
    pub base_value: i64,
    pub stats: ItemStats,
    /// Paperdoll sprite for the equipped item, if any.
    pub sprite_id: Option<&'static str>,
    /// Client-side tint when the sprite library lacks a native variant.
    pub sprite_tint: Option<&'static str>,
}

impl ItemDef {
    pub fn is_stackable(&self) -> bool {
        self.max_stack_size > 1
    }

    pub fn is_equippable(&self) -> bool {
        self.equipment_slot.is_some()
    }
}

const fn plain(
    name: &'static str,
    display_name: &'static str,
    description: &'static str,
    category: ItemCategory,
    rarity: Rarity,
    max_stack_size: u32,
    base_value: i64,
) -> ItemDef {
    ItemDef {
        name,
        display_name,
        description,
        category,
        rarity,
        equipment_slot: None,
        max_stack_size,
        is_two_handed: false,
        max_durability: None,
        required_skill: None,
        required_level: 1,
        is_tradeable: true,
        base_value,
        stats: ItemStats {
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
        },
        sprite_id: None,
        sprite_tint: None,
    }
}

macro_rules! stats {
    ($($field:ident: $value:expr),* $(,)?) => {
        ItemStats {
            $($field: $value,)*
            ..ItemStats {
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
    };
}

/// The full item table. Database ids are assigned by row order (1-based) at
/// sync time and stay stable as long as rows are only appended.
pub static ITEMS: &[ItemDef] = &[
    // Weapons
    ItemDef {
        equipment_slot: Some(EquipSlot::MainHand),
        max_durability: Some(60),
        required_skill: Some(SkillType::Attack),
        base_value: 12,
        stats: stats!(attack_bonus: 2, strength_bonus: 1),
        sprite_id: Some("copper_dagger"),
        ..plain(
            "copper_dagger",
            "Copper Dagger",
            "A crude dagger with a dull copper blade.",
            ItemCategory::Weapon,
            Rarity::Common,
            1,
            12,
        )
    },
    ItemDef {
        equipment_slot: Some(EquipSlot::MainHand),
        max_durability: Some(80),
        required_skill: Some(SkillType::Attack),
        base_value: 25,
        stats: stats!(attack_bonus: 4, strength_bonus: 3),
        sprite_id: Some("bronze_shortsword"),
        ..plain(
            "bronze_shortsword",
            "Bronze Shortsword",
            "A short, serviceable bronze blade.",
            ItemCategory::Weapon,
            Rarity::Common,
            1,
            25,
        )
    },
    ItemDef {
        equipment_slot: Some(EquipSlot::MainHand),
        max_durability: Some(120),
        required_skill: Some(SkillType::Attack),
        required_level: 5,
        base_value: 90,
        stats: stats!(attack_bonus: 10, strength_bonus: 7),
        sprite_id: Some("iron_shortsword"),
        ..plain(
            "iron_shortsword",
            "Iron Shortsword",
            "A dependable iron blade.",
            ItemCategory::Weapon,
            Rarity::Uncommon,
            1,
            90,
        )
    },
    ItemDef {
        equipment_slot: Some(EquipSlot::MainHand),
        is_two_handed: true,
        max_durability: Some(110),
        required_skill: Some(SkillType::Attack),
        required_level: 10,
        base_value: 210,
        stats: stats!(attack_bonus: 14, strength_bonus: 16, speed_bonus: -5),
        sprite_id: Some("iron_greatsword"),
        ..plain(
            "iron_greatsword",
            "Iron Greatsword",
            "A heavy two-handed blade. Both hands, no shield.",
            ItemCategory::Weapon,
            Rarity::Uncommon,
            1,
            210,
        )
    },
    ItemDef {
        equipment_slot: Some(EquipSlot::MainHand),
        is_two_handed: true,
        max_durability: Some(70),
        required_skill: Some(SkillType::Ranged),
        base_value: 45,
        stats: stats!(ranged_attack_bonus: 6, ranged_strength_bonus: 5),
        sprite_id: Some("shortbow"),
        ..plain(
            "shortbow",
            "Shortbow",
            "A simple hunting bow.",
            ItemCategory::Weapon,
            Rarity::Common,
            1,
            45,
        )
    },
    // Armor
    ItemDef {
        equipment_slot: Some(EquipSlot::Head),
        max_durability: Some(90),
        required_skill: Some(SkillType::Defence),
        base_value: 30,
        stats: stats!(physical_defence_bonus: 3),
        sprite_id: Some("bronze_helmet"),
        ..plain(
            "bronze_helmet",
            "Bronze Helmet",
            "Keeps the rain and the rats off.",
            ItemCategory::Armor,
            Rarity::Common,
            1,
            30,
        )
    },
    ItemDef {
        equipment_slot: Some(EquipSlot::Body),
        max_durability: Some(140),
        required_skill: Some(SkillType::Defence),
        base_value: 75,
        stats: stats!(physical_defence_bonus: 8, speed_bonus: -2),
        sprite_id: Some("bronze_platebody"),
        sprite_tint: Some("#b08d57"),
        ..plain(
            "bronze_platebody",
            "Bronze Platebody",
            "Heavy bronze chest plate.",
            ItemCategory::Armor,
            Rarity::Common,
            1,
            75,
        )
    },
    ItemDef {
        equipment_slot: Some(EquipSlot::Legs),
        max_durability: Some(120),
        required_skill: Some(SkillType::Defence),
        base_value: 55,
        stats: stats!(physical_defence_bonus: 6, speed_bonus: -1),
        sprite_id: Some("bronze_platelegs"),
        sprite_tint: Some("#b08d57"),
        ..plain(
            "bronze_platelegs",
            "Bronze Platelegs",
            "Heavy bronze leg plates.",
            ItemCategory::Armor,
            Rarity::Common,
            1,
            55,
        )
    },
    ItemDef {
        equipment_slot: Some(EquipSlot::OffHand),
        max_durability: Some(150),
        required_skill: Some(SkillType::Defence),
        base_value: 60,
        stats: stats!(physical_defence_bonus: 7),
        sprite_id: Some("bronze_shield"),
        ..plain(
            "bronze_shield",
            "Bronze Shield",
            "A round bronze shield.",
            ItemCategory::Armor,
            Rarity::Common,
            1,
            60,
        )
    },
    ItemDef {
        equipment_slot: Some(EquipSlot::Feet),
        max_durability: Some(80),
        base_value: 18,
        stats: stats!(physical_defence_bonus: 1),
        sprite_id: Some("leather_boots"),
        ..plain(
            "leather_boots",
            "Leather Boots",
            "Sturdy boots of tanned leather.",
            ItemCategory::Armor,
            Rarity::Common,
            1,
            18,
        )
    },
    ItemDef {
        equipment_slot: Some(EquipSlot::Hands),
        max_durability: Some(70),
        base_value: 14,
        stats: stats!(physical_defence_bonus: 1),
        sprite_id: Some("leather_gloves"),
        ..plain(
            "leather_gloves",
            "Leather Gloves",
            "Simple leather gloves.",
            ItemCategory::Armor,
            Rarity::Common,
            1,
            14,
        )
    },
    ItemDef {
        equipment_slot: Some(EquipSlot::Back),
        base_value: 120,
        stats: stats!(magic_defence_bonus: 3, speed_bonus: 2),
        sprite_id: Some("wool_cape"),
        sprite_tint: Some("#7a1f1f"),
        ..plain(
            "wool_cape",
            "Wool Cape",
            "A warm cape dyed deep red.",
            ItemCategory::Armor,
            Rarity::Uncommon,
            1,
            120,
        )
    },
    ItemDef {
        equipment_slot: Some(EquipSlot::Amulet),
        base_value: 250,
        stats: stats!(magic_attack_bonus: 4, magic_defence_bonus: 2),
        ..plain(
            "silver_amulet",
            "Silver Amulet",
            "A polished silver charm.",
            ItemCategory::Armor,
            Rarity::Rare,
            1,
            250,
        )
    },
    // Tools
    ItemDef {
        equipment_slot: Some(EquipSlot::MainHand),
        max_durability: Some(100),
        required_skill: Some(SkillType::Mining),
        base_value: 35,
        stats: stats!(mining_bonus: 5),
        sprite_id: Some("bronze_pickaxe"),
        ..plain(
            "bronze_pickaxe",
            "Bronze Pickaxe",
            "For chipping ore out of rock.",
            ItemCategory::Tool,
            Rarity::Common,
            1,
            35,
        )
    },
    // Consumables
    ItemDef {
        base_value: 8,
        ..plain(
            "bread",
            "Bread",
            "A fresh loaf. Restores a little health.",
            ItemCategory::Consumable,
            Rarity::Common,
            10,
            8,
        )
    },
    ItemDef {
        base_value: 40,
        ..plain(
            "health_potion",
            "Health Potion",
            "A swirling red draught.",
            ItemCategory::Consumable,
            Rarity::Uncommon,
            5,
            40,
        )
    },
    // Resources
    plain(
        "copper_ore",
        "Copper Ore",
        "A lump of copper-bearing rock.",
        ItemCategory::Resource,
        Rarity::Common,
        50,
        5,
    ),
    plain(
        "iron_ore",
        "Iron Ore",
        "A heavy lump of iron-bearing rock.",
        ItemCategory::Resource,
        Rarity::Common,
        50,
        12,
    ),
    plain(
        "oak_log",
        "Oak Log",
        "A length of oak.",
        ItemCategory::Resource,
        Rarity::Common,
        50,
        6,
    ),
    plain(
        "raw_trout",
        "Raw Trout",
        "A freshly caught trout.",
        ItemCategory::Resource,
        Rarity::Common,
        20,
        10,
    ),
    // Currency
    plain(
        "gold_coin",
        "Gold Coin",
        "The realm's coin.",
        ItemCategory::Currency,
        Rarity::Common,
        100_000,
        1,
    ),
    // Misc
    ItemDef {
        is_tradeable: false,
        ..plain(
            "rusty_key",
            "Rusty Key",
            "Opens something, somewhere.",
            ItemCategory::Misc,
            Rarity::Uncommon,
            1,
            0,
        )
    },
];

/// Look up an item by internal name.
pub fn item_by_name(name: &str) -> Option<&'static ItemDef> {
    ITEMS.iter().find(|item| item.name == name)
}

/// 1-based database id for an item name; row order is the id assignment.
pub fn item_db_id(name: &str) -> Option<i64> {
    ITEMS
        .iter()
        .position(|item| item.name == name)
        .map(|idx| idx as i64 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        for (i, a) in ITEMS.iter().enumerate() {
            for b in &ITEMS[i + 1..] {
                assert_ne!(a.name, b.name, "duplicate item name {}", a.name);
            }
        }
    }

    #[test]
    fn test_stackable_iff_stack_size_above_one() {
        let ore = item_by_name("copper_ore").unwrap();
        assert!(ore.is_stackable());
        let sword = item_by_name("bronze_shortsword").unwrap();
        assert!(!sword.is_stackable());
        assert_eq!(sword.max_stack_size, 1);
    }

    #[test]
    fn test_two_handed_weapons_use_main_hand() {
        for item in ITEMS.iter().filter(|i| i.is_two_handed) {
            assert_eq!(item.equipment_slot, Some(EquipSlot::MainHand));
        }
    }

    #[test]
    fn test_lookup() {
        assert!(item_by_name("bronze_shortsword").is_some());
        assert!(item_by_name("no_such_item").is_none());
        assert_eq!(item_db_id("copper_dagger"), Some(1));
    }

    #[test]
    fn test_equippables_have_sprites_or_tints_only_with_sprites() {
        for item in ITEMS {
            if item.sprite_tint.is_some() {
                assert!(item.sprite_id.is_some(), "{} tint without sprite", item.name);
            }
        }
    }
}
