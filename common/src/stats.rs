use serde::{Deserialize, Serialize};

/// Fixed vector of stat bonuses carried by items and entity templates.
/// All values can be negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemStats {
    // Combat offensive
    pub attack_bonus: i32,
    pub strength_bonus: i32,
    pub ranged_attack_bonus: i32,
    pub ranged_strength_bonus: i32,
    pub magic_attack_bonus: i32,
    pub magic_damage_bonus: i32,

    // Combat defensive
    pub physical_defence_bonus: i32,
    pub magic_defence_bonus: i32,

    // Other
    pub health_bonus: i32,
    pub speed_bonus: i32,

    // Gathering
    pub mining_bonus: i32,
    pub woodcutting_bonus: i32,
    pub fishing_bonus: i32,
}

impl ItemStats {
    /// Element-wise sum. Equipment stat totals are the fold of this over all
    /// equipped items.
    pub fn add(&self, other: &ItemStats) -> ItemStats {
        ItemStats {
            attack_bonus: self.attack_bonus + other.attack_bonus,
            strength_bonus: self.strength_bonus + other.strength_bonus,
            ranged_attack_bonus: self.ranged_attack_bonus + other.ranged_attack_bonus,
            ranged_strength_bonus: self.ranged_strength_bonus + other.ranged_strength_bonus,
            magic_attack_bonus: self.magic_attack_bonus + other.magic_attack_bonus,
            magic_damage_bonus: self.magic_damage_bonus + other.magic_damage_bonus,
            physical_defence_bonus: self.physical_defence_bonus + other.physical_defence_bonus,
            magic_defence_bonus: self.magic_defence_bonus + other.magic_defence_bonus,
            health_bonus: self.health_bonus + other.health_bonus,
            speed_bonus: self.speed_bonus + other.speed_bonus,
            mining_bonus: self.mining_bonus + other.mining_bonus,
            woodcutting_bonus: self.woodcutting_bonus + other.woodcutting_bonus,
            fishing_bonus: self.fishing_bonus + other.fishing_bonus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_elementwise() {
        let a = ItemStats {
            attack_bonus: 5,
            physical_defence_bonus: -2,
            ..ItemStats::default()
        };
        let b = ItemStats {
            attack_bonus: 3,
            strength_bonus: 7,
            ..ItemStats::default()
        };
        let sum = a.add(&b);
        assert_eq!(sum.attack_bonus, 8);
        assert_eq!(sum.strength_bonus, 7);
        assert_eq!(sum.physical_defence_bonus, -2);
        assert_eq!(sum.fishing_bonus, 0);
    }
}
