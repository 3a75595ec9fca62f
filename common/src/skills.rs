use serde::{Deserialize, Serialize};

/// Trainable player skills. Entity templates use the same enum for their
/// innate skill levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillType {
    Attack,
    Strength,
    Defence,
    Hitpoints,
    Ranged,
    Magic,
    Mining,
    Woodcutting,
    Fishing,
}

impl SkillType {
    pub const ALL: [SkillType; 9] = [
        SkillType::Attack,
        SkillType::Strength,
        SkillType::Defence,
        SkillType::Hitpoints,
        SkillType::Ranged,
        SkillType::Magic,
        SkillType::Mining,
        SkillType::Woodcutting,
        SkillType::Fishing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SkillType::Attack => "attack",
            SkillType::Strength => "strength",
            SkillType::Defence => "defence",
            SkillType::Hitpoints => "hitpoints",
            SkillType::Ranged => "ranged",
            SkillType::Magic => "magic",
            SkillType::Mining => "mining",
            SkillType::Woodcutting => "woodcutting",
            SkillType::Fishing => "fishing",
        }
    }

    pub fn from_str(s: &str) -> Option<SkillType> {
        SkillType::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Level reached at `xp` total experience. Flat curve: 100 xp per level,
    /// level 1 at zero experience, capped at 99.
    pub fn level_for_xp(xp: u64) -> u32 {
        let level = 1 + (xp / 100) as u32;
        level.min(99)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_name_round_trip() {
        for skill in SkillType::ALL {
            assert_eq!(SkillType::from_str(skill.as_str()), Some(skill));
        }
    }

    #[test]
    fn test_level_curve() {
        assert_eq!(SkillType::level_for_xp(0), 1);
        assert_eq!(SkillType::level_for_xp(99), 1);
        assert_eq!(SkillType::level_for_xp(100), 2);
        assert_eq!(SkillType::level_for_xp(1_000_000), 99);
    }
}
