//! Complete visual representation of a humanoid: base appearance plus
//! equipment visuals. The 12-hex fingerprint of a [`VisualState`] is what
//! travels on the wire every tick; full data is sent only on first sight per
//! observer.

use serde::{Deserialize, Serialize};

use crate::appearance::AppearanceData;

/// Equipment slots. The first nine are visible on the paperdoll and
/// participate in [`EquippedVisuals`]; amulet, ring, and ammo carry stats
/// only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Head,
    Body,
    Legs,
    Feet,
    Hands,
    MainHand,
    OffHand,
    Back,
    Belt,
    Amulet,
    Ring,
    Ammo,
}

impl EquipSlot {
    pub const ALL: [EquipSlot; 12] = [
        EquipSlot::Head,
        EquipSlot::Body,
        EquipSlot::Legs,
        EquipSlot::Feet,
        EquipSlot::Hands,
        EquipSlot::MainHand,
        EquipSlot::OffHand,
        EquipSlot::Back,
        EquipSlot::Belt,
        EquipSlot::Amulet,
        EquipSlot::Ring,
        EquipSlot::Ammo,
    ];

    pub const VISIBLE: [EquipSlot; 9] = [
        EquipSlot::Head,
        EquipSlot::Body,
        EquipSlot::Legs,
        EquipSlot::Feet,
        EquipSlot::Hands,
        EquipSlot::MainHand,
        EquipSlot::OffHand,
        EquipSlot::Back,
        EquipSlot::Belt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EquipSlot::Head => "head",
            EquipSlot::Body => "body",
            EquipSlot::Legs => "legs",
            EquipSlot::Feet => "feet",
            EquipSlot::Hands => "hands",
            EquipSlot::MainHand => "main_hand",
            EquipSlot::OffHand => "off_hand",
            EquipSlot::Back => "back",
            EquipSlot::Belt => "belt",
            EquipSlot::Amulet => "amulet",
            EquipSlot::Ring => "ring",
            EquipSlot::Ammo => "ammo",
        }
    }

    pub fn from_str(s: &str) -> Option<EquipSlot> {
        EquipSlot::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Whether this slot is rendered on the paperdoll.
    pub fn is_visible(self) -> bool {
        EquipSlot::VISIBLE.contains(&self)
    }
}

/// Sprite identifier plus optional client-side tint for one visible slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotVisual {
    pub sprite: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tint: Option<String>,
}

/// Visual representation of equipped items, one optional entry per visible
/// slot. Only the rendering data, not the full item rows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EquippedVisuals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<SlotVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<SlotVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legs: Option<SlotVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feet: Option<SlotVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hands: Option<SlotVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_hand: Option<SlotVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub off_hand: Option<SlotVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back: Option<SlotVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub belt: Option<SlotVisual>,
}

impl EquippedVisuals {
    pub fn slot(&self, slot: EquipSlot) -> Option<&SlotVisual> {
        match slot {
            EquipSlot::Head => self.head.as_ref(),
            EquipSlot::Body => self.body.as_ref(),
            EquipSlot::Legs => self.legs.as_ref(),
            EquipSlot::Feet => self.feet.as_ref(),
            EquipSlot::Hands => self.hands.as_ref(),
            EquipSlot::MainHand => self.main_hand.as_ref(),
            EquipSlot::OffHand => self.off_hand.as_ref(),
            EquipSlot::Back => self.back.as_ref(),
            EquipSlot::Belt => self.belt.as_ref(),
            _ => None,
        }
    }

    pub fn set_slot(&mut self, slot: EquipSlot, visual: Option<SlotVisual>) {
        match slot {
            EquipSlot::Head => self.head = visual,
            EquipSlot::Body => self.body = visual,
            EquipSlot::Legs => self.legs = visual,
            EquipSlot::Feet => self.feet = visual,
            EquipSlot::Hands => self.hands = visual,
            EquipSlot::MainHand => self.main_hand = visual,
            EquipSlot::OffHand => self.off_hand = visual,
            EquipSlot::Back => self.back = visual,
            EquipSlot::Belt => self.belt = visual,
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        EquipSlot::VISIBLE.into_iter().all(|s| self.slot(s).is_none())
    }

    /// Canonical JSON object: one `slot` key per occupied slot plus a
    /// `slot_tint` key where a tint is set. None values are omitted.
    fn to_canonical_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for slot in EquipSlot::VISIBLE {
            if let Some(v) = self.slot(slot) {
                obj.insert(
                    slot.as_str().to_string(),
                    serde_json::Value::String(v.sprite.clone()),
                );
                if let Some(tint) = &v.tint {
                    obj.insert(
                        format!("{}_tint", slot.as_str()),
                        serde_json::Value::String(tint.clone()),
                    );
                }
            }
        }
        serde_json::Value::Object(obj)
    }
}

/// Complete visual state of a humanoid entity or player.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualState {
    pub appearance: AppearanceData,
    pub equipment: EquippedVisuals,
}

impl VisualState {
    pub fn new(appearance: AppearanceData, equipment: EquippedVisuals) -> VisualState {
        VisualState {
            appearance,
            equipment,
        }
    }

    /// Stable 12-hex fingerprint over appearance and equipment visuals.
    ///
    /// serde_json's map type is BTreeMap-backed, so nested objects serialize
    /// with sorted keys and the digest is order-independent.
    pub fn compute_hash(&self) -> String {
        let mut obj = serde_json::Map::new();
        obj.insert(
            "appearance".to_string(),
            self.appearance.to_json(),
        );
        obj.insert("equipment".to_string(), self.equipment.to_canonical_json());
        let canonical =
            serde_json::to_string(&serde_json::Value::Object(obj)).unwrap_or_default();
        let digest = md5::compute(canonical.as_bytes());
        let mut hex = format!("{:x}", digest);
        hex.truncate(12);
        hex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::presets;

    fn sample_equipment() -> EquippedVisuals {
        let mut eq = EquippedVisuals::default();
        eq.set_slot(
            EquipSlot::MainHand,
            Some(SlotVisual {
                sprite: "iron_shortsword".to_string(),
                tint: None,
            }),
        );
        eq.set_slot(
            EquipSlot::Body,
            Some(SlotVisual {
                sprite: "plate_body".to_string(),
                tint: Some("#8a8a8a".to_string()),
            }),
        );
        eq
    }

    #[test]
    fn test_hash_deterministic() {
        let vs = VisualState::new(presets::guard(), sample_equipment());
        assert_eq!(vs.compute_hash(), vs.compute_hash());
        assert_eq!(vs.compute_hash().len(), 12);
    }

    #[test]
    fn test_hash_changes_with_equipment() {
        let bare = VisualState::new(presets::guard(), EquippedVisuals::default());
        let armed = VisualState::new(presets::guard(), sample_equipment());
        assert_ne!(bare.compute_hash(), armed.compute_hash());
    }

    #[test]
    fn test_hash_changes_with_tint_only() {
        let mut a = sample_equipment();
        let vs_a = VisualState::new(AppearanceData::default(), a.clone());
        a.set_slot(
            EquipSlot::Body,
            Some(SlotVisual {
                sprite: "plate_body".to_string(),
                tint: Some("#ff0000".to_string()),
            }),
        );
        let vs_b = VisualState::new(AppearanceData::default(), a);
        assert_ne!(vs_a.compute_hash(), vs_b.compute_hash());
    }

    #[test]
    fn test_invisible_slot_ignored() {
        let mut eq = EquippedVisuals::default();
        eq.set_slot(
            EquipSlot::Ring,
            Some(SlotVisual {
                sprite: "gold_ring".to_string(),
                tint: None,
            }),
        );
        assert!(eq.is_empty());
    }

    #[test]
    fn test_visible_slot_names() {
        assert_eq!(EquipSlot::MainHand.as_str(), "main_hand");
        assert_eq!(EquipSlot::from_str("off_hand"), Some(EquipSlot::OffHand));
        assert!(!EquipSlot::Ring.is_visible());
        assert!(EquipSlot::Belt.is_visible());
    }
}
