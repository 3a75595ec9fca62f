//! Visual appearance attributes for humanoid entities.
//!
//! `AppearanceData` covers the "natural" look of a character (body, skin,
//! head, hair, eyes, base clothing). Equipment visuals are layered on top by
//! [`crate::visual::VisualState`]. Every field is a closed enum whose wire
//! value matches the sprite asset naming scheme.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Declares a closed string enum with `as_str`/`from_str` and serde renames
/// matching the wire/asset values.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $value)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self { $(Self::$variant => $value),+ }
            }

            pub fn from_str(s: &str) -> Option<Self> {
                match s {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

string_enum! {
    /// Base body shapes.
    BodyType {
        Male => "male",
        Female => "female",
        Child => "child",
        Teen => "teen",
        Skeleton => "skeleton",
        Zombie => "zombie",
    }
}

string_enum! {
    /// Skin color variants, including fantasy, undead, and fur tones.
    SkinTone {
        Light => "light",
        Olive => "olive",
        Brown => "brown",
        Bronze => "bronze",
        Taupe => "taupe",
        Black => "black",
        Amber => "amber",
        Blue => "blue",
        Green => "green",
        BrightGreen => "bright_green",
        DarkGreen => "dark_green",
        PaleGreen => "pale_green",
        Lavender => "lavender",
        Zombie => "zombie",
        ZombieGreen => "zombie_green",
        FurBlack => "fur_black",
        FurBrown => "fur_brown",
        FurWhite => "fur_white",
        FurGrey => "fur_grey",
        FurTan => "fur_tan",
        FurCopper => "fur_copper",
        FurGold => "fur_gold",
    }
}

string_enum! {
    /// Head shape and race. Values are path segments for sprite lookup.
    HeadType {
        HumanMale => "human/male",
        HumanFemale => "human/female",
        HumanChild => "human/child",
        HumanMaleElderly => "human/male_elderly",
        HumanFemaleElderly => "human/female_elderly",
        HumanMaleGaunt => "human/male_gaunt",
        HumanMalePlump => "human/male_plump",
        HumanMaleSmall => "human/male_small",
        HumanFemaleSmall => "human/female_small",
        HumanElderlySmall => "human/elderly_small",
        Skeleton => "skeleton/default",
        Zombie => "zombie/default",
        Vampire => "vampire/default",
        Orc => "orc/default",
        Goblin => "goblin/default",
        Troll => "troll/default",
        Wolf => "wolf/default",
        Lizard => "lizard/default",
        Minotaur => "minotaur/default",
        Frankenstein => "frankenstein/default",
        Jack => "jack/default",
    }
}

string_enum! {
    /// Hair styles. Curated subset of the sprite library.
    HairStyle {
        Bald => "bald",
        Short => "short",
        Shorthawk => "shorthawk",
        Shortknot => "shortknot",
        Buzzcut => "buzzcut",
        Pixie => "pixie",
        Plain => "plain",
        Parted => "parted",
        Messy1 => "messy1",
        Messy2 => "messy2",
        Bedhead => "bedhead",
        Bangs => "bangs",
        Bangslong => "bangslong",
        Bangslong2 => "bangslong2",
        Bangsshort => "bangsshort",
        Page => "page",
        Bob => "bob",
        Swoop => "swoop",
        Unkempt => "unkempt",
        Halfmessy => "halfmessy",
        CurlyShort => "curly_short",
        Long => "long",
        Longhawk => "longhawk",
        Longknot => "longknot",
        Loose => "loose",
        Xlong => "xlong",
        Xlongknot => "xlongknot",
        Shoulderl => "shoulderl",
        Shoulderr => "shoulderr",
        Princess => "princess",
        CurlyLong => "curly_long",
        Ponytail => "ponytail",
        Ponytail2 => "ponytail2",
        HighPonytail => "high_ponytail",
        Bunches => "bunches",
        Braid => "braid",
        Mohawk => "mohawk",
        Jewfro => "jewfro",
        Afro => "afro",
        DreadlocksShort => "dreadlocks_short",
        DreadlocksLong => "dreadlocks_long",
        Cornrows => "cornrows",
    }
}

string_enum! {
    /// Hair colors, natural and fantasy.
    HairColor {
        Black => "black",
        Brown => "brown",
        Brown2 => "brown2",
        Brunette => "brunette",
        Brunette2 => "brunette2",
        Blonde => "blonde",
        Blonde2 => "blonde2",
        DarkBlonde => "dark-blonde",
        LightBlonde => "light-blonde",
        LightBlonde2 => "light-blonde2",
        Gold => "gold",
        Red => "red",
        Redhead => "redhead",
        Redhead2 => "redhead2",
        Raven => "raven",
        Raven2 => "raven2",
        Gray => "gray",
        White => "white",
        WhiteBlonde => "white-blonde",
        WhiteBlonde2 => "white-blonde2",
        Blue => "blue",
        Blue2 => "blue2",
        Green => "green",
        Green2 => "green2",
        Pink => "pink",
        Pink2 => "pink2",
        Purple => "purple",
        Orange => "orange",
        WhiteCyan => "white-cyan",
    }
}

string_enum! {
    /// Eye colors.
    EyeColor {
        Blue => "blue",
        Brown => "brown",
        Gray => "gray",
        Green => "green",
        Orange => "orange",
        Purple => "purple",
        Red => "red",
        Yellow => "yellow",
    }
}

string_enum! {
    /// Facial hair styles. Defaults to none for female bodies.
    FacialHairStyle {
        None => "none",
        Stubble => "stubble",
        BeardBlack => "beard_black",
        BeardBlonde => "beard_blonde",
        BeardBrown => "beard_brown",
        BeardGray => "beard_gray",
        MustacheBlack => "mustache_black",
        MustacheBlonde => "mustache_blonde",
        MustacheBrown => "mustache_brown",
        GoateeBlack => "goatee_black",
        GoateeBlonde => "goatee_blonde",
        GoateeBrown => "goatee_brown",
    }
}

string_enum! {
    /// Base shirt/top styles worn under armor.
    ClothingStyle {
        None => "none",
        Longsleeve => "longsleeve2",
        Shortsleeve => "shortsleeve",
        Sleeveless => "sleeveless",
        Tunic => "tunic",
        Vest => "vest",
        Blouse => "blouse",
        Corset => "corset",
        Robe => "robe",
    }
}

string_enum! {
    /// Base pants/leg styles worn under leg armor.
    PantsStyle {
        None => "none",
        Pants => "pants",
        Shorts => "shorts",
        Leggings => "leggings",
        Pantaloons => "pantaloons",
        Skirt => "skirts",
    }
}

string_enum! {
    /// Base footwear styles.
    ShoesStyle {
        None => "none",
        Shoes => "shoes/basic",
        Boots => "boots",
        Sandals => "sandals",
        Slippers => "slippers",
    }
}

string_enum! {
    /// Colors for base clothing.
    ClothingColor {
        White => "white",
        Black => "black",
        Gray => "gray",
        Charcoal => "charcoal",
        Slate => "slate",
        Brown => "brown",
        Tan => "tan",
        Leather => "leather",
        Walnut => "walnut",
        Blue => "blue",
        Navy => "navy",
        Sky => "sky",
        Bluegray => "bluegray",
        Teal => "teal",
        Green => "green",
        Forest => "forest",
        Red => "red",
        Maroon => "maroon",
        Pink => "pink",
        Rose => "rose",
        Orange => "orange",
        Purple => "purple",
        Lavender => "lavender",
        Yellow => "yellow",
    }
}

/// Immutable appearance value. Two appearances are equal iff every field is
/// equal; the 12-hex fingerprint is derived from the canonical field map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceData {
    pub body_type: BodyType,
    pub skin_tone: SkinTone,
    pub head_type: HeadType,
    pub hair_style: HairStyle,
    pub hair_color: HairColor,
    pub eye_color: EyeColor,
    pub facial_hair_style: FacialHairStyle,
    pub facial_hair_color: HairColor,
    pub shirt_style: ClothingStyle,
    pub shirt_color: ClothingColor,
    pub pants_style: PantsStyle,
    pub pants_color: ClothingColor,
    pub shoes_style: ShoesStyle,
    pub shoes_color: ClothingColor,
}

impl Default for AppearanceData {
    fn default() -> Self {
        AppearanceData {
            body_type: BodyType::Male,
            skin_tone: SkinTone::Light,
            head_type: HeadType::HumanMale,
            hair_style: HairStyle::Buzzcut,
            hair_color: HairColor::Brown,
            eye_color: EyeColor::Brown,
            facial_hair_style: FacialHairStyle::None,
            facial_hair_color: HairColor::Brown,
            shirt_style: ClothingStyle::Longsleeve,
            shirt_color: ClothingColor::White,
            pants_style: PantsStyle::Pants,
            pants_color: ClothingColor::Brown,
            shoes_style: ShoesStyle::Shoes,
            shoes_color: ClothingColor::Brown,
        }
    }
}

impl AppearanceData {
    /// All fields as a sorted string map. This is the canonical form that
    /// both serialization and fingerprinting build on.
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        let mut map = BTreeMap::new();
        map.insert("body_type", self.body_type.as_str().to_string());
        map.insert("skin_tone", self.skin_tone.as_str().to_string());
        map.insert("head_type", self.head_type.as_str().to_string());
        map.insert("hair_style", self.hair_style.as_str().to_string());
        map.insert("hair_color", self.hair_color.as_str().to_string());
        map.insert("eye_color", self.eye_color.as_str().to_string());
        map.insert("facial_hair_style", self.facial_hair_style.as_str().to_string());
        map.insert("facial_hair_color", self.facial_hair_color.as_str().to_string());
        map.insert("shirt_style", self.shirt_style.as_str().to_string());
        map.insert("shirt_color", self.shirt_color.as_str().to_string());
        map.insert("pants_style", self.pants_style.as_str().to_string());
        map.insert("pants_color", self.pants_color.as_str().to_string());
        map.insert("shoes_style", self.shoes_style.as_str().to_string());
        map.insert("shoes_color", self.shoes_color.as_str().to_string());
        map
    }

    /// Rebuild from a string map. Missing or unrecognized values fall back to
    /// the field default so that stale rows never fail to load.
    pub fn from_map(map: &BTreeMap<String, String>) -> AppearanceData {
        fn get<T: Copy>(
            map: &BTreeMap<String, String>,
            key: &str,
            parse: fn(&str) -> Option<T>,
            default: T,
        ) -> T {
            map.get(key).and_then(|v| parse(v)).unwrap_or(default)
        }

        let d = AppearanceData::default();
        AppearanceData {
            body_type: get(map, "body_type", BodyType::from_str, d.body_type),
            skin_tone: get(map, "skin_tone", SkinTone::from_str, d.skin_tone),
            head_type: get(map, "head_type", HeadType::from_str, d.head_type),
            hair_style: get(map, "hair_style", HairStyle::from_str, d.hair_style),
            hair_color: get(map, "hair_color", HairColor::from_str, d.hair_color),
            eye_color: get(map, "eye_color", EyeColor::from_str, d.eye_color),
            facial_hair_style: get(
                map,
                "facial_hair_style",
                FacialHairStyle::from_str,
                d.facial_hair_style,
            ),
            facial_hair_color: get(
                map,
                "facial_hair_color",
                HairColor::from_str,
                d.facial_hair_color,
            ),
            shirt_style: get(map, "shirt_style", ClothingStyle::from_str, d.shirt_style),
            shirt_color: get(map, "shirt_color", ClothingColor::from_str, d.shirt_color),
            pants_style: get(map, "pants_style", PantsStyle::from_str, d.pants_style),
            pants_color: get(map, "pants_color", ClothingColor::from_str, d.pants_color),
            shoes_style: get(map, "shoes_style", ShoesStyle::from_str, d.shoes_style),
            shoes_color: get(map, "shoes_color", ClothingColor::from_str, d.shoes_color),
        }
    }

    /// Parse from a JSON object (the durable `appearance` column). Invalid or
    /// missing fields fall back to defaults, like [`AppearanceData::from_map`].
    pub fn from_json(value: &serde_json::Value) -> AppearanceData {
        let mut map = BTreeMap::new();
        if let Some(obj) = value.as_object() {
            for (k, v) in obj {
                if let Some(s) = v.as_str() {
                    map.insert(k.clone(), s.to_string());
                }
            }
        }
        AppearanceData::from_map(&map)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.to_map()).unwrap_or(serde_json::Value::Null)
    }

    /// Stable 12-hex-character fingerprint of this appearance.
    ///
    /// Computed as `md5(canonical_json)` truncated to 12 chars, where the
    /// canonical JSON is the sorted field map with compact separators.
    pub fn compute_hash(&self) -> String {
        fingerprint_of_map(&self.to_map())
    }
}

/// md5-based 12-hex fingerprint of a sorted string map.
pub(crate) fn fingerprint_of_map(map: &BTreeMap<&'static str, String>) -> String {
    let canonical = serde_json::to_string(map).unwrap_or_default();
    let digest = md5::compute(canonical.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(12);
    hex
}

/// Stock appearances used by humanoid NPC templates.
pub mod presets {
    use super::*;

    pub fn goblin() -> AppearanceData {
        AppearanceData {
            body_type: BodyType::Male,
            skin_tone: SkinTone::Green,
            head_type: HeadType::Goblin,
            hair_style: HairStyle::Bald,
            eye_color: EyeColor::Red,
            shirt_style: ClothingStyle::Sleeveless,
            shirt_color: ClothingColor::Leather,
            pants_style: PantsStyle::Shorts,
            pants_color: ClothingColor::Leather,
            shoes_style: ShoesStyle::None,
            ..AppearanceData::default()
        }
    }

    pub fn guard() -> AppearanceData {
        AppearanceData {
            body_type: BodyType::Male,
            skin_tone: SkinTone::Olive,
            hair_style: HairStyle::Short,
            hair_color: HairColor::Black,
            facial_hair_style: FacialHairStyle::Stubble,
            facial_hair_color: HairColor::Black,
            shirt_color: ClothingColor::Slate,
            pants_color: ClothingColor::Charcoal,
            shoes_style: ShoesStyle::Boots,
            shoes_color: ClothingColor::Black,
            ..AppearanceData::default()
        }
    }

    pub fn shopkeeper() -> AppearanceData {
        AppearanceData {
            body_type: BodyType::Male,
            skin_tone: SkinTone::Brown,
            hair_style: HairStyle::Parted,
            hair_color: HairColor::Gray,
            shirt_style: ClothingStyle::Vest,
            shirt_color: ClothingColor::Green,
            pants_color: ClothingColor::Tan,
            ..AppearanceData::default()
        }
    }

    pub fn elder() -> AppearanceData {
        AppearanceData {
            body_type: BodyType::Male,
            skin_tone: SkinTone::Light,
            head_type: HeadType::HumanMaleElderly,
            hair_style: HairStyle::Bald,
            hair_color: HairColor::White,
            facial_hair_style: FacialHairStyle::BeardGray,
            facial_hair_color: HairColor::White,
            shirt_style: ClothingStyle::Robe,
            shirt_color: ClothingColor::Purple,
            pants_color: ClothingColor::Slate,
            shoes_style: ShoesStyle::Sandals,
            ..AppearanceData::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_round_trip() {
        let a = presets::guard();
        let map: BTreeMap<String, String> = a
            .to_map()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(AppearanceData::from_map(&map), a);
    }

    #[test]
    fn test_from_map_defaults_on_garbage() {
        let mut map = BTreeMap::new();
        map.insert("hair_style".to_string(), "not_a_style".to_string());
        map.insert("eye_color".to_string(), "green".to_string());
        let a = AppearanceData::from_map(&map);
        assert_eq!(a.hair_style, HairStyle::Buzzcut);
        assert_eq!(a.eye_color, EyeColor::Green);
        assert_eq!(a.body_type, BodyType::Male);
    }

    #[test]
    fn test_hash_is_stable_and_12_hex() {
        let a = AppearanceData::default();
        let h1 = a.compute_hash();
        let h2 = a.compute_hash();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 12);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_differs_when_field_differs() {
        let a = AppearanceData::default();
        let b = AppearanceData {
            hair_color: HairColor::Pink,
            ..a
        };
        assert_ne!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn test_json_round_trip() {
        let a = presets::elder();
        let json = a.to_json();
        assert_eq!(AppearanceData::from_json(&json), a);
    }
}
