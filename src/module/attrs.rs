//! Attribute and power tables.
//!
//! The game exposes 21 named module attributes, split into *basic* and
//! *special* groups. Summed attribute values bucket into levels 0..=6 at
//! fixed thresholds, and combat power is derived from per-attribute levels
//! plus a global total-value table.

use serde::{Deserialize, Serialize};

/// Attribute ids for the basic group, in display order.
#[allow(dead_code)]
pub mod attr_id {
    pub const STRENGTH_BOOST: u32 = 1110;
    pub const AGILITY_BOOST: u32 = 1111;
    pub const INTELLECT_BOOST: u32 = 1112;
    pub const SPECIAL_ATTACK: u32 = 1113;
    pub const ELITE_STRIKE: u32 = 1114;
    pub const ATTACK_SPD: u32 = 1115;
    pub const CAST_FOCUS: u32 = 1116;
    pub const PRECISION: u32 = 1117;
    pub const CRIT_RATE: u32 = 1118;
    pub const RESISTANCE: u32 = 1119;
    pub const ARMOR: u32 = 1120;
    pub const HEALING_BOOST: u32 = 1121;
    pub const HEALING_ENHANCE: u32 = 1122;

    pub const EXTREME_FLASH: u32 = 2104;
    pub const LIFE_DRAIN: u32 = 2105;
    pub const EMERGENCY_HEAL: u32 = 2106;
    pub const TEAM_SHIELD: u32 = 2107;
    pub const COUNTER_SURGE: u32 = 2204;
    pub const SWIFT_CASTING: u32 = 2205;
    pub const IRON_WILL: u32 = 2206;
    pub const BATTLE_ROAR: u32 = 2207;
}

/// Basic attribute names, in the fixed display order.
pub const BASIC_ATTRS: [&str; 13] = [
    "Strength Boost",
    "Agility Boost",
    "Intellect Boost",
    "Special Attack",
    "Elite Strike",
    "Attack SPD",
    "Cast Focus",
    "Precision",
    "Crit Rate",
    "Resistance",
    "Armor",
    "Healing Boost",
    "Healing Enhance",
];

/// Special attribute names, in the fixed display order.
pub const SPECIAL_ATTRS: [&str; 8] = [
    "Extreme Flash",
    "Life Drain",
    "Emergency Heal",
    "Team Shield",
    "Counter Surge",
    "Swift Casting",
    "Iron Will",
    "Battle Roar",
];

/// Attribute id -> name table (basic then special, id-ascending per group).
const ATTR_TABLE: [(u32, &str); 21] = [
    (attr_id::STRENGTH_BOOST, "Strength Boost"),
    (attr_id::AGILITY_BOOST, "Agility Boost"),
    (attr_id::INTELLECT_BOOST, "Intellect Boost"),
    (attr_id::SPECIAL_ATTACK, "Special Attack"),
    (attr_id::ELITE_STRIKE, "Elite Strike"),
    (attr_id::ATTACK_SPD, "Attack SPD"),
    (attr_id::CAST_FOCUS, "Cast Focus"),
    (attr_id::PRECISION, "Precision"),
    (attr_id::CRIT_RATE, "Crit Rate"),
    (attr_id::RESISTANCE, "Resistance"),
    (attr_id::ARMOR, "Armor"),
    (attr_id::HEALING_BOOST, "Healing Boost"),
    (attr_id::HEALING_ENHANCE, "Healing Enhance"),
    (attr_id::EXTREME_FLASH, "Extreme Flash"),
    (attr_id::LIFE_DRAIN, "Life Drain"),
    (attr_id::EMERGENCY_HEAL, "Emergency Heal"),
    (attr_id::TEAM_SHIELD, "Team Shield"),
    (attr_id::COUNTER_SURGE, "Counter Surge"),
    (attr_id::SWIFT_CASTING, "Swift Casting"),
    (attr_id::IRON_WILL, "Iron Will"),
    (attr_id::BATTLE_ROAR, "Battle Roar"),
];

/// Whether an attribute belongs to the basic or special group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrKind {
    Basic,
    Special,
}

/// Look up the display name for an attribute id.
///
/// Unknown ids render as `Attr(<id>)` so a schema drift never drops a part.
pub fn attr_name(id: u32) -> String {
    ATTR_TABLE
        .iter()
        .find(|(aid, _)| *aid == id)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("Attr({id})"))
}

/// Classify an attribute name as basic or special.
///
/// Names outside the 21-entry table are treated as basic; that only affects
/// the per-attribute power table chosen for synthetic heuristic parts.
pub fn attr_kind(name: &str) -> AttrKind {
    if SPECIAL_ATTRS.contains(&name) {
        AttrKind::Special
    } else {
        AttrKind::Basic
    }
}

/// The fixed, ordered 21-entry attribute listing exposed to callers.
pub fn all_attr_names() -> Vec<&'static str> {
    BASIC_ATTRS.iter().chain(SPECIAL_ATTRS.iter()).copied().collect()
}

/// Attributes preferred by Attack-category solutions.
pub const ATTACK_PREFERRED: [&str; 5] = [
    "Strength Boost",
    "Agility Boost",
    "Intellect Boost",
    "Special Attack",
    "Elite Strike",
];

/// Attributes preferred by Guard-category solutions.
pub const GUARD_PREFERRED: [&str; 2] = ["Resistance", "Armor"];

/// Attributes preferred by Support-category solutions.
pub const SUPPORT_PREFERRED: [&str; 2] = ["Healing Boost", "Healing Enhance"];

/// Physical-school attributes for the conflict penalty.
pub const PHYSICAL_ATTRS: [&str; 3] = ["Strength Boost", "Agility Boost", "Attack SPD"];

/// Magic-school attributes for the conflict penalty.
pub const MAGIC_ATTRS: [&str; 2] = ["Intellect Boost", "Cast Focus"];

/// Level thresholds for summed attribute values.
pub const LEVEL_THRESHOLDS: [u32; 6] = [1, 4, 8, 12, 16, 20];

/// Bucket a summed attribute value into a level in `0..=6`.
pub fn level(value: u32) -> u8 {
    LEVEL_THRESHOLDS.iter().filter(|&&t| value >= t).count() as u8
}

/// Per-attribute combat power for basic attributes, keyed by level 1..=6.
pub const BASIC_LEVEL_POWER: [u32; 7] = [0, 7, 14, 29, 44, 167, 254];

/// Per-attribute combat power for special attributes, keyed by level 1..=6.
pub const SPECIAL_LEVEL_POWER: [u32; 7] = [0, 14, 29, 59, 89, 298, 448];

/// Combat power contribution for one attribute at a summed value.
pub fn attr_power(name: &str, value: u32) -> u32 {
    let lvl = level(value) as usize;
    match attr_kind(name) {
        AttrKind::Basic => BASIC_LEVEL_POWER[lvl],
        AttrKind::Special => SPECIAL_LEVEL_POWER[lvl],
    }
}

/// Global combat power keyed by the total attribute value of a solution.
///
/// Index is the clamped total; totals past the table end reuse the last
/// entry, totals of 0 contribute 0.
pub const TOTAL_ATTR_POWER: [u32; 57] = [
    0, 2, 5, 9, 14, 20, 27, 35, 44, 54, // 0..=9
    65, 77, 90, 104, 119, 135, 152, 170, 189, 209, // 10..=19
    230, 252, 275, 299, 324, 350, 377, 405, 434, 464, // 20..=29
    495, 527, 560, 594, 629, 665, 702, 740, 779, 819, // 30..=39
    860, 902, 945, 989, 1034, 1080, 1127, 1175, 1224, 1274, // 40..=49
    1325, 1377, 1430, 1484, 1539, 1595, 1652, // 50..=56
];

/// Global combat power for a total attribute value.
pub fn total_power(total: u32) -> u32 {
    let idx = (total as usize).min(TOTAL_ATTR_POWER.len() - 1);
    TOTAL_ATTR_POWER[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_listing_order_and_size() {
        let names = all_attr_names();
        assert_eq!(names.len(), 21);
        assert_eq!(names[0], "Strength Boost");
        assert_eq!(names[12], "Healing Enhance");
        assert_eq!(names[13], "Extreme Flash");
        assert_eq!(names[20], "Battle Roar");
    }

    #[test]
    fn test_attr_name_lookup() {
        assert_eq!(attr_name(1110), "Strength Boost");
        assert_eq!(attr_name(1113), "Special Attack");
        assert_eq!(attr_name(2207), "Battle Roar");
        assert_eq!(attr_name(9999), "Attr(9999)");
    }

    #[test]
    fn test_attr_kind_split() {
        assert_eq!(attr_kind("Armor"), AttrKind::Basic);
        assert_eq!(attr_kind("Team Shield"), AttrKind::Special);
        // Unknown names fall back to basic
        assert_eq!(attr_kind("Attr(9999)"), AttrKind::Basic);
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(level(0), 0);
        assert_eq!(level(1), 1);
        assert_eq!(level(3), 1);
        assert_eq!(level(4), 2);
        assert_eq!(level(8), 3);
        assert_eq!(level(11), 3);
        assert_eq!(level(12), 4);
        assert_eq!(level(16), 5);
        assert_eq!(level(19), 5);
        assert_eq!(level(20), 6);
        assert_eq!(level(200), 6);
    }

    #[test]
    fn test_attr_power_tables() {
        assert_eq!(attr_power("Armor", 0), 0);
        assert_eq!(attr_power("Armor", 1), 7);
        assert_eq!(attr_power("Armor", 20), 254);
        assert_eq!(attr_power("Team Shield", 1), 14);
        assert_eq!(attr_power("Team Shield", 20), 448);
    }

    #[test]
    fn test_total_power_clamps() {
        assert_eq!(total_power(0), 0);
        assert_eq!(total_power(10), 65);
        assert_eq!(total_power(56), 1652);
        // Past the table end, the last entry is reused
        assert_eq!(total_power(400), 1652);
    }

    #[test]
    fn test_total_power_monotonic() {
        for w in TOTAL_ATTR_POWER.windows(2) {
            assert!(w[0] < w[1]);
        }
    }
}
