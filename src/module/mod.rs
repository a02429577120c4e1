//! Module inventory data model.
//!
//! A *module* is an in-game equippable item with a config id, a unique
//! instance uuid, a quality grade, and 2-4 attribute parts. Modules are
//! deduplicated by uuid across captures; four distinct modules form a
//! [`ModuleSolution`].

pub mod attrs;
mod solution;

pub use solution::{ModuleSolution, RankedSolution};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use attrs::attr_name;

/// One named attribute line on a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePart {
    pub attr_id: u32,
    pub attr_name: String,
    pub value: u8,
}

impl ModulePart {
    /// Build a part from a wire attribute id and value.
    pub fn new(attr_id: u32, value: u8) -> Self {
        Self {
            attr_id,
            attr_name: attr_name(attr_id),
            value,
        }
    }
}

/// Derived module category, computed from the config id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleCategory {
    Attack,
    Guard,
    Support,
}

impl ModuleCategory {
    /// Attribute names this category's fitness rewards.
    pub fn preferred_attrs(&self) -> &'static [&'static str] {
        match self {
            ModuleCategory::Attack => &attrs::ATTACK_PREFERRED,
            ModuleCategory::Guard => &attrs::GUARD_PREFERRED,
            ModuleCategory::Support => &attrs::SUPPORT_PREFERRED,
        }
    }
}

/// The category a screening run optimizes for. `All` disables the
/// category bonus rather than preferring every attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TargetCategory {
    Attack,
    Guard,
    Support,
    #[default]
    All,
}

impl TargetCategory {
    /// Attribute names rewarded by the category bonus, if any.
    pub fn preferred_attrs(&self) -> &'static [&'static str] {
        match self {
            TargetCategory::Attack => &attrs::ATTACK_PREFERRED,
            TargetCategory::Guard => &attrs::GUARD_PREFERRED,
            TargetCategory::Support => &attrs::SUPPORT_PREFERRED,
            TargetCategory::All => &[],
        }
    }
}

impl std::str::FromStr for TargetCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "attack" => Ok(TargetCategory::Attack),
            "guard" => Ok(TargetCategory::Guard),
            "support" => Ok(TargetCategory::Support),
            "all" => Ok(TargetCategory::All),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Config id -> (name, category) for known module lines.
const MODULE_CONFIGS: [(u32, &str, ModuleCategory); 9] = [
    (5500101, "Common Attack", ModuleCategory::Attack),
    (5500102, "Rare Attack", ModuleCategory::Attack),
    (5500103, "Legendary Attack", ModuleCategory::Attack),
    (5500201, "Common Guard", ModuleCategory::Guard),
    (5500202, "Rare Guard", ModuleCategory::Guard),
    (5500203, "Legendary Guard", ModuleCategory::Guard),
    (5500301, "Common Support", ModuleCategory::Support),
    (5500302, "Rare Support", ModuleCategory::Support),
    (5500303, "Legendary Support", ModuleCategory::Support),
];

/// Display name for a config id. Unknown ids render as `Module(<id>)`.
pub fn module_name(config_id: u32) -> String {
    MODULE_CONFIGS
        .iter()
        .find(|(id, _, _)| *id == config_id)
        .map(|(_, name, _)| (*name).to_string())
        .unwrap_or_else(|| format!("Module({config_id})"))
}

impl ModuleCategory {
    /// Derive the category from a config id.
    ///
    /// Known ids use the fixed table; unknown ids fall back to the line
    /// digit of the id (x1xx attack, x2xx guard, x3xx support).
    pub fn from_config_id(config_id: u32) -> Self {
        if let Some((_, _, cat)) = MODULE_CONFIGS.iter().find(|(id, _, _)| *id == config_id) {
            return *cat;
        }
        match (config_id / 100) % 10 {
            2 => ModuleCategory::Guard,
            3 => ModuleCategory::Support,
            _ => ModuleCategory::Attack,
        }
    }
}

/// One decoded inventory module.
///
/// Equality and deduplication are by `uuid` alone; two captures of the same
/// instance are the same module even if part ordering differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub config_id: u32,
    pub uuid: u64,
    pub quality: u8,
    pub parts: SmallVec<[ModulePart; 4]>,
}

impl ModuleInfo {
    pub fn new(config_id: u32, uuid: u64, quality: u8, parts: SmallVec<[ModulePart; 4]>) -> Self {
        Self {
            name: module_name(config_id),
            config_id,
            uuid,
            quality,
            parts,
        }
    }

    /// Sum of all part values.
    pub fn total_value(&self) -> u32 {
        self.parts.iter().map(|p| p.value as u32).sum()
    }

    /// Value of the part named `attr`, 0 when absent.
    pub fn attr_value(&self, attr: &str) -> u32 {
        self.parts
            .iter()
            .filter(|p| p.attr_name == attr)
            .map(|p| p.value as u32)
            .sum()
    }

    /// Derived category of this module.
    pub fn category(&self) -> ModuleCategory {
        ModuleCategory::from_config_id(self.config_id)
    }
}

impl PartialEq for ModuleInfo {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for ModuleInfo {}

impl std::hash::Hash for ModuleInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn module(uuid: u64, parts: &[(u32, u8)]) -> ModuleInfo {
        ModuleInfo::new(
            5500103,
            uuid,
            5,
            parts.iter().map(|&(id, v)| ModulePart::new(id, v)).collect(),
        )
    }

    #[test]
    fn test_part_names_from_table() {
        let part = ModulePart::new(1110, 8);
        assert_eq!(part.attr_name, "Strength Boost");
        let part = ModulePart::new(1113, 4);
        assert_eq!(part.attr_name, "Special Attack");
    }

    #[test]
    fn test_module_name_table() {
        assert_eq!(module_name(5500103), "Legendary Attack");
        assert_eq!(module_name(5500302), "Rare Support");
        assert_eq!(module_name(5512345), "Module(5512345)");
    }

    #[test]
    fn test_category_derivation() {
        assert_eq!(ModuleCategory::from_config_id(5500103), ModuleCategory::Attack);
        assert_eq!(ModuleCategory::from_config_id(5500202), ModuleCategory::Guard);
        assert_eq!(ModuleCategory::from_config_id(5500301), ModuleCategory::Support);
        // Unknown id falls back to the line digit
        assert_eq!(ModuleCategory::from_config_id(5512201), ModuleCategory::Guard);
    }

    #[test]
    fn test_equality_is_uuid_only() {
        let a = module(42, &[(1110, 8)]);
        let b = module(42, &[(1113, 4)]);
        let c = module(43, &[(1110, 8)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_total_and_attr_value() {
        let m = module(1, &[(1110, 8), (1113, 4)]);
        assert_eq!(m.total_value(), 12);
        assert_eq!(m.attr_value("Strength Boost"), 8);
        assert_eq!(m.attr_value("Special Attack"), 4);
        assert_eq!(m.attr_value("Armor"), 0);
    }

    #[test]
    fn test_target_category_parse() {
        assert_eq!("attack".parse::<TargetCategory>(), Ok(TargetCategory::Attack));
        assert_eq!("ALL".parse::<TargetCategory>(), Ok(TargetCategory::All));
        assert!("warrior".parse::<TargetCategory>().is_err());
    }

    #[test]
    fn test_smallvec_inlines_typical_parts() {
        let m = module(1, &[(1110, 1), (1111, 2), (1112, 3), (1113, 4)]);
        assert!(!m.parts.spilled());
    }
}
