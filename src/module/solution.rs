//! Canonical four-module solutions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::attrs::level;
use super::ModuleInfo;

/// An unordered set of exactly four distinct modules.
///
/// Canonical form sorts modules by uuid ascending, so two solutions built
/// from the same instances in any order compare and hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleSolution {
    modules: [ModuleInfo; 4],
}

impl ModuleSolution {
    /// Build a canonical solution. Returns `None` unless the four uuids
    /// are pairwise distinct.
    pub fn new(mut modules: [ModuleInfo; 4]) -> Option<Self> {
        modules.sort_by_key(|m| m.uuid);
        if modules.windows(2).any(|w| w[0].uuid == w[1].uuid) {
            return None;
        }
        Some(Self { modules })
    }

    /// The four modules, uuid-ascending.
    pub fn modules(&self) -> &[ModuleInfo; 4] {
        &self.modules
    }

    /// The four uuids, ascending. Doubles as the canonical identity key.
    pub fn uuids(&self) -> [u64; 4] {
        [
            self.modules[0].uuid,
            self.modules[1].uuid,
            self.modules[2].uuid,
            self.modules[3].uuid,
        ]
    }

    /// Does the solution contain a module with this uuid?
    pub fn contains(&self, uuid: u64) -> bool {
        self.modules.iter().any(|m| m.uuid == uuid)
    }

    /// Replace the module at `pos`, re-canonicalizing. Returns `None` when
    /// the replacement duplicates another member.
    pub fn with_replacement(&self, pos: usize, module: ModuleInfo) -> Option<Self> {
        let mut modules = self.modules.clone();
        modules[pos] = module;
        Self::new(modules)
    }

    /// Summed value per attribute name across all four modules.
    ///
    /// A `BTreeMap` keeps iteration deterministic for scoring and display.
    pub fn attr_breakdown(&self) -> BTreeMap<String, u32> {
        let mut breakdown = BTreeMap::new();
        for module in &self.modules {
            for part in &module.parts {
                *breakdown.entry(part.attr_name.clone()).or_insert(0) += part.value as u32;
            }
        }
        breakdown
    }

    /// Total attribute value across the solution.
    pub fn total_value(&self) -> u32 {
        self.modules.iter().map(|m| m.total_value()).sum()
    }

    /// Signature for attribute-level deduplication: the sorted list of
    /// `(attr_name, level)` pairs. Solutions with equal signatures are
    /// interchangeable to the user.
    pub fn level_signature(&self) -> Vec<(String, u8)> {
        // BTreeMap iteration is already name-sorted
        self.attr_breakdown()
            .into_iter()
            .map(|(name, value)| (name, level(value)))
            .collect()
    }
}

/// A scored solution as delivered to the shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedSolution {
    pub modules: Vec<ModuleInfo>,
    pub attr_breakdown: BTreeMap<String, u32>,
    /// Combat power.
    pub score: u32,
    /// GA fitness, kept for diagnostics; never shown as combat power.
    pub optimization_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModulePart;
    use smallvec::SmallVec;

    fn module(uuid: u64, parts: &[(u32, u8)]) -> ModuleInfo {
        let parts: SmallVec<[ModulePart; 4]> =
            parts.iter().map(|&(id, v)| ModulePart::new(id, v)).collect();
        ModuleInfo::new(5500103, uuid, 5, parts)
    }

    #[test]
    fn test_canonicalization_sorts_by_uuid() {
        let sol = ModuleSolution::new([
            module(4, &[]),
            module(2, &[]),
            module(3, &[]),
            module(1, &[]),
        ])
        .unwrap();
        assert_eq!(sol.uuids(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_canonicalization_idempotent() {
        let sol = ModuleSolution::new([
            module(4, &[]),
            module(2, &[]),
            module(3, &[]),
            module(1, &[]),
        ])
        .unwrap();
        let again = ModuleSolution::new(sol.modules().clone()).unwrap();
        assert_eq!(sol, again);
    }

    #[test]
    fn test_duplicate_uuid_rejected() {
        let sol = ModuleSolution::new([
            module(1, &[]),
            module(2, &[]),
            module(2, &[]),
            module(4, &[]),
        ]);
        assert!(sol.is_none());
    }

    #[test]
    fn test_breakdown_sums_parts() {
        let sol = ModuleSolution::new([
            module(1, &[(1110, 8), (1113, 4)]),
            module(2, &[(1110, 3)]),
            module(3, &[(1120, 5)]),
            module(4, &[(1113, 1)]),
        ])
        .unwrap();
        let breakdown = sol.attr_breakdown();
        assert_eq!(breakdown["Strength Boost"], 11);
        assert_eq!(breakdown["Special Attack"], 5);
        assert_eq!(breakdown["Armor"], 5);
        assert_eq!(sol.total_value(), 21);
    }

    #[test]
    fn test_level_signature_collapses_values() {
        // 8 and 11 both bucket to level 3, so the signatures match
        let a = ModuleSolution::new([
            module(1, &[(1110, 8)]),
            module(2, &[]),
            module(3, &[]),
            module(4, &[]),
        ])
        .unwrap();
        let b = ModuleSolution::new([
            module(5, &[(1110, 11)]),
            module(6, &[]),
            module(7, &[]),
            module(8, &[]),
        ])
        .unwrap();
        assert_eq!(a.level_signature(), b.level_signature());
    }

    #[test]
    fn test_replacement_recanonicalizes() {
        let sol = ModuleSolution::new([
            module(1, &[]),
            module(2, &[]),
            module(3, &[]),
            module(4, &[]),
        ])
        .unwrap();
        let swapped = sol.with_replacement(0, module(9, &[])).unwrap();
        assert_eq!(swapped.uuids(), [2, 3, 4, 9]);
        assert!(sol.with_replacement(0, module(3, &[])).is_none());
    }
}
