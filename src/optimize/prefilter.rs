//! Working-pool reduction.
//!
//! The GA only sees a union of the strongest candidates: the top modules
//! by total value plus, per attribute, the top modules for that attribute.
//! When enough high-quality modules survive, the GA restricts itself to
//! those.

use std::collections::BTreeSet;

use crate::module::ModuleInfo;

/// Pool size kept by total attribute value.
const TOP_BY_TOTAL: usize = 100;

/// Pool size kept per attribute.
const TOP_BY_ATTR: usize = 60;

/// Total value at which a module counts as high quality.
const HIGH_QUALITY_TOTAL: u32 = 12;

/// Modules required for the high-quality pool to take over.
const HIGH_QUALITY_MIN: usize = 4;

/// Result of the pre-filter pass.
#[derive(Debug, Clone)]
pub struct PrefilterOutcome {
    /// Union of top-by-total and per-attribute winners.
    pub working: Vec<ModuleInfo>,
    /// Members of `working` with total value >= 12.
    pub high_quality: Vec<ModuleInfo>,
}

impl PrefilterOutcome {
    /// The pool the GA should operate on.
    pub fn working_pool(&self) -> &[ModuleInfo] {
        if self.high_quality.len() >= HIGH_QUALITY_MIN {
            &self.high_quality
        } else {
            &self.working
        }
    }
}

/// Reduce `pool` to the working set.
///
/// When `prioritized_attrs` is non-empty, only those attributes contribute
/// per-attribute winners; otherwise every attribute present in the pool
/// does. Ties break by uuid ascending so the result is stable.
pub fn prefilter(pool: &[ModuleInfo], prioritized_attrs: &[String]) -> PrefilterOutcome {
    let mut keep: BTreeSet<u64> = BTreeSet::new();

    // Top by total value
    let mut by_total: Vec<&ModuleInfo> = pool.iter().collect();
    by_total.sort_by(|a, b| {
        b.total_value()
            .cmp(&a.total_value())
            .then(a.uuid.cmp(&b.uuid))
    });
    keep.extend(by_total.iter().take(TOP_BY_TOTAL).map(|m| m.uuid));

    // Per-attribute winners
    let attrs: Vec<String> = if prioritized_attrs.is_empty() {
        let mut present: BTreeSet<String> = BTreeSet::new();
        for module in pool {
            for part in &module.parts {
                present.insert(part.attr_name.clone());
            }
        }
        present.into_iter().collect()
    } else {
        prioritized_attrs.to_vec()
    };

    for attr in &attrs {
        let mut by_attr: Vec<&ModuleInfo> =
            pool.iter().filter(|m| m.attr_value(attr) > 0).collect();
        by_attr.sort_by(|a, b| {
            b.attr_value(attr)
                .cmp(&a.attr_value(attr))
                .then(a.uuid.cmp(&b.uuid))
        });
        keep.extend(by_attr.iter().take(TOP_BY_ATTR).map(|m| m.uuid));
    }

    let working: Vec<ModuleInfo> = pool
        .iter()
        .filter(|m| keep.contains(&m.uuid))
        .cloned()
        .collect();
    let high_quality: Vec<ModuleInfo> = working
        .iter()
        .filter(|m| m.total_value() >= HIGH_QUALITY_TOTAL)
        .cloned()
        .collect();

    PrefilterOutcome {
        working,
        high_quality,
    }
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
    fn test_small_pool_passes_through() {
        let pool: Vec<ModuleInfo> = (0..5).map(|i| module(i, &[(1110, 3)])).collect();
        let outcome = prefilter(&pool, &[]);
        assert_eq!(outcome.working.len(), 5);
    }

    #[test]
    fn test_top_by_attr_includes_specialists() {
        // 150 generalists with moderate totals, plus one specialist whose
        // total is low but whose Armor value is the best in the pool
        let mut pool: Vec<ModuleInfo> = (0..150)
            .map(|i| module(i, &[(1110, 5), (1113, 5)]))
            .collect();
        pool.push(module(999, &[(1120, 9)]));

        let outcome = prefilter(&pool, &[]);
        assert!(outcome.working.iter().any(|m| m.uuid == 999));
    }

    #[test]
    fn test_prioritized_attrs_restrict_attr_winners() {
        // Specialist in Armor is not protected when only Strength Boost is
        // prioritized and the total-value cut excludes it
        let mut pool: Vec<ModuleInfo> = (0..TOP_BY_TOTAL as u64)
            .map(|i| module(i, &[(1110, 5), (1113, 5)]))
            .collect();
        pool.push(module(999, &[(1120, 1)]));

        let prioritized = vec!["Strength Boost".to_string()];
        let outcome = prefilter(&pool, &prioritized);
        assert!(!outcome.working.iter().any(|m| m.uuid == 999));
    }

    #[test]
    fn test_high_quality_subset() {
        let mut pool: Vec<ModuleInfo> = (0..6).map(|i| module(i, &[(1110, 4)])).collect();
        pool.extend((10..14).map(|i| module(i, &[(1110, 8), (1113, 8)])));

        let outcome = prefilter(&pool, &[]);
        assert_eq!(outcome.high_quality.len(), 4);
        // 4 high-quality modules exist, so the GA pool is the subset
        assert_eq!(outcome.working_pool().len(), 4);
        assert!(outcome.working_pool().iter().all(|m| m.total_value() >= 12));
    }

    #[test]
    fn test_high_quality_subset_too_small_falls_back() {
        let mut pool: Vec<ModuleInfo> = (0..6).map(|i| module(i, &[(1110, 4)])).collect();
        pool.push(module(10, &[(1110, 8), (1113, 8)]));

        let outcome = prefilter(&pool, &[]);
        assert_eq!(outcome.high_quality.len(), 1);
        assert_eq!(outcome.working_pool().len(), 7);
    }

    #[test]
    fn test_tie_break_is_uuid_ascending() {
        // More equal-total modules than the cut keeps; the kept ones must
        // be the lowest uuids
        let pool: Vec<ModuleInfo> = (0..(TOP_BY_TOTAL as u64 + 50))
            .map(|i| module(i, &[(1110, 5)]))
            .collect();
        let outcome = prefilter(&pool, &["Special Attack".to_string()]);
        // No module carries Special Attack, so only the total cut applies
        assert_eq!(outcome.working.len(), TOP_BY_TOTAL);
        assert!(outcome.working.iter().all(|m| m.uuid < TOP_BY_TOTAL as u64));
    }
}
