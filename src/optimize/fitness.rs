//! GA fitness scoring.

use std::collections::BTreeMap;

use crate::module::attrs::{level, MAGIC_ATTRS, PHYSICAL_ATTRS};
use crate::module::{ModuleSolution, TargetCategory};

/// Priority reward keyed by attribute level 0..=6.
const PRIORITY_LEVEL_REWARD: [f64; 7] = [0.0, 10.0, 50.0, 100.0, 500.0, 2000.0, 5000.0];

/// Reward per prioritized attribute that is present at all.
const PRIORITY_PRESENCE_REWARD: f64 = 100.0;

/// Penalty per point of value on non-prioritized attributes.
const OFF_PRIORITY_PENALTY: f64 = 5.0;

/// Reward per point of value on category-preferred attributes.
const CATEGORY_REWARD: f64 = 5.0;

/// Penalty per point of overlap between physical and magic schools.
const CONFLICT_PENALTY: f64 = 10.0;

/// Weight of the raw total-value aggregation term.
const AGGREGATION_WEIGHT: f64 = 0.1;

/// Inputs held constant across one optimization run.
#[derive(Debug, Clone, Default)]
pub struct FitnessParams {
    pub category: TargetCategory,
    pub prioritized_attrs: Vec<String>,
}

/// Threshold bonus for one summed attribute value.
fn threshold_bonus(v: u32) -> f64 {
    if v >= 20 {
        1000.0 + 20.0 * (v - 20) as f64
    } else if v >= 16 {
        500.0 + 15.0 * (v - 16) as f64
    } else if v >= 12 {
        100.0 + 5.0 * (v - 12) as f64
    } else {
        0.0
    }
}

/// Fitness of a solution's attribute breakdown, maximized by the GA.
///
/// Always non-negative. The caller guarantees four distinct modules;
/// [`ModuleSolution`] construction enforces it, so a defensive zero lives
/// in the chromosome code path, not here.
pub fn fitness(solution: &ModuleSolution, params: &FitnessParams) -> f64 {
    let breakdown = solution.attr_breakdown();
    let mut score = 0.0;

    if !params.prioritized_attrs.is_empty() {
        for attr in &params.prioritized_attrs {
            let v = breakdown.get(attr.as_str()).copied().unwrap_or(0);
            score += PRIORITY_LEVEL_REWARD[level(v) as usize];
            if v > 0 {
                score += PRIORITY_PRESENCE_REWARD;
            }
        }
        let off_priority: u32 = breakdown
            .iter()
            .filter(|(name, _)| !params.prioritized_attrs.iter().any(|p| p == *name))
            .map(|(_, v)| *v)
            .sum();
        score -= OFF_PRIORITY_PENALTY * off_priority as f64;
    }

    for (_, &v) in breakdown.iter() {
        score += threshold_bonus(v);
    }

    for attr in params.category.preferred_attrs() {
        if let Some(&v) = breakdown.get(*attr) {
            score += CATEGORY_REWARD * v as f64;
        }
    }

    score -= CONFLICT_PENALTY * school_conflict(&breakdown) as f64;
    score += AGGREGATION_WEIGHT * solution.total_value() as f64;
    score.max(0.0)
}

/// Overlap between the physical and magic schools: the smaller of the two
/// school sums.
fn school_conflict(breakdown: &BTreeMap<String, u32>) -> u32 {
    let sum = |attrs: &[&str]| -> u32 {
        attrs
            .iter()
            .filter_map(|a| breakdown.get(*a))
            .copied()
            .sum()
    };
    sum(&PHYSICAL_ATTRS).min(sum(&MAGIC_ATTRS))
}
