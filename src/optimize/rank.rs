//! Final ranking: union, combat power, dedup, and ordering.

use std::collections::HashMap;

use crate::module::attrs::{attr_power, level, total_power};
use crate::module::{ModuleSolution, RankedSolution};

use super::ga::Scored;

/// Ranking configuration.
#[derive(Debug, Clone)]
pub struct RankParams {
    /// Priority attributes in user-declared order.
    pub prioritized_attrs: Vec<String>,
    pub priority_order_mode: bool,
    pub top_n: usize,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            prioritized_attrs: Vec::new(),
            priority_order_mode: false,
            top_n: 40,
        }
    }
}

/// Combat power of a solution: per-attribute level power plus the global
/// total-value power.
pub fn score_solution(solution: &ModuleSolution) -> u32 {
    let breakdown = solution.attr_breakdown();
    let per_attr: u32 = breakdown.iter().map(|(name, &v)| attr_power(name, v)).sum();
    per_attr + total_power(solution.total_value())
}

/// Lexicographic key for priority-order mode.
///
/// The top four priority attributes are chosen by `(level desc, declared
/// index asc)`; `counts[i]` holds how many of them sit at level `6 - i`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PriorityKey {
    counts: [u32; 6],
    level_sum: u32,
    score: u32,
    fitness: f64,
}

fn priority_key(solution: &ModuleSolution, score: u32, fitness: f64, prioritized: &[String]) -> PriorityKey {
    let breakdown = solution.attr_breakdown();
    let mut ranked: Vec<(u8, usize)> = prioritized
        .iter()
        .enumerate()
        .map(|(idx, attr)| (level(breakdown.get(attr.as_str()).copied().unwrap_or(0)), idx))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked.truncate(4);

    let mut counts = [0u32; 6];
    let mut level_sum = 0u32;
    for &(lvl, _) in &ranked {
        level_sum += lvl as u32;
        if lvl >= 1 {
            counts[(6 - lvl) as usize] += 1;
        }
    }
    PriorityKey {
        counts,
        level_sum,
        score,
        fitness,
    }
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(
            self.counts
                .cmp(&other.counts)
                .then(self.level_sum.cmp(&other.level_sum))
                .then(self.score.cmp(&other.score))
                .then(self.fitness.partial_cmp(&other.fitness).unwrap_or(std::cmp::Ordering::Equal)),
        )
    }
}

/// Union campaign populations, score, deduplicate, and order.
///
/// Canonical duplicates keep their best fitness; attribute-level
/// duplicates (equal sorted `(attr, level)` signatures) keep the
/// best-ranked instance.
pub fn rank_solutions(populations: Vec<Vec<Scored>>, params: &RankParams) -> Vec<RankedSolution> {
    // Union by canonical identity, keeping the highest fitness
    let mut by_identity: HashMap<[u64; 4], Scored> = HashMap::new();
    for population in populations {
        for (solution, fit) in population {
            by_identity
                .entry(solution.uuids())
                .and_modify(|entry| {
                    if fit > entry.1 {
                        entry.1 = fit;
                    }
                })
                .or_insert((solution, fit));
        }
    }

    let mut scored: Vec<(ModuleSolution, f64, u32)> = by_identity
        .into_values()
        .map(|(solution, fit)| {
            let score = score_solution(&solution);
            (solution, fit, score)
        })
        .collect();

    // Order before dedup so the kept instance is the best-ranked one
    if params.priority_order_mode {
        scored.sort_by(|a, b| {
            let ka = priority_key(&a.0, a.2, a.1, &params.prioritized_attrs);
            let kb = priority_key(&b.0, b.2, b.1, &params.prioritized_attrs);
            kb.partial_cmp(&ka).unwrap_or(std::cmp::Ordering::Equal)
        });
    } else {
        scored.sort_by(|a, b| {
            b.2.cmp(&a.2)
                .then(b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.0.uuids().cmp(&b.0.uuids()))
        });
    }

    // Attribute-level dedup, keeping the first (best-ranked) instance
    let mut seen_signatures = std::collections::HashSet::new();
    let mut results = Vec::with_capacity(params.top_n);
    for (solution, fit, score) in scored {
        if !seen_signatures.insert(solution.level_signature()) {
            continue;
        }
        results.push(RankedSolution {
            modules: solution.modules().to_vec(),
            attr_breakdown: solution.attr_breakdown(),
            score,
            optimization_score: fit,
        });
        if results.len() >= params.top_n {
            break;
        }
    }
    results
}
