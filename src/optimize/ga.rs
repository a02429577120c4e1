//! Genetic-algorithm campaigns.
//!
//! Each campaign is an independent GA run over a cloned working pool with
//! its own seeded RNG: tournament selection, two-point crossover on the
//! 4-tuples, uniform mutation, elitism, and a hill-climbing local search
//! after every generation. Campaigns run on worker threads with no shared
//! state; the driver unions their final populations.

use std::thread;

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::module::{ModuleInfo, ModuleSolution};

use super::fitness::{fitness, FitnessParams};

/// GA tuning parameters.
#[derive(Debug, Clone)]
pub struct GaParams {
    pub population_size: usize,
    pub generations: usize,
    pub tournament_size: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub elitism_rate: f64,
    pub local_search_rate: f64,
    /// Parallel campaigns; defaults to one per spare hardware thread.
    pub num_campaigns: usize,
}

impl Default for GaParams {
    fn default() -> Self {
        Self {
            population_size: 150,
            generations: 50,
            tournament_size: 5,
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            elitism_rate: 0.1,
            local_search_rate: 0.3,
            num_campaigns: default_campaigns(),
        }
    }
}

/// One spare hardware thread per campaign, at least one campaign.
fn default_campaigns() -> usize {
    let parallelism = thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
    parallelism.saturating_sub(1).max(1)
}

/// A scored individual.
pub type Scored = (ModuleSolution, f64);

/// Number of distinct 4-combinations drawable from `n` modules.
fn combinations4(n: usize) -> u64 {
    if n < 4 {
        return 0;
    }
    let n = n as u64;
    n * (n - 1) * (n - 2) * (n - 3) / 24
}

/// Draw a uniform random 4-combination from the pool.
fn random_solution(pool: &[ModuleInfo], rng: &mut StdRng) -> ModuleSolution {
    let idx = sample(rng, pool.len(), 4);
    ModuleSolution::new([
        pool[idx.index(0)].clone(),
        pool[idx.index(1)].clone(),
        pool[idx.index(2)].clone(),
        pool[idx.index(3)].clone(),
    ])
    .expect("sampled indices are distinct")
}

/// Initial population: distinct canonical chromosomes, capped at the
/// combination count.
fn init_population(
    pool: &[ModuleInfo],
    params: &GaParams,
    fp: &FitnessParams,
    rng: &mut StdRng,
) -> Vec<Scored> {
    let target = (params.population_size as u64).min(combinations4(pool.len())) as usize;
    let mut seen = std::collections::HashSet::new();
    let mut population = Vec::with_capacity(target);
    let mut attempts = 0usize;
    while population.len() < target && attempts < target * 64 {
        attempts += 1;
        let candidate = random_solution(pool, rng);
        if seen.insert(candidate.uuids()) {
            let fit = fitness(&candidate, fp);
            population.push((candidate, fit));
        }
    }
    population
}

/// Tournament selection: best of `k` uniform draws, ties to the earliest.
fn select<'a>(population: &'a [Scored], k: usize, rng: &mut StdRng) -> &'a Scored {
    let mut best: Option<&Scored> = None;
    for _ in 0..k {
        let candidate = &population[rng.gen_range(0..population.len())];
        if best.map_or(true, |b| candidate.1 > b.1) {
            best = Some(candidate);
        }
    }
    best.expect("tournament size is positive")
}

/// Two-point crossover on canonical 4-tuples.
///
/// The child keeps the first two modules of one parent and takes, in
/// order, the first modules of the other parent that are not already
/// present. A child that cannot reach four distinct modules falls back to
/// a copy of its primary parent.
fn crossover_child(first: &ModuleSolution, second: &ModuleSolution) -> ModuleSolution {
    let mut picked: Vec<ModuleInfo> = first.modules()[..2].to_vec();
    for module in second.modules() {
        if picked.len() == 4 {
            break;
        }
        if !picked.iter().any(|p| p.uuid == module.uuid) {
            picked.push(module.clone());
        }
    }
    if picked.len() == 4 {
        let picked: [ModuleInfo; 4] = picked.try_into().expect("length checked");
        if let Some(child) = ModuleSolution::new(picked) {
            return child;
        }
    }
    first.clone()
}

/// Replace a uniformly chosen position with a pool module not already in
/// the chromosome. A saturated chromosome is left unchanged.
fn mutate(
    solution: &ModuleSolution,
    pool: &[ModuleInfo],
    rng: &mut StdRng,
) -> ModuleSolution {
    let outsiders: Vec<&ModuleInfo> =
        pool.iter().filter(|m| !solution.contains(m.uuid)).collect();
    if outsiders.is_empty() {
        return solution.clone();
    }
    let pos = rng.gen_range(0..4);
    let replacement = outsiders[rng.gen_range(0..outsiders.len())].clone();
    solution
        .with_replacement(pos, replacement)
        .expect("replacement uuid is not in the chromosome")
}

/// Hill climb: first improvement over positions, best improvement over
/// candidates, repeated until no position improves.
fn local_search(
    start: &Scored,
    pool: &[ModuleInfo],
    fp: &FitnessParams,
) -> Scored {
    let mut best = start.clone();
    loop {
        let mut improved = false;
        for pos in 0..4 {
            let mut pos_best: Option<Scored> = None;
            for module in pool {
                if best.0.contains(module.uuid) {
                    continue;
                }
                if let Some(candidate) = best.0.with_replacement(pos, module.clone()) {
                    let fit = fitness(&candidate, fp);
                    if fit > best.1 && pos_best.as_ref().map_or(true, |(_, pf)| fit > *pf) {
                        pos_best = Some((candidate, fit));
                    }
                }
            }
            if let Some(better) = pos_best {
                best = better;
                improved = true;
                break;
            }
        }
        if !improved {
            return best;
        }
    }
}

/// Run one campaign to completion. Returns its final scored population.
pub fn run_campaign(
    pool: &[ModuleInfo],
    fp: &FitnessParams,
    params: &GaParams,
    seed: u64,
) -> Vec<Scored> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut population = init_population(pool, params, fp, &mut rng);
    if population.is_empty() {
        return population;
    }

    let elite_count = ((params.population_size as f64) * params.elitism_rate) as usize;
    let climber_count = ((params.population_size as f64) * params.local_search_rate) as usize;

    for generation in 0..params.generations {
        population.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut next: Vec<Scored> = population.iter().take(elite_count).cloned().collect();
        while next.len() < population.len() {
            let parent_a = select(&population, params.tournament_size, &mut rng);
            let parent_b = select(&population, params.tournament_size, &mut rng);

            let (mut child_a, mut child_b) = if rng.gen_bool(params.crossover_rate) {
                (
                    crossover_child(&parent_a.0, &parent_b.0),
                    crossover_child(&parent_b.0, &parent_a.0),
                )
            } else {
                (parent_a.0.clone(), parent_b.0.clone())
            };

            if rng.gen_bool(params.mutation_rate) {
                child_a = mutate(&child_a, pool, &mut rng);
            }
            if rng.gen_bool(params.mutation_rate) {
                child_b = mutate(&child_b, pool, &mut rng);
            }

            let fit_a = fitness(&child_a, fp);
            next.push((child_a, fit_a));
            if next.len() < population.len() {
                let fit_b = fitness(&child_b, fp);
                next.push((child_b, fit_b));
            }
        }

        next.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        for scored in next.iter_mut().take(climber_count) {
            *scored = local_search(scored, pool, fp);
        }
        population = next;

        if generation % 10 == 0 {
            debug!(
                generation,
                best = population.first().map(|(_, f)| *f).unwrap_or(0.0),
                "campaign progress"
            );
        }
    }

    population
}

/// Run all campaigns, in parallel worker threads, and collect their
/// populations.
///
/// `seeds` overrides both the campaign count and the per-campaign seeds;
/// without it each campaign draws a fresh seed. A panicked worker is
/// logged and its campaign re-run sequentially on the driver thread.
pub fn run_campaigns(
    pool: &[ModuleInfo],
    fp: &FitnessParams,
    params: &GaParams,
    seeds: Option<&[u64]>,
    progress: &mut impl FnMut(String),
) -> Vec<Vec<Scored>> {
    let seeds: Vec<u64> = match seeds {
        Some(seeds) => seeds.to_vec(),
        None => {
            let mut entropy = rand::thread_rng();
            (0..params.num_campaigns.max(1))
                .map(|_| entropy.gen())
                .collect()
        }
    };
    let total = seeds.len();

    let mut results: Vec<Vec<Scored>> = Vec::with_capacity(total);
    thread::scope(|scope| {
        let handles: Vec<_> = seeds
            .iter()
            .map(|&seed| {
                let pool = pool.to_vec();
                let fp = fp.clone();
                let params = params.clone();
                scope.spawn(move || run_campaign(&pool, &fp, &params, seed))
            })
            .collect();

        for (i, (handle, &seed)) in handles.into_iter().zip(seeds.iter()).enumerate() {
            let population = match handle.join() {
                Ok(population) => population,
                Err(_) => {
                    warn!(campaign = i, "campaign worker failed, re-running sequentially");
                    run_campaign(pool, fp, params, seed)
                }
            };
            let best = population.first().map(|(_, f)| *f).unwrap_or(0.0);
            progress(format!(
                "Task {}/{} completed. Highest score: {:.0}",
                i + 1,
                total,
                best
            ));
            results.push(population);
        }
    });
    results
}
