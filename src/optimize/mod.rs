//! Module combination optimization.
//!
//! ## Pipeline
//!
//! 1. [`prefilter`] reduces the captured pool to a working set
//! 2. [`ga`] runs parallel genetic-algorithm campaigns with local search
//! 3. [`rank`] unions, scores, deduplicates, and orders the results
//!
//! The optimizer is heuristic and stochastic; fixed campaign seeds make
//! runs reproducible but there is no optimality guarantee.

mod fitness;
mod ga;
mod prefilter;
mod rank;

pub use fitness::{fitness, FitnessParams};
pub use ga::{run_campaign, run_campaigns, GaParams};
pub use prefilter::{prefilter, PrefilterOutcome};
pub use rank::{rank_solutions, score_solution, RankParams};

use crate::error::{OptimizeError, Result};
use crate::module::{ModuleInfo, RankedSolution, TargetCategory};

/// Everything one screening run needs, cloned per campaign.
#[derive(Debug, Clone)]
pub struct ScreenParams {
    pub category: TargetCategory,
    /// Attribute names the user cares about; empty means all.
    pub attributes: Vec<String>,
    /// Up to 6 attributes to prioritize, in user-declared order.
    pub prioritized_attrs: Vec<String>,
    pub priority_order_mode: bool,
    pub top_n: usize,
}

impl Default for ScreenParams {
    fn default() -> Self {
        Self {
            category: TargetCategory::All,
            attributes: Vec::new(),
            prioritized_attrs: Vec::new(),
            priority_order_mode: false,
            top_n: 40,
        }
    }
}

/// Run the full optimization pipeline over a captured pool.
///
/// `progress` receives human-readable status lines. The campaign seeds
/// default to hardware-derived values; tests pass explicit seeds for
/// reproducibility.
pub fn optimize(
    pool: &[ModuleInfo],
    params: &ScreenParams,
    ga_params: &GaParams,
    seeds: Option<&[u64]>,
    mut progress: impl FnMut(String),
) -> Result<Vec<RankedSolution>> {
    let outcome = prefilter(pool, &params.prioritized_attrs);
    let working = outcome.working_pool();
    if working.len() < 4 {
        return Err(OptimizeError::InsufficientModules {
            have: working.len(),
            need: 4,
        }
        .into());
    }

    progress("Optimizing combinations...".to_string());

    let fitness_params = FitnessParams {
        category: params.category,
        prioritized_attrs: params.prioritized_attrs.clone(),
    };
    let populations = run_campaigns(working, &fitness_params, ga_params, seeds, &mut progress);

    let rank_params = RankParams {
        prioritized_attrs: params.prioritized_attrs.clone(),
        priority_order_mode: params.priority_order_mode,
        top_n: params.top_n,
    };
    Ok(rank_solutions(populations, &rank_params))
}
