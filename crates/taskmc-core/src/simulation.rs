//! Monte Carlo resampling of historical velocity over the pending backlog.
//!
//! Each trial draws one velocity per outstanding estimate, uniformly and with
//! replacement from the raw sample pool, and sums `estimate / velocity`.
//! Velocities that recur in history are therefore drawn proportionally more
//! often. The pool is never deduplicated.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::duration::Duration;

pub const DEFAULT_TRIALS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("No usable velocity samples: record estimated and active time on completed tasks first")]
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOptions {
    pub trials: usize,
    /// Base seed. `None` draws one from OS entropy.
    pub seed: Option<u64>,
    /// Spread trials over the rayon pool. Output is identical either way.
    pub parallel: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            seed: None,
            parallel: true,
        }
    }
}

/// Trial totals, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationRun {
    results: Vec<Duration>,
    seed: Option<u64>,
}

impl SimulationRun {
    fn from_unsorted(mut results: Vec<Duration>, seed: Option<u64>) -> Self {
        results.sort();
        Self { results, seed }
    }

    pub fn results(&self) -> &[Duration] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Seed the run was generated from, when it came from [`simulate`].
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

/// Run `options.trials` independent trials.
///
/// Every trial owns a generator seeded from the base seed and the trial
/// index, so a given seed yields the same run whether or not trials are
/// parallelized.
pub fn simulate(
    estimates: &[Duration],
    velocities: &[f64],
    options: &SimulationOptions,
) -> Result<SimulationRun, SimulationError> {
    let seed = options.seed.unwrap_or_else(rand::random);
    let Some((estimates, velocities)) = usable_pools(estimates, velocities)? else {
        return Ok(SimulationRun::from_unsorted(
            vec![Duration::ZERO; options.trials],
            Some(seed),
        ));
    };

    let trial = |index: usize| {
        let mut rng = StdRng::seed_from_u64(trial_seed(seed, index));
        run_trial(&estimates, &velocities, &mut rng)
    };
    let results: Vec<Duration> = if options.parallel {
        (0..options.trials).into_par_iter().map(trial).collect()
    } else {
        (0..options.trials).map(trial).collect()
    };
    tracing::debug!(
        trials = options.trials,
        estimates = estimates.len(),
        velocities = velocities.len(),
        seed,
        "simulation finished"
    );
    Ok(SimulationRun::from_unsorted(results, Some(seed)))
}

/// Serial variant drawing every trial from a caller-supplied generator.
pub fn simulate_with_rng<R: Rng>(
    estimates: &[Duration],
    velocities: &[f64],
    trials: usize,
    rng: &mut R,
) -> Result<SimulationRun, SimulationError> {
    let Some((estimates, velocities)) = usable_pools(estimates, velocities)? else {
        return Ok(SimulationRun::from_unsorted(vec![Duration::ZERO; trials], None));
    };
    let results = (0..trials)
        .map(|_| run_trial(&estimates, &velocities, rng))
        .collect();
    Ok(SimulationRun::from_unsorted(results, None))
}

/// Drop zero estimates and unusable velocities.
///
/// `Ok(None)` means nothing is left to forecast, which needs no velocity data.
fn usable_pools(
    estimates: &[Duration],
    velocities: &[f64],
) -> Result<Option<(Vec<Duration>, Vec<f64>)>, SimulationError> {
    let estimates: Vec<Duration> = estimates.iter().copied().filter(|e| !e.is_zero()).collect();
    if estimates.is_empty() {
        return Ok(None);
    }
    let velocities: Vec<f64> = velocities
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    if velocities.is_empty() {
        return Err(SimulationError::InsufficientData);
    }
    Ok(Some((estimates, velocities)))
}

fn run_trial<R: Rng>(estimates: &[Duration], velocities: &[f64], rng: &mut R) -> Duration {
    let total: f64 = estimates
        .iter()
        .map(|estimate| {
            let velocity = velocities[rng.gen_range(0..velocities.len())];
            estimate.as_secs_f64() / velocity
        })
        .sum();
    // Float to int casts saturate, so a vanishing velocity pins at u64::MAX.
    Duration::from_secs(total.round() as u64)
}

fn trial_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
