//! Multi-level single-linkage (MLSL).
//!
//! Global search by repeated local optimization. The first local search
//! starts from the user's starting point; afterwards every iteration draws a
//! batch of uniform samples in the box and starts a local search from each
//! sample that has no better sample within the critical distance
//!
//! ```text
//! r_k = ( Γ(1 + N/2) · vol · σ · ln k / (π^(N/2) · k) )^(1/N)
//! ```
//!
//! (`k` samples so far, `σ = 2`) and is not that close to a local minimum
//! already found. Local searches share the evaluation budget of the run.
//!
//! # References
//!
//! - Rinnooy Kan & Timmer, "Stochastic global optimization methods",
//!   Math. Programming 39 (1987)

use crate::nested::run_local;
use crate::sampling::{rank, uniform_in_box};
use log::debug;
use optima_core::{
    algorithm::{Iterate, LocalConfig, StepReport, Strategy},
    bounds::Bounds,
    error::{OptimizerError, Result},
    evaluator::Oracle,
    stopping::ForceStop,
    types::{distance, DVector},
};
use rand::{rngs::StdRng, SeedableRng};
use std::f64::consts::PI;

/// Samples drawn per iteration by default.
const DEFAULT_SAMPLES: usize = 4;

/// Scale of the critical distance.
const SIGMA: f64 = 2.0;

/// Configuration for MLSL.
#[derive(Debug, Clone)]
pub struct MlslConfig {
    /// Samples per iteration (0 = 4)
    pub samples_per_step: usize,
    /// Random seed
    pub seed: u64,
    /// Nested local optimizer
    pub local: LocalConfig,
}

/// `Γ(1 + n/2) / π^(n/2)`, the inverse volume of the unit n-ball.
fn inverse_unit_ball(n: usize) -> f64 {
    // Γ(1 + n/2) by the recurrence Γ(z + 1) = z Γ(z) from Γ(1) or Γ(3/2).
    let (mut gamma, mut z) = if n % 2 == 0 {
        (1.0, 1.0)
    } else {
        (PI.sqrt() / 2.0, 1.5)
    };
    while z < 1.0 + n as f64 / 2.0 - 0.25 {
        gamma *= z;
        z += 1.0;
    }
    gamma / PI.powf(n as f64 / 2.0)
}

/// MLSL optimizer.
#[derive(Debug)]
pub struct Mlsl {
    config: MlslConfig,
    force_stop: ForceStop,
    rng: StdRng,
    samples: Vec<Iterate>,
    minima: Vec<DVector>,
    best: Option<Iterate>,
    start: Option<DVector>,
    runs: u64,
}

impl Mlsl {
    /// Creates the optimizer. Local searches observe `force_stop`.
    pub fn new(config: MlslConfig, force_stop: ForceStop) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            force_stop,
            rng,
            samples: Vec::new(),
            minima: Vec::new(),
            best: None,
            start: None,
            runs: 0,
        }
    }

    /// Local minima found so far.
    pub fn minima(&self) -> &[DVector] {
        &self.minima
    }

    /// Critical distance for the current sample count, computed in log
    /// space so that wide boxes do not overflow the volume.
    fn critical_distance(&self, bounds: &Bounds) -> f64 {
        let k = self.samples.len() as f64;
        let n = bounds.dimension();
        if k < 2.0 || n == 0 {
            return 0.0;
        }
        let ln_r = (inverse_unit_ball(n).ln() + bounds.ln_volume() + SIGMA.ln() + k.ln().ln()
            - k.ln())
            / n as f64;
        let r = ln_r.exp();
        if r.is_finite() {
            r
        } else {
            f64::MAX
        }
    }

    fn should_start(&self, sample: &Iterate, r: f64) -> bool {
        let better_nearby = self
            .samples
            .iter()
            .any(|s| s.value < sample.value && distance(&s.point, &sample.point) <= r);
        let near_minimum = self
            .minima
            .iter()
            .any(|m| distance(m, &sample.point) <= r);
        !better_nearby && !near_minimum
    }

    fn consider(&mut self, candidate: Iterate) -> bool {
        let improved = self
            .best
            .as_ref()
            .map_or(true, |b| rank(candidate.value) < rank(b.value));
        if improved {
            self.best = Some(candidate);
        }
        improved
    }

    fn local_search(&mut self, oracle: &mut dyn Oracle, x: &DVector) -> Result<bool> {
        let outcome = run_local(
            &self.config.local,
            self.runs,
            oracle,
            x,
            &self.force_stop,
        )?;
        self.runs += 1;
        let Some(found) = outcome.best else {
            return Ok(false);
        };
        self.minima.push(found.point.clone());
        Ok(self.consider(Iterate::new(found.point, found.value)))
    }
}

impl Strategy for Mlsl {
    fn name(&self) -> &str {
        "MLSL"
    }

    fn initialize(&mut self, oracle: &mut dyn Oracle, x0: &DVector) -> Result<StepReport> {
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.samples.clear();
        self.minima.clear();
        self.best = None;
        self.runs = 0;

        let x0 = oracle.bounds().projected(x0);
        let value = oracle.evaluate(&x0, false)?.value;
        let sample = Iterate::new(x0.clone(), value);
        self.consider(sample.clone());
        self.samples.push(sample);
        self.start = Some(x0);
        Ok(StepReport::idle())
    }

    fn step(&mut self, oracle: &mut dyn Oracle) -> Result<StepReport> {
        let Some(previous) = self.best.clone() else {
            return Err(OptimizerError::failure("MLSL used before initialization"));
        };
        let mut improved = false;

        if let Some(x0) = self.start.take() {
            improved |= self.local_search(oracle, &x0)?;
        } else {
            let bounds = oracle.bounds().clone();
            let count = if self.config.samples_per_step == 0 {
                DEFAULT_SAMPLES
            } else {
                self.config.samples_per_step
            };
            let mut batch = Vec::with_capacity(count);
            for _ in 0..count {
                let x = uniform_in_box(&mut self.rng, &bounds);
                let value = oracle.evaluate(&x, false)?.value;
                let sample = Iterate::new(x, value);
                improved |= self.consider(sample.clone());
                self.samples.push(sample.clone());
                batch.push(sample);
            }

            let r = self.critical_distance(&bounds);
            batch.sort_by(|a, b| rank(a.value).total_cmp(&rank(b.value)));
            for sample in batch {
                if self.should_start(&sample, r) {
                    debug!("MLSL: local search from f = {:.6e} (r = {r:.3e})", sample.value);
                    improved |= self.local_search(oracle, &sample.point)?;
                }
            }
        }

        match &self.best {
            Some(best) if improved => Ok(StepReport::moved(previous, best.clone())),
            _ => Ok(StepReport::idle()),
        }
    }
}
