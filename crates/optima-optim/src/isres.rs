//! Improved stochastic ranking evolution strategy (ISRES).
//!
//! A (μ, λ) evolution strategy for constrained problems. Constraints enter
//! through the quadratic penalty
//!
//! ```text
//! φ(x) = Σ max(0, c_i(x))² + Σ h_j(x)²
//! ```
//!
//! (zero for points that are feasible within tolerance), and the population
//! is ordered by stochastic ranking: a bubble sort that compares neighbours
//! by objective value when both are feasible or with probability `pf`, and by
//! penalty otherwise. The best μ individuals become parents. The first μ−1
//! offspring use differential variation towards the best parent; the rest
//! are lognormal self-adaptive mutations.
//!
//! # References
//!
//! - Runarsson & Yao, "Search biases in constrained evolutionary
//!   optimization", IEEE Trans. SMC C 35(2) (2005)

use crate::sampling::{normal, rank, uniform_in_box};
use log::{debug, trace};
use optima_core::{
    algorithm::{Iterate, StepReport, Strategy},
    bounds::Bounds,
    error::{OptimizerError, Result},
    evaluator::{Evaluation, Oracle},
    types::{constants, DVector},
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Configuration for ISRES.
#[derive(Debug, Clone)]
pub struct IsresConfig {
    /// Offspring per generation λ (0 = `20 (N + 1)`)
    pub population: usize,
    /// Probability of ranking by objective regardless of feasibility
    pub ranking_probability: f64,
    /// Differential variation step γ
    pub differential_step: f64,
    /// Step size smoothing factor α
    pub smoothing: f64,
    /// Random seed
    pub seed: u64,
}

impl IsresConfig {
    /// Creates a configuration with the standard parameters.
    pub fn new(seed: u64) -> Self {
        Self {
            population: 0,
            ranking_probability: 0.45,
            differential_step: 0.85,
            smoothing: 0.2,
            seed,
        }
    }

    /// Sets the population size λ.
    pub fn with_population(mut self, population: usize) -> Self {
        self.population = population;
        self
    }

    pub(crate) fn sizes(&self, dimension: usize) -> Result<(usize, usize)> {
        let lambda = if self.population == 0 {
            20 * (dimension + 1)
        } else {
            self.population
        };
        if lambda < 2 {
            return Err(OptimizerError::invalid_argument(format!(
                "ISRES needs a population of at least 2, got {lambda}"
            )));
        }
        Ok((lambda, (lambda / 7).max(1)))
    }
}

#[derive(Debug, Clone)]
struct Individual {
    x: DVector,
    sigma: DVector,
    value: f64,
    penalty: f64,
}

impl Individual {
    /// Feasible points first, then by penalty, then by value.
    fn beats(&self, other: &Individual) -> bool {
        match (self.penalty == 0.0, other.penalty == 0.0) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => self.value < other.value,
            (false, false) => {
                self.penalty < other.penalty
                    || (self.penalty == other.penalty && self.value < other.value)
            }
        }
    }

    fn iterate(&self) -> Iterate {
        Iterate::new(self.x.clone(), self.value)
    }
}

fn penalty(evaluation: &Evaluation) -> f64 {
    if evaluation.feasible {
        return 0.0;
    }
    let inequality: f64 = evaluation.inequality.iter().map(|c| c.max(0.0).powi(2)).sum();
    let equality: f64 = evaluation.equality.iter().map(|h| h * h).sum();
    let total = inequality + equality;
    if total.is_nan() || total == 0.0 {
        f64::INFINITY
    } else {
        total
    }
}

/// ISRES optimizer.
#[derive(Debug)]
pub struct Isres {
    config: IsresConfig,
    rng: StdRng,
    population: Vec<Individual>,
    mu: usize,
    best: Option<Individual>,
}

impl Isres {
    /// Creates the optimizer.
    pub fn new(config: IsresConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            population: Vec::new(),
            mu: 1,
            best: None,
        }
    }

    fn assess(oracle: &mut dyn Oracle, x: DVector, sigma: DVector) -> Result<Individual> {
        let evaluation = oracle.evaluate(&x, false)?;
        Ok(Individual {
            value: rank(evaluation.value),
            penalty: penalty(&evaluation),
            x,
            sigma,
        })
    }

    fn stochastic_ranking(&mut self) {
        let n = self.population.len();
        for _ in 0..n {
            let mut swapped = false;
            for j in 0..n - 1 {
                let (a, b) = (&self.population[j], &self.population[j + 1]);
                let by_value = (a.penalty == 0.0 && b.penalty == 0.0)
                    || self.rng.gen::<f64>() < self.config.ranking_probability;
                let out_of_order = if by_value {
                    b.value < a.value
                } else {
                    b.penalty < a.penalty
                };
                if out_of_order {
                    self.population.swap(j, j + 1);
                    swapped = true;
                }
            }
            if !swapped {
                break;
            }
        }
    }

    fn mutate(&mut self, parent: &Individual, bounds: &Bounds) -> (DVector, DVector) {
        let n = parent.x.len();
        let tau = 1.0 / (2.0 * (n as f64).sqrt()).sqrt();
        let tau_prime = 1.0 / (2.0 * n as f64).sqrt();
        let global = tau_prime * normal(&mut self.rng);
        let sigma = DVector::from_fn(n, |i, _| {
            parent.sigma[i] * (global + tau * normal(&mut self.rng)).exp()
        });

        let mut x = parent.x.clone();
        for i in 0..n {
            let mut accepted = false;
            for _ in 0..10 {
                let trial = parent.x[i] + sigma[i] * normal(&mut self.rng);
                if trial >= bounds.lower()[i] && trial <= bounds.upper()[i] {
                    x[i] = trial;
                    accepted = true;
                    break;
                }
            }
            if !accepted {
                x[i] = (parent.x[i] + sigma[i] * normal(&mut self.rng))
                    .clamp(bounds.lower()[i], bounds.upper()[i]);
            }
        }
        let smoothed = &parent.sigma + (sigma - &parent.sigma) * self.config.smoothing;
        (x, smoothed)
    }

    fn converged(&self) -> bool {
        self.population[..self.mu].iter().all(|ind| {
            ind.sigma
                .iter()
                .zip(ind.x.iter())
                .all(|(s, x)| *s <= constants::EPSILON * x.abs().max(1.0))
        })
    }
}

impl Strategy for Isres {
    fn name(&self) -> &str {
        "ISRES"
    }

    fn initialize(&mut self, oracle: &mut dyn Oracle, x0: &DVector) -> Result<StepReport> {
        let bounds = oracle.bounds().clone();
        let n = x0.len();
        let (lambda, mu) = self.config.sizes(n)?;
        self.mu = mu;
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.population.clear();
        self.best = None;
        debug!("ISRES: λ = {lambda}, μ = {mu}");

        let sigma0 = DVector::from_fn(n, |i, _| bounds.width(i) / (n as f64).sqrt());
        for k in 0..lambda {
            let x = if k == 0 {
                bounds.projected(x0)
            } else {
                uniform_in_box(&mut self.rng, &bounds)
            };
            let individual = Self::assess(oracle, x, sigma0.clone())?;
            if self.best.as_ref().map_or(true, |b| individual.beats(b)) {
                self.best = Some(individual.clone());
            }
            self.population.push(individual);
        }
        Ok(StepReport::idle())
    }

    fn step(&mut self, oracle: &mut dyn Oracle) -> Result<StepReport> {
        let bounds = oracle.bounds().clone();
        self.stochastic_ranking();
        let Some(previous) = self.best.clone() else {
            return Err(OptimizerError::failure("ISRES used before initialization"));
        };
        if self.converged() {
            return Ok(StepReport::stalled(previous.iterate()));
        }

        let parents: Vec<Individual> = self.population[..self.mu].to_vec();
        let lambda = self.population.len();
        let mut offspring = Vec::with_capacity(lambda);
        for k in 0..lambda {
            let parent = &parents[k % self.mu];
            let mut child = None;
            if k + 1 < self.mu {
                let x = &parent.x
                    + (&parents[0].x - &parents[k + 1].x) * self.config.differential_step;
                if bounds.contains(&x) {
                    child = Some((x, parent.sigma.clone()));
                }
            }
            let (x, sigma) = match child {
                Some(child) => child,
                None => self.mutate(parent, &bounds),
            };
            offspring.push(Self::assess(oracle, x, sigma)?);
        }
        self.population = offspring;

        let mut best = previous.clone();
        for individual in &self.population {
            if individual.beats(&best) {
                best = individual.clone();
            }
        }
        if best.beats(&previous) {
            trace!("ISRES: best f = {:.6e}, penalty = {:.3e}", best.value, best.penalty);
            let report = StepReport::moved(previous.iterate(), best.iterate());
            self.best = Some(best);
            return Ok(report);
        }
        Ok(StepReport::idle())
    }
}
