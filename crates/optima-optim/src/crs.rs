//! Controlled random search with local mutation (CRS2-LM).
//!
//! A population of points sampled uniformly in the box (the starting point
//! is always a member) is improved by replacing its worst member. Each
//! iteration reflects a random member through the centroid of a random
//! simplex containing the best point; when the reflection leaves the box or
//! does not beat the worst member, a local mutation around the best point is
//! tried instead.
//!
//! # References
//!
//! - Kaelo & Ali, "Some variants of the controlled random search algorithm
//!   for global optimization", J. Optim. Theory Appl. 130 (2006)

use crate::sampling::{rank, uniform_in_box};
use log::{debug, trace};
use optima_core::{
    algorithm::{Iterate, StepReport, Strategy},
    error::{OptimizerError, Result},
    evaluator::Oracle,
    types::DVector,
};
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};

/// Configuration for CRS2-LM.
#[derive(Debug, Clone)]
pub struct CrsConfig {
    /// Population size (0 = `10 (N + 1)`)
    pub population: usize,
    /// Random seed
    pub seed: u64,
}

impl CrsConfig {
    /// Creates a configuration with the default population.
    pub fn new(seed: u64) -> Self {
        Self { population: 0, seed }
    }

    /// Sets the population size.
    pub fn with_population(mut self, population: usize) -> Self {
        self.population = population;
        self
    }

    pub(crate) fn population_for(&self, dimension: usize) -> Result<usize> {
        if self.population == 0 {
            return Ok(10 * (dimension + 1));
        }
        if self.population < dimension + 1 {
            return Err(OptimizerError::invalid_argument(format!(
                "CRS needs a population of at least {}, got {}",
                dimension + 1,
                self.population
            )));
        }
        Ok(self.population)
    }
}

/// CRS2-LM optimizer.
#[derive(Debug)]
pub struct Crs {
    config: CrsConfig,
    rng: StdRng,
    points: Vec<DVector>,
    values: Vec<f64>,
}

impl Crs {
    /// Creates the optimizer.
    pub fn new(config: CrsConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            points: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Current population size.
    pub fn population(&self) -> usize {
        self.points.len()
    }

    fn best(&self) -> usize {
        extremum(&self.values, |a, b| a < b)
    }

    fn worst(&self) -> usize {
        extremum(&self.values, |a, b| a > b)
    }

    fn collapsed(&self, best: usize) -> bool {
        self.points.iter().all(|p| *p == self.points[best])
    }

    /// Reflection of a random member through the centroid of a random
    /// simplex containing the best point.
    fn reflection(&mut self, best: usize) -> (DVector, DVector) {
        let n = self.points[best].len();
        let picks: Vec<usize> = index::sample(&mut self.rng, self.points.len(), n + 1)
            .into_iter()
            .filter(|&i| i != best)
            .take(n)
            .collect();
        let (simplex, last) = picks.split_at(n - 1);
        let mut centroid = self.points[best].clone();
        for &i in simplex {
            centroid += &self.points[i];
        }
        centroid /= n as f64;
        let reflected = &centroid * 2.0 - &self.points[last[0]];
        (reflected, self.points[last[0]].clone())
    }
}

/// Index of the extreme value under `better`, ranking NaN last.
fn extremum(values: &[f64], better: impl Fn(f64, f64) -> bool) -> usize {
    let mut index = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if better(rank(v), rank(values[index])) {
            index = i;
        }
    }
    index
}

impl Strategy for Crs {
    fn name(&self) -> &str {
        "CRS2-LM"
    }

    fn initialize(&mut self, oracle: &mut dyn Oracle, x0: &DVector) -> Result<StepReport> {
        let bounds = oracle.bounds().clone();
        let size = self.config.population_for(x0.len())?;
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.points.clear();
        self.values.clear();
        debug!("CRS2-LM: population of {size}");

        for k in 0..size {
            let x = if k == 0 {
                bounds.projected(x0)
            } else {
                uniform_in_box(&mut self.rng, &bounds)
            };
            let value = rank(oracle.evaluate(&x, false)?.value);
            self.points.push(x);
            self.values.push(value);
        }
        Ok(StepReport::idle())
    }

    fn step(&mut self, oracle: &mut dyn Oracle) -> Result<StepReport> {
        let best = self.best();
        let previous = Iterate::new(self.points[best].clone(), self.values[best]);
        if self.collapsed(best) {
            return Ok(StepReport::stalled(previous));
        }
        let worst = self.worst();
        let f_worst = self.values[worst];

        let (reflected, pivot) = self.reflection(best);
        let mut candidate = None;
        if oracle.bounds().contains(&reflected) {
            let value = rank(oracle.evaluate(&reflected, false)?.value);
            if value < f_worst {
                candidate = Some((reflected, value));
            }
        }
        if candidate.is_none() {
            let xb = &self.points[best];
            let w = DVector::from_fn(xb.len(), |_, _| self.rng.gen::<f64>());
            let mut mutated = xb + xb.component_mul(&w) - pivot.component_mul(&w);
            oracle.bounds().project(&mut mutated);
            let value = rank(oracle.evaluate(&mutated, false)?.value);
            trace!("CRS2-LM: local mutation f = {value:.6e}");
            if value < f_worst {
                candidate = Some((mutated, value));
            }
        }

        let Some((x, value)) = candidate else {
            return Ok(StepReport::idle());
        };
        self.points[worst] = x;
        self.values[worst] = value;
        if value < previous.value {
            let current = Iterate::new(self.points[worst].clone(), value);
            return Ok(StepReport::moved(previous, current));
        }
        Ok(StepReport::idle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use optima_core::result::Status;
    use optima_core::stopping::StoppingCriteria;
    use optima_core::test_utils::{box_bounds, minimize, rastrigin, shifted_sphere};

    #[test]
    fn test_population_size() {
        assert_eq!(CrsConfig::new(1).population_for(2).unwrap(), 30);
        assert_eq!(CrsConfig::new(1).with_population(5).population_for(2).unwrap(), 5);
        assert!(CrsConfig::new(1).with_population(2).population_for(2).is_err());
    }

    #[test]
    fn test_quadratic() {
        let f = shifted_sphere(&[1.0, -2.0]);
        let mut crs = Crs::new(CrsConfig::new(42));
        let outcome = minimize(
            &mut crs,
            &f,
            &box_bounds(2, -5.0, 5.0),
            &[0.0, 0.0],
            StoppingCriteria::new().with_maxeval(3000),
        )
        .unwrap();
        assert_eq!(outcome.status, Status::MaxevalReached);
        let best = outcome.best.unwrap();
        assert_relative_eq!(best.point[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(best.point[1], -2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_rastrigin_global_minimum() {
        let f = rastrigin();
        let mut crs = Crs::new(CrsConfig::new(3).with_population(100));
        let outcome = minimize(
            &mut crs,
            &f,
            &box_bounds(2, -5.12, 5.12),
            &[3.0, -3.0],
            StoppingCriteria::new().with_stopval(1e-4).with_maxeval(20_000),
        )
        .unwrap();
        assert_eq!(outcome.status, Status::StopvalReached);
        assert!(outcome.best.unwrap().value <= 1e-4);
    }

    #[test]
    fn test_same_seed_same_result() {
        let f = shifted_sphere(&[0.3, 0.7]);
        let run = |seed| {
            let mut crs = Crs::new(CrsConfig::new(seed));
            minimize(
                &mut crs,
                &f,
                &box_bounds(2, -1.0, 1.0),
                &[0.0, 0.0],
                StoppingCriteria::new().with_maxeval(200),
            )
            .unwrap()
            .best
            .unwrap()
        };
        assert_eq!(run(9).point, run(9).point);
    }
}
