//! Nelder-Mead simplex search with bound projection.
//!
//! The simplex has N+1 vertices. Each iteration replaces the worst vertex by
//! reflecting it through the centroid of the others, expanding or
//! contracting the move depending on the reflected value, and shrinks the
//! whole simplex towards the best vertex when no move helps. Trial points
//! are projected into the bounds.
//!
//! After every iteration the best and worst vertices are handed to the
//! tolerance tests, so `ftol` and `xtol` measure the size of the simplex.
//! A simplex that collapses to a single point without satisfying any
//! tolerance ends the run with `RoundoffLimited`.

use crate::sampling::rank;
use log::trace;
use optima_core::{
    algorithm::{Iterate, StepReport, Strategy},
    error::{OptimizerError, Result},
    evaluator::Oracle,
    types::DVector,
};
use std::cmp::Ordering;

/// Configuration for Nelder-Mead.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    /// Edge lengths of the initial simplex (`None` = heuristic from bounds)
    pub initial_step: Option<DVector>,
    /// Reflection coefficient α > 0
    pub reflection: f64,
    /// Expansion coefficient γ > 1
    pub expansion: f64,
    /// Contraction coefficient ρ ∈ (0, 1)
    pub contraction: f64,
    /// Shrink coefficient σ ∈ (0, 1)
    pub shrink: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            initial_step: None,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
        }
    }
}

impl NelderMeadConfig {
    /// Creates a configuration with the standard coefficients.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial simplex edge lengths.
    pub fn with_initial_step(mut self, step: DVector) -> Self {
        self.initial_step = Some(step);
        self
    }

    /// Checks the coefficient ranges.
    pub fn validate(&self) -> Result<()> {
        let valid = self.reflection > 0.0
            && self.expansion > 1.0
            && self.contraction > 0.0
            && self.contraction < 1.0
            && self.shrink > 0.0
            && self.shrink < 1.0;
        if !valid {
            return Err(OptimizerError::invalid_argument(
                "Nelder-Mead coefficients out of range",
            ));
        }
        Ok(())
    }
}

/// Nelder-Mead optimizer.
#[derive(Debug)]
pub struct NelderMead {
    config: NelderMeadConfig,
    vertices: Vec<DVector>,
    values: Vec<f64>,
}

impl NelderMead {
    /// Creates the optimizer.
    pub fn new(config: NelderMeadConfig) -> Self {
        Self {
            config,
            vertices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Vertex indices sorted from best to worst.
    fn order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.values.len()).collect();
        order.sort_by(|&a, &b| {
            rank(self.values[a])
                .partial_cmp(&rank(self.values[b]))
                .unwrap_or(Ordering::Equal)
        });
        order
    }

    fn evaluate(&self, oracle: &mut dyn Oracle, x: DVector) -> Result<(DVector, f64)> {
        let x = oracle.bounds().projected(&x);
        let value = oracle.evaluate(&x, false)?.value;
        Ok((x, value))
    }

    fn diameter(&self, best: usize) -> f64 {
        self.vertices
            .iter()
            .map(|v| (v - &self.vertices[best]).amax())
            .fold(0.0, f64::max)
    }

    fn report(&self) -> StepReport {
        let order = self.order();
        let (best, worst) = (order[0], order[order.len() - 1]);
        let low = Iterate::new(self.vertices[best].clone(), self.values[best]);
        if self.diameter(best) == 0.0 {
            return StepReport::stalled(low);
        }
        let high = Iterate::new(self.vertices[worst].clone(), self.values[worst]);
        StepReport::moved(high, low)
    }
}

impl Strategy for NelderMead {
    fn name(&self) -> &str {
        "Nelder-Mead"
    }

    fn initialize(&mut self, oracle: &mut dyn Oracle, x0: &DVector) -> Result<StepReport> {
        self.config.validate()?;
        let bounds = oracle.bounds().clone();
        let x0 = bounds.projected(x0);
        let step = match &self.config.initial_step {
            Some(step) => step.clone(),
            None => bounds.default_initial_step(&x0),
        };

        self.vertices.clear();
        self.values.clear();
        let f0 = oracle.evaluate(&x0, false)?.value;
        self.vertices.push(x0.clone());
        self.values.push(f0);
        for i in 0..x0.len() {
            let mut v = x0.clone();
            v[i] += step[i];
            if v[i] > bounds.upper()[i] {
                v[i] = x0[i] - step[i];
            }
            let (v, f) = self.evaluate(oracle, v)?;
            self.vertices.push(v);
            self.values.push(f);
        }
        Ok(StepReport::idle())
    }

    fn step(&mut self, oracle: &mut dyn Oracle) -> Result<StepReport> {
        let order = self.order();
        let n = order.len() - 1;
        let (best, second, worst) = (order[0], order[n - 1], order[n]);
        let (fl, fs, fh) = (
            rank(self.values[best]),
            rank(self.values[second]),
            rank(self.values[worst]),
        );

        let mut centroid = DVector::zeros(self.vertices[best].len());
        for &i in &order[..n] {
            centroid += &self.vertices[i];
        }
        centroid /= n as f64;
        let xh = self.vertices[worst].clone();
        let toward = &centroid - &xh;

        let (xr, fr) = self.evaluate(oracle, &centroid + &toward * self.config.reflection)?;
        let fr = rank(fr);

        let replacement = if fr < fl {
            let (xe, fe) = self.evaluate(oracle, &centroid + &toward * self.config.expansion)?;
            trace!("Nelder-Mead: expansion");
            if rank(fe) < fr {
                Some((xe, fe))
            } else {
                Some((xr, fr))
            }
        } else if fr < fs {
            Some((xr, fr))
        } else if fr < fh {
            let (xc, fc) =
                self.evaluate(oracle, &centroid + (&xr - &centroid) * self.config.contraction)?;
            (rank(fc) <= fr).then_some((xc, fc))
        } else {
            let (xc, fc) =
                self.evaluate(oracle, &centroid + (&xh - &centroid) * self.config.contraction)?;
            (rank(fc) < fh).then_some((xc, fc))
        };

        match replacement {
            Some((x, f)) => {
                self.vertices[worst] = x;
                self.values[worst] = f;
            }
            None => {
                trace!("Nelder-Mead: shrink");
                let xl = self.vertices[best].clone();
                for i in 0..self.vertices.len() {
                    if i == best {
                        continue;
                    }
                    let shrunk = &xl + (&self.vertices[i] - &xl) * self.config.shrink;
                    let (x, f) = self.evaluate(oracle, shrunk)?;
                    self.vertices[i] = x;
                    self.values[i] = f;
                }
            }
        }
        Ok(self.report())
    }
}
