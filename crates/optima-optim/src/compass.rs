//! Compass search.
//!
//! Polls the 2N points `x ± step_i e_i` (projected into the bounds) and moves
//! to the first one that improves the objective. When a full poll fails every
//! step length is halved and the poll is reported against the best trial, so
//! the tolerance tests measure the current mesh size.

use log::trace;
use optima_core::{
    algorithm::{Iterate, StepReport, Strategy},
    error::Result,
    evaluator::Oracle,
    types::{constants, DVector},
};

/// Compass search optimizer.
#[derive(Debug)]
pub struct Compass {
    initial_step: Option<DVector>,
    x: DVector,
    f: f64,
    step: DVector,
}

impl Compass {
    /// Creates the optimizer. Without an initial step the bound-based
    /// heuristic is used.
    pub fn new(initial_step: Option<DVector>) -> Self {
        Self {
            initial_step,
            x: DVector::zeros(0),
            f: f64::INFINITY,
            step: DVector::zeros(0),
        }
    }

    /// Current step lengths.
    pub fn step_lengths(&self) -> &DVector {
        &self.step
    }

    fn is_converged(&self) -> bool {
        self.step
            .iter()
            .zip(self.x.iter())
            .all(|(s, x)| *s <= constants::EPSILON * x.abs().max(1.0))
    }
}

impl Strategy for Compass {
    fn name(&self) -> &str {
        "Compass"
    }

    fn initialize(&mut self, oracle: &mut dyn Oracle, x0: &DVector) -> Result<StepReport> {
        let bounds = oracle.bounds();
        self.x = bounds.projected(x0);
        self.step = match &self.initial_step {
            Some(step) => step.abs(),
            None => bounds.default_initial_step(&self.x),
        };
        let f = oracle.evaluate(&self.x, false)?.value;
        self.f = if f.is_nan() { f64::INFINITY } else { f };
        Ok(StepReport::idle())
    }

    fn step(&mut self, oracle: &mut dyn Oracle) -> Result<StepReport> {
        let previous = Iterate::new(self.x.clone(), self.f);
        if self.is_converged() {
            return Ok(StepReport::moved(previous.clone(), previous).stationary());
        }

        let mut best_trial = previous.clone();
        let mut polled = false;
        for i in 0..self.x.len() {
            for sign in [1.0, -1.0] {
                let mut trial = self.x.clone();
                trial[i] += sign * self.step[i];
                oracle.bounds().project(&mut trial);
                if trial[i] == self.x[i] {
                    continue;
                }
                let value = oracle.evaluate(&trial, false)?.value;
                if value < self.f {
                    self.x = trial;
                    self.f = value;
                    return Ok(StepReport::moved(
                        previous,
                        Iterate::new(self.x.clone(), self.f),
                    ));
                }
                if !polled || value < best_trial.value {
                    best_trial = Iterate::new(trial, value);
                    polled = true;
                }
            }
        }

        self.step *= 0.5;
        trace!("compass: poll failed, step = {:.3e}", self.step.amax());
        Ok(StepReport::moved(previous, best_trial))
    }
}
