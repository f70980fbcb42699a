//! Preconditioned projected steepest descent.
//!
//! Moves along `-D⁻¹ ∇f(x)` with a projected backtracking line search, where
//! `D` is the diagonal of the objective preconditioner (identity without
//! one). The first trial step is 1 with a preconditioner and `1/‖∇f‖`
//! without; afterwards each search starts at twice the previously accepted
//! step.

use crate::line_search::{LineSearchParams, ProjectedBacktracking};
use crate::projection::{active_set, freeze, hessian_diagonal};
use log::debug;
use optima_core::{
    algorithm::{Iterate, StepReport, Strategy},
    error::{OptimizerError, Result},
    evaluator::Oracle,
    types::DVector,
};

/// Configuration for steepest descent.
#[derive(Debug, Clone, Default)]
pub struct SteepestDescentConfig {
    /// Line search parameters
    pub line_search: LineSearchParams,
}

/// Projected steepest descent optimizer.
#[derive(Debug)]
pub struct SteepestDescent {
    line_search: ProjectedBacktracking,
    x: DVector,
    f: f64,
    g: DVector,
    next_step: f64,
}

impl SteepestDescent {
    /// Creates the optimizer.
    pub fn new(config: SteepestDescentConfig) -> Self {
        Self {
            line_search: ProjectedBacktracking::new(config.line_search),
            x: DVector::zeros(0),
            f: f64::INFINITY,
            g: DVector::zeros(0),
            next_step: 1.0,
        }
    }
}

impl Strategy for SteepestDescent {
    fn name(&self) -> &str {
        "Steepest Descent"
    }

    fn initialize(&mut self, oracle: &mut dyn Oracle, x0: &DVector) -> Result<StepReport> {
        self.x = oracle.bounds().projected(x0);
        let evaluation = oracle.evaluate(&self.x, true)?;
        if !evaluation.value.is_finite() {
            return Err(OptimizerError::failure(
                "objective is not finite at the starting point",
            ));
        }
        self.f = evaluation.value;
        self.g = evaluation.gradient()?.clone();
        let norm = self.g.norm();
        self.next_step = if oracle.is_preconditioned() || norm <= 1.0 {
            1.0
        } else {
            1.0 / norm
        };
        Ok(StepReport::idle())
    }

    fn step(&mut self, oracle: &mut dyn Oracle) -> Result<StepReport> {
        let active = active_set(oracle.bounds(), &self.x, &self.g);
        let mut pg = self.g.clone();
        freeze(&active, &mut pg);
        let previous = Iterate::new(self.x.clone(), self.f);
        if pg.iter().all(|&v| v == 0.0) {
            return Ok(StepReport::moved(previous.clone(), previous).stationary());
        }

        let d = match hessian_diagonal(oracle, &self.x)? {
            Some(diagonal) => -pg.component_div(&diagonal),
            None => -pg,
        };

        let Some(accepted) =
            self.line_search
                .search(oracle, &self.x, self.f, &self.g, &d, self.next_step)?
        else {
            debug!("steepest descent: line search failed");
            return Ok(StepReport::stalled(previous));
        };

        self.next_step = accepted.step_size * 2.0;
        self.g = accepted.evaluation.gradient()?.clone();
        self.x = accepted.evaluation.point;
        self.f = accepted.evaluation.value;
        Ok(StepReport::moved(previous, Iterate::new(self.x.clone(), self.f)))
    }
}
