//! Projected limited-memory BFGS.
//!
//! L-BFGS (Limited-memory Broyden-Fletcher-Goldfarb-Shanno) is a quasi-Newton
//! algorithm that approximates the inverse Hessian using a limited history of
//! past position and gradient differences. This implementation handles box
//! constraints with an active-set projection.
//!
//! # Algorithm Overview
//!
//! Each iteration:
//! 1. Computes the projected gradient (active components frozen)
//! 2. Computes a search direction with the two-loop recursion
//! 3. Freezes the active components of the direction
//! 4. Performs a projected backtracking line search
//! 5. Stores the pair (s, y) if it satisfies the curvature condition sᵀy > 0
//!
//! ## Two-Loop Recursion
//!
//! ```text
//! q = g
//! for i = k-1, ..., k-m:
//!     α_i = ρ_i ⟨s_i, q⟩
//!     q = q - α_i y_i
//!
//! r = H_0 q
//!
//! for i = k-m, ..., k-1:
//!     β = ρ_i ⟨y_i, r⟩
//!     r = r + (α_i - β) s_i
//!
//! return -r
//! ```
//!
//! `H_0` is `γ D⁻¹`, where `D` is the diagonal of the objective
//! preconditioner (identity without one) and `γ = ⟨s, y⟩ / ⟨y, D⁻¹ y⟩` for the
//! most recent pair.
//!
//! # Recovery
//!
//! When the line search fails, the history is discarded and the search is
//! retried along the scaled steepest descent direction. A second failure
//! means no representable step decreases the objective; the step is reported
//! as stalled, which ends the run with `RoundoffLimited` unless a tolerance
//! test holds.
//!
//! # References
//!
//! - Nocedal & Wright, "Numerical Optimization" (2006)
//! - Byrd, Lu, Nocedal & Zhu, "A Limited Memory Algorithm for Bound
//!   Constrained Optimization" (1995)

use crate::line_search::{LineSearchParams, LineSearchResult, ProjectedBacktracking};
use crate::projection::{active_set, freeze, hessian_diagonal};
use log::{debug, warn};
use optima_core::{
    algorithm::{Iterate, StepReport, Strategy},
    error::{OptimizerError, Result},
    evaluator::Oracle,
    types::{constants, DVector},
};
use std::collections::VecDeque;

/// Configuration for the L-BFGS optimizer.
#[derive(Debug, Clone)]
pub struct LbfgsConfig {
    /// Number of vector pairs to store (typically 5-20)
    pub memory_size: usize,
    /// Line search parameters
    pub line_search: LineSearchParams,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        Self {
            memory_size: constants::DEFAULT_VECTOR_STORAGE,
            line_search: LineSearchParams::default(),
        }
    }
}

impl LbfgsConfig {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the memory size; 0 selects the default.
    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory_size = if size == 0 {
            constants::DEFAULT_VECTOR_STORAGE
        } else {
            size
        };
        self
    }

    /// Sets the line search parameters.
    pub fn with_line_search(mut self, params: LineSearchParams) -> Self {
        self.line_search = params;
        self
    }
}

/// Stored curvature pair.
#[derive(Debug, Clone)]
struct CurvaturePair {
    s: DVector,
    y: DVector,
    rho: f64,
}

/// Projected L-BFGS optimizer.
#[derive(Debug)]
pub struct Lbfgs {
    config: LbfgsConfig,
    line_search: ProjectedBacktracking,
    history: VecDeque<CurvaturePair>,
    x: DVector,
    f: f64,
    g: DVector,
    diagonal: Option<DVector>,
}

impl Lbfgs {
    /// Creates a new L-BFGS optimizer with the given configuration.
    pub fn new(config: LbfgsConfig) -> Self {
        let line_search = ProjectedBacktracking::new(config.line_search);
        Self {
            config,
            line_search,
            history: VecDeque::new(),
            x: DVector::zeros(0),
            f: f64::INFINITY,
            g: DVector::zeros(0),
            diagonal: None,
        }
    }

    /// Returns the optimizer configuration.
    pub fn config(&self) -> &LbfgsConfig {
        &self.config
    }

    /// Number of stored curvature pairs.
    pub fn stored_pairs(&self) -> usize {
        self.history.len()
    }

    fn apply_h0(&self, q: &DVector) -> DVector {
        let scaled = match &self.diagonal {
            Some(d) => q.component_div(d),
            None => q.clone(),
        };
        match self.history.back() {
            Some(last) => {
                let hy = match &self.diagonal {
                    Some(d) => last.y.component_div(d),
                    None => last.y.clone(),
                };
                let denom = last.y.dot(&hy);
                let gamma = if denom > 0.0 { last.s.dot(&last.y) / denom } else { 1.0 };
                scaled * gamma
            }
            None => scaled,
        }
    }

    /// Two-loop recursion: returns `-H g`.
    fn direction(&self, g: &DVector) -> DVector {
        let mut q = g.clone();
        let mut alphas = Vec::with_capacity(self.history.len());
        for pair in self.history.iter().rev() {
            let alpha = pair.rho * pair.s.dot(&q);
            q.axpy(-alpha, &pair.y, 1.0);
            alphas.push(alpha);
        }
        let mut r = self.apply_h0(&q);
        for (pair, alpha) in self.history.iter().zip(alphas.iter().rev()) {
            let beta = pair.rho * pair.y.dot(&r);
            r.axpy(alpha - beta, &pair.s, 1.0);
        }
        -r
    }

    fn steepest_direction(&self, pg: &DVector) -> DVector {
        match &self.diagonal {
            Some(d) => -pg.component_div(d),
            None => -pg,
        }
    }

    fn update_history(&mut self, accepted: &LineSearchResult, g_new: &DVector) {
        let s = &accepted.evaluation.point - &self.x;
        let y = g_new - &self.g;
        let sy = s.dot(&y);
        if sy > constants::EPSILON * y.norm_squared() && sy > 0.0 {
            if self.history.len() >= self.config.memory_size {
                self.history.pop_front();
            }
            self.history.push_back(CurvaturePair { s, y, rho: 1.0 / sy });
        } else {
            debug!("L-BFGS: skipping update with sᵀy = {sy:.3e}");
        }
    }

    fn first_step(&self, d: &DVector) -> f64 {
        if self.history.is_empty() && self.diagonal.is_none() {
            let norm = d.norm();
            if norm > 1.0 {
                return 1.0 / norm;
            }
        }
        1.0
    }
}

impl Strategy for Lbfgs {
    fn name(&self) -> &str {
        "L-BFGS"
    }

    fn initialize(&mut self, oracle: &mut dyn Oracle, x0: &DVector) -> Result<StepReport> {
        self.history.clear();
        self.x = oracle.bounds().projected(x0);
        let evaluation = oracle.evaluate(&self.x, true)?;
        if !evaluation.value.is_finite() {
            return Err(OptimizerError::failure(
                "objective is not finite at the starting point",
            ));
        }
        self.f = evaluation.value;
        self.g = evaluation.gradient()?.clone();
        self.diagonal = hessian_diagonal(oracle, &self.x)?;
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

        let mut d = self.direction(&pg);
        freeze(&active, &mut d);
        if d.dot(&pg) >= 0.0 {
            self.history.clear();
            d = self.steepest_direction(&pg);
        }

        let mut accepted = self.line_search.search(
            oracle,
            &self.x,
            self.f,
            &self.g,
            &d,
            self.first_step(&d),
        )?;
        if accepted.is_none() && !self.history.is_empty() {
            warn!("L-BFGS: line search failed, resetting history");
            self.history.clear();
            d = self.steepest_direction(&pg);
            accepted = self.line_search.search(
                oracle,
                &self.x,
                self.f,
                &self.g,
                &d,
                self.first_step(&d),
            )?;
        }
        let Some(accepted) = accepted else {
            debug!("L-BFGS: no decrease along the steepest descent direction");
            return Ok(StepReport::stalled(previous));
        };

        let g_new = accepted.evaluation.gradient()?.clone();
        self.update_history(&accepted, &g_new);
        self.x = accepted.evaluation.point.clone();
        self.f = accepted.evaluation.value;
        self.g = g_new;
        if oracle.is_preconditioned() {
            self.diagonal = hessian_diagonal(oracle, &self.x)?;
        }

        Ok(StepReport::moved(
            previous,
            Iterate::new(self.x.clone(), self.f),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use optima_core::bounds::Bounds;
    use optima_core::result::Status;
    use optima_core::stopping::StoppingCriteria;
    use optima_core::test_utils::{box_bounds, minimize, rosenbrock, shifted_sphere};

    #[test]
    fn test_lbfgs_config() {
        let config = LbfgsConfig::new().with_memory_size(20);
        assert_eq!(config.memory_size, 20);
        assert_eq!(
            LbfgsConfig::new().with_memory_size(0).memory_size,
            constants::DEFAULT_VECTOR_STORAGE
        );
    }

    #[test]
    fn test_quadratic() {
        let f = shifted_sphere(&[1.0, 2.0]);
        let mut lbfgs = Lbfgs::new(LbfgsConfig::new());
        let outcome = minimize(
            &mut lbfgs,
            &f,
            &Bounds::unbounded(2),
            &[0.0, 0.0],
            StoppingCriteria::new().with_xtol_rel(1e-10).with_maxeval(200),
        )
        .unwrap();
        let best = outcome.best.unwrap();
        assert!(outcome.status.is_success());
        assert_relative_eq!(best.point[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(best.point[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rosenbrock() {
        let f = rosenbrock();
        let mut lbfgs = Lbfgs::new(LbfgsConfig::new().with_memory_size(5));
        let outcome = minimize(
            &mut lbfgs,
            &f,
            &Bounds::unbounded(2),
            &[-1.2, 1.0],
            StoppingCriteria::new().with_ftol_rel(1e-14).with_maxeval(5000),
        )
        .unwrap();
        let best = outcome.best.unwrap();
        assert_relative_eq!(best.point[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(best.point[1], 1.0, epsilon = 1e-3);
        assert!(lbfgs.stored_pairs() <= 5);
    }

    #[test]
    fn test_bound_constrained() {
        let f = shifted_sphere(&[1.0, 2.0]);
        let mut lbfgs = Lbfgs::new(LbfgsConfig::new());
        let outcome = minimize(
            &mut lbfgs,
            &f,
            &box_bounds(2, -0.5, 0.5),
            &[0.0, 0.0],
            StoppingCriteria::new().with_xtol_rel(1e-10).with_maxeval(200),
        )
        .unwrap();
        let best = outcome.best.unwrap();
        assert_relative_eq!(best.point[0], 0.5, epsilon = 1e-8);
        assert_relative_eq!(best.point[1], 0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_stationary_start_reports_success() {
        let f = shifted_sphere(&[1.0, 2.0]);
        let mut lbfgs = Lbfgs::new(LbfgsConfig::new());
        let outcome = minimize(
            &mut lbfgs,
            &f,
            &Bounds::unbounded(2),
            &[1.0, 2.0],
            StoppingCriteria::new(),
        )
        .unwrap();
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.evaluations, 1);
    }
}
