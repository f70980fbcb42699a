//! Projected backtracking line search.
//!
//! Gradient methods on a box move along the *projected path*
//!
//! ```text
//! x(α) = P(x + α d)
//! ```
//!
//! where `P` clamps into the bounds. A trial step is accepted when it
//! satisfies the Armijo sufficient decrease condition measured along the
//! actual displacement:
//!
//! ```text
//! f(x(α)) ≤ f(x) + c₁ ⟨∇f(x), x(α) − x⟩
//! ```
//!
//! Otherwise the step is multiplied by the contraction factor ρ and the
//! search repeats, up to a fixed number of trials. Trials with a non-finite
//! objective value are rejected like any other failed trial.
//!
//! # Examples
//!
//! ```rust,ignore
//! let search = ProjectedBacktracking::new(LineSearchParams::default());
//! match search.search(oracle, &x, f, &g, &d, 1.0)? {
//!     Some(accepted) => x = accepted.evaluation.point,
//!     None => { /* no acceptable step */ }
//! }
//! ```

use optima_core::{
    error::{OptimizerError, Result},
    evaluator::{Evaluation, Oracle},
    types::{constants, DVector},
};

/// Parameters of the backtracking search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchParams {
    /// Armijo parameter c₁ ∈ (0, 1)
    pub c1: f64,

    /// Contraction factor ρ ∈ (0, 1)
    pub rho: f64,

    /// Maximum number of trial points
    pub max_trials: usize,

    /// Smallest step length tried
    pub min_step_size: f64,
}

impl Default for LineSearchParams {
    fn default() -> Self {
        Self {
            c1: constants::ARMIJO_C1,
            rho: constants::BACKTRACK_FACTOR,
            max_trials: constants::MAX_BACKTRACKS,
            min_step_size: 1e-20,
        }
    }
}

impl LineSearchParams {
    /// Checks `0 < c₁ < 1`, `0 < ρ < 1` and `max_trials > 0`.
    pub fn validate(&self) -> Result<()> {
        if !(self.c1 > 0.0 && self.c1 < 1.0) {
            return Err(OptimizerError::invalid_argument(format!(
                "Armijo parameter must lie in (0, 1), got {}",
                self.c1
            )));
        }
        if !(self.rho > 0.0 && self.rho < 1.0) {
            return Err(OptimizerError::invalid_argument(format!(
                "contraction factor must lie in (0, 1), got {}",
                self.rho
            )));
        }
        if self.max_trials == 0 {
            return Err(OptimizerError::invalid_argument(
                "line search needs at least one trial",
            ));
        }
        Ok(())
    }
}

/// An accepted line search step.
#[derive(Debug, Clone)]
pub struct LineSearchResult {
    /// Accepted step length α
    pub step_size: f64,

    /// Evaluation at the accepted point, with derivatives
    pub evaluation: Evaluation,

    /// Number of trial points evaluated
    pub trials: usize,
}

/// Backtracking line search along the projected path.
#[derive(Debug, Clone, Default)]
pub struct ProjectedBacktracking {
    params: LineSearchParams,
}

impl ProjectedBacktracking {
    /// Creates a line search with the given parameters.
    pub fn new(params: LineSearchParams) -> Self {
        Self { params }
    }

    /// The parameters.
    pub fn params(&self) -> &LineSearchParams {
        &self.params
    }

    /// Searches from `x` (value `f`, gradient `g`) along `d`.
    ///
    /// Returns `Ok(None)` when no trial is acceptable, including when the
    /// projected displacement is not a descent direction. Trial points are
    /// evaluated with derivatives so the caller can continue from the result.
    pub fn search(
        &self,
        oracle: &mut dyn Oracle,
        x: &DVector,
        f: f64,
        g: &DVector,
        d: &DVector,
        initial_step: f64,
    ) -> Result<Option<LineSearchResult>> {
        let mut alpha = initial_step;
        for trial in 1..=self.params.max_trials {
            if alpha < self.params.min_step_size {
                break;
            }
            let candidate = oracle.bounds().projected(&(x + d * alpha));
            let displacement = &candidate - x;
            let slope = g.dot(&displacement);
            if slope >= 0.0 || displacement.norm() == 0.0 {
                if trial == 1 {
                    return Ok(None);
                }
                break;
            }

            let evaluation = oracle.evaluate(&candidate, true)?;
            if evaluation.value.is_finite()
                && evaluation.value <= f + self.params.c1 * slope
            {
                return Ok(Some(LineSearchResult {
                    step_size: alpha,
                    evaluation,
                    trials: trial,
                }));
            }
            alpha *= self.params.rho;
        }
        Ok(None)
    }
}
