//! Stopping criteria and the controller that evaluates them.
//!
//! # Criteria
//!
//! - **stopval**: stop as soon as a feasible objective value reaches the
//!   target (≤ for minimization, ≥ for maximization)
//! - **ftol_rel / ftol_abs**: stop when an iteration changes the objective by
//!   less than `ftol_rel·(|f_old|+|f_new|)/2` or `ftol_abs`
//! - **xtol_rel / xtol_abs**: stop when an iteration moves the point by less
//!   than `xtol_rel·‖x‖`, or by less than `xtol_abs[i]` in every component
//! - **maxeval**: evaluation budget (0 = unlimited)
//! - **maxtime**: wall-clock budget (`None` = unlimited)
//! - **force stop**: an integer flag that may be set from another thread
//!
//! # Priority
//!
//! After every completed iteration the controller reports at most one
//! reason, taking the first that holds in this order: forced stop, stopval,
//! ftol, xtol, maxeval, maxtime. Algorithm-specific terminations (success,
//! failure, roundoff) are considered only when none of these hold.
//!
//! # Examples
//!
//! ```
//! use optima_core::stopping::StoppingCriteria;
//! use std::time::Duration;
//!
//! let criteria = StoppingCriteria::new()
//!     .with_xtol_rel(1e-8)
//!     .with_maxeval(10_000)
//!     .with_maxtime(Duration::from_secs(5));
//! assert_eq!(criteria.maxeval, 10_000);
//! ```

use crate::{
    algorithm::StepReport,
    error::{OptimizerError, Result},
    evaluator::ObjectiveSense,
    result::Status,
    types::{distance, DVector},
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Termination conditions of an optimization run.
///
/// All tolerances default to zero (disabled); `stopval` defaults to `None`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StoppingCriteria {
    /// Target objective value, in the user's optimization sense.
    pub stopval: Option<f64>,

    /// Relative tolerance on the objective change.
    pub ftol_rel: f64,

    /// Absolute tolerance on the objective change.
    pub ftol_abs: f64,

    /// Relative tolerance on the point change.
    pub xtol_rel: f64,

    /// Per-component absolute tolerance on the point change.
    pub xtol_abs: Option<DVector>,

    /// Maximum number of objective evaluations (0 = unlimited).
    pub maxeval: usize,

    /// Maximum wall-clock time.
    pub maxtime: Option<Duration>,
}

impl StoppingCriteria {
    /// Creates criteria with every condition disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target objective value.
    pub fn with_stopval(mut self, stopval: f64) -> Self {
        self.stopval = Some(stopval);
        self
    }

    /// Sets the relative objective tolerance.
    pub fn with_ftol_rel(mut self, tol: f64) -> Self {
        self.ftol_rel = tol;
        self
    }

    /// Sets the absolute objective tolerance.
    pub fn with_ftol_abs(mut self, tol: f64) -> Self {
        self.ftol_abs = tol;
        self
    }

    /// Sets the relative point tolerance.
    pub fn with_xtol_rel(mut self, tol: f64) -> Self {
        self.xtol_rel = tol;
        self
    }

    /// Sets the per-component absolute point tolerance.
    pub fn with_xtol_abs(mut self, tol: DVector) -> Self {
        self.xtol_abs = Some(tol);
        self
    }

    /// Sets the evaluation budget.
    pub fn with_maxeval(mut self, maxeval: usize) -> Self {
        self.maxeval = maxeval;
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_maxtime(mut self, maxtime: Duration) -> Self {
        self.maxtime = Some(maxtime);
        self
    }

    /// Checks that every tolerance is a non-negative number and that
    /// `xtol_abs` matches the problem dimension.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        for (name, tol) in [
            ("ftol_rel", self.ftol_rel),
            ("ftol_abs", self.ftol_abs),
            ("xtol_rel", self.xtol_rel),
        ] {
            check_tolerance(name, tol)?;
        }
        if let Some(stopval) = self.stopval {
            if stopval.is_nan() {
                return Err(OptimizerError::invalid_argument("stopval must not be NaN"));
            }
        }
        if let Some(xtol_abs) = &self.xtol_abs {
            if xtol_abs.len() != dimension {
                return Err(OptimizerError::dimension_mismatch(
                    "xtol_abs",
                    dimension,
                    xtol_abs.len(),
                ));
            }
            for &tol in xtol_abs.iter() {
                check_tolerance("xtol_abs", tol)?;
            }
        }
        Ok(())
    }

    /// Returns true if any tolerance-based criterion is enabled.
    pub fn has_tolerance(&self) -> bool {
        self.ftol_rel > 0.0
            || self.ftol_abs > 0.0
            || self.xtol_rel > 0.0
            || self
                .xtol_abs
                .as_ref()
                .is_some_and(|t| t.iter().any(|&v| v > 0.0))
    }

    /// Converts `stopval` to the minimization form used internally.
    pub fn to_minimization(&self, sense: ObjectiveSense) -> Self {
        let mut criteria = self.clone();
        criteria.stopval = self.stopval.map(|v| sense.sign() * v);
        criteria
    }

    /// Objective change test.
    pub fn ftol_satisfied(&self, f_old: f64, f_new: f64) -> bool {
        if !f_old.is_finite() || !f_new.is_finite() {
            return false;
        }
        let change = (f_new - f_old).abs();
        change < self.ftol_abs
            || change < self.ftol_rel * (f_new.abs() + f_old.abs()) * 0.5
            || (self.ftol_rel > 0.0 && f_new == f_old)
    }

    /// Point change test.
    pub fn xtol_satisfied(&self, x_old: &DVector, x_new: &DVector) -> bool {
        if distance(x_old, x_new) < self.xtol_rel * x_new.norm() {
            return true;
        }
        match &self.xtol_abs {
            Some(tol) if tol.iter().any(|&t| t > 0.0) => x_old
                .iter()
                .zip(x_new.iter())
                .zip(tol.iter())
                .all(|((a, b), t)| (a - b).abs() < *t),
            _ => false,
        }
    }
}

fn check_tolerance(name: &str, tol: f64) -> Result<()> {
    if tol.is_nan() || tol < 0.0 {
        return Err(OptimizerError::invalid_argument(format!(
            "{name} must be a non-negative number, got {tol}"
        )));
    }
    Ok(())
}

/// Shared force-stop flag.
///
/// Clones share the same flag, so a handle can be moved to a supervising
/// thread or signal handler and set while `optimize` runs. Any non-zero
/// value requests termination.
#[derive(Debug, Clone, Default)]
pub struct ForceStop {
    flag: Arc<AtomicI32>,
}

impl ForceStop {
    /// Creates a cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests termination with value 1.
    pub fn stop(&self) {
        self.set(1);
    }

    /// Sets the flag to an arbitrary value; 0 clears it.
    pub fn set(&self, value: i32) {
        self.flag.store(value, Ordering::SeqCst);
    }

    /// Current value of the flag.
    pub fn get(&self) -> i32 {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns true if termination was requested.
    pub fn is_set(&self) -> bool {
        self.get() != 0
    }

    /// Clears the flag.
    pub fn reset(&self) {
        self.set(0);
    }
}

/// Evaluates stopping criteria for one run.
///
/// The criteria are held in minimization form.
#[derive(Debug, Clone)]
pub struct StoppingController {
    criteria: StoppingCriteria,
    force_stop: ForceStop,
    started: Instant,
}

impl StoppingController {
    /// Starts the clock for a run.
    pub fn new(criteria: StoppingCriteria, force_stop: ForceStop) -> Self {
        Self {
            criteria,
            force_stop,
            started: Instant::now(),
        }
    }

    /// The criteria in minimization form.
    pub fn criteria(&self) -> &StoppingCriteria {
        &self.criteria
    }

    /// Wall-clock time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn stopval_reached(&self, best_feasible: Option<f64>) -> bool {
        matches!(
            (self.criteria.stopval, best_feasible),
            (Some(target), Some(best)) if best <= target
        )
    }

    fn maxeval_reached(&self, evaluations: usize) -> bool {
        self.criteria.maxeval > 0 && evaluations >= self.criteria.maxeval
    }

    fn maxtime_reached(&self) -> bool {
        self.criteria
            .maxtime
            .is_some_and(|limit| !limit.is_zero() && self.elapsed() >= limit)
    }

    /// Returns true if a new evaluation must be refused.
    ///
    /// Holds when the force-stop flag is set, the target value was reached,
    /// or the evaluation or time budget is exhausted.
    pub fn should_halt(&self, evaluations: usize, best_feasible: Option<f64>) -> bool {
        self.force_stop.is_set()
            || self.stopval_reached(best_feasible)
            || self.maxeval_reached(evaluations)
            || self.maxtime_reached()
    }

    /// Checks the criteria after a completed iteration.
    ///
    /// Returns the first reason that holds in priority order, or `None` if
    /// the run should continue.
    pub fn check(
        &self,
        report: &StepReport,
        evaluations: usize,
        best_feasible: Option<f64>,
    ) -> Option<Status> {
        if self.force_stop.is_set() {
            return Some(Status::ForcedStop);
        }
        if self.stopval_reached(best_feasible) {
            return Some(Status::StopvalReached);
        }
        if let Some((previous, current)) = report.comparison() {
            if self.criteria.ftol_satisfied(previous.value, current.value) {
                return Some(Status::FtolReached);
            }
            if self.criteria.xtol_satisfied(&previous.point, &current.point) {
                return Some(Status::XtolReached);
            }
        }
        self.limit_reached(evaluations)
    }

    /// Checks the conditions that can interrupt an iteration mid-way.
    ///
    /// Tolerance tests are skipped since no comparable iterate pair exists.
    pub fn interrupted(&self, evaluations: usize, best_feasible: Option<f64>) -> Option<Status> {
        if self.force_stop.is_set() {
            return Some(Status::ForcedStop);
        }
        if self.stopval_reached(best_feasible) {
            return Some(Status::StopvalReached);
        }
        self.limit_reached(evaluations)
    }

    fn limit_reached(&self, evaluations: usize) -> Option<Status> {
        if self.maxeval_reached(evaluations) {
            return Some(Status::MaxevalReached);
        }
        if self.maxtime_reached() {
            return Some(Status::MaxtimeReached);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Iterate;

    fn iterate(x: &[f64], f: f64) -> Iterate {
        Iterate::new(DVector::from_column_slice(x), f)
    }

    #[test]
    fn test_ftol() {
        let c = StoppingCriteria::new().with_ftol_rel(1e-3);
        assert!(c.ftol_satisfied(1.0, 1.0005));
        assert!(!c.ftol_satisfied(1.0, 1.01));
        assert!(c.ftol_satisfied(0.0, 0.0));
        assert!(!c.ftol_satisfied(f64::INFINITY, 1.0));

        let disabled = StoppingCriteria::new();
        assert!(!disabled.ftol_satisfied(1.0, 1.0));

        let abs = StoppingCriteria::new().with_ftol_abs(0.1);
        assert!(abs.ftol_satisfied(10.0, 10.05));
    }

    #[test]
    fn test_xtol() {
        let x0 = DVector::from_vec(vec![1.0, 2.0]);
        let x1 = DVector::from_vec(vec![1.0, 2.0 + 1e-10]);
        let c = StoppingCriteria::new().with_xtol_rel(1e-8);
        assert!(c.xtol_satisfied(&x0, &x1));
        assert!(!c.xtol_satisfied(&x0, &DVector::from_vec(vec![1.1, 2.0])));

        let zero = DVector::zeros(2);
        assert!(!c.xtol_satisfied(&zero, &zero));

        let abs = StoppingCriteria::new().with_xtol_abs(DVector::from_vec(vec![1e-3, 1e-3]));
        assert!(abs.xtol_satisfied(&zero, &zero));
        assert!(!abs.xtol_satisfied(&zero, &DVector::from_vec(vec![0.0, 1.0])));
    }

    #[test]
    fn test_validation() {
        assert!(StoppingCriteria::new().with_ftol_rel(-1.0).validate(2).is_err());
        assert!(StoppingCriteria::new()
            .with_xtol_abs(DVector::zeros(3))
            .validate(2)
            .is_err());
        assert!(StoppingCriteria::new().with_xtol_rel(1e-6).validate(2).is_ok());
    }

    #[test]
    fn test_priority_order() {
        let force = ForceStop::new();
        let criteria = StoppingCriteria::new()
            .with_stopval(0.5)
            .with_ftol_abs(1.0)
            .with_xtol_rel(1.0)
            .with_maxeval(3);
        let controller = StoppingController::new(criteria, force.clone());
        let report = StepReport::moved(iterate(&[1.0], 1.0), iterate(&[1.0], 1.0));

        assert_eq!(controller.check(&report, 5, Some(0.0)), Some(Status::StopvalReached));
        assert_eq!(controller.check(&report, 5, Some(2.0)), Some(Status::FtolReached));
        force.stop();
        assert_eq!(controller.check(&report, 5, Some(0.0)), Some(Status::ForcedStop));
        force.reset();
        assert_eq!(
            controller.check(&StepReport::idle(), 3, None),
            Some(Status::MaxevalReached)
        );
        assert_eq!(controller.check(&StepReport::idle(), 2, None), None);
    }

    #[test]
    fn test_should_halt() {
        let force = ForceStop::new();
        let controller =
            StoppingController::new(StoppingCriteria::new().with_maxeval(2), force.clone());
        assert!(!controller.should_halt(1, None));
        assert!(controller.should_halt(2, None));
        force.set(7);
        assert!(controller.should_halt(0, None));
        assert_eq!(force.get(), 7);
    }

    #[test]
    fn test_to_minimization() {
        let c = StoppingCriteria::new().with_stopval(3.0);
        assert_eq!(c.to_minimization(ObjectiveSense::Maximize).stopval, Some(-3.0));
        assert_eq!(c.to_minimization(ObjectiveSense::Minimize).stopval, Some(3.0));
    }
}
