//! Evaluation oracles.
//!
//! Algorithms never call user callbacks directly. They talk to an
//! [`Oracle`], which evaluates the objective and every constraint at a point
//! and returns one [`Evaluation`] record. Three oracles are provided:
//!
//! - [`ProblemOracle`] adapts a session's callbacks, always presenting a
//!   minimization problem (maximization objectives are negated).
//! - [`Monitor`] wraps another oracle, counts evaluations, refuses new ones
//!   once a stopping criterion holds and remembers the best point seen.
//! - Algorithms may add their own wrappers (the augmented Lagrangian does).
//!
//! # Best point ranking
//!
//! A feasible point always beats an infeasible one. Feasible points are
//! ranked by objective value, infeasible points by their maximum constraint
//! violation. Points with a NaN objective are never recorded.

use crate::{
    bounds::Bounds,
    error::{OptimizerError, Result},
    function::{Constraint, ObjectiveFunction},
    preconditioner::Preconditioner,
    stopping::StoppingController,
    types::{all_finite, DMatrix, DVector},
};
use log::trace;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Direction of optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ObjectiveSense {
    /// Minimize the objective.
    #[default]
    Minimize,
    /// Maximize the objective.
    Maximize,
}

impl ObjectiveSense {
    /// Factor mapping user values to minimization form and back.
    pub fn sign(self) -> f64 {
        match self {
            Self::Minimize => 1.0,
            Self::Maximize => -1.0,
        }
    }
}

/// Kind of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// `c(x) ≤ tol`.
    Inequality,
    /// `|c(x)| ≤ tol`.
    Equality,
}

/// Everything known about one evaluated point.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The evaluated point.
    pub point: DVector,
    /// Objective value in minimization form.
    pub value: f64,
    /// Objective gradient, present when derivatives were requested.
    pub gradient: Option<DVector>,
    /// Stacked inequality constraint values.
    pub inequality: DVector,
    /// Stacked equality constraint values.
    pub equality: DVector,
    /// Inequality Jacobian (one row per component).
    pub inequality_jacobian: Option<DMatrix>,
    /// Equality Jacobian (one row per component).
    pub equality_jacobian: Option<DMatrix>,
    /// Largest constraint violation, ignoring tolerances (0 if none).
    pub violation: f64,
    /// Whether every constraint holds within its tolerance.
    pub feasible: bool,
}

impl Evaluation {
    /// Evaluation of a problem without constraints.
    pub fn unconstrained(point: DVector, value: f64, gradient: Option<DVector>) -> Self {
        Self {
            point,
            value,
            gradient,
            inequality: DVector::zeros(0),
            equality: DVector::zeros(0),
            inequality_jacobian: None,
            equality_jacobian: None,
            violation: 0.0,
            feasible: true,
        }
    }

    /// Recomputes `violation` and `feasible` from the constraint values.
    pub fn assess(&mut self, inequality_tolerance: &DVector, equality_tolerance: &DVector) {
        let mut violation: f64 = 0.0;
        let mut feasible = true;
        for (c, tol) in self.inequality.iter().zip(inequality_tolerance.iter()) {
            if c.is_nan() {
                violation = f64::INFINITY;
                feasible = false;
                continue;
            }
            violation = violation.max(*c);
            feasible &= *c <= *tol;
        }
        for (c, tol) in self.equality.iter().zip(equality_tolerance.iter()) {
            if c.is_nan() {
                violation = f64::INFINITY;
                feasible = false;
                continue;
            }
            violation = violation.max(c.abs());
            feasible &= c.abs() <= *tol;
        }
        self.violation = violation;
        self.feasible = feasible;
    }

    /// The gradient, or a failure if it was not computed.
    pub fn gradient(&self) -> Result<&DVector> {
        self.gradient
            .as_ref()
            .ok_or_else(|| OptimizerError::failure("gradient was not computed"))
    }

    /// Whether the objective value is a usable number.
    pub fn is_valid(&self) -> bool {
        !self.value.is_nan()
    }
}

/// Source of evaluations for an algorithm.
///
/// Every oracle presents a minimization problem.
pub trait Oracle {
    /// Problem dimension N.
    fn dimension(&self) -> usize;

    /// Box constraints.
    fn bounds(&self) -> &Bounds;

    /// Whether `evaluate(x, true)` yields gradients and Jacobians.
    fn provides_gradient(&self) -> bool;

    /// Stacked inequality tolerances.
    fn inequality_tolerance(&self) -> &DVector;

    /// Stacked equality tolerances.
    fn equality_tolerance(&self) -> &DVector;

    /// Evaluates the objective and every constraint at `x`.
    ///
    /// With `derivatives`, the objective gradient and the constraint
    /// Jacobians are filled as well.
    fn evaluate(&mut self, x: &DVector, derivatives: bool) -> Result<Evaluation>;

    /// Number of stacked inequality components.
    fn inequality_count(&self) -> usize {
        self.inequality_tolerance().len()
    }

    /// Number of stacked equality components.
    fn equality_count(&self) -> usize {
        self.equality_tolerance().len()
    }

    /// Whether the objective carries a preconditioner.
    fn is_preconditioned(&self) -> bool {
        false
    }

    /// Applies the objective preconditioner: `out = H(x) v`.
    ///
    /// Returns `Ok(false)` without touching `out` when there is none.
    fn precondition(&self, _x: &DVector, _v: &DVector, _out: &mut DVector) -> Result<bool> {
        Ok(false)
    }

    /// Applies the preconditioner of one stacked constraint component.
    fn precondition_constraint(
        &self,
        _kind: ConstraintKind,
        _component: usize,
        _x: &DVector,
        _v: &DVector,
        _out: &mut DVector,
    ) -> Result<bool> {
        Ok(false)
    }
}

fn stacked_tolerance(constraints: &[Constraint]) -> DVector {
    let values: Vec<f64> = constraints
        .iter()
        .flat_map(|c| c.tolerance().iter().copied())
        .collect();
    DVector::from_vec(values)
}

/// Oracle over a session's objective and constraints.
#[derive(Debug)]
pub struct ProblemOracle<'a> {
    objective: &'a dyn ObjectiveFunction,
    preconditioner: Option<&'a dyn Preconditioner>,
    sense: ObjectiveSense,
    bounds: &'a Bounds,
    inequality: &'a [Constraint],
    equality: &'a [Constraint],
    inequality_tolerance: DVector,
    equality_tolerance: DVector,
}

impl<'a> ProblemOracle<'a> {
    /// Creates an oracle for the given callbacks.
    pub fn new(
        objective: &'a dyn ObjectiveFunction,
        sense: ObjectiveSense,
        bounds: &'a Bounds,
        inequality: &'a [Constraint],
        equality: &'a [Constraint],
    ) -> Self {
        Self {
            objective,
            preconditioner: None,
            sense,
            bounds,
            inequality,
            equality,
            inequality_tolerance: stacked_tolerance(inequality),
            equality_tolerance: stacked_tolerance(equality),
        }
    }

    /// Attaches the objective preconditioner.
    pub fn with_preconditioner(mut self, preconditioner: Option<&'a dyn Preconditioner>) -> Self {
        self.preconditioner = preconditioner;
        self
    }

    fn evaluate_constraints(
        &self,
        constraints: &[Constraint],
        x: &DVector,
        derivatives: bool,
    ) -> Result<(DVector, Option<DMatrix>)> {
        let n = x.len();
        let total: usize = constraints.iter().map(Constraint::dimension).sum();
        let mut values = DVector::zeros(total);
        let mut jacobian = derivatives.then(|| DMatrix::zeros(total, n));
        let mut offset = 0;
        for constraint in constraints {
            let m = constraint.dimension();
            let mut out = DVector::zeros(m);
            let mut block = jacobian.as_ref().map(|_| DMatrix::zeros(m, n));
            constraint
                .function()
                .evaluate(x, &mut out, block.as_mut())
                .map_err(callback_error)?;
            values.rows_mut(offset, m).copy_from(&out);
            if let (Some(jac), Some(block)) = (jacobian.as_mut(), block) {
                jac.rows_mut(offset, m).copy_from(&block);
            }
            offset += m;
        }
        Ok((values, jacobian))
    }

    fn owner(constraints: &[Constraint], component: usize) -> Option<&Constraint> {
        let mut offset = 0;
        for constraint in constraints {
            if component < offset + constraint.dimension() {
                return Some(constraint);
            }
            offset += constraint.dimension();
        }
        None
    }
}

fn callback_error(err: OptimizerError) -> OptimizerError {
    match err {
        OptimizerError::Evaluation { .. } => err,
        other => OptimizerError::evaluation(other.to_string()),
    }
}

impl Oracle for ProblemOracle<'_> {
    fn dimension(&self) -> usize {
        self.bounds.dimension()
    }

    fn bounds(&self) -> &Bounds {
        self.bounds
    }

    fn provides_gradient(&self) -> bool {
        self.objective.provides_gradient()
            && self
                .inequality
                .iter()
                .chain(self.equality.iter())
                .all(Constraint::provides_jacobian)
    }

    fn inequality_tolerance(&self) -> &DVector {
        &self.inequality_tolerance
    }

    fn equality_tolerance(&self) -> &DVector {
        &self.equality_tolerance
    }

    fn evaluate(&mut self, x: &DVector, derivatives: bool) -> Result<Evaluation> {
        let sign = self.sense.sign();
        let mut gradient = derivatives.then(|| DVector::zeros(x.len()));
        let value = sign
            * self
                .objective
                .evaluate(x, gradient.as_mut())
                .map_err(callback_error)?;
        if let Some(g) = gradient.as_mut() {
            if sign < 0.0 {
                g.neg_mut();
            }
        }

        let (inequality, inequality_jacobian) =
            self.evaluate_constraints(self.inequality, x, derivatives)?;
        let (equality, equality_jacobian) =
            self.evaluate_constraints(self.equality, x, derivatives)?;

        let mut evaluation = Evaluation {
            point: x.clone(),
            value,
            gradient,
            inequality,
            equality,
            inequality_jacobian,
            equality_jacobian,
            violation: 0.0,
            feasible: true,
        };
        evaluation.assess(&self.inequality_tolerance, &self.equality_tolerance);
        Ok(evaluation)
    }

    fn is_preconditioned(&self) -> bool {
        self.preconditioner.is_some()
    }

    fn precondition(&self, x: &DVector, v: &DVector, out: &mut DVector) -> Result<bool> {
        let Some(preconditioner) = self.preconditioner else {
            return Ok(false);
        };
        preconditioner.apply(x, v, out).map_err(callback_error)?;
        if self.sense == ObjectiveSense::Maximize {
            out.neg_mut();
        }
        Ok(true)
    }

    fn precondition_constraint(
        &self,
        kind: ConstraintKind,
        component: usize,
        x: &DVector,
        v: &DVector,
        out: &mut DVector,
    ) -> Result<bool> {
        let constraints = match kind {
            ConstraintKind::Inequality => self.inequality,
            ConstraintKind::Equality => self.equality,
        };
        match Self::owner(constraints, component).and_then(Constraint::preconditioner) {
            Some(preconditioner) => {
                preconditioner.apply(x, v, out).map_err(callback_error)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Best point observed during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct BestPoint {
    /// The point.
    pub point: DVector,
    /// Objective value in minimization form.
    pub value: f64,
    /// Largest constraint violation.
    pub violation: f64,
    /// Whether the point satisfies every constraint within tolerance.
    pub feasible: bool,
}

impl BestPoint {
    fn from_evaluation(evaluation: &Evaluation) -> Self {
        Self {
            point: evaluation.point.clone(),
            value: evaluation.value,
            violation: evaluation.violation,
            feasible: evaluation.feasible,
        }
    }

    /// Returns true if `self` ranks strictly above `other`.
    pub fn improves_on(&self, other: &BestPoint) -> bool {
        match (self.feasible, other.feasible) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => self.value < other.value,
            (false, false) => {
                self.violation < other.violation
                    || (self.violation == other.violation && self.value < other.value)
            }
        }
    }
}

/// Oracle wrapper enforcing budgets and tracking the best point.
pub struct Monitor<'a> {
    inner: &'a mut dyn Oracle,
    controller: &'a StoppingController,
    evaluations: usize,
    best: Option<BestPoint>,
}

impl<'a> Monitor<'a> {
    /// Wraps `inner`, consulting `controller` before every evaluation.
    pub fn new(inner: &'a mut dyn Oracle, controller: &'a StoppingController) -> Self {
        Self {
            inner,
            controller,
            evaluations: 0,
            best: None,
        }
    }

    /// Number of evaluations performed through this monitor.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Best point so far.
    pub fn best(&self) -> Option<&BestPoint> {
        self.best.as_ref()
    }

    /// Objective value of the best point, if it is feasible.
    pub fn best_feasible_value(&self) -> Option<f64> {
        self.best.as_ref().filter(|b| b.feasible).map(|b| b.value)
    }

    /// Consumes the monitor, returning the best point.
    pub fn into_best(self) -> Option<BestPoint> {
        self.best
    }

    fn record(&mut self, evaluation: &Evaluation) {
        if !evaluation.is_valid() || !all_finite(&evaluation.point) {
            return;
        }
        let candidate = BestPoint::from_evaluation(evaluation);
        let replace = match &self.best {
            Some(best) => candidate.improves_on(best),
            None => true,
        };
        if replace {
            self.best = Some(candidate);
        }
    }
}

impl Oracle for Monitor<'_> {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn bounds(&self) -> &Bounds {
        self.inner.bounds()
    }

    fn provides_gradient(&self) -> bool {
        self.inner.provides_gradient()
    }

    fn inequality_tolerance(&self) -> &DVector {
        self.inner.inequality_tolerance()
    }

    fn equality_tolerance(&self) -> &DVector {
        self.inner.equality_tolerance()
    }

    fn evaluate(&mut self, x: &DVector, derivatives: bool) -> Result<Evaluation> {
        if self
            .controller
            .should_halt(self.evaluations, self.best_feasible_value())
        {
            return Err(OptimizerError::Halted);
        }
        self.evaluations += 1;
        let evaluation = self.inner.evaluate(x, derivatives)?;
        trace!(
            "evaluation {}: f = {:.6e}, violation = {:.3e}",
            self.evaluations,
            evaluation.value,
            evaluation.violation
        );
        self.record(&evaluation);
        Ok(evaluation)
    }

    fn is_preconditioned(&self) -> bool {
        self.inner.is_preconditioned()
    }

    fn precondition(&self, x: &DVector, v: &DVector, out: &mut DVector) -> Result<bool> {
        self.inner.precondition(x, v, out)
    }

    fn precondition_constraint(
        &self,
        kind: ConstraintKind,
        component: usize,
        x: &DVector,
        v: &DVector,
        out: &mut DVector,
    ) -> Result<bool> {
        self.inner
            .precondition_constraint(kind, component, x, v, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{FnObjective, ScalarConstraint};
    use crate::stopping::{ForceStop, StoppingCriteria};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn sum_objective() -> FnObjective<impl Fn(&DVector, Option<&mut DVector>) -> Result<f64>> {
        FnObjective::with_gradient(|x: &DVector, grad: Option<&mut DVector>| {
            if let Some(g) = grad {
                g.fill(1.0);
            }
            Ok(x.sum())
        })
    }

    #[test]
    fn test_maximize_negates() {
        let f = sum_objective();
        let bounds = Bounds::unbounded(2);
        let mut oracle = ProblemOracle::new(&f, ObjectiveSense::Maximize, &bounds, &[], &[]);
        let e = oracle
            .evaluate(&DVector::from_vec(vec![1.0, 2.0]), true)
            .unwrap();
        assert_relative_eq!(e.value, -3.0);
        assert_relative_eq!(e.gradient().unwrap()[0], -1.0);
        assert!(e.feasible);
    }

    #[test]
    fn test_constraint_stacking() {
        let f = sum_objective();
        let bounds = Bounds::unbounded(2);
        let c: Arc<dyn crate::function::ConstraintFunction> =
            Arc::new(ScalarConstraint::new(|x: &DVector, _| Ok(x[0] + x[1] - 1.0)));
        let ineq = vec![Constraint::new(c, &[1e-8]).unwrap()];
        let mut oracle = ProblemOracle::new(&f, ObjectiveSense::Minimize, &bounds, &ineq, &[]);
        assert!(!oracle.provides_gradient());
        assert_eq!(oracle.inequality_count(), 1);

        let e = oracle
            .evaluate(&DVector::from_vec(vec![1.0, 1.0]), false)
            .unwrap();
        assert!(!e.feasible);
        assert_relative_eq!(e.violation, 1.0);

        let e = oracle
            .evaluate(&DVector::from_vec(vec![0.25, 0.25]), false)
            .unwrap();
        assert!(e.feasible);
        assert_relative_eq!(e.violation, 0.0);
    }

    #[test]
    fn test_callback_error_mapped() {
        let f = FnObjective::new(|_: &DVector, _| Err(OptimizerError::failure("boom")));
        let bounds = Bounds::unbounded(1);
        let mut oracle = ProblemOracle::new(&f, ObjectiveSense::Minimize, &bounds, &[], &[]);
        let err = oracle.evaluate(&DVector::zeros(1), false).unwrap_err();
        assert!(matches!(err, OptimizerError::Evaluation { .. }));
    }

    #[test]
    fn test_monitor_budget_and_best() {
        let f = sum_objective();
        let bounds = Bounds::unbounded(1);
        let mut oracle = ProblemOracle::new(&f, ObjectiveSense::Minimize, &bounds, &[], &[]);
        let controller =
            StoppingController::new(StoppingCriteria::new().with_maxeval(3), ForceStop::new());
        let mut monitor = Monitor::new(&mut oracle, &controller);

        for v in [2.0, -1.0, 5.0] {
            monitor.evaluate(&DVector::from_vec(vec![v]), false).unwrap();
        }
        let err = monitor
            .evaluate(&DVector::from_vec(vec![-10.0]), false)
            .unwrap_err();
        assert_eq!(err, OptimizerError::Halted);
        assert_eq!(monitor.evaluations(), 3);
        assert_relative_eq!(monitor.best().unwrap().value, -1.0);
    }

    #[test]
    fn test_ranking() {
        let feasible = BestPoint {
            point: DVector::zeros(1),
            value: 10.0,
            violation: 0.0,
            feasible: true,
        };
        let infeasible = BestPoint {
            point: DVector::zeros(1),
            value: -10.0,
            violation: 0.5,
            feasible: false,
        };
        let less_infeasible = BestPoint {
            violation: 0.1,
            ..infeasible.clone()
        };
        assert!(feasible.improves_on(&infeasible));
        assert!(!infeasible.improves_on(&feasible));
        assert!(less_infeasible.improves_on(&infeasible));
    }

    #[test]
    fn test_nan_never_best() {
        let f = FnObjective::new(|x: &DVector, _| Ok(if x[0] > 0.0 { f64::NAN } else { x[0] }));
        let bounds = Bounds::unbounded(1);
        let mut oracle = ProblemOracle::new(&f, ObjectiveSense::Minimize, &bounds, &[], &[]);
        let controller = StoppingController::new(StoppingCriteria::new(), ForceStop::new());
        let mut monitor = Monitor::new(&mut oracle, &controller);
        monitor.evaluate(&DVector::from_vec(vec![1.0]), false).unwrap();
        assert!(monitor.best().is_none());
        monitor.evaluate(&DVector::from_vec(vec![-1.0]), false).unwrap();
        assert_relative_eq!(monitor.best().unwrap().value, -1.0);
    }
}
