//! Test problems and helpers shared by the workspace's test suites.
//!
//! Available with the `test-utils` feature.

use crate::{
    algorithm::Strategy,
    bounds::Bounds,
    driver::{drive, Outcome},
    error::Result,
    evaluator::{ObjectiveSense, ProblemOracle},
    function::{
        Constraint, ConstraintFunction, FnObjective, ObjectiveFunction, QuadraticObjective,
        ScalarConstraint,
    },
    stopping::{ForceStop, StoppingCriteria},
    types::DVector,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// f(x) = ‖x‖² with gradient.
pub fn sphere() -> impl ObjectiveFunction {
    FnObjective::with_gradient(|x: &DVector, grad: Option<&mut DVector>| {
        if let Some(g) = grad {
            g.copy_from(&(x * 2.0));
        }
        Ok(x.norm_squared())
    })
}

/// f(x) = ‖x − center‖² with gradient.
pub fn shifted_sphere(center: &[f64]) -> QuadraticObjective {
    QuadraticObjective::shifted_sphere(&DVector::from_column_slice(center))
}

/// N-dimensional Rosenbrock function with gradient, minimum 0 at (1, …, 1).
pub fn rosenbrock() -> impl ObjectiveFunction {
    FnObjective::with_gradient(|x: &DVector, grad: Option<&mut DVector>| {
        let n = x.len();
        let mut value = 0.0;
        for i in 0..n.saturating_sub(1) {
            let a = x[i + 1] - x[i] * x[i];
            let b = 1.0 - x[i];
            value += 100.0 * a * a + b * b;
        }
        if let Some(g) = grad {
            g.fill(0.0);
            for i in 0..n.saturating_sub(1) {
                let a = x[i + 1] - x[i] * x[i];
                g[i] += -400.0 * x[i] * a - 2.0 * (1.0 - x[i]);
                g[i + 1] += 200.0 * a;
            }
        }
        Ok(value)
    })
}

/// Rastrigin function (derivative-free), global minimum 0 at the origin.
pub fn rastrigin() -> impl ObjectiveFunction {
    FnObjective::new(|x: &DVector, _| {
        let two_pi = 2.0 * std::f64::consts::PI;
        Ok(10.0 * x.len() as f64
            + x.iter()
                .map(|xi| xi * xi - 10.0 * (two_pi * xi).cos())
                .sum::<f64>())
    })
}

/// Scalar linear constraint `a·x − b` with gradient.
pub fn linear_constraint(a: &[f64], b: f64) -> Arc<dyn ConstraintFunction> {
    let a = DVector::from_column_slice(a);
    Arc::new(ScalarConstraint::with_gradient(
        move |x: &DVector, grad: Option<&mut DVector>| {
            if let Some(g) = grad {
                g.copy_from(&a);
            }
            Ok(a.dot(x) - b)
        },
    ))
}

/// Wraps a constraint function with a tolerance of 1e-8 per component.
pub fn constraint(function: Arc<dyn ConstraintFunction>) -> Result<Constraint> {
    let tolerance = vec![1e-8; function.dimension()];
    Constraint::new(function, &tolerance)
}

/// Objective wrapper counting its invocations.
#[derive(Debug)]
pub struct CountingObjective<F> {
    inner: F,
    calls: Arc<AtomicUsize>,
}

impl<F: ObjectiveFunction> CountingObjective<F> {
    /// Wraps `inner`; the returned counter observes every call.
    pub fn new(inner: F) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl<F: ObjectiveFunction> ObjectiveFunction for CountingObjective<F> {
    fn evaluate(&self, x: &DVector, gradient: Option<&mut DVector>) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.evaluate(x, gradient)
    }

    fn provides_gradient(&self) -> bool {
        self.inner.provides_gradient()
    }
}

/// Box `[lower, upper]^n`.
pub fn box_bounds(n: usize, lower: f64, upper: f64) -> Bounds {
    Bounds::new(
        DVector::from_element(n, lower),
        DVector::from_element(n, upper),
    )
    .unwrap_or_else(|_| Bounds::unbounded(n))
}

/// Minimizes `f` with `strategy` and no constraints.
pub fn minimize(
    strategy: &mut dyn Strategy,
    f: &dyn ObjectiveFunction,
    bounds: &Bounds,
    x0: &[f64],
    criteria: StoppingCriteria,
) -> Result<Outcome> {
    minimize_constrained(strategy, f, bounds, &[], &[], x0, criteria)
}

/// Minimizes `f` with `strategy` subject to constraints.
pub fn minimize_constrained(
    strategy: &mut dyn Strategy,
    f: &dyn ObjectiveFunction,
    bounds: &Bounds,
    inequality: &[Constraint],
    equality: &[Constraint],
    x0: &[f64],
    criteria: StoppingCriteria,
) -> Result<Outcome> {
    let mut oracle =
        ProblemOracle::new(f, ObjectiveSense::Minimize, bounds, inequality, equality);
    drive(
        strategy,
        &mut oracle,
        &DVector::from_column_slice(x0),
        criteria,
        &ForceStop::new(),
    )
}
