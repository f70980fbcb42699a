//! Objective and constraint interfaces.
//!
//! This module provides the traits user callbacks implement, closure
//! adapters for the common cases, and the [`Constraint`] record a session
//! stores for every inequality or equality constraint.
//!
//! # Conventions
//!
//! - Objectives follow the classical `f(x, grad)` calling convention: the
//!   gradient slot is `Some` only when the algorithm needs derivatives, and
//!   the callback must fill every component when it is.
//! - Constraints are vector-valued `c: ℝᴺ → ℝᴹ` (M = 1 for scalar
//!   constraints). Inequalities are satisfied when `c(x) ≤ tol`, equalities
//!   when `|c(x)| ≤ tol`, componentwise.
//! - Callbacks report failure by returning `Err`; the run is aborted and
//!   reported with a `Failure` status.

use crate::{
    error::{OptimizerError, Result},
    preconditioner::Preconditioner,
    types::{DMatrix, DVector},
};
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Objective function f: ℝᴺ → ℝ with an optional gradient.
pub trait ObjectiveFunction: Debug {
    /// Evaluates the objective at `x`.
    ///
    /// When `gradient` is `Some`, the callback must also write ∇f(x) into it.
    fn evaluate(&self, x: &DVector, gradient: Option<&mut DVector>) -> Result<f64>;

    /// Whether the callback can fill the gradient slot.
    fn provides_gradient(&self) -> bool {
        false
    }
}

/// Vector-valued constraint function c: ℝᴺ → ℝᴹ with an optional Jacobian.
pub trait ConstraintFunction: Debug {
    /// Number of components M.
    fn dimension(&self) -> usize;

    /// Evaluates the constraint at `x`, writing M values into `result`.
    ///
    /// When `jacobian` is `Some`, it is an M×N matrix whose row `i` must
    /// receive ∇cᵢ(x).
    fn evaluate(
        &self,
        x: &DVector,
        result: &mut DVector,
        jacobian: Option<&mut DMatrix>,
    ) -> Result<()>;

    /// Whether the callback can fill the Jacobian slot.
    fn provides_jacobian(&self) -> bool {
        false
    }
}

/// Closure-backed objective.
///
/// ```
/// use optima_core::function::{FnObjective, ObjectiveFunction};
/// use optima_core::types::DVector;
///
/// let f = FnObjective::with_gradient(|x: &DVector, grad: Option<&mut DVector>| {
///     if let Some(g) = grad {
///         g.copy_from(&(x * 2.0));
///     }
///     Ok(x.norm_squared())
/// });
/// assert!(f.provides_gradient());
/// ```
pub struct FnObjective<F> {
    f: F,
    gradient: bool,
}

impl<F> FnObjective<F>
where
    F: Fn(&DVector, Option<&mut DVector>) -> Result<f64>,
{
    /// Wraps a derivative-free objective. The gradient slot is always `None`.
    pub fn new(f: F) -> Self {
        Self { f, gradient: false }
    }

    /// Wraps an objective that fills the gradient slot on request.
    pub fn with_gradient(f: F) -> Self {
        Self { f, gradient: true }
    }
}

impl<F> Debug for FnObjective<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObjective")
            .field("gradient", &self.gradient)
            .finish_non_exhaustive()
    }
}

impl<F> ObjectiveFunction for FnObjective<F>
where
    F: Fn(&DVector, Option<&mut DVector>) -> Result<f64>,
{
    fn evaluate(&self, x: &DVector, gradient: Option<&mut DVector>) -> Result<f64> {
        if self.gradient {
            (self.f)(x, gradient)
        } else {
            (self.f)(x, None)
        }
    }

    fn provides_gradient(&self) -> bool {
        self.gradient
    }
}

/// Closure-backed scalar constraint (M = 1).
pub struct ScalarConstraint<F> {
    f: F,
    gradient: bool,
}

impl<F> ScalarConstraint<F>
where
    F: Fn(&DVector, Option<&mut DVector>) -> Result<f64>,
{
    /// Wraps a derivative-free scalar constraint.
    pub fn new(f: F) -> Self {
        Self { f, gradient: false }
    }

    /// Wraps a scalar constraint that fills its gradient on request.
    pub fn with_gradient(f: F) -> Self {
        Self { f, gradient: true }
    }
}

impl<F> Debug for ScalarConstraint<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarConstraint")
            .field("gradient", &self.gradient)
            .finish_non_exhaustive()
    }
}

impl<F> ConstraintFunction for ScalarConstraint<F>
where
    F: Fn(&DVector, Option<&mut DVector>) -> Result<f64>,
{
    fn dimension(&self) -> usize {
        1
    }

    fn evaluate(
        &self,
        x: &DVector,
        result: &mut DVector,
        jacobian: Option<&mut DMatrix>,
    ) -> Result<()> {
        match jacobian {
            Some(jac) if self.gradient => {
                let mut grad = DVector::zeros(x.len());
                result[0] = (self.f)(x, Some(&mut grad))?;
                jac.row_mut(0).copy_from(&grad.transpose());
            }
            _ => result[0] = (self.f)(x, None)?,
        }
        Ok(())
    }

    fn provides_jacobian(&self) -> bool {
        self.gradient
    }
}

/// Closure-backed vector-valued constraint (M ≥ 1).
pub struct VectorConstraint<F> {
    f: F,
    dimension: usize,
    jacobian: bool,
}

impl<F> VectorConstraint<F>
where
    F: Fn(&DVector, &mut DVector, Option<&mut DMatrix>) -> Result<()>,
{
    /// Wraps a derivative-free M-component constraint.
    pub fn new(dimension: usize, f: F) -> Self {
        Self {
            f,
            dimension,
            jacobian: false,
        }
    }

    /// Wraps an M-component constraint that fills its Jacobian on request.
    pub fn with_jacobian(dimension: usize, f: F) -> Self {
        Self {
            f,
            dimension,
            jacobian: true,
        }
    }
}

impl<F> Debug for VectorConstraint<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorConstraint")
            .field("dimension", &self.dimension)
            .field("jacobian", &self.jacobian)
            .finish_non_exhaustive()
    }
}

impl<F> ConstraintFunction for VectorConstraint<F>
where
    F: Fn(&DVector, &mut DVector, Option<&mut DMatrix>) -> Result<()>,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn evaluate(
        &self,
        x: &DVector,
        result: &mut DVector,
        jacobian: Option<&mut DMatrix>,
    ) -> Result<()> {
        if self.jacobian {
            (self.f)(x, result, jacobian)
        } else {
            (self.f)(x, result, None)
        }
    }

    fn provides_jacobian(&self) -> bool {
        self.jacobian
    }
}

/// A constraint attached to a session.
///
/// Callback references are shared (`Arc`) so that copying a session shares
/// the callbacks instead of duplicating them.
#[derive(Debug, Clone)]
pub struct Constraint {
    function: Arc<dyn ConstraintFunction>,
    tolerance: DVector,
    preconditioner: Option<Arc<dyn Preconditioner>>,
}

impl Constraint {
    /// Creates a constraint with one tolerance per component.
    pub fn new(function: Arc<dyn ConstraintFunction>, tolerance: &[f64]) -> Result<Self> {
        let m = function.dimension();
        if m == 0 {
            return Err(OptimizerError::invalid_argument(
                "constraint must have at least one component",
            ));
        }
        if tolerance.len() != m {
            return Err(OptimizerError::dimension_mismatch(
                "constraint tolerance",
                m,
                tolerance.len(),
            ));
        }
        if tolerance.iter().any(|t| t.is_nan() || *t < 0.0) {
            return Err(OptimizerError::invalid_argument(
                "constraint tolerances must be non-negative",
            ));
        }
        Ok(Self {
            function,
            tolerance: DVector::from_column_slice(tolerance),
            preconditioner: None,
        })
    }

    /// Attaches a preconditioner (approximate Hessian of the constraint).
    pub fn with_preconditioner(mut self, preconditioner: Arc<dyn Preconditioner>) -> Self {
        self.preconditioner = Some(preconditioner);
        self
    }

    /// Number of components M.
    pub fn dimension(&self) -> usize {
        self.function.dimension()
    }

    /// Per-component tolerance.
    pub fn tolerance(&self) -> &DVector {
        &self.tolerance
    }

    /// The wrapped callback.
    pub fn function(&self) -> &Arc<dyn ConstraintFunction> {
        &self.function
    }

    /// The attached preconditioner, if any.
    pub fn preconditioner(&self) -> Option<&Arc<dyn Preconditioner>> {
        self.preconditioner.as_ref()
    }

    /// Whether a preconditioner is attached.
    pub fn is_preconditioned(&self) -> bool {
        self.preconditioner.is_some()
    }

    /// Whether the callback can compute its Jacobian.
    pub fn provides_jacobian(&self) -> bool {
        self.function.provides_jacobian()
    }
}

/// A simple quadratic objective for testing and benchmarking.
///
/// Computes f(x) = 0.5 * xᵀ A x + bᵀ x + c.
#[derive(Debug, Clone)]
pub struct QuadraticObjective {
    /// The quadratic form matrix (should be symmetric)
    pub a: DMatrix,
    /// The linear term
    pub b: DVector,
    /// The constant term
    pub c: f64,
}

impl QuadraticObjective {
    /// Creates a new quadratic objective.
    pub fn new(a: DMatrix, b: DVector, c: f64) -> Self {
        Self { a, b, c }
    }

    /// f(x) = ‖x − center‖², minimized at `center` with value 0.
    pub fn shifted_sphere(center: &DVector) -> Self {
        let n = center.len();
        Self {
            a: DMatrix::identity(n, n) * 2.0,
            b: center * -2.0,
            c: center.norm_squared(),
        }
    }
}

impl ObjectiveFunction for QuadraticObjective {
    fn evaluate(&self, x: &DVector, gradient: Option<&mut DVector>) -> Result<f64> {
        let ax = &self.a * x;
        if let Some(g) = gradient {
            g.copy_from(&(&ax + &self.b));
        }
        Ok(0.5 * x.dot(&ax) + self.b.dot(x) + self.c)
    }

    fn provides_gradient(&self) -> bool {
        true
    }
}
