//! Core traits and types for nonlinear constrained optimization.
//!
//! This crate provides the algorithm-independent parts of the optimizer: the
//! problem model, the evaluation layer, the stopping controller, the driver
//! loop and the result types. Concrete algorithms live in `optima-optim`;
//! the user-facing session lives in `optima`.
//!
//! # Key Concepts
//!
//! - **Problem**: an objective f: ℝᴺ → ℝ, box bounds, and vector-valued
//!   inequality (`c(x) ≤ tol`) and equality (`|h(x)| ≤ tol`) constraints
//! - **Oracle**: evaluates every function of the problem at a point, always
//!   in minimization form
//! - **Strategy**: one algorithm, advanced one iteration at a time
//! - **Stopping criteria**: target value, tolerances, budgets and force stop
//!
//! # Modules
//!
//! - [`algorithm`]: Algorithm selection, capabilities and the strategy trait
//! - [`bounds`]: Box constraints
//! - [`driver`]: The optimization loop
//! - [`error`]: Error types
//! - [`evaluator`]: Oracles, evaluation records and best-point tracking
//! - [`function`]: Objective and constraint interfaces
//! - [`preconditioner`]: Approximate Hessian-vector products
//! - [`result`]: Termination status and run result
//! - [`stopping`]: Stopping criteria and the force-stop flag
//! - [`types`]: Type aliases and numerical constants

pub mod algorithm;
pub mod bounds;
pub mod driver;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod preconditioner;
pub mod result;
pub mod stopping;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used items at the crate root
pub use error::{OptimizerError, Result};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use optima_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algorithm::{
        Algorithm, Capabilities, Iterate, LocalConfig, ProblemShape, StepReport, Strategy,
        StrategyConfig,
    };
    pub use crate::bounds::Bounds;
    pub use crate::driver::{drive, Outcome};
    pub use crate::error::{OptimizerError, Result};
    pub use crate::evaluator::{
        BestPoint, ConstraintKind, Evaluation, Monitor, ObjectiveSense, Oracle, ProblemOracle,
    };
    pub use crate::function::{
        Constraint, ConstraintFunction, FnObjective, ObjectiveFunction, QuadraticObjective,
        ScalarConstraint, VectorConstraint,
    };
    pub use crate::preconditioner::{
        DiagonalPreconditioner, FnPreconditioner, IdentityPreconditioner, Preconditioner,
    };
    pub use crate::result::{OptimizationResult, Status};
    pub use crate::stopping::{ForceStop, StoppingController, StoppingCriteria};
    pub use crate::types::{constants, DMatrix, DVector};
}
