//! Type definitions and aliases for nonlinear optimization.
//!
//! Every algorithm in the workspace works on dense `f64` vectors of a fixed
//! dimension N chosen when a session is created. This module provides the
//! vector and matrix aliases used throughout the library together with the
//! numerical constants the algorithms share.

/// Type alias for a dynamically-sized vector of reals.
pub type DVector = nalgebra::DVector<f64>;

/// Type alias for a dynamically-sized matrix of reals.
///
/// Constraint Jacobians are stored row-major in the mathematical sense:
/// row `i` holds the gradient of constraint component `i`.
pub type DMatrix = nalgebra::DMatrix<f64>;

/// Numerical constants shared by the algorithms.
pub mod constants {
    /// Machine epsilon.
    pub const EPSILON: f64 = f64::EPSILON;

    /// Sufficient decrease parameter c₁ of the Armijo condition.
    pub const ARMIJO_C1: f64 = 1e-4;

    /// Backtracking contraction factor.
    pub const BACKTRACK_FACTOR: f64 = 0.5;

    /// Maximum number of backtracking trials in one line search.
    pub const MAX_BACKTRACKS: usize = 40;

    /// Default history length of limited-memory quasi-Newton methods.
    pub const DEFAULT_VECTOR_STORAGE: usize = 10;

    /// Fraction of a finite bound range used as the default initial step.
    pub const DEFAULT_STEP_FRACTION: f64 = 0.25;

    /// Smallest step allowed by the default initial-step heuristic.
    pub const MIN_INITIAL_STEP: f64 = 1e-8;

    /// Default seed for per-session random generators.
    pub const DEFAULT_SEED: u64 = 0x5eed_0f_0971;
}

/// Euclidean norm of `a - b` without allocating.
pub fn distance(a: &DVector, b: &DVector) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Returns true if every component is finite.
pub fn all_finite(v: &DVector) -> bool {
    v.iter().all(|x| x.is_finite())
}
