//! Algorithm selection, capabilities and the strategy interface.
//!
//! The set of algorithms is closed: an [`Algorithm`] is chosen when a session
//! is created and never changes. Each algorithm declares its
//! [`Capabilities`], which are checked against the configured problem before
//! any evaluation happens.
//!
//! Algorithms are implemented as [`Strategy`] values driven by
//! [`crate::driver::drive`]. A strategy evaluates its starting state in
//! `initialize`, then performs one iteration per `step`. Each call returns a
//! [`StepReport`] describing how the iterate moved, which the stopping
//! controller uses for the objective and point tolerance tests.

use crate::{
    error::{OptimizerError, Result},
    evaluator::Oracle,
    stopping::StoppingCriteria,
    types::DVector,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Optimization algorithms.
///
/// The prefix of the code follows the usual convention: `G`/`L` for global
/// or local search, `N`/`D` for derivative-free or derivative-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Algorithm {
    /// Projected limited-memory BFGS.
    LdLbfgs,
    /// Preconditioned projected steepest descent.
    LdSteepestDescent,
    /// Nelder-Mead simplex with bound projection.
    LnNelderMead,
    /// Compass (coordinate pattern) search.
    LnCompass,
    /// Controlled random search with local mutation.
    GnCrs2Lm,
    /// Improved stochastic ranking evolution strategy.
    GnIsres,
    /// Multi-level single-linkage with a nested local optimizer.
    GMlsl,
    /// Augmented Lagrangian for inequality and equality constraints.
    Auglag,
    /// Augmented Lagrangian for equality constraints only; inequalities are
    /// handed to the local optimizer.
    AuglagEq,
}

/// What an algorithm can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Requires objective gradients and constraint Jacobians.
    pub gradient_based: bool,
    /// Never requests derivatives.
    pub derivative_free: bool,
    /// Handles inequality constraints.
    pub supports_inequality: bool,
    /// Handles equality constraints.
    pub supports_equality: bool,
    /// Handles box constraints.
    pub supports_bounds: bool,
    /// Maintains a population of points.
    pub population_based: bool,
    /// Requires every bound to be finite.
    pub requires_finite_bounds: bool,
    /// Delegates to a nested local optimizer.
    pub nested_local: bool,
}

/// Shape of a configured problem, for capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProblemShape {
    /// Problem dimension.
    pub dimension: usize,
    /// The objective provides gradients.
    pub objective_gradient: bool,
    /// Every constraint provides its Jacobian.
    pub constraint_jacobians: bool,
    /// Number of stacked inequality components.
    pub inequality: usize,
    /// Number of stacked equality components.
    pub equality: usize,
    /// Every bound is finite.
    pub finite_bounds: bool,
}

impl ProblemShape {
    /// Whether derivatives of every function in the problem are available.
    pub fn has_derivatives(&self) -> bool {
        self.objective_gradient
            && (self.inequality + self.equality == 0 || self.constraint_jacobians)
    }
}

impl Algorithm {
    /// Every algorithm.
    pub const ALL: [Algorithm; 9] = [
        Algorithm::LdLbfgs,
        Algorithm::LdSteepestDescent,
        Algorithm::LnNelderMead,
        Algorithm::LnCompass,
        Algorithm::GnCrs2Lm,
        Algorithm::GnIsres,
        Algorithm::GMlsl,
        Algorithm::Auglag,
        Algorithm::AuglagEq,
    ];

    /// Stable identifier, e.g. `"LD_LBFGS"`.
    pub fn code(self) -> &'static str {
        match self {
            Self::LdLbfgs => "LD_LBFGS",
            Self::LdSteepestDescent => "LD_STEEPEST_DESCENT",
            Self::LnNelderMead => "LN_NELDERMEAD",
            Self::LnCompass => "LN_COMPASS",
            Self::GnCrs2Lm => "GN_CRS2_LM",
            Self::GnIsres => "GN_ISRES",
            Self::GMlsl => "G_MLSL",
            Self::Auglag => "AUGLAG",
            Self::AuglagEq => "AUGLAG_EQ",
        }
    }

    /// Human-readable description.
    pub fn name(self) -> &'static str {
        match self {
            Self::LdLbfgs => "Limited-memory BFGS (L-BFGS) (local, derivative-based)",
            Self::LdSteepestDescent => {
                "Preconditioned steepest descent (local, derivative-based)"
            }
            Self::LnNelderMead => "Nelder-Mead simplex algorithm (local, no-derivative)",
            Self::LnCompass => "Compass pattern search (local, no-derivative)",
            Self::GnCrs2Lm => {
                "Controlled random search (CRS2) with local mutation (global, no-derivative)"
            }
            Self::GnIsres => {
                "ISRES evolutionary constrained optimization (global, no-derivative)"
            }
            Self::GMlsl => "Multi-level single-linkage (MLSL), random (global, needs sub-algorithm)",
            Self::Auglag => "Augmented Lagrangian method (needs sub-algorithm)",
            Self::AuglagEq => {
                "Augmented Lagrangian method for equality constraints (needs sub-algorithm)"
            }
        }
    }

    /// Declared capabilities.
    pub fn capabilities(self) -> Capabilities {
        let local_gradient = Capabilities {
            gradient_based: true,
            supports_bounds: true,
            ..Capabilities::default()
        };
        let local_free = Capabilities {
            derivative_free: true,
            supports_bounds: true,
            ..Capabilities::default()
        };
        match self {
            Self::LdLbfgs | Self::LdSteepestDescent => local_gradient,
            Self::LnNelderMead | Self::LnCompass => local_free,
            Self::GnCrs2Lm => Capabilities {
                population_based: true,
                requires_finite_bounds: true,
                ..local_free
            },
            Self::GnIsres => Capabilities {
                supports_inequality: true,
                supports_equality: true,
                population_based: true,
                requires_finite_bounds: true,
                ..local_free
            },
            Self::GMlsl => Capabilities {
                supports_bounds: true,
                population_based: true,
                requires_finite_bounds: true,
                nested_local: true,
                ..Capabilities::default()
            },
            Self::Auglag | Self::AuglagEq => Capabilities {
                supports_bounds: true,
                supports_inequality: true,
                supports_equality: true,
                nested_local: true,
                ..Capabilities::default()
            },
        }
    }

    /// Checks the algorithm against a problem.
    ///
    /// Capability mismatches yield `UnsupportedOperation`; infinite bounds on
    /// an algorithm that samples the box yield `InvalidArgument`.
    pub fn check(self, shape: &ProblemShape) -> Result<()> {
        let caps = self.capabilities();
        if caps.gradient_based && !shape.has_derivatives() {
            return Err(OptimizerError::unsupported(format!(
                "{} requires gradients of the objective and every constraint",
                self.code()
            )));
        }
        if shape.inequality > 0 && !caps.supports_inequality {
            return Err(OptimizerError::unsupported(format!(
                "{} does not support inequality constraints",
                self.code()
            )));
        }
        if shape.equality > 0 && !caps.supports_equality {
            return Err(OptimizerError::unsupported(format!(
                "{} does not support equality constraints",
                self.code()
            )));
        }
        if caps.requires_finite_bounds && !shape.finite_bounds {
            return Err(OptimizerError::invalid_argument(format!(
                "{} requires finite lower and upper bounds",
                self.code()
            )));
        }
        Ok(())
    }

    /// The problem a nested local optimizer sees, or `None` for algorithms
    /// without one.
    pub fn local_shape(self, shape: &ProblemShape) -> Option<ProblemShape> {
        match self {
            Self::GMlsl => Some(*shape),
            Self::Auglag => Some(ProblemShape {
                objective_gradient: shape.has_derivatives(),
                inequality: 0,
                equality: 0,
                ..*shape
            }),
            Self::AuglagEq => Some(ProblemShape {
                objective_gradient: shape.has_derivatives(),
                equality: 0,
                ..*shape
            }),
            _ => None,
        }
    }

    /// Default local optimizer for nested algorithms.
    ///
    /// Subproblems that keep constraints get ISRES, which requires finite
    /// bounds; the caller checks the choice against the shape.
    pub fn default_local(shape: &ProblemShape) -> Algorithm {
        if shape.inequality + shape.equality > 0 {
            Self::GnIsres
        } else if shape.has_derivatives() {
            Self::LdLbfgs
        } else {
            Self::LnNelderMead
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Algorithm {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|a| a.code() == normalized)
            .ok_or_else(|| OptimizerError::invalid_argument(format!("unknown algorithm '{s}'")))
    }
}

/// A point with its objective value.
#[derive(Debug, Clone, PartialEq)]
pub struct Iterate {
    /// The point.
    pub point: DVector,
    /// Objective value in minimization form.
    pub value: f64,
}

impl Iterate {
    /// Creates an iterate.
    pub fn new(point: DVector, value: f64) -> Self {
        Self { point, value }
    }
}

/// What happened during `initialize` or one `step`.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    comparison: Option<(Iterate, Iterate)>,
    stationary: bool,
    stalled: bool,
}

impl StepReport {
    /// Nothing comparable happened (e.g. after initialization).
    pub fn idle() -> Self {
        Self::default()
    }

    /// The iterate moved from `previous` to `current`.
    pub fn moved(previous: Iterate, current: Iterate) -> Self {
        Self {
            comparison: Some((previous, current)),
            stationary: false,
            stalled: false,
        }
    }

    /// No representable step improves on `at`.
    ///
    /// The tolerance tests see a zero move; if none of them holds the run
    /// ends with `RoundoffLimited`.
    pub fn stalled(at: Iterate) -> Self {
        Self {
            comparison: Some((at.clone(), at)),
            stationary: false,
            stalled: true,
        }
    }

    /// Marks the report as an algorithm-detected stationary point.
    pub fn stationary(mut self) -> Self {
        self.stationary = true;
        self
    }

    /// The pair compared by the tolerance tests.
    pub fn comparison(&self) -> Option<(&Iterate, &Iterate)> {
        self.comparison.as_ref().map(|(a, b)| (a, b))
    }

    /// Whether the algorithm detected convergence on its own.
    pub fn is_stationary(&self) -> bool {
        self.stationary
    }

    /// Whether the algorithm could not make progress.
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }
}

/// One optimization algorithm.
///
/// Strategies hold their own state between calls and never evaluate the
/// problem except through the oracle they are given.
pub trait Strategy {
    /// Algorithm name, for logging.
    fn name(&self) -> &str;

    /// Evaluates the starting state (a point, a simplex, a population).
    fn initialize(&mut self, oracle: &mut dyn Oracle, x0: &DVector) -> Result<StepReport>;

    /// Performs one iteration.
    fn step(&mut self, oracle: &mut dyn Oracle) -> Result<StepReport>;
}

/// Algorithm parameters beyond the stopping criteria.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    /// Selected algorithm.
    pub algorithm: Algorithm,
    /// Population size (0 = algorithm default).
    pub population: usize,
    /// Quasi-Newton memory (0 = default).
    pub vector_storage: usize,
    /// Initial step for derivative-free methods (`None` = heuristic).
    pub initial_step: Option<DVector>,
    /// Seed of the random generator.
    pub seed: u64,
    /// Nested local optimizer.
    pub local: Option<Box<LocalConfig>>,
}

impl StrategyConfig {
    /// Configuration with every parameter at its default.
    pub fn new(algorithm: Algorithm, seed: u64) -> Self {
        Self {
            algorithm,
            population: 0,
            vector_storage: 0,
            initial_step: None,
            seed,
            local: None,
        }
    }
}

/// Configuration of a nested local optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalConfig {
    /// Local algorithm parameters.
    pub strategy: StrategyConfig,
    /// Local stopping criteria, in minimization form.
    pub criteria: StoppingCriteria,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(gradient: bool, inequality: usize, equality: usize, finite: bool) -> ProblemShape {
        ProblemShape {
            dimension: 2,
            objective_gradient: gradient,
            constraint_jacobians: gradient,
            inequality,
            equality,
            finite_bounds: finite,
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!("LD_LBFGS".parse::<Algorithm>().unwrap(), Algorithm::LdLbfgs);
        assert_eq!(" gn_isres".parse::<Algorithm>().unwrap(), Algorithm::GnIsres);
        assert!("LD_FOO".parse::<Algorithm>().is_err());
        for a in Algorithm::ALL {
            assert_eq!(a.code().parse::<Algorithm>().unwrap(), a);
            assert!(!a.name().is_empty());
        }
    }

    #[test]
    fn test_gradient_requirement() {
        let err = Algorithm::LdLbfgs.check(&shape(false, 0, 0, false)).unwrap_err();
        assert!(matches!(err, OptimizerError::UnsupportedOperation { .. }));
        assert!(Algorithm::LnNelderMead.check(&shape(false, 0, 0, false)).is_ok());
    }

    #[test]
    fn test_constraint_support() {
        let err = Algorithm::LnNelderMead.check(&shape(false, 0, 1, false)).unwrap_err();
        assert!(matches!(err, OptimizerError::UnsupportedOperation { .. }));
        assert!(Algorithm::GnIsres.check(&shape(false, 1, 1, true)).is_ok());
        assert!(Algorithm::Auglag.check(&shape(false, 1, 1, false)).is_ok());
    }

    #[test]
    fn test_finite_bounds_required() {
        let err = Algorithm::GnCrs2Lm.check(&shape(false, 0, 0, false)).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidArgument { .. }));
    }

    #[test]
    fn test_local_shape() {
        let s = shape(true, 2, 1, false);
        let local = Algorithm::AuglagEq.local_shape(&s).unwrap();
        assert_eq!(local.inequality, 2);
        assert_eq!(local.equality, 0);
        assert!(Algorithm::LdLbfgs.local_shape(&s).is_none());
        assert_eq!(Algorithm::default_local(&local), Algorithm::GnIsres);
        let local = Algorithm::Auglag.local_shape(&s).unwrap();
        assert_eq!(Algorithm::default_local(&local), Algorithm::LdLbfgs);
        assert_eq!(
            Algorithm::default_local(&shape(false, 0, 0, true)),
            Algorithm::LnNelderMead
        );
    }

    #[test]
    fn test_capability_flags() {
        assert!(Algorithm::GnIsres.capabilities().population_based);
        assert!(Algorithm::GMlsl.capabilities().nested_local);
        assert!(Algorithm::LdLbfgs.capabilities().gradient_based);
        assert!(Algorithm::LnCompass.capabilities().derivative_free);
    }
}
