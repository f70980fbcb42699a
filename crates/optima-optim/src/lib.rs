//! Optima Optimization - concrete optimization algorithms.
//!
//! This crate implements every [`Algorithm`] as a [`Strategy`] that the
//! driver loop in `optima-core` advances one iteration at a time.
//!
//! # Available Algorithms
//!
//! - **L-BFGS**: projected limited-memory quasi-Newton (gradient-based)
//! - **Steepest Descent**: preconditioned projected gradient descent
//! - **Nelder-Mead**: simplex direct search (derivative-free)
//! - **Compass**: coordinate pattern search (derivative-free)
//! - **CRS2-LM**: controlled random search with local mutation (global)
//! - **ISRES**: evolution strategy with stochastic ranking (global,
//!   constrained)
//! - **MLSL**: multi-level single-linkage around a nested local optimizer
//! - **AUGLAG / AUGLAG_EQ**: augmented Lagrangian around a nested local
//!   optimizer
//!
//! # Examples
//!
//! ```rust
//! use optima_core::prelude::*;
//! use optima_optim::build_strategy;
//!
//! let f = FnObjective::new(|x: &DVector, _| Ok((x[0] - 1.0).powi(2)));
//! let bounds = Bounds::unbounded(1);
//! let mut oracle = ProblemOracle::new(&f, ObjectiveSense::Minimize, &bounds, &[], &[]);
//! let force = ForceStop::new();
//! let mut strategy = build_strategy(&StrategyConfig::new(Algorithm::LnNelderMead, 0), &force)?;
//!
//! let outcome = drive(
//!     strategy.as_mut(),
//!     &mut oracle,
//!     &DVector::zeros(1),
//!     StoppingCriteria::new().with_xtol_rel(1e-8),
//!     &force,
//! )?;
//! assert!(outcome.status.is_success());
//! # Ok::<(), OptimizerError>(())
//! ```

pub mod auglag;
pub mod compass;
pub mod crs;
pub mod isres;
pub mod lbfgs;
pub mod line_search;
pub mod mlsl;
pub mod nelder_mead;
pub mod projection;
pub mod sampling;
pub mod steepest_descent;

mod nested;

// Re-export main optimizers for convenience
pub use auglag::{Auglag, AuglagConfig};
pub use compass::Compass;
pub use crs::{Crs, CrsConfig};
pub use isres::{Isres, IsresConfig};
pub use lbfgs::{Lbfgs, LbfgsConfig};
pub use line_search::{LineSearchParams, ProjectedBacktracking};
pub use mlsl::{Mlsl, MlslConfig};
pub use nelder_mead::{NelderMead, NelderMeadConfig};
pub use steepest_descent::{SteepestDescent, SteepestDescentConfig};

use optima_core::{
    algorithm::{Algorithm, LocalConfig, Strategy, StrategyConfig},
    error::{OptimizerError, Result},
    stopping::ForceStop,
};

fn local_config(config: &StrategyConfig) -> Result<LocalConfig> {
    config
        .local
        .as_deref()
        .cloned()
        .ok_or_else(|| {
            OptimizerError::invalid_argument(format!(
                "{} requires a local optimizer",
                config.algorithm.code()
            ))
        })
}

/// Checks the parameters of `config` and of its nested local optimizer for a
/// problem of the given dimension, without evaluating anything.
///
/// The same checks run again when a strategy initializes; calling this first
/// reports a bad local configuration before the parent has spent any
/// evaluation.
pub fn validate_strategy(config: &StrategyConfig, dimension: usize) -> Result<()> {
    match config.algorithm {
        Algorithm::GnCrs2Lm => {
            CrsConfig::new(config.seed)
                .with_population(config.population)
                .population_for(dimension)?;
        }
        Algorithm::GnIsres => {
            IsresConfig::new(config.seed)
                .with_population(config.population)
                .sizes(dimension)?;
        }
        Algorithm::GMlsl | Algorithm::Auglag | Algorithm::AuglagEq => {
            validate_strategy(&local_config(config)?.strategy, dimension)?;
        }
        Algorithm::LdLbfgs
        | Algorithm::LdSteepestDescent
        | Algorithm::LnNelderMead
        | Algorithm::LnCompass => {}
    }
    if let Some(step) = &config.initial_step {
        if step.len() != dimension {
            return Err(OptimizerError::invalid_argument(format!(
                "initial step has {} components, expected {dimension}",
                step.len()
            )));
        }
    }
    Ok(())
}

/// Builds the strategy selected by `config`.
///
/// Nested algorithms require `config.local`; their local runs observe
/// `force_stop`.
pub fn build_strategy(config: &StrategyConfig, force_stop: &ForceStop) -> Result<Box<dyn Strategy>> {
    let strategy: Box<dyn Strategy> = match config.algorithm {
        Algorithm::LdLbfgs => Box::new(Lbfgs::new(
            LbfgsConfig::new().with_memory_size(config.vector_storage),
        )),
        Algorithm::LdSteepestDescent => {
            Box::new(SteepestDescent::new(SteepestDescentConfig::default()))
        }
        Algorithm::LnNelderMead => Box::new(NelderMead::new(NelderMeadConfig {
            initial_step: config.initial_step.clone(),
            ..NelderMeadConfig::default()
        })),
        Algorithm::LnCompass => Box::new(Compass::new(config.initial_step.clone())),
        Algorithm::GnCrs2Lm => Box::new(Crs::new(
            CrsConfig::new(config.seed).with_population(config.population),
        )),
        Algorithm::GnIsres => Box::new(Isres::new(
            IsresConfig::new(config.seed).with_population(config.population),
        )),
        Algorithm::GMlsl => Box::new(Mlsl::new(
            MlslConfig {
                samples_per_step: config.population,
                seed: config.seed,
                local: local_config(config)?,
            },
            force_stop.clone(),
        )),
        Algorithm::Auglag | Algorithm::AuglagEq => Box::new(Auglag::new(
            AuglagConfig {
                equality_only: config.algorithm == Algorithm::AuglagEq,
                local: local_config(config)?,
            },
            force_stop.clone(),
        )),
    };
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use optima_core::stopping::StoppingCriteria;

    #[test]
    fn test_every_algorithm_builds() {
        let force = ForceStop::new();
        let local = LocalConfig {
            strategy: StrategyConfig::new(Algorithm::LnNelderMead, 0),
            criteria: StoppingCriteria::new().with_xtol_rel(1e-8),
        };
        for algorithm in Algorithm::ALL {
            let mut config = StrategyConfig::new(algorithm, 0);
            config.local = Some(Box::new(local.clone()));
            let strategy = build_strategy(&config, &force).unwrap();
            assert!(!strategy.name().is_empty());
        }
    }

    #[test]
    fn test_validate_reaches_nested_local() {
        let local = LocalConfig {
            strategy: StrategyConfig {
                population: 1,
                ..StrategyConfig::new(Algorithm::GnCrs2Lm, 0)
            },
            criteria: StoppingCriteria::new().with_xtol_rel(1e-8),
        };
        let mut config = StrategyConfig::new(Algorithm::GMlsl, 0);
        config.local = Some(Box::new(local));
        let err = validate_strategy(&config, 2).err();
        assert!(matches!(err, Some(OptimizerError::InvalidArgument { .. })));

        config.local.as_mut().unwrap().strategy.population = 3;
        assert!(validate_strategy(&config, 2).is_ok());
    }

    #[test]
    fn test_validate_population_minimums() {
        let isres = StrategyConfig {
            population: 1,
            ..StrategyConfig::new(Algorithm::GnIsres, 0)
        };
        assert!(validate_strategy(&isres, 2).is_err());
        assert!(validate_strategy(&StrategyConfig::new(Algorithm::GnIsres, 0), 2).is_ok());
        assert!(validate_strategy(&StrategyConfig::new(Algorithm::LdLbfgs, 0), 2).is_ok());
    }

    #[test]
    fn test_nested_requires_local() {
        let force = ForceStop::new();
        for algorithm in [Algorithm::GMlsl, Algorithm::Auglag, Algorithm::AuglagEq] {
            let err = build_strategy(&StrategyConfig::new(algorithm, 0), &force).err();
            assert!(matches!(err, Some(OptimizerError::InvalidArgument { .. })));
        }
    }
}
