//! # Optima
//!
//! Nonlinear constrained optimization in Rust.
//!
//! Optima minimizes or maximizes an objective `f: ℝᴺ → ℝ` subject to box
//! bounds, inequality constraints `c(x) ≤ 0` and equality constraints
//! `h(x) = 0`. A problem is configured on a [`Session`], which selects one
//! [`Algorithm`] and can be optimized repeatedly.
//!
//! ## Algorithms
//!
//! | Code | Kind | Derivatives | Constraints |
//! |------|------|-------------|-------------|
//! | `LD_LBFGS` | local | required | bounds |
//! | `LD_STEEPEST_DESCENT` | local | required | bounds |
//! | `LN_NELDERMEAD` | local | none | bounds |
//! | `LN_COMPASS` | local | none | bounds |
//! | `GN_CRS2_LM` | global | none | finite bounds |
//! | `GN_ISRES` | global | none | finite bounds, inequality, equality |
//! | `G_MLSL` | global | from the local optimizer | finite bounds |
//! | `AUGLAG` | nested | from the local optimizer | bounds, inequality, equality |
//! | `AUGLAG_EQ` | nested | from the local optimizer | bounds, inequality, equality |
//!
//! ## Quick Start
//!
//! ```rust
//! use optima::prelude::*;
//!
//! // minimize (x - 1)² + (y - 2)² subject to x + y ≤ 1
//! let mut session = Session::new(2, Algorithm::Auglag)?;
//! session.set_min_objective(FnObjective::new(|x: &DVector, _| {
//!     Ok((x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2))
//! }));
//! session.add_inequality_constraint(
//!     ScalarConstraint::new(|x: &DVector, _| Ok(x[0] + x[1] - 1.0)),
//!     1e-8,
//! )?;
//! session.set_xtol_rel(1e-6)?;
//!
//! let result = session.optimize(&[0.0, 0.0])?;
//! assert!(result.point[0] + result.point[1] <= 1.0 + 1e-6);
//! # Ok::<(), OptimizerError>(())
//! ```
//!
//! ## Features
//!
//! - `serde`: serialization of [`SessionConfig`] and the result types
//! - `full`: every optional feature

pub mod config;
pub mod session;

pub use config::SessionConfig;
pub use session::{default_seed, default_seed_from_time, set_default_seed, Session};

pub use optima_core;
pub use optima_optim;

pub use optima_core::{
    algorithm::Algorithm,
    error::{OptimizerError, Result},
    result::{OptimizationResult, Status},
};

/// Version of the library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Major, minor and bugfix components of [`version`].
pub fn version_parts() -> (u32, u32, u32) {
    let parse = |s: &str| s.parse().unwrap_or(0);
    (
        parse(env!("CARGO_PKG_VERSION_MAJOR")),
        parse(env!("CARGO_PKG_VERSION_MINOR")),
        parse(env!("CARGO_PKG_VERSION_PATCH")),
    )
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::session::Session;

    pub use optima_core::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        let (major, minor, patch) = version_parts();
        assert_eq!(format!("{major}.{minor}.{patch}"), version());
    }
}
