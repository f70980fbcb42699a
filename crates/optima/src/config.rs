//! Serializable session configuration.
//!
//! A [`SessionConfig`] captures everything a [`crate::Session`] holds except
//! its callbacks. With the `serde` feature it can be stored as JSON and
//! turned back into a session with [`crate::Session::from_config`].

use optima_core::{algorithm::Algorithm, bounds::Bounds, stopping::StoppingCriteria, types::DVector};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration snapshot of a session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SessionConfig {
    /// Selected algorithm
    pub algorithm: Algorithm,
    /// Number of variables
    pub dimension: usize,
    /// Box constraints
    pub bounds: Bounds,
    /// Stopping criteria, `stopval` in the user's sense
    pub criteria: StoppingCriteria,
    /// Population size (0 = default)
    pub population: usize,
    /// Quasi-Newton memory (0 = default)
    pub vector_storage: usize,
    /// Initial step of derivative-free algorithms
    pub initial_step: Option<DVector>,
    /// Random seed
    pub seed: u64,
    /// Nested local optimizer
    pub local: Option<Box<SessionConfig>>,
}

#[cfg(test)]
mod tests {
    use crate::Session;
    use optima_core::algorithm::Algorithm;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_round_trip() {
        let mut local = Session::new(2, Algorithm::LnCompass).unwrap();
        local.set_xtol_rel(1e-5).unwrap();
        let mut session = Session::new(2, Algorithm::Auglag).unwrap();
        session.set_lower_bounds1(-1.0).unwrap();
        session.set_maxeval(500);
        session.set_initial_step1(0.1).unwrap();
        session.set_seed(3);
        session.set_local_optimizer(&local).unwrap();

        let config = session.config();
        assert_eq!(config.local.as_ref().unwrap().algorithm, Algorithm::LnCompass);
        let rebuilt = Session::from_config(&config).unwrap();
        assert_eq!(rebuilt.config(), config);
        assert!(!rebuilt.has_objective());
    }

    #[test]
    fn test_config_dimension_checked() {
        let mut config = Session::new(2, Algorithm::LnCompass).unwrap().config();
        config.dimension = 3;
        assert!(Session::from_config(&config).is_err());
    }
}
