//! Integration tests for optima-optim
//!
//! Every algorithm is built through the factory and driven on shared test
//! problems, the way the session layer uses them.

use approx::assert_relative_eq;
use optima_core::{
    algorithm::{Algorithm, LocalConfig, StrategyConfig},
    bounds::Bounds,
    driver::{drive, Outcome},
    evaluator::{ObjectiveSense, ProblemOracle},
    function::{Constraint, ObjectiveFunction},
    result::Status,
    stopping::{ForceStop, StoppingCriteria},
    test_utils::{box_bounds, constraint, linear_constraint, shifted_sphere, CountingObjective},
    types::DVector,
};
use optima_optim::build_strategy;
use proptest::prelude::*;
use std::sync::atomic::Ordering;

fn config(algorithm: Algorithm, seed: u64) -> StrategyConfig {
    let mut config = StrategyConfig::new(algorithm, seed);
    if algorithm.capabilities().nested_local {
        config.local = Some(Box::new(LocalConfig {
            strategy: StrategyConfig::new(Algorithm::LdLbfgs, seed),
            criteria: StoppingCriteria::new().with_xtol_rel(1e-8).with_maxeval(1000),
        }));
    }
    config
}

fn run(
    algorithm: Algorithm,
    f: &dyn ObjectiveFunction,
    bounds: &Bounds,
    inequality: &[Constraint],
    x0: &[f64],
    criteria: StoppingCriteria,
) -> Outcome {
    let force = ForceStop::new();
    let mut strategy = build_strategy(&config(algorithm, 7), &force).unwrap();
    let mut oracle = ProblemOracle::new(f, ObjectiveSense::Minimize, bounds, inequality, &[]);
    drive(
        strategy.as_mut(),
        &mut oracle,
        &DVector::from_column_slice(x0),
        criteria,
        &force,
    )
    .unwrap()
}

#[test]
fn test_every_algorithm_solves_a_quadratic() {
    let f = shifted_sphere(&[1.0, 2.0]);
    let bounds = box_bounds(2, -10.0, 10.0);
    for algorithm in Algorithm::ALL {
        let outcome = run(
            algorithm,
            &f,
            &bounds,
            &[],
            &[0.0, 0.0],
            StoppingCriteria::new().with_xtol_rel(1e-8).with_maxeval(30_000),
        );
        assert!(
            outcome.status.is_success(),
            "{algorithm}: {}",
            outcome.status
        );
        let best = outcome.best.unwrap();
        assert_relative_eq!(best.point[0], 1.0, epsilon = 1e-2);
        assert_relative_eq!(best.point[1], 2.0, epsilon = 1e-2);
    }
}

#[test]
fn test_maxeval_one_evaluates_once() {
    let (f, calls) = CountingObjective::new(shifted_sphere(&[1.0, 2.0]));
    let bounds = box_bounds(2, -10.0, 10.0);
    for algorithm in Algorithm::ALL {
        calls.store(0, Ordering::SeqCst);
        let outcome = run(
            algorithm,
            &f,
            &bounds,
            &[],
            &[0.0, 0.0],
            StoppingCriteria::new().with_maxeval(1),
        );
        assert_eq!(outcome.status, Status::MaxevalReached, "{algorithm}");
        assert_eq!(outcome.evaluations, 1, "{algorithm}");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "{algorithm}");
    }
}

#[test]
fn test_constrained_algorithms_stay_feasible() {
    let f = shifted_sphere(&[1.0, 2.0]);
    let g = constraint(linear_constraint(&[1.0, 1.0], 1.0)).unwrap();
    let bounds = box_bounds(2, -10.0, 10.0);
    for algorithm in [Algorithm::GnIsres, Algorithm::Auglag, Algorithm::AuglagEq] {
        let outcome = run(
            algorithm,
            &f,
            &bounds,
            std::slice::from_ref(&g),
            &[0.0, 0.0],
            StoppingCriteria::new().with_xtol_rel(1e-6).with_maxeval(20_000),
        );
        let best = outcome.best.unwrap();
        assert!(best.feasible, "{algorithm}");
        assert!(best.point[0] + best.point[1] <= 1.0 + 1e-8, "{algorithm}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_stochastic_points_stay_in_bounds(
        seed in 0u64..1000,
        lower in -5.0f64..0.0,
        width in 0.1f64..5.0,
    ) {
        let f = shifted_sphere(&[10.0, -10.0]);
        let bounds = box_bounds(2, lower, lower + width);
        for algorithm in [Algorithm::GnCrs2Lm, Algorithm::GnIsres] {
            let force = ForceStop::new();
            let mut strategy = build_strategy(&config(algorithm, seed), &force).unwrap();
            let mut oracle = ProblemOracle::new(&f, ObjectiveSense::Minimize, &bounds, &[], &[]);
            let outcome = drive(
                strategy.as_mut(),
                &mut oracle,
                &DVector::from_element(2, lower),
                StoppingCriteria::new().with_maxeval(300),
                &force,
            )
            .unwrap();
            prop_assert!(outcome.evaluations <= 300);
            prop_assert!(bounds.contains(&outcome.best.unwrap().point));
        }
    }
}
