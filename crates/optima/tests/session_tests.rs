//! End-to-end tests of the session API.

use approx::assert_relative_eq;
use optima::prelude::{
    Algorithm, ConstraintFunction, DMatrix, DVector, DiagonalPreconditioner, FnObjective,
    ObjectiveFunction, OptimizerError, ScalarConstraint, Session, Status, VectorConstraint,
};
#[cfg(feature = "serde")]
use optima::SessionConfig;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// Evaluation during which the supervising thread sets the flag.
const STOP_AT: usize = 10;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// (x - 1)² + (y - 2)² with its gradient, counting calls.
fn objective(calls: Arc<AtomicUsize>) -> impl ObjectiveFunction {
    FnObjective::with_gradient(move |x: &DVector, grad: Option<&mut DVector>| {
        calls.fetch_add(1, Ordering::SeqCst);
        if let Some(g) = grad {
            g[0] = 2.0 * (x[0] - 1.0);
            g[1] = 2.0 * (x[1] - 2.0);
        }
        Ok((x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2))
    })
}

fn scenario(algorithm: Algorithm) -> (Session, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut session = Session::new(2, algorithm).unwrap();
    session.set_min_objective(objective(calls.clone()));
    session.set_lower_bounds1(-10.0).unwrap();
    session.set_upper_bounds1(10.0).unwrap();
    (session, calls)
}

fn x_plus_y_at_most_one() -> impl ConstraintFunction {
    ScalarConstraint::with_gradient(|x: &DVector, grad: Option<&mut DVector>| {
        if let Some(g) = grad {
            g.fill(1.0);
        }
        Ok(x[0] + x[1] - 1.0)
    })
}

#[test]
fn test_scenario_converges_within_xtol() {
    init_logging();
    for algorithm in [
        Algorithm::LdLbfgs,
        Algorithm::LdSteepestDescent,
        Algorithm::LnNelderMead,
        Algorithm::LnCompass,
    ] {
        let (mut session, _) = scenario(algorithm);
        session.set_xtol_rel(1e-8).unwrap();
        let result = session.optimize(&[0.0, 0.0]).unwrap();

        assert!(
            matches!(result.status, Status::XtolReached | Status::FtolReached),
            "{algorithm}: {}",
            result.status
        );
        assert_relative_eq!(result.point[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(result.point[1], 2.0, epsilon = 1e-5);
        assert_relative_eq!(result.value, 0.0, epsilon = 1e-9);
    }
}

#[test]
fn test_scenario_maxeval_one() {
    init_logging();
    for algorithm in Algorithm::ALL {
        let (mut session, calls) = scenario(algorithm);
        session.set_maxeval(1);
        let result = session.optimize(&[0.0, 0.0]).unwrap();

        assert_eq!(result.status, Status::MaxevalReached, "{algorithm}");
        assert_eq!(result.evaluations, 1, "{algorithm}");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "{algorithm}");
        assert_eq!(session.evaluations(), 1);
    }
}

#[test]
fn test_scenario_inequality_stays_feasible() {
    init_logging();
    for algorithm in [Algorithm::Auglag, Algorithm::AuglagEq, Algorithm::GnIsres] {
        let (mut session, _) = scenario(algorithm);
        session
            .add_inequality_constraint(x_plus_y_at_most_one(), 1e-8)
            .unwrap();
        session.set_xtol_rel(1e-8).unwrap();
        session.set_maxeval(50_000);
        let result = session.optimize(&[0.0, 0.0]).unwrap();

        assert!(result.status.is_success(), "{algorithm}: {}", result.status);
        assert!(
            result.point[0] + result.point[1] <= 1.0 + 1e-8,
            "{algorithm}: {:?}",
            result.point
        );
    }
}

#[test]
fn test_auglag_reaches_constrained_optimum() {
    init_logging();
    let (mut session, _) = scenario(Algorithm::Auglag);
    session
        .add_inequality_constraint(x_plus_y_at_most_one(), 1e-8)
        .unwrap();
    let mut local = Session::new(2, Algorithm::LdLbfgs).unwrap();
    local.set_xtol_rel(1e-10).unwrap();
    session.set_local_optimizer(&local).unwrap();
    session.set_xtol_rel(1e-8).unwrap();
    session.set_maxeval(20_000);
    let result = session.optimize(&[0.0, 0.0]).unwrap();

    assert!(result.is_success(), "{}", result.status);
    assert_relative_eq!(result.point[0], 0.0, epsilon = 1e-4);
    assert_relative_eq!(result.point[1], 1.0, epsilon = 1e-4);
}

#[test]
fn test_invalid_bounds_evaluate_nothing() {
    for algorithm in Algorithm::ALL {
        let (mut session, calls) = scenario(algorithm);
        session.set_lower_bounds(&[0.0, 5.0]).unwrap();
        session.set_upper_bounds(&[1.0, 4.0]).unwrap();
        let err = session.optimize(&[0.5, 4.5]).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidArgument { .. }), "{algorithm}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn test_bounds_may_be_set_out_of_order() {
    let (mut session, _) = scenario(Algorithm::LnCompass);
    session.set_lower_bounds1(20.0).unwrap();
    session.set_upper_bounds1(30.0).unwrap();
    session.set_xtol_rel(1e-8).unwrap();
    let result = session.optimize(&[25.0, 25.0]).unwrap();
    assert!(result.is_success());
    assert_relative_eq!(result.point[0], 20.0, epsilon = 1e-8);
}

#[test]
fn test_force_stop_from_another_thread() {
    init_logging();
    for algorithm in [
        Algorithm::LnNelderMead,
        Algorithm::LdLbfgs,
        Algorithm::GnCrs2Lm,
        Algorithm::GnIsres,
        Algorithm::GMlsl,
    ] {
        let (reached, reached_rx) = mpsc::channel::<()>();
        let (resume, resume_rx) = mpsc::channel::<()>();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut session = Session::new(2, algorithm).unwrap();
        session.set_lower_bounds1(-5.0).unwrap();
        session.set_upper_bounds1(5.0).unwrap();
        session.set_min_objective(FnObjective::with_gradient(
            move |x: &DVector, grad: Option<&mut DVector>| {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 == STOP_AT {
                    let _ = reached.send(());
                    let _ = resume_rx.recv();
                }
                if let Some(g) = grad {
                    g[0] = 2.0 * x[0] + 3.0 * x[0].cos();
                    g[1] = 2.0 * x[1];
                }
                Ok(x[0].powi(2) + 3.0 * x[0].sin() + x[1].powi(2))
            },
        ));

        let handle = session.force_stop_handle();
        let supervisor = thread::spawn(move || {
            if reached_rx.recv_timeout(Duration::from_secs(60)).is_ok() {
                handle.set(42);
            }
            let _ = resume.send(());
        });

        let result = session.optimize(&[4.0, 4.0]).unwrap();
        supervisor.join().unwrap();

        assert_eq!(result.status, Status::ForcedStop, "{algorithm}");
        assert_eq!(calls.load(Ordering::SeqCst), STOP_AT, "{algorithm}");
        assert_eq!(session.force_stop_value(), 42);
        assert!(result.value.is_finite());
    }
}

#[test]
fn test_force_stop_is_cleared_on_start() {
    let (mut session, _) = scenario(Algorithm::LnCompass);
    session.force_stop();
    session.set_xtol_rel(1e-8).unwrap();
    let result = session.optimize(&[0.0, 0.0]).unwrap();
    assert!(result.is_success());
    assert_eq!(session.force_stop_value(), 0);
}

#[test]
fn test_idempotent_runs() {
    for algorithm in [Algorithm::LnNelderMead, Algorithm::LdLbfgs, Algorithm::GnIsres] {
        let (mut session, _) = scenario(algorithm);
        session.set_seed(11);
        session.set_maxeval(400);
        session.set_xtol_rel(1e-10).unwrap();
        let first = session.optimize(&[-3.0, 7.0]).unwrap();
        let second = session.optimize(&[-3.0, 7.0]).unwrap();

        assert_eq!(first.status, second.status, "{algorithm}");
        assert_eq!(first.point, second.point, "{algorithm}");
        assert_eq!(first.value.to_bits(), second.value.to_bits(), "{algorithm}");
        assert_eq!(first.evaluations, second.evaluations, "{algorithm}");
    }
}

#[test]
fn test_copy_runs_like_original() {
    let (mut session, calls) = scenario(Algorithm::LnNelderMead);
    session.set_xtol_rel(1e-8).unwrap();
    let mut copy = session.clone();
    let a = session.optimize(&[0.0, 0.0]).unwrap();
    let b = copy.optimize(&[0.0, 0.0]).unwrap();
    assert_eq!(a.point, b.point);
    assert_eq!(calls.load(Ordering::SeqCst), a.evaluations + b.evaluations);
}

#[test]
fn test_maximize_with_stopval() {
    let mut session = Session::new(1, Algorithm::LnNelderMead).unwrap();
    session.set_max_objective(FnObjective::new(|x: &DVector, _| Ok(-(x[0] - 2.0).powi(2))));
    session.set_stopval(-1e-4).unwrap();
    let result = session.optimize(&[0.0]).unwrap();
    assert_eq!(result.status, Status::StopvalReached);
    assert!(result.value >= -1e-4);
}

#[test]
fn test_callback_error_is_failure_with_best_point() {
    let mut session = Session::new(1, Algorithm::LnCompass).unwrap();
    session.set_min_objective(FnObjective::new(|x: &DVector, _| {
        if x[0] < 1.0 {
            Err(OptimizerError::evaluation("outside the model's domain"))
        } else {
            Ok(x[0])
        }
    }));
    let result = session.optimize(&[3.0]).unwrap();
    assert_eq!(result.status, Status::Failure);
    assert!(result.point[0] >= 1.0);
    assert!(result.value.is_finite());
}

#[test]
fn test_maxtime_reached() {
    init_logging();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut session = Session::new(2, Algorithm::LnNelderMead).unwrap();
    session.set_min_objective(FnObjective::new(move |x: &DVector, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(2));
        Ok((x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2))
    }));
    session.set_maxtime(0.1).unwrap();

    let result = session.optimize(&[5.0, 5.0]).unwrap();
    assert_eq!(result.status, Status::MaxtimeReached);
    assert!(result.duration >= Duration::from_millis(100));
    assert!(calls.load(Ordering::SeqCst) > 0);
    assert_eq!(result.evaluations, calls.load(Ordering::SeqCst));
}

#[test]
fn test_bad_local_population_rejected_before_evaluating() {
    let (mut session, calls) = scenario(Algorithm::GMlsl);
    session.set_lower_bounds1(-1.0).unwrap();
    session.set_upper_bounds1(1.0).unwrap();
    session.set_maxeval(100);
    let mut local = Session::new(2, Algorithm::GnCrs2Lm).unwrap();
    local.set_population(1);
    local.set_xtol_rel(1e-6).unwrap();
    session.set_local_optimizer(&local).unwrap();

    let err = session.optimize(&[0.0, 0.0]).unwrap_err();
    assert!(matches!(err, OptimizerError::InvalidArgument { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_nan_only_objective_reports_start() {
    let mut session = Session::new(2, Algorithm::LnCompass).unwrap();
    session.set_min_objective(FnObjective::new(|_: &DVector, _| Ok(f64::NAN)));
    session.set_maxeval(20);
    let result = session.optimize(&[0.5, -0.5]).unwrap();
    assert_eq!(result.point.as_slice(), &[0.5, -0.5]);
    assert!(result.value.is_nan());
}

#[test]
fn test_start_outside_bounds_is_clamped() {
    let (mut session, _) = scenario(Algorithm::LnCompass);
    session.set_maxeval(1);
    let result = session.optimize(&[50.0, -50.0]).unwrap();
    assert_eq!(result.point.as_slice(), &[10.0, -10.0]);
}

#[test]
fn test_equality_mconstraint() {
    let (mut session, _) = scenario(Algorithm::Auglag);
    session
        .add_equality_mconstraint(
            VectorConstraint::with_jacobian(1, |x: &DVector, out: &mut DVector, jac: Option<&mut DMatrix>| {
                out[0] = x[0] - x[1];
                if let Some(j) = jac {
                    j[(0, 0)] = 1.0;
                    j[(0, 1)] = -1.0;
                }
                Ok(())
            }),
            &[1e-6],
        )
        .unwrap();
    session.set_xtol_rel(1e-8).unwrap();
    session.set_maxeval(20_000);
    let result = session.optimize(&[0.0, 0.0]).unwrap();
    assert!(result.is_success(), "{}", result.status);
    assert_relative_eq!(result.point[0], 1.5, epsilon = 1e-3);
    assert_relative_eq!(result.point[1], 1.5, epsilon = 1e-3);
    assert!(result.violation <= 1e-6);
}

#[test]
fn test_preconditioned_objective() {
    let mut session = Session::new(2, Algorithm::LdSteepestDescent).unwrap();
    session.set_precond_min_objective(
        FnObjective::with_gradient(|x: &DVector, grad: Option<&mut DVector>| {
            if let Some(g) = grad {
                g[0] = 200.0 * x[0];
                g[1] = 2.0 * x[1];
            }
            Ok(100.0 * x[0].powi(2) + x[1].powi(2))
        }),
        DiagonalPreconditioner::new(DVector::from_vec(vec![200.0, 2.0])),
    );
    session.set_xtol_abs1(1e-10).unwrap();
    session.set_maxeval(200);
    let result = session.optimize(&[1.0, 1.0]).unwrap();
    assert!(result.is_success(), "{}", result.status);
    assert!(result.point.norm() < 1e-6);
}

#[test]
fn test_unknown_algorithm_name() {
    assert!("LD_NOTHING".parse::<Algorithm>().is_err());
    assert_eq!("ln_neldermead".parse::<Algorithm>().unwrap(), Algorithm::LnNelderMead);
}

#[cfg(feature = "serde")]
#[test]
fn test_config_json_round_trip() {
    let (mut session, _) = scenario(Algorithm::GnIsres);
    session.set_population(60);
    session.set_xtol_abs1(1e-4).unwrap();
    session.set_maxtime(1.5).unwrap();
    let json = serde_json::to_string(&session.config()).unwrap();
    let config: SessionConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config, session.config());
    let rebuilt = Session::from_config(&config).unwrap();
    assert_eq!(rebuilt.population(), 60);
    assert_relative_eq!(rebuilt.maxtime(), 1.5);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_maxeval_never_exceeded(
        k in 1usize..60,
        index in 0usize..Algorithm::ALL.len(),
        x in -10.0f64..10.0,
        y in -10.0f64..10.0,
    ) {
        let algorithm = Algorithm::ALL[index];
        let (mut session, calls) = scenario(algorithm);
        session.set_maxeval(k);
        let result = session.optimize(&[x, y]).unwrap();
        prop_assert!(result.evaluations <= k);
        prop_assert!(calls.load(Ordering::SeqCst) <= k);
    }

    #[test]
    fn prop_crossed_bounds_rejected(
        index in 0usize..Algorithm::ALL.len(),
        lower in -5.0f64..5.0,
        gap in 1e-6f64..5.0,
        component in 0usize..2,
    ) {
        let algorithm = Algorithm::ALL[index];
        let (mut session, calls) = scenario(algorithm);
        let mut lo = [-1.0, -1.0];
        let mut hi = [1.0, 1.0];
        lo[component] = lower;
        hi[component] = lower - gap;
        session.set_lower_bounds(&lo).unwrap();
        session.set_upper_bounds(&hi).unwrap();
        let err = session.optimize(&[0.0, 0.0]).unwrap_err();
        let rejected = matches!(err, OptimizerError::InvalidArgument { .. });
        prop_assert!(rejected);
        prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
