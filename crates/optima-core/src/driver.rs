//! The algorithm-agnostic optimization loop.
//!
//! [`drive`] initializes a strategy, then alternates `step` and the stopping
//! checks until a termination status is determined. Evaluations go through a
//! [`Monitor`], so the evaluation budget, the time budget, the target value
//! and the force-stop flag are enforced even in the middle of an iteration:
//! the monitor refuses the evaluation with [`OptimizerError::Halted`] and the
//! driver turns the unwound iteration into the corresponding status.
//!
//! Nested runs (the local optimizer of MLSL or the augmented Lagrangian) call
//! `drive` on an oracle that wraps the parent's monitor. When the parent's
//! budget runs out, the nested run has no reason of its own to stop and the
//! `Halted` signal propagates to the parent, which reports it.

use crate::{
    algorithm::{StepReport, Strategy},
    error::{OptimizerError, Result},
    evaluator::{BestPoint, Monitor, Oracle},
    result::Status,
    stopping::{ForceStop, StoppingController, StoppingCriteria},
    types::DVector,
};
use log::{debug, info, warn};
use std::time::Duration;

/// Outcome of one run of [`drive`].
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Termination status.
    pub status: Status,
    /// Best point in minimization form.
    pub best: Option<BestPoint>,
    /// Number of evaluations performed by this run.
    pub evaluations: usize,
    /// Number of completed iterations.
    pub iterations: usize,
    /// Wall-clock duration.
    pub elapsed: Duration,
    /// The error behind a `Failure` or `RoundoffLimited` status.
    pub error: Option<OptimizerError>,
}

impl Outcome {
    /// Returns the callback error that aborted the run, if any.
    ///
    /// Nested runs use this to abort their parent as well.
    pub fn callback_error(&self) -> Option<&OptimizerError> {
        self.error
            .as_ref()
            .filter(|e| matches!(e, OptimizerError::Evaluation { .. }))
    }
}

enum Resolution {
    Stop(Status, Option<OptimizerError>),
    Propagate(OptimizerError),
}

fn resolve(
    error: OptimizerError,
    controller: &StoppingController,
    monitor: &Monitor<'_>,
) -> Resolution {
    let interrupted = controller.interrupted(monitor.evaluations(), monitor.best_feasible_value());
    match error {
        OptimizerError::Halted => match interrupted {
            Some(status) => Resolution::Stop(status, None),
            None => Resolution::Propagate(OptimizerError::Halted),
        },
        OptimizerError::Evaluation { .. } | OptimizerError::Failure { .. } => {
            Resolution::Stop(Status::Failure, Some(error))
        }
        OptimizerError::RoundoffLimited { .. } => match interrupted {
            Some(status) => Resolution::Stop(status, None),
            None => Resolution::Stop(Status::RoundoffLimited, Some(error)),
        },
        other => Resolution::Propagate(other),
    }
}

/// Runs `strategy` from `x0` until a stopping criterion holds.
///
/// `criteria` must be in minimization form. Configuration errors raised by
/// the strategy and `Halted` signals that belong to an enclosing run are
/// returned as `Err`; every other termination is an `Ok` outcome.
pub fn drive(
    strategy: &mut dyn Strategy,
    oracle: &mut dyn Oracle,
    x0: &DVector,
    criteria: StoppingCriteria,
    force_stop: &ForceStop,
) -> Result<Outcome> {
    let controller = StoppingController::new(criteria, force_stop.clone());
    let mut monitor = Monitor::new(&mut *oracle, &controller);
    let mut iterations = 0;

    debug!("{}: starting from {} variables", strategy.name(), x0.len());
    let mut pending = strategy.initialize(&mut monitor, x0);

    let (status, error) = loop {
        let report: StepReport = match pending {
            Ok(report) => report,
            Err(err) => match resolve(err, &controller, &monitor) {
                Resolution::Stop(status, error) => break (status, error),
                Resolution::Propagate(err) => return Err(err),
            },
        };

        if let Some(status) =
            controller.check(&report, monitor.evaluations(), monitor.best_feasible_value())
        {
            break (status, None);
        }
        if report.is_stationary() {
            break (Status::Success, None);
        }
        if report.is_stalled() {
            break (
                Status::RoundoffLimited,
                Some(OptimizerError::roundoff(format!(
                    "{} cannot make further progress",
                    strategy.name()
                ))),
            );
        }

        pending = strategy.step(&mut monitor);
        if pending.is_ok() {
            iterations += 1;
            if let Some(best) = monitor.best() {
                debug!(
                    "{}: iteration {iterations}, best f = {:.6e}, violation = {:.3e}",
                    strategy.name(),
                    best.value,
                    best.violation
                );
            }
        }
    };

    if let Some(err) = &error {
        warn!("{}: {err}", strategy.name());
    }
    let evaluations = monitor.evaluations();
    let best = monitor.into_best();
    info!(
        "{}: {status} after {iterations} iterations and {evaluations} evaluations",
        strategy.name()
    );

    Ok(Outcome {
        status,
        best,
        evaluations,
        iterations,
        elapsed: controller.elapsed(),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Iterate;
    use crate::bounds::Bounds;
    use crate::evaluator::{ObjectiveSense, ProblemOracle};
    use crate::function::{FnObjective, ObjectiveFunction};
    use approx::assert_relative_eq;

    /// Moves x halfway towards zero each step.
    struct Halving {
        x: DVector,
        f: f64,
    }

    impl Strategy for Halving {
        fn name(&self) -> &str {
            "halving"
        }

        fn initialize(&mut self, oracle: &mut dyn Oracle, x0: &DVector) -> Result<StepReport> {
            self.x = x0.clone();
            self.f = oracle.evaluate(x0, false)?.value;
            Ok(StepReport::idle())
        }

        fn step(&mut self, oracle: &mut dyn Oracle) -> Result<StepReport> {
            let previous = Iterate::new(self.x.clone(), self.f);
            self.x *= 0.5;
            self.f = oracle.evaluate(&self.x, false)?.value;
            Ok(StepReport::moved(previous, Iterate::new(self.x.clone(), self.f)))
        }
    }

    fn square() -> impl ObjectiveFunction {
        FnObjective::new(|x: &DVector, _| Ok(x.norm_squared()))
    }

    fn run(criteria: StoppingCriteria, f: &dyn ObjectiveFunction) -> Result<Outcome> {
        let bounds = Bounds::unbounded(1);
        let mut oracle = ProblemOracle::new(f, ObjectiveSense::Minimize, &bounds, &[], &[]);
        let mut strategy = Halving {
            x: DVector::zeros(1),
            f: 0.0,
        };
        drive(
            &mut strategy,
            &mut oracle,
            &DVector::from_vec(vec![1.0]),
            criteria,
            &ForceStop::new(),
        )
    }

    #[test]
    fn test_maxeval_never_exceeded() {
        let f = square();
        let outcome = run(StoppingCriteria::new().with_maxeval(5), &f).unwrap();
        assert_eq!(outcome.status, Status::MaxevalReached);
        assert_eq!(outcome.evaluations, 5);
        assert_relative_eq!(outcome.best.unwrap().point[0], 1.0 / 16.0);
    }

    #[test]
    fn test_xtol_terminates() {
        let f = square();
        let outcome = run(StoppingCriteria::new().with_xtol_rel(1.5), &f).unwrap();
        assert_eq!(outcome.status, Status::XtolReached);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_stopval() {
        let f = square();
        let outcome = run(StoppingCriteria::new().with_stopval(0.01), &f).unwrap();
        assert_eq!(outcome.status, Status::StopvalReached);
        assert!(outcome.best.unwrap().value <= 0.01);
    }

    #[test]
    fn test_callback_error_is_failure() {
        let f = FnObjective::new(|x: &DVector, _| {
            if x[0] < 0.3 {
                Err(OptimizerError::evaluation("domain error"))
            } else {
                Ok(x[0])
            }
        });
        let outcome = run(StoppingCriteria::new(), &f).unwrap();
        assert_eq!(outcome.status, Status::Failure);
        assert!(outcome.callback_error().is_some());
        assert_relative_eq!(outcome.best.unwrap().point[0], 0.5);
    }

    #[test]
    fn test_forced_stop_before_start() {
        let f = square();
        let bounds = Bounds::unbounded(1);
        let mut oracle = ProblemOracle::new(&f, ObjectiveSense::Minimize, &bounds, &[], &[]);
        let force = ForceStop::new();
        force.stop();
        let mut strategy = Halving {
            x: DVector::zeros(1),
            f: 0.0,
        };
        let outcome = drive(
            &mut strategy,
            &mut oracle,
            &DVector::from_vec(vec![1.0]),
            StoppingCriteria::new(),
            &force,
        )
        .unwrap();
        assert_eq!(outcome.status, Status::ForcedStop);
        assert_eq!(outcome.evaluations, 0);
        assert!(outcome.best.is_none());
    }
}
