//! Runs of a nested local optimizer.

use crate::build_strategy;
use log::debug;
use optima_core::{
    algorithm::LocalConfig,
    driver::{drive, Outcome},
    error::{OptimizerError, Result},
    evaluator::Oracle,
    result::Status,
    stopping::ForceStop,
    types::DVector,
};

/// Runs the local optimizer from `x0` on `oracle`.
///
/// Each run gets a fresh strategy whose seed is offset by `run`. A forced
/// stop or a failing user callback aborts the enclosing run as well; any
/// other local status is returned for the caller to inspect.
pub(crate) fn run_local(
    local: &LocalConfig,
    run: u64,
    oracle: &mut dyn Oracle,
    x0: &DVector,
    force_stop: &ForceStop,
) -> Result<Outcome> {
    let mut config = local.strategy.clone();
    config.seed = config.seed.wrapping_add(run);
    let mut strategy = build_strategy(&config, force_stop)?;
    let outcome = drive(
        strategy.as_mut(),
        oracle,
        x0,
        local.criteria.clone(),
        force_stop,
    )?;
    debug!(
        "local run {run} ({}): {} after {} evaluations",
        config.algorithm, outcome.status, outcome.evaluations
    );
    if outcome.status == Status::ForcedStop {
        return Err(OptimizerError::Halted);
    }
    if let Some(err) = outcome.callback_error() {
        return Err(err.clone());
    }
    Ok(outcome)
}
