//! Optimization sessions.
//!
//! A [`Session`] owns the full configuration of one problem: its dimension,
//! algorithm, objective, bounds, constraints, stopping criteria and
//! algorithm parameters. It is configured through setters and can be
//! optimized any number of times.
//!
//! # Validation
//!
//! Setters check what they can on their own (vector lengths, NaN values,
//! negative tolerances) and fail with `InvalidArgument` immediately.
//! Everything that depends on the configuration as a whole is checked by
//! [`Session::optimize`] before the first evaluation:
//!
//! - an objective is set and `lower ≤ upper` componentwise
//! - the algorithm supports the configured constraints and has the
//!   derivatives it needs (`UnsupportedOperation` otherwise)
//! - algorithms that sample the box have finite bounds
//! - the nested local optimizer, if any, fits the subproblem it will solve
//!
//! # Example
//!
//! ```
//! use optima::prelude::*;
//!
//! let mut session = Session::new(2, Algorithm::LnNelderMead)?;
//! session.set_min_objective(FnObjective::new(|x: &DVector, _| {
//!     Ok((x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2))
//! }));
//! session.set_lower_bounds1(-10.0)?;
//! session.set_upper_bounds1(10.0)?;
//! session.set_xtol_rel(1e-8)?;
//!
//! let result = session.optimize(&[0.0, 0.0])?;
//! assert!(result.is_success());
//! assert!((result.point[0] - 1.0).abs() < 1e-4);
//! # Ok::<(), OptimizerError>(())
//! ```

use crate::config::SessionConfig;
use log::{debug, info, warn};
use optima_core::{
    algorithm::{Algorithm, LocalConfig, ProblemShape, StrategyConfig},
    bounds::Bounds,
    driver::drive,
    error::{OptimizerError, Result},
    evaluator::{BestPoint, ConstraintKind, ObjectiveSense, ProblemOracle},
    function::{Constraint, ConstraintFunction, ObjectiveFunction},
    preconditioner::Preconditioner,
    result::{OptimizationResult, Status},
    stopping::{ForceStop, StoppingCriteria},
    types::{constants, DVector},
};
use optima_optim::{build_strategy, validate_strategy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Point tolerance of a default local optimizer when the parent sets none.
const DEFAULT_LOCAL_XTOL_REL: f64 = 1e-8;

static DEFAULT_SEED: AtomicU64 = AtomicU64::new(constants::DEFAULT_SEED);

/// Sets the seed that sessions created from now on start with.
pub fn set_default_seed(seed: u64) {
    DEFAULT_SEED.store(seed, Ordering::SeqCst);
}

/// Sets the default seed from the system clock.
pub fn default_seed_from_time() {
    set_default_seed(time_seed());
}

/// The seed new sessions start with.
pub fn default_seed() -> u64 {
    DEFAULT_SEED.load(Ordering::SeqCst)
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() ^ u64::from(d.subsec_nanos()).rotate_left(32))
}

#[derive(Debug, Clone)]
struct Objective {
    function: Arc<dyn ObjectiveFunction>,
    preconditioner: Option<Arc<dyn Preconditioner>>,
}

/// A configured optimization problem.
///
/// Cloning a session copies its configuration and shares its callbacks.
/// The clone gets its own force-stop flag, initialised to the current
/// value.
#[derive(Debug)]
pub struct Session {
    algorithm: Algorithm,
    dimension: usize,
    sense: ObjectiveSense,
    objective: Option<Objective>,
    bounds: Bounds,
    inequality: Vec<Constraint>,
    equality: Vec<Constraint>,
    criteria: StoppingCriteria,
    force_stop: ForceStop,
    population: usize,
    vector_storage: usize,
    initial_step: Option<DVector>,
    seed: u64,
    local: Option<Box<Session>>,
    evaluations: usize,
}

impl Clone for Session {
    fn clone(&self) -> Self {
        let force_stop = ForceStop::new();
        force_stop.set(self.force_stop.get());
        Self {
            algorithm: self.algorithm,
            dimension: self.dimension,
            sense: self.sense,
            objective: self.objective.clone(),
            bounds: self.bounds.clone(),
            inequality: self.inequality.clone(),
            equality: self.equality.clone(),
            criteria: self.criteria.clone(),
            force_stop,
            population: self.population,
            vector_storage: self.vector_storage,
            initial_step: self.initial_step.clone(),
            seed: self.seed,
            local: self.local.clone(),
            evaluations: self.evaluations,
        }
    }
}

impl Session {
    /// Creates a session for a problem of `dimension` variables.
    ///
    /// Bounds start unbounded, every stopping criterion disabled and the
    /// seed at the process-wide default.
    pub fn new(dimension: usize, algorithm: Algorithm) -> Result<Self> {
        if dimension == 0 {
            return Err(OptimizerError::invalid_argument(
                "dimension must be positive",
            ));
        }
        Ok(Self {
            algorithm,
            dimension,
            sense: ObjectiveSense::Minimize,
            objective: None,
            bounds: Bounds::unbounded(dimension),
            inequality: Vec::new(),
            equality: Vec::new(),
            criteria: StoppingCriteria::new(),
            force_stop: ForceStop::new(),
            population: 0,
            vector_storage: 0,
            initial_step: None,
            seed: default_seed(),
            local: None,
            evaluations: 0,
        })
    }

    /// Rebuilds a session from a configuration snapshot.
    ///
    /// Callbacks are not part of a snapshot: the objective and constraints
    /// must be set again.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let mut session = Self::new(config.dimension, config.algorithm)?;
        if config.bounds.dimension() != config.dimension {
            return Err(OptimizerError::dimension_mismatch(
                "bounds",
                config.dimension,
                config.bounds.dimension(),
            ));
        }
        config.criteria.validate(config.dimension)?;
        session.bounds = config.bounds.clone();
        session.criteria = config.criteria.clone();
        session.population = config.population;
        session.vector_storage = config.vector_storage;
        if let Some(step) = &config.initial_step {
            session.set_initial_step(step.as_slice())?;
        }
        session.seed = config.seed;
        if let Some(local) = &config.local {
            session.set_local_optimizer(&Self::from_config(local)?)?;
        }
        Ok(session)
    }

    /// Snapshot of everything but the callbacks.
    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            algorithm: self.algorithm,
            dimension: self.dimension,
            bounds: self.bounds.clone(),
            criteria: self.criteria.clone(),
            population: self.population,
            vector_storage: self.vector_storage,
            initial_step: self.initial_step.clone(),
            seed: self.seed,
            local: self.local.as_ref().map(|l| Box::new(l.config())),
        }
    }

    /// The selected algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Number of variables.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Direction of the objective set last.
    pub fn sense(&self) -> ObjectiveSense {
        self.sense
    }

    /// Evaluations performed by the last call to [`Session::optimize`].
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    // Objective

    /// Sets an objective to minimize.
    pub fn set_min_objective<F>(&mut self, f: F)
    where
        F: ObjectiveFunction + 'static,
    {
        self.set_objective(Arc::new(f), None, ObjectiveSense::Minimize);
    }

    /// Sets an objective to maximize.
    pub fn set_max_objective<F>(&mut self, f: F)
    where
        F: ObjectiveFunction + 'static,
    {
        self.set_objective(Arc::new(f), None, ObjectiveSense::Maximize);
    }

    /// Sets an objective to minimize together with its preconditioner.
    pub fn set_precond_min_objective<F, P>(&mut self, f: F, preconditioner: P)
    where
        F: ObjectiveFunction + 'static,
        P: Preconditioner + 'static,
    {
        self.set_objective(
            Arc::new(f),
            Some(Arc::new(preconditioner)),
            ObjectiveSense::Minimize,
        );
    }

    /// Sets an objective to maximize together with its preconditioner.
    pub fn set_precond_max_objective<F, P>(&mut self, f: F, preconditioner: P)
    where
        F: ObjectiveFunction + 'static,
        P: Preconditioner + 'static,
    {
        self.set_objective(
            Arc::new(f),
            Some(Arc::new(preconditioner)),
            ObjectiveSense::Maximize,
        );
    }

    /// Sets an already shared objective.
    pub fn set_objective(
        &mut self,
        function: Arc<dyn ObjectiveFunction>,
        preconditioner: Option<Arc<dyn Preconditioner>>,
        sense: ObjectiveSense,
    ) {
        self.objective = Some(Objective {
            function,
            preconditioner,
        });
        self.sense = sense;
    }

    /// Whether an objective is set.
    pub fn has_objective(&self) -> bool {
        self.objective.is_some()
    }

    // Bounds

    /// Sets the lower bounds; `lower` must have length N.
    pub fn set_lower_bounds(&mut self, lower: &[f64]) -> Result<()> {
        self.bounds.set_lower(lower)
    }

    /// Sets every lower bound to `value`.
    pub fn set_lower_bounds1(&mut self, value: f64) -> Result<()> {
        self.bounds.set_lower1(value)
    }

    /// The lower bounds, exactly as set.
    pub fn lower_bounds(&self) -> &DVector {
        self.bounds.lower()
    }

    /// Sets the upper bounds; `upper` must have length N.
    pub fn set_upper_bounds(&mut self, upper: &[f64]) -> Result<()> {
        self.bounds.set_upper(upper)
    }

    /// Sets every upper bound to `value`.
    pub fn set_upper_bounds1(&mut self, value: f64) -> Result<()> {
        self.bounds.set_upper1(value)
    }

    /// The upper bounds, exactly as set.
    pub fn upper_bounds(&self) -> &DVector {
        self.bounds.upper()
    }

    /// Both bound vectors.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    // Constraints

    /// Adds a scalar inequality constraint `c(x) ≤ tolerance`.
    pub fn add_inequality_constraint<C>(&mut self, constraint: C, tolerance: f64) -> Result<()>
    where
        C: ConstraintFunction + 'static,
    {
        self.add_constraint(ConstraintKind::Inequality, Arc::new(constraint), &[tolerance], None)
    }

    /// Adds a scalar inequality constraint with a preconditioner.
    pub fn add_precond_inequality_constraint<C, P>(
        &mut self,
        constraint: C,
        preconditioner: P,
        tolerance: f64,
    ) -> Result<()>
    where
        C: ConstraintFunction + 'static,
        P: Preconditioner + 'static,
    {
        self.add_constraint(
            ConstraintKind::Inequality,
            Arc::new(constraint),
            &[tolerance],
            Some(Arc::new(preconditioner)),
        )
    }

    /// Adds an M-component inequality constraint with one tolerance per
    /// component.
    pub fn add_inequality_mconstraint<C>(&mut self, constraint: C, tolerance: &[f64]) -> Result<()>
    where
        C: ConstraintFunction + 'static,
    {
        self.add_constraint(ConstraintKind::Inequality, Arc::new(constraint), tolerance, None)
    }

    /// Removes every inequality constraint.
    pub fn remove_inequality_constraints(&mut self) {
        self.inequality.clear();
    }

    /// Adds a scalar equality constraint `|h(x)| ≤ tolerance`.
    pub fn add_equality_constraint<C>(&mut self, constraint: C, tolerance: f64) -> Result<()>
    where
        C: ConstraintFunction + 'static,
    {
        self.add_constraint(ConstraintKind::Equality, Arc::new(constraint), &[tolerance], None)
    }

    /// Adds a scalar equality constraint with a preconditioner.
    pub fn add_precond_equality_constraint<C, P>(
        &mut self,
        constraint: C,
        preconditioner: P,
        tolerance: f64,
    ) -> Result<()>
    where
        C: ConstraintFunction + 'static,
        P: Preconditioner + 'static,
    {
        self.add_constraint(
            ConstraintKind::Equality,
            Arc::new(constraint),
            &[tolerance],
            Some(Arc::new(preconditioner)),
        )
    }

    /// Adds an M-component equality constraint.
    pub fn add_equality_mconstraint<C>(&mut self, constraint: C, tolerance: &[f64]) -> Result<()>
    where
        C: ConstraintFunction + 'static,
    {
        self.add_constraint(ConstraintKind::Equality, Arc::new(constraint), tolerance, None)
    }

    /// Removes every equality constraint.
    pub fn remove_equality_constraints(&mut self) {
        self.equality.clear();
    }

    /// Adds an already shared constraint of either kind.
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        function: Arc<dyn ConstraintFunction>,
        tolerance: &[f64],
        preconditioner: Option<Arc<dyn Preconditioner>>,
    ) -> Result<()> {
        let mut constraint = Constraint::new(function, tolerance)?;
        if let Some(preconditioner) = preconditioner {
            constraint = constraint.with_preconditioner(preconditioner);
        }
        match kind {
            ConstraintKind::Inequality => self.inequality.push(constraint),
            ConstraintKind::Equality => self.equality.push(constraint),
        }
        Ok(())
    }

    /// The inequality constraints, in insertion order.
    pub fn inequality_constraints(&self) -> &[Constraint] {
        &self.inequality
    }

    /// The equality constraints, in insertion order.
    pub fn equality_constraints(&self) -> &[Constraint] {
        &self.equality
    }

    // Stopping criteria

    /// Stops once a feasible objective value reaches `stopval` (≤ when
    /// minimizing, ≥ when maximizing).
    pub fn set_stopval(&mut self, stopval: f64) -> Result<()> {
        if stopval.is_nan() {
            return Err(OptimizerError::invalid_argument("stopval must not be NaN"));
        }
        self.criteria.stopval = Some(stopval);
        Ok(())
    }

    /// The target value, if set.
    pub fn stopval(&self) -> Option<f64> {
        self.criteria.stopval
    }

    /// Sets the relative objective tolerance (0 disables it).
    pub fn set_ftol_rel(&mut self, tol: f64) -> Result<()> {
        self.criteria.ftol_rel = non_negative("ftol_rel", tol)?;
        Ok(())
    }

    /// Relative objective tolerance.
    pub fn ftol_rel(&self) -> f64 {
        self.criteria.ftol_rel
    }

    /// Sets the absolute objective tolerance (0 disables it).
    pub fn set_ftol_abs(&mut self, tol: f64) -> Result<()> {
        self.criteria.ftol_abs = non_negative("ftol_abs", tol)?;
        Ok(())
    }

    /// Absolute objective tolerance.
    pub fn ftol_abs(&self) -> f64 {
        self.criteria.ftol_abs
    }

    /// Sets the relative point tolerance (0 disables it).
    pub fn set_xtol_rel(&mut self, tol: f64) -> Result<()> {
        self.criteria.xtol_rel = non_negative("xtol_rel", tol)?;
        Ok(())
    }

    /// Relative point tolerance.
    pub fn xtol_rel(&self) -> f64 {
        self.criteria.xtol_rel
    }

    /// Sets the per-component absolute point tolerance.
    pub fn set_xtol_abs(&mut self, tol: &[f64]) -> Result<()> {
        if tol.len() != self.dimension {
            return Err(OptimizerError::dimension_mismatch(
                "xtol_abs",
                self.dimension,
                tol.len(),
            ));
        }
        for &t in tol {
            non_negative("xtol_abs", t)?;
        }
        self.criteria.xtol_abs = Some(DVector::from_column_slice(tol));
        Ok(())
    }

    /// Sets every component of the absolute point tolerance to `tol`.
    pub fn set_xtol_abs1(&mut self, tol: f64) -> Result<()> {
        let tol = non_negative("xtol_abs", tol)?;
        self.criteria.xtol_abs = Some(DVector::from_element(self.dimension, tol));
        Ok(())
    }

    /// Absolute point tolerance (zeros when unset).
    pub fn xtol_abs(&self) -> DVector {
        self.criteria
            .xtol_abs
            .clone()
            .unwrap_or_else(|| DVector::zeros(self.dimension))
    }

    /// Sets the evaluation budget (0 = unlimited).
    pub fn set_maxeval(&mut self, maxeval: usize) {
        self.criteria.maxeval = maxeval;
    }

    /// Evaluation budget.
    pub fn maxeval(&self) -> usize {
        self.criteria.maxeval
    }

    /// Sets the time budget in seconds (0 or +∞ = unlimited).
    pub fn set_maxtime(&mut self, seconds: f64) -> Result<()> {
        let seconds = non_negative("maxtime", seconds)?;
        self.criteria.maxtime = Duration::try_from_secs_f64(seconds)
            .ok()
            .filter(|d| !d.is_zero());
        Ok(())
    }

    /// Time budget in seconds (0 = unlimited).
    pub fn maxtime(&self) -> f64 {
        self.criteria.maxtime.map_or(0.0, |d| d.as_secs_f64())
    }

    /// All stopping criteria, in the user's sense.
    pub fn stopping_criteria(&self) -> &StoppingCriteria {
        &self.criteria
    }

    // Force stop

    /// Requests termination of a running or the next optimization.
    pub fn force_stop(&self) {
        self.force_stop.stop();
    }

    /// Sets the force-stop flag to `value` (0 clears it).
    pub fn set_force_stop(&self, value: i32) {
        self.force_stop.set(value);
    }

    /// Current value of the force-stop flag.
    ///
    /// After a run ended with `ForcedStop` this is the value that stopped it.
    pub fn force_stop_value(&self) -> i32 {
        self.force_stop.get()
    }

    /// A handle that sets this session's flag from another thread.
    pub fn force_stop_handle(&self) -> ForceStop {
        self.force_stop.clone()
    }

    // Algorithm parameters

    /// Sets the population size of stochastic algorithms (0 = default).
    pub fn set_population(&mut self, population: usize) {
        self.population = population;
    }

    /// Population size (0 = algorithm default).
    pub fn population(&self) -> usize {
        self.population
    }

    /// Sets the memory of limited-memory quasi-Newton methods (0 = default).
    pub fn set_vector_storage(&mut self, vectors: usize) {
        self.vector_storage = vectors;
    }

    /// Quasi-Newton memory (0 = default).
    pub fn vector_storage(&self) -> usize {
        self.vector_storage
    }

    /// Sets the initial step of derivative-free algorithms.
    ///
    /// Every component must be finite and non-zero; the sign is ignored.
    pub fn set_initial_step(&mut self, step: &[f64]) -> Result<()> {
        if step.len() != self.dimension {
            return Err(OptimizerError::dimension_mismatch(
                "initial step",
                self.dimension,
                step.len(),
            ));
        }
        if step.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(OptimizerError::invalid_argument(
                "initial step components must be finite and non-zero",
            ));
        }
        self.initial_step = Some(DVector::from_iterator(
            self.dimension,
            step.iter().map(|s| s.abs()),
        ));
        Ok(())
    }

    /// Sets every component of the initial step to `step`.
    pub fn set_initial_step1(&mut self, step: f64) -> Result<()> {
        self.set_initial_step(&vec![step; self.dimension])
    }

    /// Sets the initial step from the bound heuristic evaluated at `x`.
    pub fn set_default_initial_step(&mut self, x: &[f64]) -> Result<()> {
        let step = self.default_step_at(x)?;
        self.initial_step = Some(step);
        Ok(())
    }

    /// The initial step an algorithm would use when started at `x`.
    pub fn initial_step(&self, x: &[f64]) -> Result<DVector> {
        match &self.initial_step {
            Some(step) => Ok(step.clone()),
            None => self.default_step_at(x),
        }
    }

    fn default_step_at(&self, x: &[f64]) -> Result<DVector> {
        if x.len() != self.dimension {
            return Err(OptimizerError::dimension_mismatch(
                "point",
                self.dimension,
                x.len(),
            ));
        }
        Ok(self
            .bounds
            .default_initial_step(&DVector::from_column_slice(x)))
    }

    /// Sets the nested local optimizer of MLSL and the augmented Lagrangian.
    ///
    /// Only the algorithm, stopping criteria and parameters of `local` are
    /// kept; its objective and constraints are replaced by the subproblem.
    pub fn set_local_optimizer(&mut self, local: &Session) -> Result<()> {
        if local.dimension != self.dimension {
            return Err(OptimizerError::dimension_mismatch(
                "local optimizer",
                self.dimension,
                local.dimension,
            ));
        }
        let mut local = local.clone();
        local.objective = None;
        local.inequality.clear();
        local.equality.clear();
        local.force_stop = ForceStop::new();
        self.local = Some(Box::new(local));
        Ok(())
    }

    /// The nested local optimizer, if one was set.
    pub fn local_optimizer(&self) -> Option<&Session> {
        self.local.as_deref()
    }

    // Seeds

    /// Seeds the random generator of stochastic algorithms.
    ///
    /// Every run starts from this seed, so repeated runs are reproducible.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Seeds the random generator from the system clock.
    pub fn seed_from_time(&mut self) {
        self.seed = time_seed();
    }

    /// The seed of the next run.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    // Optimization

    fn shape(&self, objective: &Objective) -> ProblemShape {
        ProblemShape {
            dimension: self.dimension,
            objective_gradient: objective.function.provides_gradient(),
            constraint_jacobians: self
                .inequality
                .iter()
                .chain(&self.equality)
                .all(Constraint::provides_jacobian),
            inequality: self.inequality.iter().map(Constraint::dimension).sum(),
            equality: self.equality.iter().map(Constraint::dimension).sum(),
            finite_bounds: self.bounds.is_finite(),
        }
    }

    fn strategy_config(&self, shape: &ProblemShape, sense: ObjectiveSense) -> Result<StrategyConfig> {
        Ok(StrategyConfig {
            algorithm: self.algorithm,
            population: self.population,
            vector_storage: self.vector_storage,
            initial_step: self.initial_step.clone(),
            seed: self.seed,
            local: self.nested_config(shape, sense)?,
        })
    }

    fn nested_config(
        &self,
        shape: &ProblemShape,
        sense: ObjectiveSense,
    ) -> Result<Option<Box<LocalConfig>>> {
        let Some(local_shape) = self.algorithm.local_shape(shape) else {
            return Ok(None);
        };
        let config = match &self.local {
            Some(local) => {
                local.algorithm.check(&local_shape)?;
                local.criteria.validate(local.dimension)?;
                LocalConfig {
                    strategy: local.strategy_config(&local_shape, sense)?,
                    criteria: local.criteria.to_minimization(sense),
                }
            }
            None => {
                let algorithm = Algorithm::default_local(&local_shape);
                algorithm.check(&local_shape).map_err(|err| {
                    OptimizerError::invalid_argument(format!(
                        "{} needs an explicit local optimizer: {err}",
                        self.algorithm
                    ))
                })?;
                debug!("{}: using {algorithm} as local optimizer", self.algorithm);
                LocalConfig {
                    strategy: StrategyConfig {
                        vector_storage: self.vector_storage,
                        ..StrategyConfig::new(algorithm, self.seed)
                    },
                    criteria: self.inherited_criteria(),
                }
            }
        };
        Ok(Some(Box::new(config)))
    }

    /// Tolerances handed to a default local optimizer.
    fn inherited_criteria(&self) -> StoppingCriteria {
        let mut criteria = StoppingCriteria {
            ftol_rel: self.criteria.ftol_rel,
            ftol_abs: self.criteria.ftol_abs,
            xtol_rel: self.criteria.xtol_rel,
            xtol_abs: self.criteria.xtol_abs.clone(),
            ..StoppingCriteria::default()
        };
        if !criteria.has_tolerance() {
            criteria.xtol_rel = DEFAULT_LOCAL_XTOL_REL;
        }
        criteria
    }

    /// Runs the algorithm from `x0`.
    ///
    /// Configuration errors are returned as `Err` before any evaluation.
    /// Every other termination, including callback failures and roundoff
    /// trouble, yields an [`OptimizationResult`] carrying the best point
    /// found. A starting point outside the bounds is clamped into them.
    pub fn optimize(&mut self, x0: &[f64]) -> Result<OptimizationResult> {
        if x0.len() != self.dimension {
            return Err(OptimizerError::dimension_mismatch(
                "initial point",
                self.dimension,
                x0.len(),
            ));
        }
        if x0.iter().any(|v| v.is_nan()) {
            return Err(OptimizerError::invalid_argument(
                "initial point must not contain NaN",
            ));
        }
        let objective = self
            .objective
            .clone()
            .ok_or_else(|| OptimizerError::invalid_argument("no objective function set"))?;
        self.bounds.validate()?;
        self.criteria.validate(self.dimension)?;

        let shape = self.shape(&objective);
        self.algorithm.check(&shape)?;
        let config = self.strategy_config(&shape, self.sense)?;
        validate_strategy(&config, self.dimension)?;
        let mut strategy = build_strategy(&config, &self.force_stop)?;

        let mut start = DVector::from_column_slice(x0);
        if !self.bounds.contains(&start) {
            warn!("initial point lies outside the bounds, clamping it");
            self.bounds.project(&mut start);
        }

        self.force_stop.reset();
        let started = Instant::now();
        let mut oracle = ProblemOracle::new(
            objective.function.as_ref(),
            self.sense,
            &self.bounds,
            &self.inequality,
            &self.equality,
        )
        .with_preconditioner(objective.preconditioner.as_deref());
        let outcome = drive(
            strategy.as_mut(),
            &mut oracle,
            &start,
            self.criteria.to_minimization(self.sense),
            &self.force_stop,
        );

        let result = match outcome {
            Ok(outcome) => self.report(
                outcome.status,
                outcome.best,
                start,
                outcome.evaluations,
                outcome.iterations,
                outcome.elapsed,
            ),
            Err(err @ (OptimizerError::OutOfMemory
            | OptimizerError::InvalidArgument { .. }
            | OptimizerError::UnsupportedOperation { .. })) => return Err(err),
            Err(err) => {
                warn!("{}: run aborted: {err}", self.algorithm);
                self.report(Status::Failure, None, start, 0, 0, started.elapsed())
            }
        };
        self.evaluations = result.evaluations;
        info!(
            "{}: {} with f = {:.6e} after {} evaluations",
            self.algorithm, result.status, result.value, result.evaluations
        );
        Ok(result)
    }

    fn report(
        &self,
        status: Status,
        best: Option<BestPoint>,
        start: DVector,
        evaluations: usize,
        iterations: usize,
        duration: Duration,
    ) -> OptimizationResult {
        let (point, value, violation) = match best {
            Some(best) => (best.point, self.sense.sign() * best.value, best.violation),
            None => (start, f64::NAN, f64::NAN),
        };
        OptimizationResult {
            status,
            point,
            value,
            violation,
            evaluations,
            iterations,
            duration,
        }
    }
}

fn non_negative(name: &str, value: f64) -> Result<f64> {
    if value.is_nan() || value < 0.0 {
        return Err(OptimizerError::invalid_argument(format!(
            "{name} must be a non-negative number, got {value}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use optima_core::function::{FnObjective, ScalarConstraint};
    use pretty_assertions::assert_eq;

    fn quadratic() -> impl ObjectiveFunction {
        FnObjective::with_gradient(|x: &DVector, grad: Option<&mut DVector>| {
            if let Some(g) = grad {
                g[0] = 2.0 * (x[0] - 1.0);
                g[1] = 2.0 * (x[1] - 2.0);
            }
            Ok((x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2))
        })
    }

    #[test]
    fn test_new_rejects_zero_dimension() {
        assert!(matches!(
            Session::new(0, Algorithm::LdLbfgs),
            Err(OptimizerError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_setters_validate_shape() {
        let mut s = Session::new(3, Algorithm::LnNelderMead).unwrap();
        assert!(s.set_lower_bounds(&[0.0, 0.0]).is_err());
        assert!(s.set_xtol_abs(&[1e-3; 2]).is_err());
        assert!(s.set_initial_step(&[1.0, 0.0, 1.0]).is_err());
        assert!(s.set_ftol_rel(-1.0).is_err());
        assert!(s.set_maxtime(f64::NAN).is_err());
        assert!(s.set_stopval(f64::NAN).is_err());
        assert!(s
            .add_inequality_mconstraint(
                ScalarConstraint::new(|x: &DVector, _| Ok(x[0])),
                &[0.0, 0.0]
            )
            .is_err());
    }

    #[test]
    fn test_getters_read_back() {
        let mut s = Session::new(2, Algorithm::GnCrs2Lm).unwrap();
        s.set_lower_bounds(&[-1.0, f64::NEG_INFINITY]).unwrap();
        s.set_upper_bounds1(3.0).unwrap();
        s.set_stopval(0.5).unwrap();
        s.set_xtol_abs1(1e-6).unwrap();
        s.set_maxeval(100);
        s.set_maxtime(2.5).unwrap();
        s.set_population(40);
        s.set_vector_storage(7);
        s.set_initial_step(&[-0.5, 0.25]).unwrap();

        assert_eq!(s.lower_bounds().as_slice(), &[-1.0, f64::NEG_INFINITY]);
        assert_eq!(s.upper_bounds().as_slice(), &[3.0, 3.0]);
        assert_eq!(s.stopval(), Some(0.5));
        assert_eq!(s.xtol_abs().as_slice(), &[1e-6, 1e-6]);
        assert_eq!(s.maxeval(), 100);
        assert_relative_eq!(s.maxtime(), 2.5);
        assert_eq!(s.population(), 40);
        assert_eq!(s.vector_storage(), 7);
        assert_eq!(s.initial_step(&[0.0, 0.0]).unwrap().as_slice(), &[0.5, 0.25]);

        s.set_maxtime(0.0).unwrap();
        assert_eq!(s.maxtime(), 0.0);
    }

    #[test]
    fn test_default_initial_step() {
        let mut s = Session::new(2, Algorithm::LnNelderMead).unwrap();
        s.set_lower_bounds(&[0.0, f64::NEG_INFINITY]).unwrap();
        s.set_upper_bounds(&[4.0, f64::INFINITY]).unwrap();
        let step = s.initial_step(&[2.0, -3.0]).unwrap();
        assert_relative_eq!(step[0], 1.0);
        assert_relative_eq!(step[1], 3.0);

        s.set_default_initial_step(&[0.2, 0.0]).unwrap();
        let step = s.initial_step(&[2.0, -3.0]).unwrap();
        assert_relative_eq!(step[0], 0.15);
        assert_relative_eq!(step[1], 1.0);
    }

    #[test]
    fn test_missing_objective() {
        let mut s = Session::new(1, Algorithm::LnCompass).unwrap();
        assert!(matches!(
            s.optimize(&[0.0]),
            Err(OptimizerError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_gradient_required() {
        let mut s = Session::new(2, Algorithm::LdLbfgs).unwrap();
        s.set_min_objective(FnObjective::new(|x: &DVector, _| Ok(x.norm_squared())));
        assert!(matches!(
            s.optimize(&[1.0, 1.0]),
            Err(OptimizerError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_equality_unsupported() {
        let mut s = Session::new(2, Algorithm::LnNelderMead).unwrap();
        s.set_min_objective(quadratic());
        s.add_equality_constraint(ScalarConstraint::new(|x: &DVector, _| Ok(x[0] - x[1])), 0.0)
            .unwrap();
        assert!(matches!(
            s.optimize(&[0.0, 0.0]),
            Err(OptimizerError::UnsupportedOperation { .. })
        ));
        s.remove_equality_constraints();
        s.set_xtol_rel(1e-6).unwrap();
        assert!(s.optimize(&[0.0, 0.0]).unwrap().is_success());
    }

    #[test]
    fn test_local_optimizer_dimension() {
        let mut s = Session::new(2, Algorithm::Auglag).unwrap();
        let local = Session::new(3, Algorithm::LdLbfgs).unwrap();
        assert!(s.set_local_optimizer(&local).is_err());
        assert!(s.local_optimizer().is_none());
    }

    #[test]
    fn test_local_optimizer_checked_against_subproblem() {
        let mut s = Session::new(2, Algorithm::Auglag).unwrap();
        s.set_min_objective(FnObjective::new(|x: &DVector, _| Ok(x.norm_squared())));
        s.set_local_optimizer(&Session::new(2, Algorithm::LdLbfgs).unwrap())
            .unwrap();
        assert!(matches!(
            s.optimize(&[1.0, 1.0]),
            Err(OptimizerError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_maximize_reports_user_sign() {
        let mut s = Session::new(1, Algorithm::LnCompass).unwrap();
        s.set_max_objective(FnObjective::new(|x: &DVector, _| Ok(3.0 - (x[0] - 0.5).powi(2))));
        s.set_xtol_abs1(1e-9).unwrap();
        let result = s.optimize(&[0.0]).unwrap();
        assert!(result.is_success());
        assert_relative_eq!(result.point[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(result.value, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_clone_has_own_force_stop() {
        let s = Session::new(2, Algorithm::LnCompass).unwrap();
        s.set_force_stop(3);
        let copy = s.clone();
        assert_eq!(copy.force_stop_value(), 3);
        copy.set_force_stop(0);
        assert_eq!(s.force_stop_value(), 3);
    }

    #[test]
    fn test_seed() {
        let mut s = Session::new(1, Algorithm::GnIsres).unwrap();
        s.set_seed(99);
        assert_eq!(s.seed(), 99);
        assert_eq!(s.clone().seed(), 99);
    }
}
