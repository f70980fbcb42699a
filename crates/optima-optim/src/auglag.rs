//! Augmented Lagrangian method.
//!
//! Constrained problems are solved as a sequence of bound-constrained
//! subproblems handed to a nested local optimizer. Each subproblem minimizes
//!
//! ```text
//! L(x) = f(x) + ρ/2 [ Σ_j (h_j(x) + λ_j/ρ)² + Σ_i max(0, c_i(x) + μ_i/ρ)² ]
//! ```
//!
//! after which the multipliers are updated (`λ_j += ρ h_j`,
//! `μ_i = max(0, μ_i + ρ c_i)`) and the penalty `ρ` is multiplied by 10
//! whenever the infeasibility measure failed to halve. The equality-only
//! variant leaves the inequality constraints out of `L` and passes them to
//! the local optimizer as ordinary constraints.
//!
//! The tolerance tests compare consecutive outer iterates once they are
//! feasible. A subproblem solution that satisfies every constraint exactly
//! ends the run with `Success`.
//!
//! # References
//!
//! - Birgin & Martínez, "Improving ultimate convergence of an augmented
//!   Lagrangian method", Optim. Methods Softw. 23 (2008)
//! - Conn, Gould & Toint, "A globally convergent augmented Lagrangian
//!   algorithm", SIAM J. Numer. Anal. 28 (1991)

use crate::nested::run_local;
use log::{debug, trace};
use optima_core::{
    algorithm::{Iterate, LocalConfig, StepReport, Strategy},
    bounds::Bounds,
    error::{OptimizerError, Result},
    evaluator::{ConstraintKind, Evaluation, Oracle},
    stopping::ForceStop,
    types::DVector,
};

/// Penalty multiplier applied when infeasibility does not decrease enough.
const RHO_FACTOR: f64 = 10.0;

/// Required decrease of the infeasibility measure between iterations.
const ICM_DECREASE: f64 = 0.5;

/// Configuration of the augmented Lagrangian method.
#[derive(Debug, Clone)]
pub struct AuglagConfig {
    /// Penalize equality constraints only; inequalities go to the local
    /// optimizer
    pub equality_only: bool,
    /// Nested local optimizer
    pub local: LocalConfig,
}

/// Whether local evaluation `a` ranks above `b` (feasible first, then by
/// value; infeasible ones by violation).
fn ranks_above(a: &Evaluation, b: &Evaluation) -> bool {
    match (a.feasible, b.feasible) {
        (true, false) => true,
        (false, true) => false,
        (true, true) => a.value < b.value,
        (false, false) => {
            a.violation < b.violation || (a.violation == b.violation && a.value < b.value)
        }
    }
}

/// The subproblem seen by the local optimizer.
///
/// Remembers the parent evaluation at the best subproblem point, since the
/// local run only reports values of `L`.
struct LagrangianOracle<'a> {
    parent: &'a mut dyn Oracle,
    rho: f64,
    lambda: &'a DVector,
    mu: &'a DVector,
    pass_inequality: bool,
    empty: DVector,
    best: Option<(Evaluation, Evaluation)>,
}

impl<'a> LagrangianOracle<'a> {
    fn new(
        parent: &'a mut dyn Oracle,
        rho: f64,
        lambda: &'a DVector,
        mu: &'a DVector,
        pass_inequality: bool,
    ) -> Self {
        Self {
            parent,
            rho,
            lambda,
            mu,
            pass_inequality,
            empty: DVector::zeros(0),
            best: None,
        }
    }

    fn into_best(self) -> Option<Evaluation> {
        self.best.map(|(parent, _)| parent)
    }

    fn lagrangian(&self, e: &Evaluation, derivatives: bool) -> Result<(f64, Option<DVector>)> {
        let rho = self.rho;
        let mut value = e.value;
        let mut gradient = if derivatives {
            Some(e.gradient()?.clone())
        } else {
            None
        };

        if !e.equality.is_empty() {
            let weights = e.equality.map(|h| h * rho) + self.lambda;
            value += weights.iter().map(|w| w * w).sum::<f64>() / (2.0 * rho);
            if let Some(g) = gradient.as_mut() {
                let jacobian = e.equality_jacobian.as_ref().ok_or_else(|| {
                    OptimizerError::failure("equality Jacobian was not computed")
                })?;
                g.gemv_tr(1.0, jacobian, &weights, 1.0);
            }
        }

        if !self.pass_inequality && !e.inequality.is_empty() {
            let weights = (e.inequality.map(|c| c * rho) + self.mu).map(|w| w.max(0.0));
            value += weights.iter().map(|w| w * w).sum::<f64>() / (2.0 * rho);
            if let Some(g) = gradient.as_mut() {
                let jacobian = e.inequality_jacobian.as_ref().ok_or_else(|| {
                    OptimizerError::failure("inequality Jacobian was not computed")
                })?;
                g.gemv_tr(1.0, jacobian, &weights, 1.0);
            }
        }
        Ok((value, gradient))
    }
}

impl Oracle for LagrangianOracle<'_> {
    fn dimension(&self) -> usize {
        self.parent.dimension()
    }

    fn bounds(&self) -> &Bounds {
        self.parent.bounds()
    }

    fn provides_gradient(&self) -> bool {
        self.parent.provides_gradient()
    }

    fn inequality_tolerance(&self) -> &DVector {
        if self.pass_inequality {
            self.parent.inequality_tolerance()
        } else {
            &self.empty
        }
    }

    fn equality_tolerance(&self) -> &DVector {
        &self.empty
    }

    fn evaluate(&mut self, x: &DVector, derivatives: bool) -> Result<Evaluation> {
        let parent = self.parent.evaluate(x, derivatives)?;
        let (value, gradient) = self.lagrangian(&parent, derivatives)?;
        let (inequality, inequality_jacobian) = if self.pass_inequality {
            (parent.inequality.clone(), parent.inequality_jacobian.clone())
        } else {
            (DVector::zeros(0), None)
        };
        let mut local = Evaluation {
            point: parent.point.clone(),
            value,
            gradient,
            inequality,
            equality: DVector::zeros(0),
            inequality_jacobian,
            equality_jacobian: None,
            violation: 0.0,
            feasible: true,
        };
        local.assess(self.inequality_tolerance(), &self.empty);

        if local.is_valid() && self.best.as_ref().map_or(true, |(_, b)| ranks_above(&local, b)) {
            self.best = Some((parent, local.clone()));
        }
        Ok(local)
    }

    fn is_preconditioned(&self) -> bool {
        self.parent.is_preconditioned()
    }

    /// Hessian-vector product of the Lagrangian: `H_f v + Σ λ_j H_hj v +
    /// Σ μ_i H_ci v`, skipping constraints without a preconditioner.
    fn precondition(&self, x: &DVector, v: &DVector, out: &mut DVector) -> Result<bool> {
        if !self.parent.precondition(x, v, out)? {
            return Ok(false);
        }
        let mut term = DVector::zeros(v.len());
        for (j, &weight) in self.lambda.iter().enumerate() {
            if weight != 0.0
                && self.parent.precondition_constraint(
                    ConstraintKind::Equality,
                    j,
                    x,
                    v,
                    &mut term,
                )?
            {
                out.axpy(weight, &term, 1.0);
            }
        }
        if !self.pass_inequality {
            for (i, &weight) in self.mu.iter().enumerate() {
                if weight != 0.0
                    && self.parent.precondition_constraint(
                        ConstraintKind::Inequality,
                        i,
                        x,
                        v,
                        &mut term,
                    )?
                {
                    out.axpy(weight, &term, 1.0);
                }
            }
        }
        Ok(true)
    }

    fn precondition_constraint(
        &self,
        kind: ConstraintKind,
        component: usize,
        x: &DVector,
        v: &DVector,
        out: &mut DVector,
    ) -> Result<bool> {
        match kind {
            ConstraintKind::Inequality if self.pass_inequality => self
                .parent
                .precondition_constraint(kind, component, x, v, out),
            _ => Ok(false),
        }
    }
}

/// Augmented Lagrangian optimizer.
#[derive(Debug)]
pub struct Auglag {
    config: AuglagConfig,
    force_stop: ForceStop,
    rho: f64,
    lambda: DVector,
    mu: DVector,
    previous_icm: f64,
    current: Option<(Iterate, bool)>,
    runs: u64,
}

impl Auglag {
    /// Creates the optimizer. Subproblem runs observe `force_stop`.
    pub fn new(config: AuglagConfig, force_stop: ForceStop) -> Self {
        Self {
            config,
            force_stop,
            rho: 1.0,
            lambda: DVector::zeros(0),
            mu: DVector::zeros(0),
            previous_icm: f64::INFINITY,
            current: None,
            runs: 0,
        }
    }

    /// Current penalty parameter ρ.
    pub fn penalty(&self) -> f64 {
        self.rho
    }

    /// Current equality multipliers λ.
    pub fn equality_multipliers(&self) -> &DVector {
        &self.lambda
    }

    /// Current inequality multipliers μ (empty for the equality-only
    /// variant).
    pub fn inequality_multipliers(&self) -> &DVector {
        &self.mu
    }

    fn penalized_inequality<'e>(&self, e: &'e Evaluation) -> &'e [f64] {
        if self.config.equality_only {
            &[]
        } else {
            e.inequality.as_slice()
        }
    }

    fn initial_penalty(&self, e: &Evaluation) -> f64 {
        let violation: f64 = e.equality.iter().map(|h| h * h).sum::<f64>()
            + self
                .penalized_inequality(e)
                .iter()
                .map(|c| c.max(0.0).powi(2))
                .sum::<f64>();
        if violation > 0.0 && e.value.is_finite() {
            (2.0 * e.value.abs() / violation).clamp(1e-6, 10.0)
        } else {
            1.0
        }
    }

    /// Updates the multipliers and the penalty; returns the infeasibility
    /// measure.
    fn update_multipliers(&mut self, e: &Evaluation) -> f64 {
        let rho = self.rho;
        let mut icm: f64 = 0.0;
        for (lambda, h) in self.lambda.iter_mut().zip(e.equality.iter()) {
            icm = icm.max(h.abs());
            *lambda += rho * h;
        }
        if !self.config.equality_only {
            for (mu, c) in self.mu.iter_mut().zip(e.inequality.iter()) {
                icm = icm.max(c.max(-*mu / rho).abs());
                *mu = (*mu + rho * c).max(0.0);
            }
        }
        if icm > ICM_DECREASE * self.previous_icm {
            self.rho *= RHO_FACTOR;
        }
        self.previous_icm = icm;
        icm
    }
}

impl Strategy for Auglag {
    fn name(&self) -> &str {
        if self.config.equality_only {
            "AUGLAG_EQ"
        } else {
            "AUGLAG"
        }
    }

    fn initialize(&mut self, oracle: &mut dyn Oracle, x0: &DVector) -> Result<StepReport> {
        let x = oracle.bounds().projected(x0);
        let evaluation = oracle.evaluate(&x, false)?;
        self.lambda = DVector::zeros(oracle.equality_count());
        self.mu = if self.config.equality_only {
            DVector::zeros(0)
        } else {
            DVector::zeros(oracle.inequality_count())
        };
        self.rho = self.initial_penalty(&evaluation);
        self.previous_icm = f64::INFINITY;
        self.runs = 0;
        debug!("{}: initial penalty ρ = {:.3e}", self.name(), self.rho);
        self.current = Some((Iterate::new(x, evaluation.value), evaluation.feasible));
        Ok(StepReport::idle())
    }

    fn step(&mut self, oracle: &mut dyn Oracle) -> Result<StepReport> {
        let Some((previous, previous_feasible)) = self.current.clone() else {
            return Err(OptimizerError::failure("augmented Lagrangian used before initialization"));
        };

        let mut subproblem = LagrangianOracle::new(
            oracle,
            self.rho,
            &self.lambda,
            &self.mu,
            self.config.equality_only,
        );
        let outcome = run_local(
            &self.config.local,
            self.runs,
            &mut subproblem,
            &previous.point,
            &self.force_stop,
        )?;
        let found = subproblem.into_best();
        self.runs += 1;

        let Some(evaluation) = found else {
            return Err(OptimizerError::failure(format!(
                "local optimizer found no valid point ({})",
                outcome.status
            )));
        };
        let icm = self.update_multipliers(&evaluation);
        trace!(
            "{}: f = {:.6e}, ICM = {icm:.3e}, ρ = {:.3e}",
            self.name(),
            evaluation.value,
            self.rho
        );

        let current = Iterate::new(evaluation.point.clone(), evaluation.value);
        self.current = Some((current.clone(), evaluation.feasible));
        if !evaluation.feasible {
            return Ok(StepReport::idle());
        }
        if icm == 0.0 {
            return Ok(StepReport::moved(previous, current).stationary());
        }
        if previous_feasible {
            return Ok(StepReport::moved(previous, current));
        }
        Ok(StepReport::idle())
    }
}
