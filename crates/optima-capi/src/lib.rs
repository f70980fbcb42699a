#![allow(unsafe_code)]

//! C interface to optima.
//!
//! Every operation of [`optima::Session`] is exported as an `extern "C"`
//! function over an opaque [`OptimaSession`] handle. Setters return a result
//! code (`1` on success, a negative code otherwise); `optima_optimize`
//! returns the termination status of the run. Codes are those of
//! [`optima::Status::code`].
//!
//! Algorithms are identified by their index in [`optima::Algorithm::ALL`].
//!
//! # Threads
//!
//! A handle must not be used from two threads at once, with one exception:
//! `optima_force_stop` and `optima_set_force_stop` may be called from any
//! thread or from inside a callback while `optima_optimize` runs. Other
//! calls made on a handle whose optimization is in progress fail with
//! `INVALID_ARGS`.

mod callback;
mod error;

pub use callback::{OptimaFunc, OptimaMFunc, OptimaPrecond};

use callback::{CConstraint, CMConstraint, CObjective, CPreconditioner};
use error::{code_of, error_code, SUCCESS};
use log::warn;
use optima::{Algorithm, Session, Status};
use optima_core::{evaluator::ConstraintKind, preconditioner::Preconditioner, stopping::ForceStop};
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint, c_ulong, c_void};
use std::ptr;
use std::slice;
use std::sync::{Arc, OnceLock};

const INVALID: c_int = -2;

/// Opaque session handle.
pub struct OptimaSession {
    session: RefCell<Session>,
    force_stop: ForceStop,
}

impl OptimaSession {
    fn into_raw(session: Session) -> *mut Self {
        let force_stop = session.force_stop_handle();
        Box::into_raw(Box::new(Self {
            session: RefCell::new(session),
            force_stop,
        }))
    }
}

/// # Safety
///
/// `p` is null or a live handle returned by `optima_create` or `optima_copy`.
unsafe fn handle<'a>(p: *const OptimaSession) -> Option<&'a OptimaSession> {
    p.as_ref()
}

/// # Safety
///
/// `p` is null or points to `n` readable values.
unsafe fn values<'a>(p: *const f64, n: usize) -> Option<&'a [f64]> {
    (!p.is_null()).then(|| slice::from_raw_parts(p, n))
}

/// # Safety
///
/// `p` is null or points to `n` writable values.
unsafe fn values_mut<'a>(p: *mut f64, n: usize) -> Option<&'a mut [f64]> {
    (!p.is_null()).then(|| slice::from_raw_parts_mut(p, n))
}

fn busy() -> c_int {
    warn!("session is in use by a running optimization");
    INVALID
}

/// # Safety
///
/// See [`handle`].
unsafe fn configure<F>(p: *mut OptimaSession, f: F) -> c_int
where
    F: FnOnce(&mut Session) -> optima::Result<()>,
{
    let Some(h) = handle(p) else {
        return INVALID;
    };
    let Ok(mut session) = h.session.try_borrow_mut() else {
        return busy();
    };
    code_of(f(&mut session))
}

/// # Safety
///
/// See [`handle`].
unsafe fn inspect<R, F>(p: *const OptimaSession, default: R, f: F) -> R
where
    F: FnOnce(&Session) -> R,
{
    match handle(p).map(|h| h.session.try_borrow()) {
        Some(Ok(session)) => f(&session),
        _ => default,
    }
}

fn algorithm_at(index: c_int) -> Option<Algorithm> {
    usize::try_from(index)
        .ok()
        .and_then(|i| Algorithm::ALL.get(i).copied())
}

fn algorithm_index(algorithm: Algorithm) -> c_int {
    Algorithm::ALL
        .iter()
        .position(|a| *a == algorithm)
        .and_then(|i| c_int::try_from(i).ok())
        .unwrap_or(-1)
}

fn dimension_of(session: &Session) -> c_uint {
    c_uint::try_from(session.dimension()).unwrap_or(c_uint::MAX)
}

// Creation

/// Creates a session for `n` variables; returns null on invalid arguments.
#[no_mangle]
pub extern "C" fn optima_create(algorithm: c_int, n: c_uint) -> *mut OptimaSession {
    let Some(algorithm) = algorithm_at(algorithm) else {
        warn!("unknown algorithm index {algorithm}");
        return ptr::null_mut();
    };
    match Session::new(n as usize, algorithm) {
        Ok(session) => OptimaSession::into_raw(session),
        Err(err) => {
            error_code(&err);
            ptr::null_mut()
        }
    }
}

/// Destroys a session and everything attached to it.
///
/// # Safety
///
/// `p` is null or a live handle; it must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn optima_destroy(p: *mut OptimaSession) {
    if !p.is_null() {
        drop(Box::from_raw(p));
    }
}

/// Copies a session; callbacks and their user data are shared.
///
/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_copy(p: *const OptimaSession) -> *mut OptimaSession {
    inspect(p, ptr::null_mut(), |s| OptimaSession::into_raw(s.clone()))
}

/// Runs the optimization from `x`, overwriting it with the best point and
/// `opt_f` with its objective value.
///
/// # Safety
///
/// `p` is a live handle, `x` points to `n` values and `opt_f` to one.
#[no_mangle]
pub unsafe extern "C" fn optima_optimize(
    p: *mut OptimaSession,
    x: *mut f64,
    opt_f: *mut f64,
) -> c_int {
    let Some(h) = handle(p) else {
        return INVALID;
    };
    let Ok(mut session) = h.session.try_borrow_mut() else {
        return busy();
    };
    let Some(x) = values_mut(x, session.dimension()) else {
        return INVALID;
    };
    if opt_f.is_null() {
        return INVALID;
    }
    match session.optimize(x) {
        Ok(result) => {
            x.copy_from_slice(result.point.as_slice());
            *opt_f = result.value;
            result.status.code()
        }
        Err(err) => error_code(&err),
    }
}

// Objective

/// # Safety
///
/// `p` is null or a live handle; `data` stays valid while the session uses
/// `f`.
#[no_mangle]
pub unsafe extern "C" fn optima_set_min_objective(
    p: *mut OptimaSession,
    f: OptimaFunc,
    data: *mut c_void,
) -> c_int {
    configure(p, |s| {
        let objective = CObjective::new(f, dimension_of(s), data)
            .ok_or_else(|| optima::OptimizerError::invalid_argument("null objective"))?;
        s.set_min_objective(objective);
        Ok(())
    })
}

/// # Safety
///
/// See [`optima_set_min_objective`].
#[no_mangle]
pub unsafe extern "C" fn optima_set_max_objective(
    p: *mut OptimaSession,
    f: OptimaFunc,
    data: *mut c_void,
) -> c_int {
    configure(p, |s| {
        let objective = CObjective::new(f, dimension_of(s), data)
            .ok_or_else(|| optima::OptimizerError::invalid_argument("null objective"))?;
        s.set_max_objective(objective);
        Ok(())
    })
}

/// # Safety
///
/// See [`optima_set_min_objective`]; `pre` shares `data`.
#[no_mangle]
pub unsafe extern "C" fn optima_set_precond_min_objective(
    p: *mut OptimaSession,
    f: OptimaFunc,
    pre: OptimaPrecond,
    data: *mut c_void,
) -> c_int {
    configure(p, |s| {
        let n = dimension_of(s);
        let (Some(objective), Some(pre)) = (
            CObjective::new(f, n, data),
            CPreconditioner::new(pre, n, data),
        ) else {
            return Err(optima::OptimizerError::invalid_argument("null callback"));
        };
        s.set_precond_min_objective(objective, pre);
        Ok(())
    })
}

/// # Safety
///
/// See [`optima_set_precond_min_objective`].
#[no_mangle]
pub unsafe extern "C" fn optima_set_precond_max_objective(
    p: *mut OptimaSession,
    f: OptimaFunc,
    pre: OptimaPrecond,
    data: *mut c_void,
) -> c_int {
    configure(p, |s| {
        let n = dimension_of(s);
        let (Some(objective), Some(pre)) = (
            CObjective::new(f, n, data),
            CPreconditioner::new(pre, n, data),
        ) else {
            return Err(optima::OptimizerError::invalid_argument("null callback"));
        };
        s.set_precond_max_objective(objective, pre);
        Ok(())
    })
}

/// Index of the session's algorithm, or -1 for a null handle.
///
/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_algorithm(p: *const OptimaSession) -> c_int {
    inspect(p, -1, |s| algorithm_index(s.algorithm()))
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_dimension(p: *const OptimaSession) -> c_uint {
    inspect(p, 0, dimension_of)
}

// Bounds

/// # Safety
///
/// `p` is null or a live handle; `lb` is null or points to `n` values.
#[no_mangle]
pub unsafe extern "C" fn optima_set_lower_bounds(p: *mut OptimaSession, lb: *const f64) -> c_int {
    configure(p, |s| {
        let lb = values(lb, s.dimension())
            .ok_or_else(|| optima::OptimizerError::invalid_argument("null bounds"))?;
        s.set_lower_bounds(lb)
    })
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_lower_bounds1(p: *mut OptimaSession, lb: f64) -> c_int {
    configure(p, |s| s.set_lower_bounds1(lb))
}

/// # Safety
///
/// `p` is null or a live handle; `lb` is null or points to `n` writable values.
#[no_mangle]
pub unsafe extern "C" fn optima_get_lower_bounds(p: *const OptimaSession, lb: *mut f64) -> c_int {
    inspect(p, INVALID, |s| match values_mut(lb, s.dimension()) {
        Some(out) => {
            out.copy_from_slice(s.lower_bounds().as_slice());
            SUCCESS
        }
        None => INVALID,
    })
}

/// # Safety
///
/// See [`optima_set_lower_bounds`].
#[no_mangle]
pub unsafe extern "C" fn optima_set_upper_bounds(p: *mut OptimaSession, ub: *const f64) -> c_int {
    configure(p, |s| {
        let ub = values(ub, s.dimension())
            .ok_or_else(|| optima::OptimizerError::invalid_argument("null bounds"))?;
        s.set_upper_bounds(ub)
    })
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_upper_bounds1(p: *mut OptimaSession, ub: f64) -> c_int {
    configure(p, |s| s.set_upper_bounds1(ub))
}

/// # Safety
///
/// See [`optima_get_lower_bounds`].
#[no_mangle]
pub unsafe extern "C" fn optima_get_upper_bounds(p: *const OptimaSession, ub: *mut f64) -> c_int {
    inspect(p, INVALID, |s| match values_mut(ub, s.dimension()) {
        Some(out) => {
            out.copy_from_slice(s.upper_bounds().as_slice());
            SUCCESS
        }
        None => INVALID,
    })
}

// Constraints

/// # Safety
///
/// See [`configure`]; `data` stays valid while the session uses the callbacks.
unsafe fn add_scalar(
    p: *mut OptimaSession,
    kind: ConstraintKind,
    fc: OptimaFunc,
    pre: Option<OptimaPrecond>,
    data: *mut c_void,
    tol: f64,
) -> c_int {
    configure(p, |s| {
        let n = dimension_of(s);
        let constraint = CConstraint::new(fc, n, data)
            .ok_or_else(|| optima::OptimizerError::invalid_argument("null constraint"))?;
        let preconditioner: Option<Arc<dyn Preconditioner>> = match pre {
            Some(pre) => Some(Arc::new(CPreconditioner::new(pre, n, data).ok_or_else(
                || optima::OptimizerError::invalid_argument("null preconditioner"),
            )?)),
            None => None,
        };
        s.add_constraint(kind, Arc::new(constraint), &[tol], preconditioner)
    })
}

/// # Safety
///
/// See [`add_scalar`]; `tol` is null or points to `m` values.
unsafe fn add_vector(
    p: *mut OptimaSession,
    kind: ConstraintKind,
    m: c_uint,
    fc: OptimaMFunc,
    data: *mut c_void,
    tol: *const f64,
) -> c_int {
    configure(p, |s| {
        let constraint = CMConstraint::new(fc, m, dimension_of(s), data)
            .ok_or_else(|| optima::OptimizerError::invalid_argument("null constraint"))?;
        let tol = match values(tol, m as usize) {
            Some(tol) => tol.to_vec(),
            None => vec![0.0; m as usize],
        };
        s.add_constraint(kind, Arc::new(constraint), &tol, None)
    })
}

/// Removes every inequality constraint.
///
/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_remove_inequality_constraints(p: *mut OptimaSession) -> c_int {
    configure(p, |s| {
        s.remove_inequality_constraints();
        Ok(())
    })
}

/// Adds `fc(x) ≤ tol`.
///
/// # Safety
///
/// `p` is null or a live handle; `data` stays valid while the session uses
/// `fc`.
#[no_mangle]
pub unsafe extern "C" fn optima_add_inequality_constraint(
    p: *mut OptimaSession,
    fc: OptimaFunc,
    data: *mut c_void,
    tol: f64,
) -> c_int {
    add_scalar(p, ConstraintKind::Inequality, fc, None, data, tol)
}

/// # Safety
///
/// See [`optima_add_inequality_constraint`]; `pre` shares `data`.
#[no_mangle]
pub unsafe extern "C" fn optima_add_precond_inequality_constraint(
    p: *mut OptimaSession,
    fc: OptimaFunc,
    pre: OptimaPrecond,
    data: *mut c_void,
    tol: f64,
) -> c_int {
    add_scalar(p, ConstraintKind::Inequality, fc, Some(pre), data, tol)
}

/// Adds `m` inequality constraints evaluated together; a null `tol` means
/// zero tolerance.
///
/// # Safety
///
/// See [`optima_add_inequality_constraint`]; `tol` is null or points to `m`
/// values.
#[no_mangle]
pub unsafe extern "C" fn optima_add_inequality_mconstraint(
    p: *mut OptimaSession,
    m: c_uint,
    fc: OptimaMFunc,
    data: *mut c_void,
    tol: *const f64,
) -> c_int {
    add_vector(p, ConstraintKind::Inequality, m, fc, data, tol)
}

/// Removes every equality constraint.
///
/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_remove_equality_constraints(p: *mut OptimaSession) -> c_int {
    configure(p, |s| {
        s.remove_equality_constraints();
        Ok(())
    })
}

/// Adds `|h(x)| ≤ tol`.
///
/// # Safety
///
/// See [`optima_add_inequality_constraint`].
#[no_mangle]
pub unsafe extern "C" fn optima_add_equality_constraint(
    p: *mut OptimaSession,
    h: OptimaFunc,
    data: *mut c_void,
    tol: f64,
) -> c_int {
    add_scalar(p, ConstraintKind::Equality, h, None, data, tol)
}

/// # Safety
///
/// See [`optima_add_precond_inequality_constraint`].
#[no_mangle]
pub unsafe extern "C" fn optima_add_precond_equality_constraint(
    p: *mut OptimaSession,
    h: OptimaFunc,
    pre: OptimaPrecond,
    data: *mut c_void,
    tol: f64,
) -> c_int {
    add_scalar(p, ConstraintKind::Equality, h, Some(pre), data, tol)
}

/// # Safety
///
/// See [`optima_add_inequality_mconstraint`].
#[no_mangle]
pub unsafe extern "C" fn optima_add_equality_mconstraint(
    p: *mut OptimaSession,
    m: c_uint,
    h: OptimaMFunc,
    data: *mut c_void,
    tol: *const f64,
) -> c_int {
    add_vector(p, ConstraintKind::Equality, m, h, data, tol)
}

// Stopping criteria

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_stopval(p: *mut OptimaSession, stopval: f64) -> c_int {
    configure(p, |s| s.set_stopval(stopval))
}

/// The target value; `-HUGE_VAL` (`+HUGE_VAL` when maximizing) if unset.
///
/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_stopval(p: *const OptimaSession) -> f64 {
    inspect(p, f64::NAN, |s| {
        s.stopval()
            .unwrap_or(-s.sense().sign() * f64::INFINITY)
    })
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_ftol_rel(p: *mut OptimaSession, tol: f64) -> c_int {
    configure(p, |s| s.set_ftol_rel(tol))
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_ftol_rel(p: *const OptimaSession) -> f64 {
    inspect(p, f64::NAN, Session::ftol_rel)
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_ftol_abs(p: *mut OptimaSession, tol: f64) -> c_int {
    configure(p, |s| s.set_ftol_abs(tol))
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_ftol_abs(p: *const OptimaSession) -> f64 {
    inspect(p, f64::NAN, Session::ftol_abs)
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_xtol_rel(p: *mut OptimaSession, tol: f64) -> c_int {
    configure(p, |s| s.set_xtol_rel(tol))
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_xtol_rel(p: *const OptimaSession) -> f64 {
    inspect(p, f64::NAN, Session::xtol_rel)
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_xtol_abs1(p: *mut OptimaSession, tol: f64) -> c_int {
    configure(p, |s| s.set_xtol_abs1(tol))
}

/// # Safety
///
/// `p` is null or a live handle; `tol` is null or points to `n` values.
#[no_mangle]
pub unsafe extern "C" fn optima_set_xtol_abs(p: *mut OptimaSession, tol: *const f64) -> c_int {
    configure(p, |s| {
        let tol = values(tol, s.dimension())
            .ok_or_else(|| optima::OptimizerError::invalid_argument("null tolerance"))?;
        s.set_xtol_abs(tol)
    })
}

/// # Safety
///
/// `p` is null or a live handle; `tol` is null or points to `n` writable
/// values.
#[no_mangle]
pub unsafe extern "C" fn optima_get_xtol_abs(p: *const OptimaSession, tol: *mut f64) -> c_int {
    inspect(p, INVALID, |s| match values_mut(tol, s.dimension()) {
        Some(out) => {
            out.copy_from_slice(s.xtol_abs().as_slice());
            SUCCESS
        }
        None => INVALID,
    })
}

/// Sets the evaluation budget; zero or negative means unlimited.
///
/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_maxeval(p: *mut OptimaSession, maxeval: c_int) -> c_int {
    configure(p, |s| {
        s.set_maxeval(usize::try_from(maxeval).unwrap_or(0));
        Ok(())
    })
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_maxeval(p: *const OptimaSession) -> c_int {
    inspect(p, 0, |s| c_int::try_from(s.maxeval()).unwrap_or(c_int::MAX))
}

/// Evaluations performed by the last optimization.
///
/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_numevals(p: *const OptimaSession) -> c_int {
    inspect(p, 0, |s| c_int::try_from(s.evaluations()).unwrap_or(c_int::MAX))
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_maxtime(p: *mut OptimaSession, seconds: f64) -> c_int {
    configure(p, |s| s.set_maxtime(seconds))
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_maxtime(p: *const OptimaSession) -> f64 {
    inspect(p, f64::NAN, Session::maxtime)
}

// Force stop

/// Requests termination of the running or next optimization.
///
/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_force_stop(p: *const OptimaSession) -> c_int {
    optima_set_force_stop(p, 1)
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_force_stop(p: *const OptimaSession, value: c_int) -> c_int {
    match handle(p) {
        Some(h) => {
            h.force_stop.set(value);
            SUCCESS
        }
        None => INVALID,
    }
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_force_stop(p: *const OptimaSession) -> c_int {
    handle(p).map_or(0, |h| h.force_stop.get())
}

// Algorithm parameters

/// Uses a copy of `local`'s algorithm and criteria for nested runs.
///
/// # Safety
///
/// `p` and `local` are null or live handles.
#[no_mangle]
pub unsafe extern "C" fn optima_set_local_optimizer(
    p: *mut OptimaSession,
    local: *const OptimaSession,
) -> c_int {
    let Some(local) = inspect(local, None, |s| Some(s.clone())) else {
        return INVALID;
    };
    configure(p, |s| s.set_local_optimizer(&local))
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_population(p: *mut OptimaSession, pop: c_uint) -> c_int {
    configure(p, |s| {
        s.set_population(pop as usize);
        Ok(())
    })
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_population(p: *const OptimaSession) -> c_uint {
    inspect(p, 0, |s| c_uint::try_from(s.population()).unwrap_or(c_uint::MAX))
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_vector_storage(p: *mut OptimaSession, dim: c_uint) -> c_int {
    configure(p, |s| {
        s.set_vector_storage(dim as usize);
        Ok(())
    })
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_get_vector_storage(p: *const OptimaSession) -> c_uint {
    inspect(p, 0, |s| c_uint::try_from(s.vector_storage()).unwrap_or(c_uint::MAX))
}

/// Sets the initial step from the bound heuristic at `x`.
///
/// # Safety
///
/// `p` is null or a live handle; `x` is null or points to `n` values.
#[no_mangle]
pub unsafe extern "C" fn optima_set_default_initial_step(
    p: *mut OptimaSession,
    x: *const f64,
) -> c_int {
    configure(p, |s| {
        let x = values(x, s.dimension())
            .ok_or_else(|| optima::OptimizerError::invalid_argument("null point"))?;
        s.set_default_initial_step(x)
    })
}

/// # Safety
///
/// `p` is null or a live handle; `dx` is null or points to `n` values.
#[no_mangle]
pub unsafe extern "C" fn optima_set_initial_step(p: *mut OptimaSession, dx: *const f64) -> c_int {
    configure(p, |s| {
        let dx = values(dx, s.dimension())
            .ok_or_else(|| optima::OptimizerError::invalid_argument("null step"))?;
        s.set_initial_step(dx)
    })
}

/// # Safety
///
/// `p` is null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn optima_set_initial_step1(p: *mut OptimaSession, dx: f64) -> c_int {
    configure(p, |s| s.set_initial_step1(dx))
}

/// Writes into `dx` the initial step used when starting at `x`.
///
/// # Safety
///
/// `p` is null or a live handle; `x` and `dx` are null or point to `n`
/// values.
#[no_mangle]
pub unsafe extern "C" fn optima_get_initial_step(
    p: *const OptimaSession,
    x: *const f64,
    dx: *mut f64,
) -> c_int {
    inspect(p, INVALID, |s| {
        let n = s.dimension();
        let (Some(x), Some(out)) = (values(x, n), values_mut(dx, n)) else {
            return INVALID;
        };
        match s.initial_step(x) {
            Ok(step) => {
                out.copy_from_slice(step.as_slice());
                SUCCESS
            }
            Err(err) => error_code(&err),
        }
    })
}

// Process-wide settings and names

/// Seeds every session created afterwards.
#[no_mangle]
pub extern "C" fn optima_srand(seed: c_ulong) {
    optima::set_default_seed(u64::from(seed));
}

/// Seeds every session created afterwards from the system clock.
#[no_mangle]
pub extern "C" fn optima_srand_time() {
    optima::default_seed_from_time();
}

/// Writes the library version; null pointers are skipped.
///
/// # Safety
///
/// Each pointer is null or writable.
#[no_mangle]
pub unsafe extern "C" fn optima_version(major: *mut c_int, minor: *mut c_int, bugfix: *mut c_int) {
    let (a, b, c) = optima::version_parts();
    for (out, value) in [(major, a), (minor, b), (bugfix, c)] {
        if let Some(out) = out.as_mut() {
            *out = c_int::try_from(value).unwrap_or(c_int::MAX);
        }
    }
}

fn algorithm_names() -> &'static [CString] {
    static NAMES: OnceLock<Vec<CString>> = OnceLock::new();
    NAMES.get_or_init(|| {
        Algorithm::ALL
            .iter()
            .map(|a| CString::new(a.name()).unwrap_or_default())
            .collect()
    })
}

/// Human-readable name of an algorithm, or null for an unknown index.
#[no_mangle]
pub extern "C" fn optima_algorithm_name(algorithm: c_int) -> *const c_char {
    usize::try_from(algorithm)
        .ok()
        .and_then(|i| algorithm_names().get(i))
        .map_or(ptr::null(), |name| name.as_ptr())
}

/// Index of the algorithm with code `name` (e.g. `"LD_LBFGS"`), or -1.
///
/// # Safety
///
/// `name` is null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn optima_algorithm_from_string(name: *const c_char) -> c_int {
    if name.is_null() {
        return -1;
    }
    CStr::from_ptr(name)
        .to_str()
        .ok()
        .and_then(|s| s.parse::<Algorithm>().ok())
        .map_or(-1, algorithm_index)
}

/// Name of a result code, e.g. `"XTOL_REACHED"`.
#[no_mangle]
pub extern "C" fn optima_result_to_string(code: c_int) -> *const c_char {
    error::describe(code).as_ptr()
}

/// Whether a result code denotes success.
#[no_mangle]
pub extern "C" fn optima_result_is_success(code: c_int) -> c_int {
    c_int::from(Status::from_code(code).is_some_and(Status::is_success))
}
