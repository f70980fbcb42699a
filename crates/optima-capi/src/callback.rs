//! Adapters from C function pointers to the optimizer's callback traits.
//!
//! Gradients and Jacobians are exchanged through caller-visible buffers: a
//! null gradient pointer means no derivative is requested. Jacobians of
//! m-constraints are row-major `m × n` arrays, `grad[i * n + j] = ∂cᵢ/∂xⱼ`.

use optima_core::{
    error::Result,
    function::{ConstraintFunction, ObjectiveFunction},
    preconditioner::Preconditioner,
    types::{DMatrix, DVector},
};
use std::os::raw::{c_uint, c_void};
use std::ptr;

/// Objective or scalar constraint: returns f(x), fills `gradient` when it
/// is not null.
pub type OptimaFunc = Option<
    unsafe extern "C" fn(n: c_uint, x: *const f64, gradient: *mut f64, data: *mut c_void) -> f64,
>;

/// Vector-valued constraint: writes `m` values into `result`, fills the
/// row-major Jacobian when `gradient` is not null.
pub type OptimaMFunc = Option<
    unsafe extern "C" fn(
        m: c_uint,
        result: *mut f64,
        n: c_uint,
        x: *const f64,
        gradient: *mut f64,
        data: *mut c_void,
    ),
>;

/// Preconditioner: writes `H(x) v` into `vpre`.
pub type OptimaPrecond = Option<
    unsafe extern "C" fn(n: c_uint, x: *const f64, v: *const f64, vpre: *mut f64, data: *mut c_void),
>;

type RawFunc =
    unsafe extern "C" fn(n: c_uint, x: *const f64, gradient: *mut f64, data: *mut c_void) -> f64;
type RawMFunc = unsafe extern "C" fn(
    m: c_uint,
    result: *mut f64,
    n: c_uint,
    x: *const f64,
    gradient: *mut f64,
    data: *mut c_void,
);
type RawPrecond =
    unsafe extern "C" fn(n: c_uint, x: *const f64, v: *const f64, vpre: *mut f64, data: *mut c_void);

/// Wraps a C objective.
///
/// The C calling convention cannot say whether the callback computes
/// gradients, so it is assumed to whenever the algorithm asks.
#[derive(Debug)]
pub(crate) struct CObjective {
    f: RawFunc,
    n: c_uint,
    data: *mut c_void,
}

impl CObjective {
    pub(crate) fn new(f: OptimaFunc, n: c_uint, data: *mut c_void) -> Option<Self> {
        f.map(|f| Self { f, n, data })
    }
}

impl ObjectiveFunction for CObjective {
    fn evaluate(&self, x: &DVector, gradient: Option<&mut DVector>) -> Result<f64> {
        let grad = gradient.map_or(ptr::null_mut(), |g| g.as_mut_ptr());
        // SAFETY: `x` and a non-null `grad` hold `n` contiguous values; the
        // user guarantees `data` is valid for the callback.
        Ok(unsafe { (self.f)(self.n, x.as_ptr(), grad, self.data) })
    }

    fn provides_gradient(&self) -> bool {
        true
    }
}

/// Wraps a scalar C constraint.
#[derive(Debug)]
pub(crate) struct CConstraint {
    f: RawFunc,
    n: c_uint,
    data: *mut c_void,
}

impl CConstraint {
    pub(crate) fn new(f: OptimaFunc, n: c_uint, data: *mut c_void) -> Option<Self> {
        f.map(|f| Self { f, n, data })
    }
}

impl ConstraintFunction for CConstraint {
    fn dimension(&self) -> usize {
        1
    }

    fn evaluate(
        &self,
        x: &DVector,
        result: &mut DVector,
        jacobian: Option<&mut DMatrix>,
    ) -> Result<()> {
        match jacobian {
            Some(jac) => {
                let mut grad = DVector::zeros(x.len());
                // SAFETY: see `CObjective::evaluate`.
                result[0] =
                    unsafe { (self.f)(self.n, x.as_ptr(), grad.as_mut_ptr(), self.data) };
                jac.row_mut(0).copy_from(&grad.transpose());
            }
            None => {
                // SAFETY: see `CObjective::evaluate`.
                result[0] = unsafe { (self.f)(self.n, x.as_ptr(), ptr::null_mut(), self.data) };
            }
        }
        Ok(())
    }

    fn provides_jacobian(&self) -> bool {
        true
    }
}

/// Wraps an m-component C constraint.
#[derive(Debug)]
pub(crate) struct CMConstraint {
    f: RawMFunc,
    m: c_uint,
    n: c_uint,
    data: *mut c_void,
}

impl CMConstraint {
    pub(crate) fn new(f: OptimaMFunc, m: c_uint, n: c_uint, data: *mut c_void) -> Option<Self> {
        f.map(|f| Self { f, m, n, data })
    }
}

impl ConstraintFunction for CMConstraint {
    fn dimension(&self) -> usize {
        self.m as usize
    }

    fn evaluate(
        &self,
        x: &DVector,
        result: &mut DVector,
        jacobian: Option<&mut DMatrix>,
    ) -> Result<()> {
        let (m, n) = (self.m as usize, self.n as usize);
        match jacobian {
            Some(jac) => {
                let mut rows = vec![0.0; m * n];
                // SAFETY: `result` holds `m` values, `rows` holds `m * n`.
                unsafe {
                    (self.f)(
                        self.m,
                        result.as_mut_ptr(),
                        self.n,
                        x.as_ptr(),
                        rows.as_mut_ptr(),
                        self.data,
                    );
                }
                jac.copy_from(&DMatrix::from_row_slice(m, n, &rows));
            }
            None => {
                // SAFETY: `result` holds `m` values.
                unsafe {
                    (self.f)(
                        self.m,
                        result.as_mut_ptr(),
                        self.n,
                        x.as_ptr(),
                        ptr::null_mut(),
                        self.data,
                    );
                }
            }
        }
        Ok(())
    }

    fn provides_jacobian(&self) -> bool {
        true
    }
}

/// Wraps a C preconditioner.
#[derive(Debug)]
pub(crate) struct CPreconditioner {
    f: RawPrecond,
    n: c_uint,
    data: *mut c_void,
}

impl CPreconditioner {
    pub(crate) fn new(f: OptimaPrecond, n: c_uint, data: *mut c_void) -> Option<Self> {
        f.map(|f| Self { f, n, data })
    }
}

impl Preconditioner for CPreconditioner {
    fn apply(&self, x: &DVector, v: &DVector, out: &mut DVector) -> Result<()> {
        // SAFETY: `x`, `v` and `out` hold `n` contiguous values.
        unsafe { (self.f)(self.n, x.as_ptr(), v.as_ptr(), out.as_mut_ptr(), self.data) };
        Ok(())
    }

    fn name(&self) -> &str {
        "C preconditioner"
    }
}
