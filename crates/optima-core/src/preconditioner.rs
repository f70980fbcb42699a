//! Preconditioners for objectives and constraints.
//!
//! A preconditioner supplies an approximate Hessian-vector product
//! `v ↦ H(x) v` for a function. Gradient-based algorithms use its diagonal as
//! an initial inverse-Hessian scaling, which improves the conditioning of
//! badly scaled problems.

use crate::{error::Result, types::DVector};
use std::fmt::{self, Debug};

/// Approximate Hessian-vector product `out = H(x) v`.
///
/// `H(x)` should be symmetric positive semi-definite.
pub trait Preconditioner: Debug {
    /// Applies the approximate Hessian at `x` to `v`.
    fn apply(&self, x: &DVector, v: &DVector, out: &mut DVector) -> Result<()>;

    /// Returns the name of this preconditioner.
    fn name(&self) -> &str {
        "Generic Preconditioner"
    }
}

/// Identity preconditioner (no preconditioning).
#[derive(Debug, Clone, Copy)]
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, _x: &DVector, v: &DVector, out: &mut DVector) -> Result<()> {
        out.copy_from(v);
        Ok(())
    }

    fn name(&self) -> &str {
        "Identity"
    }
}

/// Diagonal preconditioner with a fixed diagonal.
#[derive(Debug, Clone)]
pub struct DiagonalPreconditioner {
    diagonal: DVector,
}

impl DiagonalPreconditioner {
    /// Creates a diagonal preconditioner `H = diag(diagonal)`.
    pub fn new(diagonal: DVector) -> Self {
        Self { diagonal }
    }
}

impl Preconditioner for DiagonalPreconditioner {
    fn apply(&self, _x: &DVector, v: &DVector, out: &mut DVector) -> Result<()> {
        out.copy_from(&self.diagonal.component_mul(v));
        Ok(())
    }

    fn name(&self) -> &str {
        "Diagonal"
    }
}

/// Closure-backed preconditioner.
pub struct FnPreconditioner<F> {
    f: F,
}

impl<F> FnPreconditioner<F>
where
    F: Fn(&DVector, &DVector, &mut DVector) -> Result<()>,
{
    /// Wraps `f(x, v, out)` computing `out = H(x) v`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Debug for FnPreconditioner<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPreconditioner").finish_non_exhaustive()
    }
}

impl<F> Preconditioner for FnPreconditioner<F>
where
    F: Fn(&DVector, &DVector, &mut DVector) -> Result<()>,
{
    fn apply(&self, x: &DVector, v: &DVector, out: &mut DVector) -> Result<()> {
        (self.f)(x, v, out)
    }
}

/// Estimates the diagonal of `H(x)` with N unit-vector products.
///
/// Non-positive or non-finite entries are replaced by 1 so that the result
/// can always be inverted.
pub fn diagonal_estimate(preconditioner: &dyn Preconditioner, x: &DVector) -> Result<DVector> {
    diagonal_from_products(x.len(), |e, hv| preconditioner.apply(x, e, hv))
}

/// Diagonal of a linear map of dimension `n` given by its products
/// `product(v, out)`, with the same replacement rule as
/// [`diagonal_estimate`].
pub fn diagonal_from_products<F>(n: usize, mut product: F) -> Result<DVector>
where
    F: FnMut(&DVector, &mut DVector) -> Result<()>,
{
    let mut diagonal = DVector::from_element(n, 1.0);
    let mut e = DVector::zeros(n);
    let mut hv = DVector::zeros(n);
    for i in 0..n {
        e[i] = 1.0;
        product(&e, &mut hv)?;
        e[i] = 0.0;
        if hv[i].is_finite() && hv[i] > 0.0 {
            diagonal[i] = hv[i];
        }
    }
    Ok(diagonal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity() {
        let v = DVector::from_vec(vec![1.0, -2.0]);
        let mut out = DVector::zeros(2);
        IdentityPreconditioner.apply(&v, &v, &mut out).unwrap();
        assert_eq!(out, v);
    }

    #[test]
    fn test_diagonal_estimate() {
        let p = DiagonalPreconditioner::new(DVector::from_vec(vec![4.0, 0.0, -1.0]));
        let x = DVector::zeros(3);
        let d = diagonal_estimate(&p, &x).unwrap();
        assert_relative_eq!(d[0], 4.0);
        assert_relative_eq!(d[1], 1.0);
        assert_relative_eq!(d[2], 1.0);
    }

    #[test]
    fn test_fn_preconditioner() {
        let p = FnPreconditioner::new(|_x: &DVector, v: &DVector, out: &mut DVector| {
            out.copy_from(&(v * 3.0));
            Ok(())
        });
        let x = DVector::zeros(2);
        let d = diagonal_estimate(&p, &x).unwrap();
        assert_relative_eq!(d[1], 3.0);
    }
}
