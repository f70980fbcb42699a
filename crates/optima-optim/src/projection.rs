//! Active-set helpers for bound-constrained gradient methods.
//!
//! A component is *active* when the point sits on one of its bounds and the
//! gradient pushes it further out. Active components are frozen: their
//! gradient and search-direction entries are zeroed.

use optima_core::{
    bounds::Bounds, error::Result, evaluator::Oracle, preconditioner::diagonal_from_products,
    types::DVector,
};

/// Returns a mask of the active components at `x` for gradient `g`.
pub fn active_set(bounds: &Bounds, x: &DVector, g: &DVector) -> Vec<bool> {
    (0..x.len())
        .map(|i| {
            (x[i] <= bounds.lower()[i] && g[i] > 0.0) || (x[i] >= bounds.upper()[i] && g[i] < 0.0)
        })
        .collect()
}

/// Gradient with the active components zeroed.
pub fn projected_gradient(bounds: &Bounds, x: &DVector, g: &DVector) -> DVector {
    let mut pg = g.clone();
    freeze(&active_set(bounds, x, g), &mut pg);
    pg
}

/// Zeroes the entries of `v` flagged in `active`.
pub fn freeze(active: &[bool], v: &mut DVector) {
    for (vi, &a) in v.iter_mut().zip(active) {
        if a {
            *vi = 0.0;
        }
    }
}

/// Diagonal of the objective preconditioner at `x`, if the oracle has one.
///
/// Entries that are not positive and finite are replaced by 1.
pub fn hessian_diagonal(oracle: &dyn Oracle, x: &DVector) -> Result<Option<DVector>> {
    if !oracle.is_preconditioned() {
        return Ok(None);
    }
    diagonal_from_products(x.len(), |e, hv| oracle.precondition(x, e, hv).map(|_| ()))
        .map(Some)
}
