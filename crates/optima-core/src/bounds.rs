//! Box constraints on the optimization variables.
//!
//! A [`Bounds`] value stores the lower and upper bound vectors of a problem of
//! dimension N. Entries may be infinite. Bounds are stored exactly as set, so
//! reading them back yields the same values; the consistency check
//! `lower ≤ upper` is deferred to [`Bounds::validate`] because callers may set
//! the two sides in any order.

use crate::{
    error::{OptimizerError, Result},
    types::{constants, DVector},
};
use std::f64::consts::LN_2;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lower and upper bounds of dimension N.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    lower: DVector,
    upper: DVector,
}

impl Bounds {
    /// Creates unbounded box constraints (−∞, +∞)^N.
    pub fn unbounded(dimension: usize) -> Self {
        Self {
            lower: DVector::from_element(dimension, f64::NEG_INFINITY),
            upper: DVector::from_element(dimension, f64::INFINITY),
        }
    }

    /// Creates bounds from explicit vectors.
    pub fn new(lower: DVector, upper: DVector) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(OptimizerError::dimension_mismatch(
                "upper bounds",
                lower.len(),
                upper.len(),
            ));
        }
        Ok(Self { lower, upper })
    }

    /// Problem dimension.
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// Lower bound vector.
    pub fn lower(&self) -> &DVector {
        &self.lower
    }

    /// Upper bound vector.
    pub fn upper(&self) -> &DVector {
        &self.upper
    }

    /// Sets every lower bound. The slice must have length N.
    pub fn set_lower(&mut self, lower: &[f64]) -> Result<()> {
        Self::assign(&mut self.lower, lower, "lower bounds")
    }

    /// Sets every lower bound to the same value.
    pub fn set_lower1(&mut self, value: f64) -> Result<()> {
        Self::check_not_nan(value, "lower bound")?;
        self.lower.fill(value);
        Ok(())
    }

    /// Sets every upper bound. The slice must have length N.
    pub fn set_upper(&mut self, upper: &[f64]) -> Result<()> {
        Self::assign(&mut self.upper, upper, "upper bounds")
    }

    /// Sets every upper bound to the same value.
    pub fn set_upper1(&mut self, value: f64) -> Result<()> {
        Self::check_not_nan(value, "upper bound")?;
        self.upper.fill(value);
        Ok(())
    }

    fn assign(target: &mut DVector, values: &[f64], what: &str) -> Result<()> {
        if values.len() != target.len() {
            return Err(OptimizerError::dimension_mismatch(
                what,
                target.len(),
                values.len(),
            ));
        }
        for &v in values {
            Self::check_not_nan(v, what)?;
        }
        target.copy_from_slice(values);
        Ok(())
    }

    fn check_not_nan(value: f64, what: &str) -> Result<()> {
        if value.is_nan() {
            return Err(OptimizerError::invalid_argument(format!(
                "{what} must not be NaN"
            )));
        }
        Ok(())
    }

    /// Checks `lower[i] ≤ upper[i]` for every component.
    pub fn validate(&self) -> Result<()> {
        for (i, (lo, hi)) in self.lower.iter().zip(self.upper.iter()).enumerate() {
            if lo > hi {
                return Err(OptimizerError::invalid_argument(format!(
                    "lower bound {lo} exceeds upper bound {hi} in component {i}"
                )));
            }
        }
        Ok(())
    }

    /// Returns true if every bound is finite.
    pub fn is_finite(&self) -> bool {
        self.lower.iter().chain(self.upper.iter()).all(|b| b.is_finite())
    }

    /// Returns true if `x` lies inside the box.
    pub fn contains(&self, x: &DVector) -> bool {
        x.iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(xi, (lo, hi))| xi >= lo && xi <= hi)
    }

    /// Clamps `x` into the box in place.
    pub fn project(&self, x: &mut DVector) {
        for ((xi, lo), hi) in x.iter_mut().zip(self.lower.iter()).zip(self.upper.iter()) {
            *xi = xi.max(*lo).min(*hi);
        }
    }

    /// Returns a copy of `x` clamped into the box.
    pub fn projected(&self, x: &DVector) -> DVector {
        let mut y = x.clone();
        self.project(&mut y);
        y
    }

    /// Width `upper[i] - lower[i]` of component `i`.
    pub fn width(&self, i: usize) -> f64 {
        self.upper[i] - self.lower[i]
    }

    /// Natural logarithm of the product of the widths.
    ///
    /// Finite for any finite box, even when the product itself overflows;
    /// infinite unless [`Bounds::is_finite`].
    pub fn ln_volume(&self) -> f64 {
        (0..self.dimension())
            .map(|i| (self.upper[i] / 2.0 - self.lower[i] / 2.0).ln() + LN_2)
            .sum()
    }

    /// Heuristic initial step for derivative-free methods starting at `x`.
    ///
    /// Uses a quarter of the bound range when both sides are finite, shrinks
    /// the step so that it stays inside a nearby finite bound, and falls back
    /// to `|x_i|` (or 1 at the origin) for unbounded components.
    pub fn default_initial_step(&self, x: &DVector) -> DVector {
        let mut step = DVector::zeros(self.dimension());
        for i in 0..self.dimension() {
            let (lo, hi, xi) = (self.lower[i], self.upper[i], x[i]);
            let mut s = f64::INFINITY;

            if lo.is_finite() && hi.is_finite() && hi > lo {
                s = s.min((hi - lo) * constants::DEFAULT_STEP_FRACTION);
            }
            if hi.is_finite() && hi > xi && hi - xi < s {
                s = (hi - xi) * 0.75;
            }
            if lo.is_finite() && xi > lo && xi - lo < s {
                s = (xi - lo) * 0.75;
            }
            if s.is_infinite() {
                s = if xi != 0.0 { xi.abs() } else { 1.0 };
            }
            step[i] = s.max(constants::MIN_INITIAL_STEP);
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_read_back_exact() {
        let mut b = Bounds::unbounded(3);
        b.set_lower(&[-1.0, f64::NEG_INFINITY, 0.5]).unwrap();
        b.set_upper1(2.0).unwrap();
        assert_eq!(b.lower().as_slice(), &[-1.0, f64::NEG_INFINITY, 0.5]);
        assert_eq!(b.upper().as_slice(), &[2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut b = Bounds::unbounded(2);
        let err = b.set_lower(&[0.0]).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidArgument { .. }));
        assert!(b.set_upper(&[0.0, 1.0, 2.0]).is_err());
        assert!(b.set_lower1(f64::NAN).is_err());
    }

    #[test]
    fn test_validation_deferred() {
        let mut b = Bounds::unbounded(2);
        // Setting the lower side first is allowed even though it
        // temporarily conflicts with nothing; conflicts only fail validate().
        b.set_lower1(5.0).unwrap();
        b.set_upper(&[10.0, 1.0]).unwrap();
        assert!(b.validate().is_err());
        b.set_upper1(10.0).unwrap();
        assert!(b.validate().is_ok());
    }

    #[test]
    fn test_projection() {
        let mut b = Bounds::unbounded(2);
        b.set_lower1(-1.0).unwrap();
        b.set_upper1(1.0).unwrap();
        let x = DVector::from_vec(vec![3.0, -0.5]);
        assert!(!b.contains(&x));
        let p = b.projected(&x);
        assert_eq!(p.as_slice(), &[1.0, -0.5]);
        assert!(b.contains(&p));
        assert_relative_eq!(b.ln_volume(), 4.0f64.ln(), epsilon = 1e-12);

        let mut wide = Bounds::unbounded(2);
        wide.set_lower1(-f64::MAX).unwrap();
        wide.set_upper1(f64::MAX).unwrap();
        assert!(wide.ln_volume().is_finite());
        assert!(Bounds::unbounded(2).ln_volume().is_infinite());
    }

    #[test]
    fn test_default_initial_step() {
        let mut b = Bounds::unbounded(3);
        b.set_lower(&[-10.0, f64::NEG_INFINITY, f64::NEG_INFINITY]).unwrap();
        b.set_upper(&[10.0, f64::INFINITY, 1.0]).unwrap();
        let x = DVector::from_vec(vec![0.0, -4.0, 0.9]);
        let step = b.default_initial_step(&x);
        assert_relative_eq!(step[0], 5.0);
        assert_relative_eq!(step[1], 4.0);
        assert_relative_eq!(step[2], 0.075, epsilon = 1e-12);

        let origin = DVector::zeros(3);
        let unbounded = Bounds::unbounded(3).default_initial_step(&origin);
        assert!(unbounded.iter().all(|&s| s == 1.0));
    }
}
