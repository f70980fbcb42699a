//! Random sampling helpers shared by the stochastic algorithms.

use optima_core::{bounds::Bounds, types::DVector};
use rand::Rng;
use rand_distr::StandardNormal;

/// Uniform sample in a finite box.
pub fn uniform_in_box<R: Rng + ?Sized>(rng: &mut R, bounds: &Bounds) -> DVector {
    DVector::from_fn(bounds.dimension(), |i, _| {
        let (lo, hi) = (bounds.lower()[i], bounds.upper()[i]);
        if hi > lo {
            rng.gen_range(lo..=hi)
        } else {
            lo
        }
    })
}

/// Standard normal draw.
pub fn normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.sample(StandardNormal)
}

/// NaN objective values rank behind every number.
pub fn rank(value: f64) -> f64 {
    if value.is_nan() {
        f64::INFINITY
    } else {
        value
    }
}
