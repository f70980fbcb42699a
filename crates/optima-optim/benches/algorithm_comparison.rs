//! Benchmarks comparing the optimization algorithms
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use optima_core::{
    algorithm::{Algorithm, LocalConfig, StrategyConfig},
    bounds::Bounds,
    driver::drive,
    evaluator::{ObjectiveSense, ProblemOracle},
    function::QuadraticObjective,
    stopping::{ForceStop, StoppingCriteria},
    types::DVector,
};
use optima_optim::build_strategy;

fn quadratic(dim: usize) -> QuadraticObjective {
    let center = DVector::from_fn(dim, |i, _| (i as f64 + 1.0) / dim as f64);
    QuadraticObjective::shifted_sphere(&center)
}

fn box_bounds(dim: usize) -> Bounds {
    Bounds::new(
        DVector::from_element(dim, -5.0),
        DVector::from_element(dim, 5.0),
    )
    .unwrap()
}

fn solve(algorithm: Algorithm, f: &QuadraticObjective, bounds: &Bounds, maxeval: usize) {
    let force = ForceStop::new();
    let mut config = StrategyConfig::new(algorithm, 42);
    if algorithm.capabilities().nested_local {
        config.local = Some(Box::new(LocalConfig {
            strategy: StrategyConfig::new(Algorithm::LdLbfgs, 42),
            criteria: StoppingCriteria::new().with_xtol_rel(1e-8),
        }));
    }
    let mut strategy = build_strategy(&config, &force).unwrap();
    let mut oracle = ProblemOracle::new(f, ObjectiveSense::Minimize, bounds, &[], &[]);
    let x0 = DVector::zeros(bounds.dimension());
    let _ = drive(
        strategy.as_mut(),
        &mut oracle,
        black_box(&x0),
        StoppingCriteria::new()
            .with_xtol_rel(1e-6)
            .with_maxeval(maxeval),
        &force,
    );
}

fn benchmark_local_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_methods");

    for &dim in &[2, 10, 50] {
        let f = quadratic(dim);
        let bounds = box_bounds(dim);
        for algorithm in [
            Algorithm::LdLbfgs,
            Algorithm::LdSteepestDescent,
            Algorithm::LnNelderMead,
            Algorithm::LnCompass,
        ] {
            group.bench_with_input(BenchmarkId::new(algorithm.code(), dim), &dim, |b, _| {
                b.iter(|| solve(algorithm, black_box(&f), &bounds, 20_000));
            });
        }
    }

    group.finish();
}

fn benchmark_global_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("global_methods");
    group.sample_size(10);

    for &dim in &[2, 5] {
        let f = quadratic(dim);
        let bounds = box_bounds(dim);
        for algorithm in [Algorithm::GnCrs2Lm, Algorithm::GnIsres, Algorithm::GMlsl] {
            group.bench_with_input(BenchmarkId::new(algorithm.code(), dim), &dim, |b, _| {
                b.iter(|| solve(algorithm, black_box(&f), &bounds, 5_000));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_local_methods, benchmark_global_methods);
criterion_main!(benches);
