// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodynamic Observer Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Criterion benchmarks for the audit path run after every sampler step.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{Array2, ArrayD};

use thermodiff_energy::EnergyState;
use thermodiff_observers::{analyze, BoltzmannMetrics, EntropyValidator};

// ── Helpers ─────────────────────────────────────────────────────────

fn wave_map(n: usize, phase: f64) -> ArrayD<f64> {
    Array2::from_shape_fn((n, n), |(i, j)| 1.0 + 0.3 * ((i + 2 * j) as f64 * 0.2 + phase).sin())
        .into_dyn()
}

fn wave_state(n: usize, phase: f64) -> EnergyState {
    EnergyState::from_raw_array(wave_map(n, phase), 1.0).unwrap()
}

// ── spectral::analyze() ─────────────────────────────────────────────

fn bench_spectrum_32(c: &mut Criterion) {
    let map = wave_map(32, 0.0);
    c.bench_function("spectrum_32x32", |b| b.iter(|| analyze(black_box(&map))));
}

fn bench_spectrum_128(c: &mut Criterion) {
    let map = wave_map(128, 0.0);
    c.bench_function("spectrum_128x128", |b| b.iter(|| analyze(black_box(&map))));
}

// ── EntropyValidator ────────────────────────────────────────────────

fn bench_validate_transition(c: &mut Criterion) {
    let validator = EntropyValidator::default();
    let a = wave_state(32, 0.0);
    let b_state = wave_state(32, 0.1);
    c.bench_function("validate_transition_32x32", |b| {
        b.iter(|| validator.validate_transition(black_box(&a), black_box(&b_state)))
    });
}

fn bench_validate_trajectory_50(c: &mut Criterion) {
    let validator = EntropyValidator::default();
    let states: Vec<EnergyState> = (0..50).map(|k| wave_state(16, k as f64 * 0.01)).collect();
    c.bench_function("validate_trajectory_50x16x16", |b| {
        b.iter(|| validator.validate_trajectory(black_box(&states)))
    });
}

// ── BoltzmannMetrics ────────────────────────────────────────────────

fn bench_boltzmann_summary(c: &mut Criterion) {
    let metrics = BoltzmannMetrics::new(1.0).unwrap();
    let energies: Vec<f64> = (0..1024).map(|i| (i as f64 * 0.37).sin() * 4.0).collect();
    c.bench_function("boltzmann_summary_1024", |b| {
        b.iter(|| metrics.summarize(black_box(&energies)))
    });
}

criterion_group!(
    benches,
    bench_spectrum_32,
    bench_spectrum_128,
    bench_validate_transition,
    bench_validate_trajectory_50,
    bench_boltzmann_summary,
);
criterion_main!(benches);
