// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Diffusion Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Criterion benchmarks for the diffusion hot path:
//!   - Schedule + coefficient table construction
//!   - Single forward / reverse step with energy guidance
//!   - Full sampler runs (ddim, energy-guided)

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{Array2, ArrayD};

use thermodiff_core::{
    ForwardDiffusion, NoiseSchedule, ReverseDiffusion, Sampler, ScheduleCoefficients,
};
use thermodiff_energy::EnergyField;
use thermodiff_types::{DiffusionConfig, SamplerConfig, ScheduleType};

const N: usize = 32;

// ── Helpers ─────────────────────────────────────────────────────────

fn make_config(schedule_type: ScheduleType) -> DiffusionConfig {
    DiffusionConfig {
        timesteps: 1000,
        schedule_type,
        seed: Some(7),
        ..DiffusionConfig::default()
    }
}

fn make_field() -> EnergyField {
    EnergyField::new(&[N, N], 1.0, 0.01).unwrap()
}

fn make_x() -> ArrayD<f64> {
    Array2::from_shape_fn((N, N), |(i, j)| ((i * N + j) as f64 * 0.05).sin() * 0.5).into_dyn()
}

// ── Schedules ───────────────────────────────────────────────────────

fn bench_cosine_schedule(c: &mut Criterion) {
    let cfg = make_config(ScheduleType::Cosine);
    c.bench_function("cosine_schedule_1000", |b| {
        b.iter(|| NoiseSchedule::from_config(black_box(&cfg)))
    });
}

fn bench_boltzmann_coefficients(c: &mut Criterion) {
    let schedule = NoiseSchedule::from_config(&make_config(ScheduleType::Boltzmann)).unwrap();
    c.bench_function("boltzmann_coefficients_1000", |b| {
        b.iter(|| ScheduleCoefficients::from_betas(black_box(schedule.betas())))
    });
}

// ── Single steps ────────────────────────────────────────────────────

fn bench_forward_step(c: &mut Criterion) {
    let cfg = make_config(ScheduleType::Linear);
    let mut fwd = ForwardDiffusion::new(&cfg).unwrap();
    let field = make_field();
    let x = make_x();
    c.bench_function("forward_step_32x32", |b| {
        b.iter(|| fwd.forward_step(black_box(&x), 500, Some(&field)))
    });
}

fn bench_reverse_step(c: &mut Criterion) {
    let cfg = make_config(ScheduleType::Linear);
    let mut rev = ReverseDiffusion::new(&cfg).unwrap();
    let field = make_field();
    let x = make_x();
    c.bench_function("reverse_step_32x32", |b| {
        b.iter(|| rev.reverse_step(black_box(&x), 500, Some(&field), true))
    });
}

// ── Sampler runs ────────────────────────────────────────────────────

fn bench_ddim_50(c: &mut Criterion) {
    let cfg = make_config(ScheduleType::Cosine);
    let rev = ReverseDiffusion::new(&cfg).unwrap();
    let field = make_field();
    let x = make_x();
    let mut sampler = Sampler::new(SamplerConfig::Ddim { num_steps: 50, eta: 0.0 }, Some(1));
    c.bench_function("ddim_50_steps_32x32", |b| {
        b.iter(|| sampler.sample(&rev, Some(&field), black_box(x.clone())))
    });
}

fn bench_energy_guided_20x4(c: &mut Criterion) {
    let cfg = make_config(ScheduleType::Cosine);
    let rev = ReverseDiffusion::new(&cfg).unwrap();
    let field = make_field();
    let x = make_x();
    let mut sampler = Sampler::new(
        SamplerConfig::EnergyGuided {
            num_steps: 20,
            eta: 0.5,
            num_proposals: 4,
            exploration_scale: 0.1,
        },
        Some(1),
    );
    c.bench_function("energy_guided_20x4_32x32", |b| {
        b.iter(|| sampler.sample(&rev, Some(&field), black_box(x.clone())))
    });
}

criterion_group!(
    benches,
    bench_cosine_schedule,
    bench_boltzmann_coefficients,
    bench_forward_step,
    bench_reverse_step,
    bench_ddim_50,
    bench_energy_guided_20x4,
);
criterion_main!(benches);
