// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — End-to-End Diffusion Pipeline Tests
// ─────────────────────────────────────────────────────────────────────
//! Model, samplers and observers wired together the way callers use them.

use std::sync::Arc;

use ndarray::{Array2, ArrayD};

use thermodiff_core::{DiffusionModel, ExternalPredictor, ReverseDiffusion, Sampler};
use thermodiff_energy::{EnergyField, EnergyState};
use thermodiff_observers::{BoltzmannMetrics, EntropyValidator};
use thermodiff_types::{DiffusionConfig, SamplerConfig, ScheduleType};

// ── Helpers ─────────────────────────────────────────────────────────

fn config(schedule_type: ScheduleType, timesteps: usize) -> DiffusionConfig {
    DiffusionConfig {
        timesteps,
        schedule_type,
        seed: Some(2024),
        ..DiffusionConfig::default()
    }
}

fn signal() -> ArrayD<f64> {
    Array2::from_shape_fn((8, 8), |(i, j)| 0.4 * ((i as f64 * 0.5).sin() + (j as f64 * 0.3).cos()) / 2.0)
        .into_dyn()
}

// ── Model round trip ────────────────────────────────────────────────

#[test]
fn test_diffuse_denoise_then_audit() {
    let mut model = DiffusionModel::new(config(ScheduleType::Cosine, 40), &[8, 8]).unwrap();
    let x0 = signal();
    let (xt, forward_metrics) = model.diffuse(&x0, None).unwrap();
    assert_eq!(forward_metrics.len(), 40);

    let (x_hat, reverse_metrics) = model.denoise(&xt, None, true).unwrap();
    assert_eq!(reverse_metrics.len(), 40);
    assert!(x_hat.iter().all(|v| v.is_finite()));
    assert_eq!(model.energy_field().current_state().metadata().step, 40);

    let validator = EntropyValidator::default();
    let start = EnergyState::from_raw_array(xt, 1.0).unwrap();
    let end = model.energy_field().current_state().clone();
    let m = validator.validate_transition(&start, &end);
    assert!((0.0..=1.0 + 1e-12).contains(&m.overall_score), "score = {}", m.overall_score);
    assert!(m.entropy_production >= 0.0);
    assert!(m.spectral_energy >= 0.0);
}

#[test]
fn test_sampler_trajectory_feeds_validator() {
    let cfg = config(ScheduleType::Linear, 100);
    let reverse = ReverseDiffusion::new(&cfg).unwrap();
    let field = EnergyField::from_config(&[8, 8], &cfg).unwrap();
    let mut sampler =
        Sampler::new(SamplerConfig::Ddim { num_steps: 10, eta: 0.0 }, Some(5)).recording_states(true);
    let trace = sampler.sample_from_noise(&reverse, Some(&field), &[8, 8]).unwrap();
    assert_eq!(trace.states.len(), 11);

    let summary = EntropyValidator::default().validate_trajectory(&trace.states);
    assert_eq!(summary.num_transitions, 10);
    assert_eq!(summary.transitions.len(), 10);
    assert!((0.0..=1.0).contains(&summary.pass_rate));
}

#[test]
fn test_oracle_predictor_recovers_signal_with_deterministic_ddim() {
    let cfg = config(ScheduleType::Linear, 200);
    let mut model = DiffusionModel::new(cfg.clone(), &[8, 8]).unwrap();
    let x0 = signal();
    let (xt, _) = model.forward_mut().add_noise(&x0, 199, None).unwrap();

    let alphas_cumprod = model.forward().coefficients().alphas_cumprod.clone();
    let target = x0.clone();
    let oracle = ExternalPredictor::new(move |x, t| {
        let ab = alphas_cumprod[t];
        Ok((x - &(&target * ab.sqrt())) / (1.0 - ab).sqrt())
    });
    let reverse = ReverseDiffusion::new(&cfg).unwrap().with_predictor(Arc::new(oracle));

    let mut sampler = Sampler::new(SamplerConfig::Ddim { num_steps: 20, eta: 0.0 }, Some(9));
    let trace = sampler.sample(&reverse, None, xt).unwrap();
    let err = (&trace.sample - &x0).mapv(f64::abs).fold(0.0f64, |a, &b| a.max(b));
    assert!(err < 1e-6, "max reconstruction error {err}");
}

#[test]
fn test_energy_guided_sampler_records_selections() {
    let cfg = config(ScheduleType::Boltzmann, 60);
    let reverse = ReverseDiffusion::new(&cfg).unwrap();
    let field = EnergyField::from_config(&[8, 8], &cfg).unwrap();
    let mut sampler = Sampler::new(
        SamplerConfig::EnergyGuided {
            num_steps: 6,
            eta: 0.5,
            num_proposals: 3,
            exploration_scale: 0.2,
        },
        Some(11),
    );
    let trace = sampler.sample_from_noise(&reverse, Some(&field), &[8, 8]).unwrap();
    assert_eq!(trace.timesteps, vec![50, 40, 30, 20, 10, 0]);
    assert_eq!(trace.selections.len(), 6);
    assert!(trace.selections.iter().all(|&k| k < 3));
}

// ── Ensemble metrics ────────────────────────────────────────────────

#[test]
fn test_boltzmann_metrics_on_denoised_state() {
    let mut model = DiffusionModel::new(config(ScheduleType::Linear, 20), &[8, 8]).unwrap();
    let x = model.sample(&[8, 8], Some(10)).unwrap();
    assert_eq!(x.shape(), &[8, 8]);

    let state = model.energy_field().current_state();
    let metrics = BoltzmannMetrics::for_state(state);
    let energies: Vec<f64> = state.energy_map().iter().copied().collect();
    let s = metrics.summarize(&energies).unwrap();
    assert!(s.free_energy.is_finite());
    assert!(s.entropy >= 0.0 && s.entropy <= (64.0f64).ln() + 1e-9);
    let e_min = energies.iter().copied().fold(f64::INFINITY, f64::min);
    assert!(s.free_energy <= s.expected_energy - e_min + 1e-8);
    assert!(s.free_energy <= 0.0);
}
