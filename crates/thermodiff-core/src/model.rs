// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Diffusion Model (Forward + Reverse + Field)
// ─────────────────────────────────────────────────────────────────────
//! Composition of the forward process, the reverse process and one
//! energy field.
//!
//!   diffuse   x_0 → x_T via `forward_step`, per-step drift tracked
//!   denoise   x_T → x_0 via `reverse_step`, the field updated each step
//!   sample    N(0, I) start, then `denoise`
//!
//! Each trajectory returns [`TrajectoryMetrics`]; soft violations the
//! field reports are collected there rather than raised.

use std::sync::Arc;

use ndarray::ArrayD;

use thermodiff_energy::{EnergyField, NoiseSource, EPS};
use thermodiff_types::{
    DiffusionConfig, StepMetrics, ThermodiffError, ThermodiffResult, TrajectoryMetrics,
};

use crate::coefficients::ScheduleCoefficients;
use crate::forward::{ensure_same_shape, ForwardDiffusion};
use crate::predictor::NoisePredictor;
use crate::reverse::ReverseDiffusion;
use crate::schedule::{AdaptationEvent, NoiseSchedule};

#[derive(Debug, Clone)]
pub struct DiffusionModel {
    config: DiffusionConfig,
    schedule: NoiseSchedule,
    forward: ForwardDiffusion,
    reverse: ReverseDiffusion,
    energy_field: EnergyField,
    noise: NoiseSource,
}

impl DiffusionModel {
    /// Model for fields of `shape` (rank 2 or 3).
    pub fn new(config: DiffusionConfig, shape: &[usize]) -> ThermodiffResult<Self> {
        let schedule = NoiseSchedule::from_config(&config)?;
        let mut root = NoiseSource::new(config.seed);
        let forward =
            ForwardDiffusion::from_schedule(&schedule, &config)?.with_noise_source(root.fork());
        let reverse =
            ReverseDiffusion::from_schedule(&schedule, &config)?.with_noise_source(root.fork());
        let energy_field = EnergyField::from_config(shape, &config)?;
        log::info!(
            "DiffusionModel: {} schedule, {} steps, shape {:?}",
            config.schedule_type,
            config.timesteps,
            shape
        );
        Ok(Self {
            config,
            schedule,
            forward,
            reverse,
            energy_field,
            noise: root,
        })
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn NoisePredictor>) -> Self {
        self.reverse.set_predictor(Some(predictor));
        self
    }

    /// Replace the energy field, e.g. one carrying domain terms.
    pub fn with_energy_field(mut self, field: EnergyField) -> Self {
        self.energy_field = field;
        self
    }

    pub fn config(&self) -> &DiffusionConfig {
        &self.config
    }

    pub fn schedule(&self) -> &NoiseSchedule {
        &self.schedule
    }

    pub fn forward(&self) -> &ForwardDiffusion {
        &self.forward
    }

    pub fn forward_mut(&mut self) -> &mut ForwardDiffusion {
        &mut self.forward
    }

    pub fn reverse(&self) -> &ReverseDiffusion {
        &self.reverse
    }

    pub fn reverse_mut(&mut self) -> &mut ReverseDiffusion {
        &mut self.reverse
    }

    pub fn energy_field(&self) -> &EnergyField {
        &self.energy_field
    }

    pub fn energy_field_mut(&mut self) -> &mut EnergyField {
        &mut self.energy_field
    }

    pub fn timesteps(&self) -> usize {
        self.config.timesteps
    }

    /// Feed an observed variance back into an adaptive schedule and
    /// refresh the coefficient tables of both processes.
    pub fn adapt_schedule(
        &mut self,
        variance: f64,
        step: usize,
    ) -> ThermodiffResult<AdaptationEvent> {
        let adaptive = self.schedule.as_adaptive_mut().ok_or_else(|| {
            ThermodiffError::Config(format!(
                "adapt_schedule needs an adaptive schedule, this model uses '{}'",
                self.config.schedule_type
            ))
        })?;
        let event = adaptive.adapt_schedule(variance, step)?;
        let coeffs = ScheduleCoefficients::from_betas(self.schedule.betas())?;
        self.forward.set_coefficients(coeffs.clone());
        self.reverse.set_coefficients(coeffs);
        Ok(event)
    }

    fn resolve_steps(&self, steps: Option<usize>) -> ThermodiffResult<usize> {
        let timesteps = self.config.timesteps;
        let steps = steps.unwrap_or(timesteps);
        if steps > timesteps {
            return Err(ThermodiffError::TimestepOutOfRange {
                t: steps - 1,
                timesteps,
            });
        }
        Ok(steps)
    }

    fn step_metrics(
        &self,
        step: usize,
        prev_energy: f64,
        prev_entropy: f64,
        x: &ArrayD<f64>,
    ) -> StepMetrics {
        let energy = self.energy_field.total_energy(x);
        let entropy = self.energy_field.compute_entropy(x);
        let drift = (energy - prev_energy).abs();
        StepMetrics {
            step,
            timestep: step,
            energy,
            drift,
            entropy,
            entropy_change: entropy - prev_entropy,
            fidelity: 1.0 - drift / (prev_energy.abs() + EPS),
        }
    }

    /// Noise `x0` for `steps` timesteps (all of them by default).
    pub fn diffuse(
        &mut self,
        x0: &ArrayD<f64>,
        steps: Option<usize>,
    ) -> ThermodiffResult<(ArrayD<f64>, TrajectoryMetrics)> {
        ensure_same_shape(self.energy_field.shape(), x0.shape())?;
        let steps = self.resolve_steps(steps)?;

        let mut x = x0.clone();
        let mut metrics = TrajectoryMetrics::new(
            self.energy_field.total_energy(&x),
            self.energy_field.compute_entropy(&x),
        );
        for t in 0..steps {
            let (prev_energy, prev_entropy) = (metrics.final_energy, metrics.final_entropy);
            x = self.forward.forward_step(&x, t, Some(&self.energy_field))?;
            let m = self.step_metrics(t, prev_energy, prev_entropy, &x);
            log::debug!("diffuse t={t}: energy {:.6e}, drift {:.6e}", m.energy, m.drift);
            metrics.record(m);
        }
        log::info!(
            "diffuse: {steps} steps, total drift {:.6e}, max drift {:.6e}",
            metrics.total_drift,
            metrics.max_drift
        );
        Ok((x, metrics))
    }

    /// Denoise `xt` over the last `steps` timesteps in descending order.
    pub fn denoise(
        &mut self,
        xt: &ArrayD<f64>,
        steps: Option<usize>,
        use_guidance: bool,
    ) -> ThermodiffResult<(ArrayD<f64>, TrajectoryMetrics)> {
        ensure_same_shape(self.energy_field.shape(), xt.shape())?;
        let steps = self.resolve_steps(steps)?;

        self.energy_field.reset_state(xt.clone())?;
        let mut metrics = TrajectoryMetrics::new(
            self.energy_field.total_energy(xt),
            self.energy_field.current_state().entropy(),
        );
        let clip = self.config.clip_denoised;
        let mut x = xt.clone();

        for (step, t) in (0..steps).rev().enumerate() {
            let field = if use_guidance {
                Some(&self.energy_field)
            } else {
                None
            };
            x = self.reverse.reverse_step(&x, t, field, clip)?;

            let prev_energy = metrics.final_energy;
            let transition = self.energy_field.update_state(x.clone())?;
            let energy = self.energy_field.total_energy(transition.state.energy_map());
            let m = StepMetrics {
                step,
                timestep: t,
                energy,
                drift: transition.drift,
                entropy: transition.state.entropy(),
                entropy_change: transition.entropy_change,
                fidelity: 1.0 - transition.drift / (prev_energy.abs() + EPS),
            };
            log::debug!(
                "denoise t={t}: energy {:.6e}, drift {:.6e}, dS {:+.3e}",
                m.energy,
                m.drift,
                m.entropy_change
            );
            metrics.record(m);
            metrics.violations.extend(transition.violations);
        }
        log::info!(
            "denoise: {steps} steps, mean fidelity {:.4}, {} soft violations",
            metrics.mean_fidelity,
            metrics.violations.len()
        );
        Ok((x, metrics))
    }

    /// Generate from standard-normal noise of `shape`.
    pub fn sample(&mut self, shape: &[usize], steps: Option<usize>) -> ThermodiffResult<ArrayD<f64>> {
        ensure_same_shape(self.energy_field.shape(), shape)?;
        let xt = self.noise.standard_normal(shape);
        let (x0, _) = self.denoise(&xt, steps, true)?;
        Ok(x0)
    }

    /// Noise-prediction objective `mean((ε̂ − ε)²)` at timestep `t`.
    pub fn training_loss(&mut self, x0: &ArrayD<f64>, t: usize) -> ThermodiffResult<f64> {
        let predictor = self.reverse.predictor().cloned().ok_or_else(|| {
            ThermodiffError::Validation("training_loss requires a noise predictor".to_string())
        })?;
        let (xt, eps) = self.forward.add_noise(x0, t, None)?;
        let eps_hat = predictor.predict(&xt, t)?;
        ensure_same_shape(eps.shape(), eps_hat.shape())?;
        let loss = (&eps_hat - &eps).mapv(|v| v * v).mean().unwrap_or(0.0);
        if !loss.is_finite() {
            return Err(ThermodiffError::Numerical(format!("training loss is {loss}")));
        }
        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{ExternalPredictor, ZeroPredictor};
    use ndarray::{Array2, IxDyn};
    use thermodiff_types::{ScheduleType, SoftViolation};

    fn model(timesteps: usize) -> DiffusionModel {
        let cfg = DiffusionConfig {
            timesteps,
            seed: Some(17),
            ..DiffusionConfig::default()
        };
        DiffusionModel::new(cfg, &[8, 8]).unwrap()
    }

    fn signal() -> ArrayD<f64> {
        Array2::from_shape_fn((8, 8), |(i, j)| ((i * 8 + j) as f64 * 0.2).cos() * 0.5).into_dyn()
    }

    #[test]
    fn test_diffuse_records_every_step() {
        let mut m = model(50);
        let (xt, metrics) = m.diffuse(&signal(), Some(20)).unwrap();
        assert_eq!(xt.shape(), &[8, 8]);
        assert_eq!(metrics.len(), 20);
        assert_eq!(metrics.steps[19].timestep, 19);
        assert!(metrics.max_drift >= metrics.steps[0].drift);
        let sum: f64 = metrics.steps.iter().map(|s| s.drift).sum();
        assert!((metrics.total_drift - sum).abs() < 1e-9);
    }

    #[test]
    fn test_denoise_descends_and_updates_field() {
        let mut m = model(30);
        let xt = NoiseSource::seeded(4).standard_normal(&[8, 8]);
        let (x0, metrics) = m.denoise(&xt, None, true).unwrap();
        let visited: Vec<usize> = metrics.steps.iter().map(|s| s.timestep).collect();
        assert_eq!(visited, (0..30).rev().collect::<Vec<_>>());
        assert_eq!(m.energy_field().current_state().metadata().step, 30);
        assert_eq!(m.energy_field().current_state().energy_map(), &x0);
        assert!(x0.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_denoise_collects_soft_violations() {
        let mut m = model(10);
        let xt = ArrayD::from_elem(IxDyn(&[8, 8]), 3.0);
        let (_, metrics) = m.denoise(&xt, None, false).unwrap();
        // Clipping pulls a 3.0 field toward [-1, 1]: large drift, reported not raised
        assert!(metrics
            .violations
            .iter()
            .any(|v| matches!(v, SoftViolation::EnergyDrift { .. })));
    }

    #[test]
    fn test_steps_beyond_timesteps_rejected() {
        let mut m = model(10);
        assert!(matches!(
            m.diffuse(&signal(), Some(11)),
            Err(ThermodiffError::TimestepOutOfRange { .. })
        ));
        assert!(m.denoise(&signal(), Some(11), true).is_err());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut m = model(10);
        let x = ArrayD::<f64>::zeros(IxDyn(&[4, 4]));
        assert!(matches!(
            m.diffuse(&x, None),
            Err(ThermodiffError::ShapeMismatch { .. })
        ));
        assert!(m.sample(&[2, 8, 8], None).is_err());
    }

    #[test]
    fn test_sample_is_reproducible() {
        let a = model(20).sample(&[8, 8], None).unwrap();
        let b = model(20).sample(&[8, 8], None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_training_loss_zero_for_oracle() {
        // Oracle predictor: invert x_t = √ᾱ x0 + √(1−ᾱ) ε for a known x0 = 0
        let mut m = model(50);
        let coeffs = m.forward().coefficients().clone();
        let oracle = ExternalPredictor::new(move |xt, t| {
            Ok(xt / coeffs.sqrt_one_minus_alphas_cumprod[t])
        });
        let mut m2 = m.clone().with_predictor(Arc::new(oracle));
        let x0 = ArrayD::<f64>::zeros(IxDyn(&[8, 8]));
        let loss = m2.training_loss(&x0, 25).unwrap();
        assert!(loss < 1e-20, "loss = {loss}");

        // Without a predictor there is no objective to evaluate
        assert!(m.training_loss(&x0, 25).is_err());
    }

    #[test]
    fn test_training_loss_zero_predictor_is_noise_power() {
        let mut m = model(50).with_predictor(Arc::new(ZeroPredictor));
        let x0 = ArrayD::<f64>::zeros(IxDyn(&[8, 8]));
        let loss = m.training_loss(&x0, 10).unwrap();
        // mean(ε²) over 64 standard normals
        assert!(loss > 0.4 && loss < 1.8, "loss = {loss}");
    }

    #[test]
    fn test_adapt_schedule_refreshes_coefficients() {
        let cfg = DiffusionConfig {
            timesteps: 20,
            schedule_type: ScheduleType::Adaptive,
            adaptation_rate: 0.5,
            seed: Some(0),
            ..DiffusionConfig::default()
        };
        let mut m = DiffusionModel::new(cfg, &[8, 8]).unwrap();
        let before = m.forward().coefficients().betas[5];
        let ev = m.adapt_schedule(10.0, 5).unwrap();
        assert!((ev.new_beta - (0.5 * before + 0.5 * 0.02)).abs() < 1e-15);
        assert!((m.forward().coefficients().betas[5] - ev.new_beta).abs() < 1e-15);
        assert!((m.reverse().coefficients().betas[5] - ev.new_beta).abs() < 1e-15);
    }

    #[test]
    fn test_adapt_schedule_needs_adaptive() {
        let mut m = model(10);
        assert!(matches!(
            m.adapt_schedule(1.0, 0),
            Err(ThermodiffError::Config(_))
        ));
    }
}
