// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Forward Diffusion
// ─────────────────────────────────────────────────────────────────────
//! Forward (noising) process.
//!
//!   closed form   x_t    = √ᾱ_t · x_0 + √(1 − ᾱ_t) · ε
//!   single step   x_next = √α_t · x + √β_t · ε − λ · ∇E(x)
//!
//! ε ~ N(0, I) is drawn from the instance's seeded [`NoiseSource`]
//! unless the caller supplies it.

use ndarray::ArrayD;

use thermodiff_energy::{EnergyField, NoiseSource};
use thermodiff_types::{DiffusionConfig, ThermodiffError, ThermodiffResult};

use crate::coefficients::{per_batch_scalars, ScheduleCoefficients};
use crate::schedule::NoiseSchedule;

pub(crate) fn ensure_same_shape(expected: &[usize], got: &[usize]) -> ThermodiffResult<()> {
    if expected != got {
        return Err(ThermodiffError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ForwardDiffusion {
    coeffs: ScheduleCoefficients,
    energy_guidance_scale: f64,
    noise: NoiseSource,
}

impl ForwardDiffusion {
    /// Build the configured schedule and derive its coefficients.
    pub fn new(config: &DiffusionConfig) -> ThermodiffResult<Self> {
        let schedule = NoiseSchedule::from_config(config)?;
        Self::from_schedule(&schedule, config)
    }

    pub fn from_schedule(schedule: &NoiseSchedule, config: &DiffusionConfig) -> ThermodiffResult<Self> {
        Ok(Self {
            coeffs: ScheduleCoefficients::from_betas(schedule.betas())?,
            energy_guidance_scale: config.energy_guidance_scale,
            noise: NoiseSource::new(config.seed),
        })
    }

    pub fn with_noise_source(mut self, noise: NoiseSource) -> Self {
        self.noise = noise;
        self
    }

    pub fn coefficients(&self) -> &ScheduleCoefficients {
        &self.coeffs
    }

    pub(crate) fn set_coefficients(&mut self, coeffs: ScheduleCoefficients) {
        self.coeffs = coeffs;
    }

    pub fn timesteps(&self) -> usize {
        self.coeffs.len()
    }

    pub fn energy_guidance_scale(&self) -> f64 {
        self.energy_guidance_scale
    }

    fn resolve_noise(&mut self, like: &ArrayD<f64>, noise: Option<&ArrayD<f64>>) -> ThermodiffResult<ArrayD<f64>> {
        match noise {
            Some(eps) => {
                ensure_same_shape(like.shape(), eps.shape())?;
                Ok(eps.clone())
            }
            None => Ok(self.noise.standard_normal_like(like)),
        }
    }

    /// Jump straight to timestep `t`. Returns `(x_t, ε)`.
    pub fn add_noise(
        &mut self,
        x0: &ArrayD<f64>,
        t: usize,
        noise: Option<&ArrayD<f64>>,
    ) -> ThermodiffResult<(ArrayD<f64>, ArrayD<f64>)> {
        self.coeffs.check_t(t)?;
        let eps = self.resolve_noise(x0, noise)?;
        let xt = x0 * self.coeffs.sqrt_alphas_cumprod[t]
            + &eps * self.coeffs.sqrt_one_minus_alphas_cumprod[t];
        Ok((xt, eps))
    }

    /// Per-element timesteps for a `(B, …)` batch: `ts[b]` applies to
    /// `x0[b]`.
    pub fn add_noise_batched(
        &mut self,
        x0: &ArrayD<f64>,
        ts: &[usize],
        noise: Option<&ArrayD<f64>>,
    ) -> ThermodiffResult<(ArrayD<f64>, ArrayD<f64>)> {
        let signal = per_batch_scalars(&self.coeffs.sqrt_alphas_cumprod, ts, x0.shape())?;
        let spread = per_batch_scalars(&self.coeffs.sqrt_one_minus_alphas_cumprod, ts, x0.shape())?;
        let eps = self.resolve_noise(x0, noise)?;
        let xt = x0 * &signal + &eps * &spread;
        Ok((xt, eps))
    }

    /// One Markov step t → t+1 with fresh noise.
    pub fn forward_step(
        &mut self,
        x: &ArrayD<f64>,
        t: usize,
        energy_field: Option<&EnergyField>,
    ) -> ThermodiffResult<ArrayD<f64>> {
        self.coeffs.check_t(t)?;
        let eps = self.noise.standard_normal_like(x);
        self.forward_step_with_noise(x, t, &eps, energy_field)
    }

    /// One Markov step with caller-supplied ε.
    pub fn forward_step_with_noise(
        &self,
        x: &ArrayD<f64>,
        t: usize,
        eps: &ArrayD<f64>,
        energy_field: Option<&EnergyField>,
    ) -> ThermodiffResult<ArrayD<f64>> {
        self.coeffs.check_t(t)?;
        ensure_same_shape(x.shape(), eps.shape())?;
        let mut next = x * self.coeffs.sqrt_alphas[t] + eps * self.coeffs.sqrt_betas[t];
        if let Some(field) = energy_field {
            if self.energy_guidance_scale != 0.0 {
                let grad = field.compute_energy_gradient(x)?;
                next.scaled_add(-self.energy_guidance_scale, &grad);
            }
        }
        Ok(next)
    }
}
