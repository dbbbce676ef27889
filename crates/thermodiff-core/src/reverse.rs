// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Reverse Diffusion
// ─────────────────────────────────────────────────────────────────────
//! Reverse (denoising) process.
//!
//!   x̂_0    = (x_t − √(1 − ᾱ_t) · ε̂) / √ᾱ_t
//!   μ      = coef1_t · x̂_0 + coef2_t · x_t
//!   x_{t-1} = μ + exp(½ log σ²_t) · z − λ · ∇E(x_t),   z = 0 at t = 0
//!
//! ε̂ comes from the injected [`NoisePredictor`]; without one the
//! energy gradient stands in, and without a field it is zero.

use std::fmt;
use std::sync::Arc;

use ndarray::ArrayD;

use thermodiff_energy::{EnergyField, NoiseSource};
use thermodiff_types::{DiffusionConfig, ThermodiffResult};

use crate::coefficients::ScheduleCoefficients;
use crate::forward::ensure_same_shape;
use crate::predictor::NoisePredictor;
use crate::schedule::NoiseSchedule;

#[derive(Clone)]
pub struct ReverseDiffusion {
    coeffs: ScheduleCoefficients,
    energy_guidance_scale: f64,
    clip_denoised: bool,
    noise: NoiseSource,
    predictor: Option<Arc<dyn NoisePredictor>>,
}

impl fmt::Debug for ReverseDiffusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReverseDiffusion")
            .field("timesteps", &self.coeffs.len())
            .field("energy_guidance_scale", &self.energy_guidance_scale)
            .field("clip_denoised", &self.clip_denoised)
            .field("has_predictor", &self.predictor.is_some())
            .finish()
    }
}

impl ReverseDiffusion {
    pub fn new(config: &DiffusionConfig) -> ThermodiffResult<Self> {
        let schedule = NoiseSchedule::from_config(config)?;
        Self::from_schedule(&schedule, config)
    }

    pub fn from_schedule(schedule: &NoiseSchedule, config: &DiffusionConfig) -> ThermodiffResult<Self> {
        Ok(Self {
            coeffs: ScheduleCoefficients::from_betas(schedule.betas())?,
            energy_guidance_scale: config.energy_guidance_scale,
            clip_denoised: config.clip_denoised,
            noise: NoiseSource::new(config.seed),
            predictor: None,
        })
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn NoisePredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_noise_source(mut self, noise: NoiseSource) -> Self {
        self.noise = noise;
        self
    }

    pub fn set_predictor(&mut self, predictor: Option<Arc<dyn NoisePredictor>>) {
        self.predictor = predictor;
    }

    pub fn predictor(&self) -> Option<&Arc<dyn NoisePredictor>> {
        self.predictor.as_ref()
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

    /// Default clipping behaviour taken from the config.
    pub fn clip_denoised(&self) -> bool {
        self.clip_denoised
    }

    /// x̂_0 from x_t and a noise estimate.
    pub fn predict_start_from_noise(
        &self,
        xt: &ArrayD<f64>,
        t: usize,
        noise: &ArrayD<f64>,
    ) -> ThermodiffResult<ArrayD<f64>> {
        self.coeffs.check_t(t)?;
        ensure_same_shape(xt.shape(), noise.shape())?;
        Ok((xt - &(noise * self.coeffs.sqrt_one_minus_alphas_cumprod[t]))
            / self.coeffs.sqrt_alphas_cumprod[t])
    }

    /// Posterior q(x_{t-1} | x_t, x_0): `(mean, variance, log_variance)`.
    pub fn posterior_mean_variance(
        &self,
        x0: &ArrayD<f64>,
        xt: &ArrayD<f64>,
        t: usize,
    ) -> ThermodiffResult<(ArrayD<f64>, f64, f64)> {
        self.coeffs.check_t(t)?;
        ensure_same_shape(xt.shape(), x0.shape())?;
        let mean = x0 * self.coeffs.posterior_mean_coef1[t] + xt * self.coeffs.posterior_mean_coef2[t];
        Ok((
            mean,
            self.coeffs.posterior_variance[t],
            self.coeffs.posterior_log_variance_clipped[t],
        ))
    }

    /// ε̂ from the predictor, else the energy gradient, else zero.
    pub fn predict_noise(
        &self,
        xt: &ArrayD<f64>,
        t: usize,
        energy_field: Option<&EnergyField>,
    ) -> ThermodiffResult<ArrayD<f64>> {
        match (&self.predictor, energy_field) {
            (Some(p), _) => p.predict(xt, t),
            (None, Some(field)) => field.compute_energy_gradient(xt),
            (None, None) => Ok(ArrayD::zeros(xt.raw_dim())),
        }
    }

    /// `λ · ∇E(x_t)`, or `None` when there is nothing to subtract.
    pub fn guidance(
        &self,
        xt: &ArrayD<f64>,
        energy_field: Option<&EnergyField>,
    ) -> ThermodiffResult<Option<ArrayD<f64>>> {
        match energy_field {
            Some(field) if self.energy_guidance_scale != 0.0 => {
                let mut g = field.compute_energy_gradient(xt)?;
                g *= self.energy_guidance_scale;
                Ok(Some(g))
            }
            _ => Ok(None),
        }
    }

    /// One denoising step t → t−1 with fresh noise.
    pub fn reverse_step(
        &mut self,
        xt: &ArrayD<f64>,
        t: usize,
        energy_field: Option<&EnergyField>,
        clip_denoised: bool,
    ) -> ThermodiffResult<ArrayD<f64>> {
        self.coeffs.check_t(t)?;
        let z = if t > 0 {
            Some(self.noise.standard_normal_like(xt))
        } else {
            None
        };
        self.reverse_step_with_noise(xt, t, z.as_ref(), energy_field, clip_denoised)
    }

    /// One denoising step with caller-supplied `z` (ignored at t = 0).
    pub fn reverse_step_with_noise(
        &self,
        xt: &ArrayD<f64>,
        t: usize,
        z: Option<&ArrayD<f64>>,
        energy_field: Option<&EnergyField>,
        clip_denoised: bool,
    ) -> ThermodiffResult<ArrayD<f64>> {
        self.coeffs.check_t(t)?;
        let eps = self.predict_noise(xt, t, energy_field)?;
        let mut x0_hat = self.predict_start_from_noise(xt, t, &eps)?;
        if clip_denoised {
            x0_hat.mapv_inplace(|v| v.clamp(-1.0, 1.0));
        }
        let (mut x_prev, _, log_var) = self.posterior_mean_variance(&x0_hat, xt, t)?;
        if t > 0 {
            if let Some(z) = z {
                ensure_same_shape(xt.shape(), z.shape())?;
                x_prev.scaled_add((0.5 * log_var).exp(), z);
            }
        }
        if let Some(g) = self.guidance(xt, energy_field)? {
            x_prev -= &g;
        }
        Ok(x_prev)
    }
}
