// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Sampler Family
// ─────────────────────────────────────────────────────────────────────
//! Samplers that run a full reverse chain on top of [`ReverseDiffusion`].
//!
//!   ddpm           all T steps, posterior reconstruction
//!   ddim           strided steps, eta ∈ [0, 1] sets the stochasticity
//!   energy_guided  K strided candidates per step, one picked by
//!                  Boltzmann-weighted categorical draw over entropies
//!   ancestral      all T steps, mean taken directly from (x, ε̂)
//!
//! The variant is a closed enum ([`SamplerConfig`]); every run returns a
//! [`SampleTrace`].

use ndarray::{ArrayD, IxDyn};

use thermodiff_energy::{EnergyField, EnergyState, NoiseSource};
use thermodiff_types::{SamplerConfig, ThermodiffError, ThermodiffResult};

use crate::reverse::ReverseDiffusion;

/// Output of one sampler run.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTrace {
    /// Final sample x_0.
    pub sample: ArrayD<f64>,
    /// Timesteps visited, in the order they were applied.
    pub timesteps: Vec<usize>,
    /// Chosen candidate per step (energy-guided sampler only).
    pub selections: Vec<usize>,
    /// Start state followed by the state after every step, when recorded.
    pub states: Vec<EnergyState>,
}

/// Descending "leading" strided sequence: `(0..num_steps)·(T / num_steps)`.
pub fn strided_timesteps(timesteps: usize, num_steps: usize) -> Vec<usize> {
    let num_steps = num_steps.clamp(1, timesteps.max(1));
    let stride = (timesteps / num_steps).max(1);
    (0..num_steps).map(|i| i * stride).rev().collect()
}

/// Accelerated update x_t → x_{t_prev} for a given ε̂.
///
///   σ = eta · √((1 − ᾱ_prev)/(1 − ᾱ_t) · (1 − ᾱ_t/ᾱ_prev))
///   x = √ᾱ_prev · x̂_0 + √(1 − ᾱ_prev − σ²) · ε̂ + σ · z
#[allow(clippy::too_many_arguments)]
fn ddim_update(
    reverse: &ReverseDiffusion,
    x: &ArrayD<f64>,
    t: usize,
    t_prev: Option<usize>,
    eps: &ArrayD<f64>,
    eta: f64,
    clip: bool,
    noise: &mut NoiseSource,
) -> ThermodiffResult<ArrayD<f64>> {
    let c = reverse.coefficients();
    let ab_t = c.alphas_cumprod[t];
    let ab_prev = c.alpha_bar(t_prev);

    let mut x0_hat = reverse.predict_start_from_noise(x, t, eps)?;
    if clip {
        x0_hat.mapv_inplace(|v| v.clamp(-1.0, 1.0));
    }
    let sigma = eta * ((1.0 - ab_prev) / (1.0 - ab_t) * (1.0 - ab_t / ab_prev)).max(0.0).sqrt();
    let dir = (1.0 - ab_prev - sigma * sigma).max(0.0).sqrt();

    let mut next = x0_hat * ab_prev.sqrt();
    next.scaled_add(dir, eps);
    if sigma > 0.0 {
        let z = noise.standard_normal_like(x);
        next.scaled_add(sigma, &z);
    }
    Ok(next)
}

/// Draw one candidate index with probability ∝ exp(−S_k / T), where S_k
/// is the candidate's entropy. A single candidate is returned without
/// touching `noise`.
fn select_proposal(
    field: &EnergyField,
    candidates: &[ArrayD<f64>],
    noise: &mut NoiseSource,
) -> ThermodiffResult<usize> {
    if candidates.len() == 1 {
        return Ok(0);
    }
    let scores: Vec<f64> = candidates.iter().map(|c| field.compute_entropy(c)).collect();
    let scores = ArrayD::from_shape_vec(IxDyn(&[candidates.len()]), scores)
        .map_err(|e| ThermodiffError::Validation(format!("score reshape failed: {e}")))?;
    let weights: Vec<f64> = field.boltzmann_weight(&scores)?.iter().copied().collect();
    noise.categorical(&weights)
}

#[derive(Debug, Clone)]
pub struct Sampler {
    config: SamplerConfig,
    noise: NoiseSource,
    record_states: bool,
}

impl Sampler {
    pub fn new(config: SamplerConfig, seed: Option<u64>) -> Self {
        Self {
            config,
            noise: NoiseSource::new(seed),
            record_states: false,
        }
    }

    /// Default parameterisation of a named sampler.
    pub fn from_name(name: &str, seed: Option<u64>) -> ThermodiffResult<Self> {
        Ok(Self::new(name.parse()?, seed))
    }

    /// Keep every intermediate [`EnergyState`] in the trace.
    pub fn recording_states(mut self, record: bool) -> Self {
        self.record_states = record;
        self
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn name(&self) -> &'static str {
        self.config.name()
    }

    /// Run the chain from standard-normal noise of `shape`.
    pub fn sample_from_noise(
        &mut self,
        reverse: &ReverseDiffusion,
        energy_field: Option<&EnergyField>,
        shape: &[usize],
    ) -> ThermodiffResult<SampleTrace> {
        let x_t = self.noise.standard_normal(shape);
        self.sample(reverse, energy_field, x_t)
    }

    /// Run the chain from `x_t`.
    pub fn sample(
        &mut self,
        reverse: &ReverseDiffusion,
        energy_field: Option<&EnergyField>,
        x_t: ArrayD<f64>,
    ) -> ThermodiffResult<SampleTrace> {
        let timesteps = reverse.timesteps();
        self.config.validate(timesteps)?;

        let temperature = energy_field.map_or(1.0, |f| f.temperature());
        let mut trace = SampleTrace {
            sample: ArrayD::zeros(IxDyn(&[])),
            timesteps: Vec::new(),
            selections: Vec::new(),
            states: Vec::new(),
        };
        if self.record_states {
            trace
                .states
                .push(EnergyState::from_raw_array(x_t.clone(), temperature)?);
        }

        let config = self.config.clone();
        let sample = match config {
            SamplerConfig::Ddpm => {
                let seq: Vec<usize> = (0..timesteps).rev().collect();
                self.run_chain(&seq, x_t, &mut trace, temperature, |s, x, t, _| {
                    s.ddpm_step(reverse, energy_field, x, t)
                })?
            }
            SamplerConfig::Ancestral => {
                let seq: Vec<usize> = (0..timesteps).rev().collect();
                self.run_chain(&seq, x_t, &mut trace, temperature, |s, x, t, _| {
                    s.ancestral_step(reverse, energy_field, x, t)
                })?
            }
            SamplerConfig::Ddim { num_steps, eta } => {
                let seq = strided_timesteps(timesteps, num_steps);
                self.run_chain(&seq, x_t, &mut trace, temperature, |s, x, t, t_prev| {
                    let eps = reverse.predict_noise(x, t, energy_field)?;
                    let mut next = ddim_update(
                        reverse,
                        x,
                        t,
                        t_prev,
                        &eps,
                        eta,
                        reverse.clip_denoised(),
                        &mut s.noise,
                    )?;
                    if let Some(g) = reverse.guidance(x, energy_field)? {
                        next -= &g;
                    }
                    Ok((next, None))
                })?
            }
            SamplerConfig::EnergyGuided {
                num_steps,
                eta,
                num_proposals,
                exploration_scale,
            } => {
                let field = energy_field.ok_or_else(|| {
                    ThermodiffError::Validation(
                        "energy-guided sampler requires an energy field".to_string(),
                    )
                })?;
                let seq = strided_timesteps(timesteps, num_steps);
                self.run_chain(&seq, x_t, &mut trace, temperature, |s, x, t, t_prev| {
                    s.proposal_step(
                        reverse,
                        field,
                        x,
                        t,
                        t_prev,
                        eta,
                        num_proposals,
                        exploration_scale,
                    )
                })?
            }
        };

        log::info!(
            "{} sampler: {} steps, {} states recorded",
            self.name(),
            trace.timesteps.len(),
            trace.states.len()
        );
        trace.sample = sample;
        Ok(trace)
    }

    /// Drive `step` over a descending timestep sequence.
    fn run_chain<F>(
        &mut self,
        seq: &[usize],
        x_t: ArrayD<f64>,
        trace: &mut SampleTrace,
        temperature: f64,
        mut step: F,
    ) -> ThermodiffResult<ArrayD<f64>>
    where
        F: FnMut(
            &mut Self,
            &ArrayD<f64>,
            usize,
            Option<usize>,
        ) -> ThermodiffResult<(ArrayD<f64>, Option<usize>)>,
    {
        let mut x = x_t;
        for (i, &t) in seq.iter().enumerate() {
            let t_prev = seq.get(i + 1).copied();
            let (next, selection) = step(self, &x, t, t_prev)?;
            x = next;
            trace.timesteps.push(t);
            if let Some(k) = selection {
                trace.selections.push(k);
            }
            if self.record_states {
                trace
                    .states
                    .push(EnergyState::from_raw_array(x.clone(), temperature)?);
            }
            log::debug!("{} sampler t={t}", self.config.name());
        }
        Ok(x)
    }

    fn ddpm_step(
        &mut self,
        reverse: &ReverseDiffusion,
        energy_field: Option<&EnergyField>,
        x: &ArrayD<f64>,
        t: usize,
    ) -> ThermodiffResult<(ArrayD<f64>, Option<usize>)> {
        let z = (t > 0).then(|| self.noise.standard_normal_like(x));
        let next =
            reverse.reverse_step_with_noise(x, t, z.as_ref(), energy_field, reverse.clip_denoised())?;
        Ok((next, None))
    }

    /// mean = (x − β_t/√(1 − ᾱ_t) · ε̂) / √α_t, variance = posterior variance.
    fn ancestral_step(
        &mut self,
        reverse: &ReverseDiffusion,
        energy_field: Option<&EnergyField>,
        x: &ArrayD<f64>,
        t: usize,
    ) -> ThermodiffResult<(ArrayD<f64>, Option<usize>)> {
        let eps = reverse.predict_noise(x, t, energy_field)?;
        let c = reverse.coefficients();
        let eps_coef = c.betas[t] / c.sqrt_one_minus_alphas_cumprod[t];
        let mut next = (x - &(&eps * eps_coef)) / c.sqrt_alphas[t];
        if t > 0 {
            let z = self.noise.standard_normal_like(x);
            next.scaled_add(c.posterior_variance[t].sqrt(), &z);
        }
        if let Some(g) = reverse.guidance(x, energy_field)? {
            next -= &g;
        }
        Ok((next, None))
    }

    #[allow(clippy::too_many_arguments)]
    fn proposal_step(
        &mut self,
        reverse: &ReverseDiffusion,
        field: &EnergyField,
        x: &ArrayD<f64>,
        t: usize,
        t_prev: Option<usize>,
        eta: f64,
        num_proposals: usize,
        exploration_scale: f64,
    ) -> ThermodiffResult<(ArrayD<f64>, Option<usize>)> {
        let eps = reverse.predict_noise(x, t, Some(field))?;
        let guidance = reverse.guidance(x, Some(field))?;
        let explore = num_proposals > 1 && t > 0 && exploration_scale > 0.0;

        let mut candidates = Vec::with_capacity(num_proposals);
        for _ in 0..num_proposals {
            let mut c = ddim_update(
                reverse,
                x,
                t,
                t_prev,
                &eps,
                eta,
                reverse.clip_denoised(),
                &mut self.noise,
            )?;
            if explore {
                let kick = self.noise.standard_normal_like(x);
                c.scaled_add(exploration_scale, &kick);
            }
            if let Some(g) = &guidance {
                c -= g;
            }
            candidates.push(c);
        }

        let choice = select_proposal(field, &candidates, &mut self.noise)?;
        let chosen = candidates.swap_remove(choice);
        Ok((chosen, Some(choice)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::predictor::ExternalPredictor;
    use thermodiff_types::DiffusionConfig;

    fn reverse(timesteps: usize) -> ReverseDiffusion {
        let cfg = DiffusionConfig {
            timesteps,
            seed: Some(2),
            ..DiffusionConfig::default()
        };
        ReverseDiffusion::new(&cfg).unwrap()
    }

    fn start() -> ArrayD<f64> {
        NoiseSource::seeded(8).standard_normal(&[6, 6])
    }

    #[test]
    fn test_strided_timesteps() {
        assert_eq!(strided_timesteps(100, 4), vec![75, 50, 25, 0]);
        assert_eq!(strided_timesteps(10, 3), vec![6, 3, 0]);
        assert_eq!(strided_timesteps(5, 5), vec![4, 3, 2, 1, 0]);
        assert_eq!(strided_timesteps(5, 1), vec![0]);
    }

    #[test]
    fn test_ddpm_visits_all_timesteps() {
        let rev = reverse(20);
        let mut s = Sampler::new(SamplerConfig::Ddpm, Some(1));
        let trace = s.sample(&rev, None, start()).unwrap();
        assert_eq!(trace.timesteps, (0..20).rev().collect::<Vec<_>>());
        assert!(trace.selections.is_empty());
        assert!(trace.states.is_empty());
        assert!(trace.sample.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_ddim_eta_zero_is_deterministic() {
        let rev = reverse(100);
        let cfg = SamplerConfig::Ddim { num_steps: 10, eta: 0.0 };
        let a = Sampler::new(cfg.clone(), Some(1)).sample(&rev, None, start()).unwrap();
        let b = Sampler::new(cfg, Some(999)).sample(&rev, None, start()).unwrap();
        assert_eq!(a.sample, b.sample);
        assert_eq!(a.timesteps.len(), 10);
    }

    #[test]
    fn test_ddim_eta_one_is_stochastic() {
        let rev = reverse(100);
        let cfg = SamplerConfig::Ddim { num_steps: 10, eta: 1.0 };
        let a = Sampler::new(cfg.clone(), Some(1)).sample(&rev, None, start()).unwrap();
        let b = Sampler::new(cfg, Some(2)).sample(&rev, None, start()).unwrap();
        assert_ne!(a.sample, b.sample);
    }

    #[test]
    fn test_single_proposal_equals_ddim() {
        let rev = reverse(100);
        let field = EnergyField::new(&[6, 6], 1.0, 0.01).unwrap();
        let ddim = Sampler::new(SamplerConfig::Ddim { num_steps: 10, eta: 0.0 }, Some(1))
            .sample(&rev, Some(&field), start())
            .unwrap();
        let guided = Sampler::new(
            SamplerConfig::EnergyGuided {
                num_steps: 10,
                eta: 0.0,
                num_proposals: 1,
                exploration_scale: 0.5,
            },
            Some(7),
        )
        .sample(&rev, Some(&field), start())
        .unwrap();
        assert_eq!(ddim.sample, guided.sample);
        assert_eq!(guided.selections, vec![0; 10]);
    }

    #[test]
    fn test_multi_proposal_selects_valid_indices() {
        let rev = reverse(50);
        let field = EnergyField::new(&[6, 6], 1.0, 0.01).unwrap();
        let mut s = Sampler::new(
            SamplerConfig::EnergyGuided {
                num_steps: 5,
                eta: 0.5,
                num_proposals: 4,
                exploration_scale: 0.05,
            },
            Some(3),
        );
        let trace = s.sample(&rev, Some(&field), start()).unwrap();
        assert_eq!(trace.selections.len(), 5);
        assert!(trace.selections.iter().all(|&k| k < 4));
        assert!(trace.sample.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_proposal_selection_follows_boltzmann_weights() {
        let field = EnergyField::new(&[6, 6], 4.0, 0.01).unwrap();
        let flat = ArrayD::from_elem(IxDyn(&[6, 6]), 1.0);
        let half = ArrayD::from_shape_fn(IxDyn(&[6, 6]), |ix| if ix[0] < 3 { 1.0 } else { 0.0 });
        let mut spike = ArrayD::<f64>::zeros(IxDyn(&[6, 6]));
        spike[[2, 3]] = 1.0;
        let candidates = vec![flat, half, spike];

        let scores: Vec<f64> = candidates.iter().map(|c| field.compute_entropy(c)).collect();
        let scores = ArrayD::from_shape_vec(IxDyn(&[3]), scores).unwrap();
        let expected: Vec<f64> = field.boltzmann_weight(&scores).unwrap().iter().copied().collect();

        let draws = 20_000;
        let mut counts = [0usize; 3];
        let mut noise = NoiseSource::seeded(11);
        for _ in 0..draws {
            counts[select_proposal(&field, &candidates, &mut noise).unwrap()] += 1;
        }
        for (k, &n) in counts.iter().enumerate() {
            let freq = n as f64 / draws as f64;
            assert!(
                (freq - expected[k]).abs() < 0.02,
                "candidate {k}: freq {freq:.4} vs weight {:.4}",
                expected[k]
            );
        }
        // Not an arg-max: the less favoured candidates still get picked
        assert!(counts[0] > 0 && counts[1] > 0);
        assert!(counts[2] < draws);
    }

    #[test]
    fn test_single_candidate_skips_draw() {
        let field = EnergyField::new(&[6, 6], 1.0, 0.01).unwrap();
        let mut noise = NoiseSource::seeded(5);
        let mut untouched = NoiseSource::seeded(5);
        assert_eq!(select_proposal(&field, &[start()], &mut noise).unwrap(), 0);
        assert_eq!(noise.uniform(), untouched.uniform());
    }

    #[test]
    fn test_energy_guided_needs_field() {
        let rev = reverse(50);
        let mut s = Sampler::from_name("energy_guided", Some(1)).unwrap();
        assert!(matches!(
            s.sample(&rev, None, start()),
            Err(ThermodiffError::Validation(_))
        ));
    }

    #[test]
    fn test_ancestral_final_step_uses_direct_mean() {
        // Single-step chain at t = 0 with zero ε̂: x_prev = x / √α_0
        let rev = reverse(1);
        let x = start();
        let trace = Sampler::new(SamplerConfig::Ancestral, Some(1))
            .sample(&rev, None, x.clone())
            .unwrap();
        let sa = rev.coefficients().sqrt_alphas[0];
        for (a, b) in trace.sample.iter().zip(x.iter()) {
            assert!((a - b / sa).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ancestral_step_uses_direct_mean_above_zero() {
        let eps = NoiseSource::seeded(21).standard_normal(&[6, 6]);
        let eps_c = eps.clone();
        let rev = reverse(20)
            .with_predictor(Arc::new(ExternalPredictor::new(move |_, _| Ok(eps_c.clone()))));
        let x = start();
        let t = 7;

        let mut s = Sampler::new(SamplerConfig::Ancestral, Some(4));
        let (next, selection) = s.ancestral_step(&rev, None, &x, t).unwrap();
        assert!(selection.is_none());

        // Replay the sampler's own stream to remove the noise term
        let z = NoiseSource::seeded(4).standard_normal_like(&x);
        let c = rev.coefficients();
        let eps_coef = c.betas[t] / c.sqrt_one_minus_alphas_cumprod[t];
        let sigma = c.posterior_variance[t].sqrt();
        assert!(sigma > 0.0);
        for (((n, xv), e), zv) in next.iter().zip(x.iter()).zip(eps.iter()).zip(z.iter()) {
            let mean = (xv - eps_coef * e) / c.sqrt_alphas[t];
            assert!((n - sigma * zv - mean).abs() < 1e-10, "{n} vs {mean}");
        }
    }

    #[test]
    fn test_recorded_states_cover_trajectory() {
        let rev = reverse(12);
        let field = EnergyField::new(&[6, 6], 2.0, 0.01).unwrap();
        let trace = Sampler::new(SamplerConfig::Ddpm, Some(1))
            .recording_states(true)
            .sample(&rev, Some(&field), start())
            .unwrap();
        assert_eq!(trace.states.len(), 13);
        assert_eq!(trace.states[12].energy_map(), &trace.sample);
        assert!((trace.states[0].temperature() - 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_unknown_sampler_is_hard_error() {
        assert!(matches!(
            Sampler::from_name("heun", None),
            Err(ThermodiffError::UnknownSampler(_))
        ));
    }

    #[test]
    fn test_invalid_sampler_config_rejected() {
        let rev = reverse(10);
        let mut s = Sampler::new(SamplerConfig::Ddim { num_steps: 11, eta: 0.0 }, Some(1));
        assert!(matches!(
            s.sample(&rev, None, start()),
            Err(ThermodiffError::Config(_))
        ));
    }
}
