// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Noise Schedules
// ─────────────────────────────────────────────────────────────────────
//! Noise schedule family: β_t for t = 0..T, with α_t = 1 − β_t.
//!
//!   Linear     β evenly spaced in [β_start, β_end]
//!   Cosine     ᾱ(t) = cos²(((t/T + s)/(1 + s))·π/2) / ᾱ(0),
//!              β_t = 1 − ᾱ(t+1)/ᾱ(t), clipped to [1e-4, 0.9999]
//!   Boltzmann  β = β_start + (β_end − β_start)·(1 − w(u)),
//!              w a min-max normalised decay kernel of u = t/(T−1)
//!   Adaptive   starts linear, each β_t relaxes toward a
//!              variance-driven target by EMA

use serde::{Deserialize, Serialize};

use thermodiff_types::{
    BoltzmannKernel, DiffusionConfig, ScheduleType, ThermodiffError, ThermodiffResult,
};

/// Lower clip of the cosine schedule.
pub const COSINE_BETA_MIN: f64 = 1e-4;
/// Upper clip of the cosine schedule.
pub const COSINE_BETA_MAX: f64 = 0.9999;

const NORM_EPS: f64 = 1e-8;

fn check_t(t: usize, timesteps: usize) -> ThermodiffResult<()> {
    if t >= timesteps {
        return Err(ThermodiffError::TimestepOutOfRange { t, timesteps });
    }
    Ok(())
}

/// β evenly spaced between the bounds, endpoints included.
pub fn linear_betas(timesteps: usize, beta_start: f64, beta_end: f64) -> Vec<f64> {
    if timesteps == 1 {
        return vec![beta_start];
    }
    let span = (timesteps - 1) as f64;
    (0..timesteps)
        .map(|i| beta_start + (beta_end - beta_start) * i as f64 / span)
        .collect()
}

/// Cosine schedule with offset `s`.
pub fn cosine_betas(timesteps: usize, s: f64) -> Vec<f64> {
    let big_t = timesteps as f64;
    let f = |t: f64| {
        let c = ((t / big_t + s) / (1.0 + s) * std::f64::consts::FRAC_PI_2).cos();
        c * c
    };
    let f0 = f(0.0);
    let alpha_bar: Vec<f64> = (0..=timesteps).map(|t| f(t as f64) / f0).collect();
    alpha_bar
        .windows(2)
        .map(|w| (1.0 - w[1] / w[0]).clamp(COSINE_BETA_MIN, COSINE_BETA_MAX))
        .collect()
}

fn kernel_weight(kernel: BoltzmannKernel, u: f64, temperature: f64) -> f64 {
    match kernel {
        BoltzmannKernel::Exponential => (-u / temperature).exp(),
        BoltzmannKernel::Sigmoid => 1.0 / (1.0 + (-(0.5 - u) / temperature).exp()),
        BoltzmannKernel::Power => (1.0 - u).max(0.0).powf(1.0 / temperature),
    }
}

/// Boltzmann-shaped schedule.
pub fn boltzmann_betas(
    timesteps: usize,
    beta_start: f64,
    beta_end: f64,
    kernel: BoltzmannKernel,
    temperature: f64,
) -> Vec<f64> {
    let span = timesteps.saturating_sub(1).max(1) as f64;
    let weights: Vec<f64> = (0..timesteps)
        .map(|i| kernel_weight(kernel, i as f64 / span, temperature))
        .collect();
    let w_min = weights.iter().copied().fold(f64::INFINITY, f64::min);
    let w_max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    weights
        .iter()
        .map(|w| {
            let norm = (w - w_min) / (w_max - w_min + NORM_EPS);
            beta_start + (beta_end - beta_start) * (1.0 - norm)
        })
        .collect()
}

/// Boltzmann-shaped schedule with its thermodynamic diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoltzmannSchedule {
    betas: Vec<f64>,
    kernel: BoltzmannKernel,
    temperature: f64,
}

impl BoltzmannSchedule {
    pub fn new(
        timesteps: usize,
        beta_start: f64,
        beta_end: f64,
        kernel: BoltzmannKernel,
        temperature: f64,
    ) -> ThermodiffResult<Self> {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ThermodiffError::InvalidTemperature(temperature));
        }
        Ok(Self {
            betas: boltzmann_betas(timesteps, beta_start, beta_end, kernel, temperature),
            kernel,
            temperature,
        })
    }

    pub fn kernel(&self) -> BoltzmannKernel {
        self.kernel
    }

    /// Effective temperature `T·(1 − t/timesteps)`, falling linearly to 0.
    pub fn temperature_at_step(&self, t: usize) -> ThermodiffResult<f64> {
        check_t(t, self.betas.len())?;
        Ok(self.temperature * (1.0 - t as f64 / self.betas.len() as f64))
    }
}

/// Record of one adaptive update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationEvent {
    pub step: usize,
    pub variance: f64,
    pub old_beta: f64,
    pub target: f64,
    pub new_beta: f64,
}

/// Feedback-driven schedule.
///
/// `betas` is an arena indexed by timestep; `adapt_schedule` is the only
/// writer and logs every update as an [`AdaptationEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveSchedule {
    betas: Vec<f64>,
    beta_start: f64,
    beta_end: f64,
    adaptation_rate: f64,
    events: Vec<AdaptationEvent>,
}

impl AdaptiveSchedule {
    pub fn new(
        timesteps: usize,
        beta_start: f64,
        beta_end: f64,
        adaptation_rate: f64,
    ) -> ThermodiffResult<Self> {
        if !(0.0..=1.0).contains(&adaptation_rate) {
            return Err(ThermodiffError::Config(format!(
                "adaptation_rate must be in [0, 1], got {adaptation_rate}"
            )));
        }
        Ok(Self {
            betas: linear_betas(timesteps, beta_start, beta_end),
            beta_start,
            beta_end,
            adaptation_rate,
            events: Vec::new(),
        })
    }

    /// Relax β_step toward `β_start + (β_end − β_start)·min(variance/10, 1)`.
    pub fn adapt_schedule(&mut self, variance: f64, step: usize) -> ThermodiffResult<AdaptationEvent> {
        check_t(step, self.betas.len())?;
        if !variance.is_finite() {
            return Err(ThermodiffError::Numerical(format!(
                "adaptive schedule received variance {variance}"
            )));
        }
        let ratio = (variance / 10.0).clamp(0.0, 1.0);
        let target = self.beta_start + (self.beta_end - self.beta_start) * ratio;
        let old_beta = self.betas[step];
        let new_beta = (1.0 - self.adaptation_rate) * old_beta + self.adaptation_rate * target;
        self.betas[step] = new_beta;

        let event = AdaptationEvent {
            step,
            variance,
            old_beta,
            target,
            new_beta,
        };
        log::debug!(
            "AdaptiveSchedule: step {step} beta {old_beta:.6e} -> {new_beta:.6e} (variance {variance:.4})"
        );
        self.events.push(event.clone());
        Ok(event)
    }

    pub fn events(&self) -> &[AdaptationEvent] {
        &self.events
    }
}

/// Closed family of noise schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoiseSchedule {
    Linear { betas: Vec<f64> },
    Cosine { betas: Vec<f64>, offset: f64 },
    Boltzmann(BoltzmannSchedule),
    Adaptive(AdaptiveSchedule),
}

impl NoiseSchedule {
    /// Build the schedule named by `config.schedule_type`.
    pub fn from_config(config: &DiffusionConfig) -> ThermodiffResult<Self> {
        config.validate()?;
        let t = config.timesteps;
        let schedule = match config.schedule_type {
            ScheduleType::Linear => NoiseSchedule::Linear {
                betas: linear_betas(t, config.beta_start, config.beta_end),
            },
            ScheduleType::Cosine => NoiseSchedule::Cosine {
                betas: cosine_betas(t, config.cosine_offset),
                offset: config.cosine_offset,
            },
            ScheduleType::Boltzmann => NoiseSchedule::Boltzmann(BoltzmannSchedule::new(
                t,
                config.beta_start,
                config.beta_end,
                config.boltzmann_kernel,
                config.schedule_temperature,
            )?),
            ScheduleType::Adaptive => NoiseSchedule::Adaptive(AdaptiveSchedule::new(
                t,
                config.beta_start,
                config.beta_end,
                config.adaptation_rate,
            )?),
        };
        log::debug!(
            "NoiseSchedule: built {} schedule with {t} steps",
            config.schedule_type
        );
        Ok(schedule)
    }

    pub fn schedule_type(&self) -> ScheduleType {
        match self {
            NoiseSchedule::Linear { .. } => ScheduleType::Linear,
            NoiseSchedule::Cosine { .. } => ScheduleType::Cosine,
            NoiseSchedule::Boltzmann(_) => ScheduleType::Boltzmann,
            NoiseSchedule::Adaptive(_) => ScheduleType::Adaptive,
        }
    }

    pub fn betas(&self) -> &[f64] {
        match self {
            NoiseSchedule::Linear { betas } | NoiseSchedule::Cosine { betas, .. } => betas,
            NoiseSchedule::Boltzmann(b) => &b.betas,
            NoiseSchedule::Adaptive(a) => &a.betas,
        }
    }

    pub fn alphas(&self) -> Vec<f64> {
        self.betas().iter().map(|b| 1.0 - b).collect()
    }

    pub fn len(&self) -> usize {
        self.betas().len()
    }

    pub fn is_empty(&self) -> bool {
        self.betas().is_empty()
    }

    /// Schedule energy `−ln(β_t / (α_t + 1e-8))`.
    pub fn energy_at_step(&self, t: usize) -> ThermodiffResult<f64> {
        check_t(t, self.len())?;
        let beta = self.betas()[t];
        Ok(-(beta / (1.0 - beta + NORM_EPS)).ln())
    }

    pub fn as_adaptive_mut(&mut self) -> Option<&mut AdaptiveSchedule> {
        match self {
            NoiseSchedule::Adaptive(a) => Some(a),
            _ => None,
        }
    }
}
