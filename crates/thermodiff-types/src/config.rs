// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Kernel Configuration
// ─────────────────────────────────────────────────────────────────────
//! Immutable configuration records for the diffusion core, the sampler
//! family and the thermodynamic validator.
//!
//! Every record validates itself (`validate()`) and loads from JSON.
//! Enum-valued options parse from their snake_case names and reject
//! unknown names with a typed error instead of falling back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ThermodiffError, ThermodiffResult};

/// Noise schedule family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScheduleType {
    Linear,
    Cosine,
    Boltzmann,
    Adaptive,
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::Linear => "linear",
            ScheduleType::Cosine => "cosine",
            ScheduleType::Boltzmann => "boltzmann",
            ScheduleType::Adaptive => "adaptive",
        }
    }
}

impl FromStr for ScheduleType {
    type Err = ThermodiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(ScheduleType::Linear),
            "cosine" => Ok(ScheduleType::Cosine),
            "boltzmann" => Ok(ScheduleType::Boltzmann),
            "adaptive" => Ok(ScheduleType::Adaptive),
            _ => Err(ThermodiffError::UnknownSchedule(s.to_string())),
        }
    }
}

impl TryFrom<String> for ScheduleType {
    type Error = ThermodiffError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleType> for String {
    fn from(value: ScheduleType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decay kernel used by the Boltzmann-shaped schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BoltzmannKernel {
    /// `exp(-u / T)`
    Exponential,
    /// `σ((0.5 - u) / T)`
    Sigmoid,
    /// `(1 - u)^(1 / T)`
    Power,
}

impl BoltzmannKernel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoltzmannKernel::Exponential => "exponential",
            BoltzmannKernel::Sigmoid => "sigmoid",
            BoltzmannKernel::Power => "power",
        }
    }
}

impl FromStr for BoltzmannKernel {
    type Err = ThermodiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exponential" | "exp" => Ok(BoltzmannKernel::Exponential),
            "sigmoid" => Ok(BoltzmannKernel::Sigmoid),
            "power" => Ok(BoltzmannKernel::Power),
            _ => Err(ThermodiffError::UnknownVariant {
                kind: "boltzmann kernel",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for BoltzmannKernel {
    type Error = ThermodiffError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BoltzmannKernel> for String {
    fn from(value: BoltzmannKernel) -> Self {
        value.as_str().to_string()
    }
}

/// Numeric backend for element-wise work inside one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Backend {
    /// Single-threaded ndarray kernels.
    #[default]
    Cpu,
    /// Data-parallel ndarray kernels (requires the `rayon` feature).
    Rayon,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Cpu => "cpu",
            Backend::Rayon => "rayon",
        }
    }
}

impl FromStr for Backend {
    type Err = ThermodiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Backend::Cpu),
            "rayon" | "parallel" => Ok(Backend::Rayon),
            _ => Err(ThermodiffError::UnknownVariant {
                kind: "backend",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Backend {
    type Error = ThermodiffError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Backend> for String {
    fn from(value: Backend) -> Self {
        value.as_str().to_string()
    }
}

/// Runtime configuration shared by forward and reverse diffusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    /// Number of diffusion timesteps T.
    /// Default: 1000.
    pub timesteps: usize,

    /// First noise coefficient β_0 of the linear family.
    /// Default: 1e-4.
    pub beta_start: f64,

    /// Last noise coefficient β_{T-1} of the linear family.
    /// Default: 0.02.
    pub beta_end: f64,

    /// Schedule family. Default: linear.
    pub schedule_type: ScheduleType,

    /// Cosine schedule offset s. Default: 0.008.
    pub cosine_offset: f64,

    /// Decay kernel of the Boltzmann-shaped schedule.
    /// Default: exponential.
    pub boltzmann_kernel: BoltzmannKernel,

    /// Kernel temperature of the Boltzmann-shaped schedule.
    /// Default: 1.0.
    pub schedule_temperature: f64,

    /// EMA rate of the adaptive schedule. Default: 0.1.
    pub adaptation_rate: f64,

    /// Scale λ applied to the energy gradient in guided steps.
    /// Default: 0.1.
    pub energy_guidance_scale: f64,

    /// Field temperature (k_B = 1). Default: 1.0.
    pub temperature: f64,

    /// Absolute energy drift tolerated per transition.
    /// Default: 0.01.
    pub energy_tolerance: f64,

    /// Clip predicted x0 to [-1, 1] during reverse steps.
    /// Default: true.
    pub clip_denoised: bool,

    /// Seed for every noise draw. `None` seeds from OS entropy.
    pub seed: Option<u64>,

    /// Element-wise backend. Default: cpu.
    pub backend: Backend,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            timesteps: 1000,
            beta_start: 1e-4,
            beta_end: 0.02,
            schedule_type: ScheduleType::Linear,
            cosine_offset: 0.008,
            boltzmann_kernel: BoltzmannKernel::Exponential,
            schedule_temperature: 1.0,
            adaptation_rate: 0.1,
            energy_guidance_scale: 0.1,
            temperature: 1.0,
            energy_tolerance: 0.01,
            clip_denoised: true,
            seed: None,
            backend: Backend::Cpu,
        }
    }
}

impl DiffusionConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> ThermodiffResult<()> {
        if self.timesteps == 0 {
            return Err(ThermodiffError::Config(
                "timesteps must be > 0".to_string(),
            ));
        }
        if !(self.beta_start > 0.0 && self.beta_start < 1.0) {
            return Err(ThermodiffError::Config(format!(
                "beta_start must be in (0, 1), got {}",
                self.beta_start
            )));
        }
        if !(self.beta_end > 0.0 && self.beta_end < 1.0) {
            return Err(ThermodiffError::Config(format!(
                "beta_end must be in (0, 1), got {}",
                self.beta_end
            )));
        }
        if self.beta_start >= self.beta_end {
            return Err(ThermodiffError::Config(format!(
                "beta_start must be < beta_end, got {} >= {}",
                self.beta_start, self.beta_end
            )));
        }
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(ThermodiffError::InvalidTemperature(self.temperature));
        }
        if !(self.energy_tolerance.is_finite() && self.energy_tolerance >= 0.0) {
            return Err(ThermodiffError::Config(format!(
                "energy_tolerance must be >= 0, got {}",
                self.energy_tolerance
            )));
        }
        if !(self.energy_guidance_scale.is_finite() && self.energy_guidance_scale >= 0.0) {
            return Err(ThermodiffError::Config(format!(
                "energy_guidance_scale must be >= 0, got {}",
                self.energy_guidance_scale
            )));
        }
        if !(self.cosine_offset.is_finite() && self.cosine_offset >= 0.0) {
            return Err(ThermodiffError::Config(format!(
                "cosine_offset must be >= 0, got {}",
                self.cosine_offset
            )));
        }
        if !(self.schedule_temperature.is_finite() && self.schedule_temperature > 0.0) {
            return Err(ThermodiffError::Config(format!(
                "schedule_temperature must be > 0, got {}",
                self.schedule_temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.adaptation_rate) {
            return Err(ThermodiffError::Config(format!(
                "adaptation_rate must be in [0, 1], got {}",
                self.adaptation_rate
            )));
        }
        Ok(())
    }

    /// Load from JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> ThermodiffResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ThermodiffError::Config(format!("JSON parse error: {e}")))
    }

    /// Load from JSON and validate in one go.
    pub fn from_json_validated(json: &str) -> ThermodiffResult<Self> {
        let cfg = Self::from_json(json)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Sampler family, each variant carrying only the parameters it uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplerConfig {
    /// Full stochastic chain over all timesteps.
    Ddpm,
    /// Strided chain; `eta = 0` is deterministic, `eta = 1` fully stochastic.
    Ddim { num_steps: usize, eta: f64 },
    /// Strided chain drawing `num_proposals` candidates per step and
    /// selecting one by Boltzmann-weighted categorical sampling.
    EnergyGuided {
        num_steps: usize,
        eta: f64,
        num_proposals: usize,
        exploration_scale: f64,
    },
    /// Full chain using the direct (x, ε̂) mean decomposition.
    Ancestral,
}

impl SamplerConfig {
    pub fn name(&self) -> &'static str {
        match self {
            SamplerConfig::Ddpm => "ddpm",
            SamplerConfig::Ddim { .. } => "ddim",
            SamplerConfig::EnergyGuided { .. } => "energy_guided",
            SamplerConfig::Ancestral => "ancestral",
        }
    }

    /// Validate against the schedule length it will run on.
    pub fn validate(&self, timesteps: usize) -> ThermodiffResult<()> {
        let check_strided = |num_steps: usize, eta: f64| -> ThermodiffResult<()> {
            if num_steps == 0 || num_steps > timesteps {
                return Err(ThermodiffError::Config(format!(
                    "num_steps must be in [1, {timesteps}], got {num_steps}"
                )));
            }
            if !(0.0..=1.0).contains(&eta) {
                return Err(ThermodiffError::Config(format!(
                    "eta must be in [0, 1], got {eta}"
                )));
            }
            Ok(())
        };

        match *self {
            SamplerConfig::Ddpm | SamplerConfig::Ancestral => Ok(()),
            SamplerConfig::Ddim { num_steps, eta } => check_strided(num_steps, eta),
            SamplerConfig::EnergyGuided {
                num_steps,
                eta,
                num_proposals,
                exploration_scale,
            } => {
                check_strided(num_steps, eta)?;
                if num_proposals == 0 {
                    return Err(ThermodiffError::Config(
                        "num_proposals must be >= 1".to_string(),
                    ));
                }
                if !(exploration_scale.is_finite() && exploration_scale >= 0.0) {
                    return Err(ThermodiffError::Config(format!(
                        "exploration_scale must be >= 0, got {exploration_scale}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Replace the parameters that are given, keep the rest. Fields a
    /// variant does not carry are ignored.
    pub fn with_overrides(
        mut self,
        num_steps: Option<usize>,
        eta: Option<f64>,
        num_proposals: Option<usize>,
        exploration_scale: Option<f64>,
    ) -> Self {
        match &mut self {
            SamplerConfig::Ddpm | SamplerConfig::Ancestral => {}
            SamplerConfig::Ddim {
                num_steps: n,
                eta: e,
            } => {
                *n = num_steps.unwrap_or(*n);
                *e = eta.unwrap_or(*e);
            }
            SamplerConfig::EnergyGuided {
                num_steps: n,
                eta: e,
                num_proposals: k,
                exploration_scale: x,
            } => {
                *n = num_steps.unwrap_or(*n);
                *e = eta.unwrap_or(*e);
                *k = num_proposals.unwrap_or(*k);
                *x = exploration_scale.unwrap_or(*x);
            }
        }
        self
    }

    /// Load from JSON string, e.g. `{"kind": "ddim", "num_steps": 50, "eta": 0.0}`.
    pub fn from_json(json: &str) -> ThermodiffResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ThermodiffError::Config(format!("JSON parse error: {e}")))
    }
}

/// Parse a sampler name into its default parameterisation.
impl FromStr for SamplerConfig {
    type Err = ThermodiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ddpm" => Ok(SamplerConfig::Ddpm),
            "ddim" => Ok(SamplerConfig::Ddim {
                num_steps: 50,
                eta: 0.0,
            }),
            "energy_guided" | "boltzmann" => Ok(SamplerConfig::EnergyGuided {
                num_steps: 50,
                eta: 0.0,
                num_proposals: 4,
                exploration_scale: 0.01,
            }),
            "ancestral" => Ok(SamplerConfig::Ancestral),
            _ => Err(ThermodiffError::UnknownSampler(s.to_string())),
        }
    }
}

/// Thresholds and weights for the entropy validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Absolute energy drift tolerated. Default: 0.01.
    pub energy_tolerance: f64,

    /// Entropy decrease tolerated before monotonicity fails.
    /// Default: 1e-6.
    pub entropy_tolerance: f64,

    /// Fraction of the Nyquist bound the dominant frequency may reach.
    /// Default: 0.8.
    pub spectral_threshold: f64,

    /// Score weight of energy fidelity. Default: 0.4.
    pub w_fidelity: f64,

    /// Score weight of entropy monotonicity. Default: 0.3.
    pub w_entropy: f64,

    /// Score weight of spectral validity. Default: 0.3.
    pub w_spectral: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            energy_tolerance: 0.01,
            entropy_tolerance: 1e-6,
            spectral_threshold: 0.8,
            w_fidelity: 0.4,
            w_entropy: 0.3,
            w_spectral: 0.3,
        }
    }
}

impl ValidatorConfig {
    pub fn validate(&self) -> ThermodiffResult<()> {
        if !(self.energy_tolerance.is_finite() && self.energy_tolerance >= 0.0) {
            return Err(ThermodiffError::Config(format!(
                "energy_tolerance must be >= 0, got {}",
                self.energy_tolerance
            )));
        }
        if !(self.entropy_tolerance.is_finite() && self.entropy_tolerance >= 0.0) {
            return Err(ThermodiffError::Config(format!(
                "entropy_tolerance must be >= 0, got {}",
                self.entropy_tolerance
            )));
        }
        if !(self.spectral_threshold > 0.0 && self.spectral_threshold <= 1.0) {
            return Err(ThermodiffError::Config(format!(
                "spectral_threshold must be in (0, 1], got {}",
                self.spectral_threshold
            )));
        }
        let w_sum = self.w_fidelity + self.w_entropy + self.w_spectral;
        if (w_sum - 1.0).abs() > 1e-9 {
            return Err(ThermodiffError::Config(format!(
                "score weights must sum to 1.0, got {} + {} + {} = {}",
                self.w_fidelity, self.w_entropy, self.w_spectral, w_sum
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> ThermodiffResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ThermodiffError::Config(format!("JSON parse error: {e}")))
    }
}
