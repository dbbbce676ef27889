// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Kernel Metric Records
// ─────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Clamp a value to [lo, hi], mapping NaN to lo and Inf to nearest bound.
#[inline]
pub fn clamp_finite(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_finite: NaN detected, clamping to {lo:.4}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_finite: Inf detected, clamping to {boundary:.4}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// Seconds since the Unix epoch (0.0 if the clock is before it).
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// A recoverable invariant violation observed while a trajectory runs.
///
/// These never abort a loop; they are returned next to the primary
/// result so callers can inspect them post hoc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoftViolation {
    /// |ΣE_new − ΣE_old| exceeded the field's energy tolerance.
    EnergyDrift {
        step: u64,
        drift: f64,
        tolerance: f64,
    },
    /// Entropy fell by more than the numerical tolerance.
    EntropyDecrease { step: u64, entropy_change: f64 },
}

impl SoftViolation {
    pub fn step(&self) -> u64 {
        match self {
            SoftViolation::EnergyDrift { step, .. } => *step,
            SoftViolation::EntropyDecrease { step, .. } => *step,
        }
    }
}

/// Side-effect-free conservation check between two states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConservationReport {
    pub initial_energy: f64,
    pub final_energy: f64,
    /// |E_final − E_initial|.
    pub energy_drift: f64,
    /// S_final − S_initial.
    pub entropy_change: f64,
    /// drift <= tolerance (inclusive).
    pub energy_conserved: bool,
    /// ΔS ≥ −1e-6.
    pub entropy_monotonic: bool,
    /// 1 − drift / (|E_initial| + ε).
    pub energy_fidelity: f64,
    /// energy_conserved ∧ entropy_monotonic.
    pub passed: bool,
}

/// One step of a `diffuse` or `denoise` trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    /// Position in the trajectory (0-based).
    pub step: usize,
    /// Schedule timestep that was applied.
    pub timestep: usize,
    /// Total energy after the step.
    pub energy: f64,
    /// Absolute energy change produced by the step.
    pub drift: f64,
    /// Shannon entropy after the step.
    pub entropy: f64,
    pub entropy_change: f64,
    pub fidelity: f64,
}

/// Aggregate record of a full `diffuse` / `denoise` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryMetrics {
    pub steps: Vec<StepMetrics>,
    pub initial_energy: f64,
    pub final_energy: f64,
    pub initial_entropy: f64,
    pub final_entropy: f64,
    /// Σ per-step drift.
    pub total_drift: f64,
    pub max_drift: f64,
    pub mean_fidelity: f64,
    /// Soft violations reported by the energy field along the way.
    pub violations: Vec<SoftViolation>,
}

impl TrajectoryMetrics {
    pub fn new(initial_energy: f64, initial_entropy: f64) -> Self {
        Self {
            initial_energy,
            final_energy: initial_energy,
            initial_entropy,
            final_entropy: initial_entropy,
            ..Self::default()
        }
    }

    /// Append one step and refresh the running aggregates.
    pub fn record(&mut self, step: StepMetrics) {
        self.total_drift += step.drift;
        self.max_drift = self.max_drift.max(step.drift);
        self.final_energy = step.energy;
        self.final_entropy = step.entropy;
        self.steps.push(step);
        let n = self.steps.len() as f64;
        self.mean_fidelity = self.steps.iter().map(|s| s.fidelity).sum::<f64>() / n;
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Net entropy change over the whole run.
    pub fn entropy_change(&self) -> f64 {
        self.final_entropy - self.initial_entropy
    }
}

/// Result of auditing one state transition.
///
/// Created fresh per validation call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermodynamicMetrics {
    // Energy conservation
    pub energy_conserved: bool,
    pub energy_drift: f64,
    pub energy_fidelity: f64,

    // Entropy monotonicity
    pub entropy_monotonic: bool,
    pub entropy_change: f64,
    /// max(ΔS, 0).
    pub entropy_production: f64,

    // Spectral plausibility
    pub spectral_valid: bool,
    pub spectral_energy: f64,
    pub dominant_frequency: f64,

    // Aggregate
    pub passed: bool,
    pub overall_score: f64,

    /// Seconds since the Unix epoch at validation time.
    pub timestamp: f64,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Pairwise audit of a whole trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySummary {
    pub transitions: Vec<ThermodynamicMetrics>,
    pub num_transitions: usize,
    pub num_passed: usize,
    /// num_passed / num_transitions (1.0 for an empty trajectory).
    pub pass_rate: f64,
    pub mean_fidelity: f64,
    pub mean_score: f64,
    /// Σ entropy production over all transitions.
    pub total_entropy_production: f64,
    /// Index of the first failing transition, if any.
    pub first_failure: Option<usize>,
}

impl TrajectorySummary {
    /// Aggregate a list of per-transition audits.
    pub fn from_transitions(transitions: Vec<ThermodynamicMetrics>) -> Self {
        let n = transitions.len();
        if n == 0 {
            return Self {
                pass_rate: 1.0,
                ..Self::default()
            };
        }
        let num_passed = transitions.iter().filter(|m| m.passed).count();
        let nf = n as f64;
        Self {
            num_transitions: n,
            num_passed,
            pass_rate: num_passed as f64 / nf,
            mean_fidelity: transitions.iter().map(|m| m.energy_fidelity).sum::<f64>() / nf,
            mean_score: transitions.iter().map(|m| m.overall_score).sum::<f64>() / nf,
            total_entropy_production: transitions.iter().map(|m| m.entropy_production).sum(),
            first_failure: transitions.iter().position(|m| !m.passed),
            transitions,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.num_passed == self.num_transitions
    }
}
