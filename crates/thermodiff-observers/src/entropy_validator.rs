// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Entropy Validator (Thermodynamic Audit)
// ─────────────────────────────────────────────────────────────────────
//! Scores a state transition against three checks:
//!
//!   1. Energy conservation   |E_f − E_i| ≤ tolerance
//!   2. Entropy monotonicity  S_f − S_i ≥ −entropy_tolerance
//!   3. Spectral plausibility dominant frequency ≤ threshold · bound
//!
//! overall_score = w_f · fidelity + w_s · [2] + w_p · [3], with the
//! fidelity clamped to [0, 1] before weighting.

use std::collections::BTreeMap;

use serde_json::json;

use thermodiff_energy::{EnergyState, EPS};
use thermodiff_types::{
    clamp_finite, unix_timestamp, ThermodiffResult, ThermodynamicMetrics, TrajectorySummary,
    ValidatorConfig,
};

use crate::spectral;

#[derive(Debug, Clone, Default)]
pub struct EntropyValidator {
    config: ValidatorConfig,
}

impl EntropyValidator {
    pub fn new(config: ValidatorConfig) -> ThermodiffResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Audit one transition. Pure apart from the timestamp.
    pub fn validate_transition(
        &self,
        initial: &EnergyState,
        final_state: &EnergyState,
    ) -> ThermodynamicMetrics {
        let cfg = &self.config;

        let e_initial = initial.energy();
        let e_final = final_state.energy();
        let energy_drift = (e_final - e_initial).abs();
        let energy_conserved = energy_drift <= cfg.energy_tolerance;
        let energy_fidelity = 1.0 - energy_drift / (e_initial.abs() + EPS);

        let entropy_change = final_state.entropy() - initial.entropy();
        let entropy_monotonic = entropy_change >= -cfg.entropy_tolerance;
        let entropy_production = entropy_change.max(0.0);

        let spectrum = spectral::analyze(final_state.energy_map());
        let spectral_valid = spectrum.is_plausible(cfg.spectral_threshold);

        let passed = energy_conserved && entropy_monotonic && spectral_valid;
        let indicator = |ok: bool| if ok { 1.0 } else { 0.0 };
        let overall_score = cfg.w_fidelity * clamp_finite(energy_fidelity, 0.0, 1.0)
            + cfg.w_entropy * indicator(entropy_monotonic)
            + cfg.w_spectral * indicator(spectral_valid);

        if !passed {
            log::debug!(
                "EntropyValidator: transition failed (drift {energy_drift:.3e}, dS {entropy_change:+.3e}, f_dom {:.3})",
                spectrum.dominant_frequency
            );
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("initial_step".to_string(), json!(initial.metadata().step));
        metadata.insert("final_step".to_string(), json!(final_state.metadata().step));
        metadata.insert("shape".to_string(), json!(final_state.shape()));
        metadata.insert("nyquist_bound".to_string(), json!(spectrum.nyquist_bound));

        ThermodynamicMetrics {
            energy_conserved,
            energy_drift,
            energy_fidelity,
            entropy_monotonic,
            entropy_change,
            entropy_production,
            spectral_valid,
            spectral_energy: spectrum.spectral_energy,
            dominant_frequency: spectrum.dominant_frequency,
            passed,
            overall_score,
            timestamp: unix_timestamp(),
            metadata,
        }
    }

    /// Audit every consecutive pair of `states`.
    pub fn validate_trajectory(&self, states: &[EnergyState]) -> TrajectorySummary {
        let transitions: Vec<ThermodynamicMetrics> = states
            .windows(2)
            .map(|w| self.validate_transition(&w[0], &w[1]))
            .collect();
        let summary = TrajectorySummary::from_transitions(transitions);
        log::info!(
            "EntropyValidator: {}/{} transitions passed, mean fidelity {:.4}, entropy production {:.4e}",
            summary.num_passed,
            summary.num_transitions,
            summary.mean_fidelity,
            summary.total_entropy_production
        );
        summary
    }
}
