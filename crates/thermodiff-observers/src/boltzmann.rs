// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Boltzmann Ensemble Metrics
// ─────────────────────────────────────────────────────────────────────
//! Canonical-ensemble quantities over a finite set of energies (k_B = 1):
//!
//!   w_i  = exp(−(E_i − E_min)/T)
//!   p_i  = w_i / Σ w
//!   F    = −T · ln Σ w_i
//!   ⟨E⟩  = Σ p_i E_i
//!   S    = −Σ p_i ln p_i
//!
//! Weights are taken relative to E_min so every exponent is ≤ 0; the
//! free energy is reported on that shifted scale, F = ⟨E⟩ − E_min − T·S.

use serde::{Deserialize, Serialize};

use thermodiff_energy::{boltzmann_distribution, EnergyState};
use thermodiff_types::{ThermodiffError, ThermodiffResult};

const LOG_EPS: f64 = 1e-10;

/// All ensemble quantities for one set of energies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoltzmannSummary {
    pub free_energy: f64,
    pub expected_energy: f64,
    pub entropy: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoltzmannMetrics {
    temperature: f64,
}

impl BoltzmannMetrics {
    pub fn new(temperature: f64) -> ThermodiffResult<Self> {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ThermodiffError::InvalidTemperature(temperature));
        }
        Ok(Self { temperature })
    }

    /// Metrics at the temperature a state carries.
    pub fn for_state(state: &EnergyState) -> Self {
        Self {
            temperature: state.temperature(),
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    fn check_non_empty(energies: &[f64]) -> ThermodiffResult<()> {
        if energies.is_empty() {
            return Err(ThermodiffError::Validation(
                "Boltzmann metrics need at least one energy".to_string(),
            ));
        }
        Ok(())
    }

    /// Normalised weights p_i.
    pub fn boltzmann_weight(&self, energies: &[f64]) -> ThermodiffResult<Vec<f64>> {
        boltzmann_distribution(energies, self.temperature)
    }

    /// Free energy −T ln Σ w_i over the min-shifted weights.
    pub fn free_energy(&self, energies: &[f64]) -> ThermodiffResult<f64> {
        Self::check_non_empty(energies)?;
        if energies.iter().any(|e| !e.is_finite()) {
            return Err(ThermodiffError::Numerical(
                "energies contain NaN or Inf".to_string(),
            ));
        }
        let t = self.temperature;
        let e_min = energies.iter().copied().fold(f64::INFINITY, f64::min);
        let z_shifted: f64 = energies.iter().map(|e| (-(e - e_min) / t).exp()).sum();
        Ok(-t * z_shifted.ln())
    }

    /// ⟨E⟩ under the Boltzmann distribution.
    pub fn expected_energy(&self, energies: &[f64]) -> ThermodiffResult<f64> {
        Self::check_non_empty(energies)?;
        let p = self.boltzmann_weight(energies)?;
        Ok(p.iter().zip(energies).map(|(p, e)| p * e).sum())
    }

    /// Shannon entropy of a probability vector; zero entries contribute 0.
    pub fn entropy_from_distribution(p: &[f64]) -> f64 {
        -p.iter()
            .filter(|&&pi| pi > 0.0)
            .map(|&pi| pi * (pi + LOG_EPS).ln())
            .sum::<f64>()
    }

    pub fn summarize(&self, energies: &[f64]) -> ThermodiffResult<BoltzmannSummary> {
        let p = self.boltzmann_weight(energies)?;
        Ok(BoltzmannSummary {
            free_energy: self.free_energy(energies)?,
            expected_energy: p.iter().zip(energies).map(|(p, e)| p * e).sum(),
            entropy: Self::entropy_from_distribution(&p),
            temperature: self.temperature,
        })
    }
}
