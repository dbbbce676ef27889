// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Energy State
// ─────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;

use ndarray::ArrayD;
use serde::Serialize;

use thermodiff_types::{ThermodiffError, ThermodiffResult};

use crate::operators::{check_rank, field_energy, shannon_entropy};

/// Provenance attached to every state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateMetadata {
    /// Number of `update_state` calls since the last reset.
    pub step: u64,
    /// |ΣE_new − ΣE_old| of the transition that produced this state.
    pub drift: f64,
    /// S_new − S_old of the transition that produced this state.
    pub entropy_change: f64,
    /// Free-form annotations.
    pub annotations: BTreeMap<String, serde_json::Value>,
}

/// Immutable snapshot of an energy map and its derived quantities.
///
/// The entropy is computed at construction, so it can never disagree
/// with the map it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyState {
    energy_map: ArrayD<f64>,
    entropy: f64,
    temperature: f64,
    metadata: StateMetadata,
}

impl EnergyState {
    /// Wrap a raw rank-2 (H, W) or rank-3 (B, H, W) array.
    pub fn from_raw_array(energy_map: ArrayD<f64>, temperature: f64) -> ThermodiffResult<Self> {
        Self::with_metadata(energy_map, temperature, StateMetadata::default())
    }

    pub fn with_metadata(
        energy_map: ArrayD<f64>,
        temperature: f64,
        metadata: StateMetadata,
    ) -> ThermodiffResult<Self> {
        check_rank(energy_map.shape())?;
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ThermodiffError::InvalidTemperature(temperature));
        }
        let entropy = shannon_entropy(&energy_map.view());
        Ok(Self {
            energy_map,
            entropy,
            temperature,
            metadata,
        })
    }

    /// Copy with one extra annotation.
    pub fn annotated(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.annotations.insert(key.into(), value);
        self
    }

    pub fn energy_map(&self) -> &ArrayD<f64> {
        &self.energy_map
    }

    pub fn into_energy_map(self) -> ArrayD<f64> {
        self.energy_map
    }

    pub fn entropy(&self) -> f64 {
        self.entropy
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn metadata(&self) -> &StateMetadata {
        &self.metadata
    }

    pub fn shape(&self) -> &[usize] {
        self.energy_map.shape()
    }

    /// Σ E over the map, without any domain terms.
    pub fn energy(&self) -> f64 {
        field_energy(&self.energy_map.view())
    }
}
