// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Shared Energy Field
// ─────────────────────────────────────────────────────────────────────
//! Thread-safe handle for callers that must share one field.
//!
//! Writers are serialised by a `parking_lot::Mutex`; each call holds the
//! lock for exactly one operation, so a step is the unit of atomicity.

use std::sync::Arc;

use ndarray::ArrayD;
use parking_lot::Mutex;

use thermodiff_types::{ConservationReport, ThermodiffResult};

use crate::field::{EnergyField, StateTransition};
use crate::state::EnergyState;

#[derive(Debug, Clone)]
pub struct SharedEnergyField {
    inner: Arc<Mutex<EnergyField>>,
}

impl SharedEnergyField {
    pub fn new(field: EnergyField) -> Self {
        Self {
            inner: Arc::new(Mutex::new(field)),
        }
    }

    pub fn update_state(&self, new_map: ArrayD<f64>) -> ThermodiffResult<StateTransition> {
        self.inner.lock().update_state(new_map)
    }

    pub fn reset_state(&self, energy_map: ArrayD<f64>) -> ThermodiffResult<EnergyState> {
        self.inner.lock().reset_state(energy_map).cloned()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> EnergyState {
        self.inner.lock().current_state().clone()
    }

    pub fn validate_conservation(
        &self,
        initial: &EnergyState,
        final_state: &EnergyState,
    ) -> ConservationReport {
        self.inner.lock().validate_conservation(initial, final_state)
    }

    /// Run `f` with exclusive access to the field.
    pub fn with_field<R>(&self, f: impl FnOnce(&mut EnergyField) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}
