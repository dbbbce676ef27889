// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Energy Field
// ─────────────────────────────────────────────────────────────────────
//! Stateful wrapper around the current [`EnergyState`].
//!
//! The field is single-writer: `update_state` and `reset_state` take
//! `&mut self`. Invariant violations during `update_state` are soft:
//! they are logged and returned in the [`StateTransition`], never
//! raised.

use std::fmt;
use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};

use thermodiff_types::{
    Backend, ConservationReport, DiffusionConfig, SoftViolation, ThermodiffError,
    ThermodiffResult,
};

use crate::backend;
use crate::operators::{self, ENTROPY_TOLERANCE, EPS};
use crate::state::{EnergyState, StateMetadata};
use crate::terms::EnergyTerm;

/// Outcome of one `update_state` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    /// The newly installed state.
    pub state: EnergyState,
    pub drift: f64,
    pub entropy_change: f64,
    pub violations: Vec<SoftViolation>,
}

impl StateTransition {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Energy field with fixed shape, temperature and tolerance.
#[derive(Clone)]
pub struct EnergyField {
    shape: Vec<usize>,
    temperature: f64,
    energy_tolerance: f64,
    backend: Backend,
    current_state: EnergyState,
    terms: Vec<Arc<dyn EnergyTerm>>,
}

impl fmt::Debug for EnergyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.terms.iter().map(|t| t.name()).collect();
        f.debug_struct("EnergyField")
            .field("shape", &self.shape)
            .field("temperature", &self.temperature)
            .field("energy_tolerance", &self.energy_tolerance)
            .field("backend", &self.backend)
            .field("step", &self.current_state.metadata().step)
            .field("terms", &names)
            .finish()
    }
}

impl EnergyField {
    /// Zero-initialised field on the CPU backend.
    pub fn new(shape: &[usize], temperature: f64, energy_tolerance: f64) -> ThermodiffResult<Self> {
        operators::check_rank(shape)?;
        if !(energy_tolerance.is_finite() && energy_tolerance >= 0.0) {
            return Err(ThermodiffError::Config(format!(
                "energy_tolerance must be >= 0, got {energy_tolerance}"
            )));
        }
        let current_state = EnergyState::from_raw_array(ArrayD::zeros(IxDyn(shape)), temperature)?;
        Ok(Self {
            shape: shape.to_vec(),
            temperature,
            energy_tolerance,
            backend: Backend::Cpu,
            current_state,
            terms: Vec::new(),
        })
    }

    /// Temperature, tolerance and backend taken from a diffusion config.
    pub fn from_config(shape: &[usize], config: &DiffusionConfig) -> ThermodiffResult<Self> {
        Self::new(shape, config.temperature, config.energy_tolerance)?.with_backend(config.backend)
    }

    pub fn with_backend(mut self, backend: Backend) -> ThermodiffResult<Self> {
        backend::ensure_available(backend)?;
        self.backend = backend;
        Ok(self)
    }

    /// Attach a domain energy term.
    pub fn with_term(mut self, term: Arc<dyn EnergyTerm>) -> Self {
        log::debug!("EnergyField: attached term '{}'", term.name());
        self.terms.push(term);
        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn energy_tolerance(&self) -> f64 {
        self.energy_tolerance
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn current_state(&self) -> &EnergyState {
        &self.current_state
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    fn check_shape(&self, got: &[usize]) -> ThermodiffResult<()> {
        if got != self.shape.as_slice() {
            return Err(ThermodiffError::ShapeMismatch {
                expected: self.shape.clone(),
                got: got.to_vec(),
            });
        }
        Ok(())
    }

    /// |∇E| of `field` plus the gradient of every attached term.
    pub fn compute_energy_gradient(&self, field: &ArrayD<f64>) -> ThermodiffResult<ArrayD<f64>> {
        let mut grad = operators::energy_gradient(&field.view(), self.backend)?;
        for term in &self.terms {
            let g = term.gradient(&field.view());
            if g.shape() != field.shape() {
                return Err(ThermodiffError::ShapeMismatch {
                    expected: field.shape().to_vec(),
                    got: g.shape().to_vec(),
                });
            }
            grad += &g;
        }
        Ok(grad)
    }

    /// Shannon entropy of the magnitude distribution of `field`.
    pub fn compute_entropy(&self, field: &ArrayD<f64>) -> f64 {
        operators::shannon_entropy(&field.view())
    }

    /// exp(-E/T) normalised to sum 1, same shape as `field`.
    pub fn boltzmann_weight(&self, field: &ArrayD<f64>) -> ThermodiffResult<ArrayD<f64>> {
        operators::boltzmann_field(&field.view(), self.temperature, self.backend)
    }

    /// Σ field plus the energy of every attached term.
    pub fn total_energy(&self, field: &ArrayD<f64>) -> f64 {
        let view = field.view();
        let base = operators::field_energy(&view);
        self.terms.iter().fold(base, |acc, t| acc + t.energy(&view))
    }

    /// Build a state at this field's temperature without installing it.
    pub fn make_state(&self, energy_map: ArrayD<f64>) -> ThermodiffResult<EnergyState> {
        EnergyState::from_raw_array(energy_map, self.temperature)
    }

    /// Install a fresh step-0 state.
    pub fn reset_state(&mut self, energy_map: ArrayD<f64>) -> ThermodiffResult<&EnergyState> {
        self.check_shape(energy_map.shape())?;
        self.current_state = EnergyState::from_raw_array(energy_map, self.temperature)?;
        Ok(&self.current_state)
    }

    /// Replace the current state with `new_map`.
    ///
    /// Drift above tolerance and entropy decreases below −1e-6 are
    /// reported, not raised.
    pub fn update_state(&mut self, new_map: ArrayD<f64>) -> ThermodiffResult<StateTransition> {
        self.check_shape(new_map.shape())?;
        operators::check_finite(&new_map.view(), "energy map")?;

        let old_energy = self.total_energy(self.current_state.energy_map());
        let new_energy = self.total_energy(&new_map);
        let drift = (new_energy - old_energy).abs();
        let entropy = self.compute_entropy(&new_map);
        let entropy_change = entropy - self.current_state.entropy();
        let step = self.current_state.metadata().step + 1;

        let mut violations = Vec::new();
        if drift > self.energy_tolerance {
            log::warn!(
                "EnergyField step {step}: energy drift {drift:.6e} exceeds tolerance {:.6e}",
                self.energy_tolerance
            );
            violations.push(SoftViolation::EnergyDrift {
                step,
                drift,
                tolerance: self.energy_tolerance,
            });
        }
        if entropy_change < -ENTROPY_TOLERANCE {
            log::warn!("EnergyField step {step}: entropy decreased by {:.6e}", -entropy_change);
            violations.push(SoftViolation::EntropyDecrease {
                step,
                entropy_change,
            });
        }

        let metadata = StateMetadata {
            step,
            drift,
            entropy_change,
            annotations: self.current_state.metadata().annotations.clone(),
        };
        self.current_state = EnergyState::with_metadata(new_map, self.temperature, metadata)?;

        Ok(StateTransition {
            state: self.current_state.clone(),
            drift,
            entropy_change,
            violations,
        })
    }

    /// Pure conservation check between two states.
    ///
    /// The drift bound is inclusive, matching the `drift > tolerance`
    /// warning in `update_state`.
    pub fn validate_conservation(
        &self,
        initial: &EnergyState,
        final_state: &EnergyState,
    ) -> ConservationReport {
        let initial_energy = self.total_energy(initial.energy_map());
        let final_energy = self.total_energy(final_state.energy_map());
        let energy_drift = (final_energy - initial_energy).abs();
        let entropy_change = final_state.entropy() - initial.entropy();
        let energy_conserved = energy_drift <= self.energy_tolerance;
        let entropy_monotonic = entropy_change >= -ENTROPY_TOLERANCE;
        ConservationReport {
            initial_energy,
            final_energy,
            energy_drift,
            entropy_change,
            energy_conserved,
            entropy_monotonic,
            energy_fidelity: 1.0 - energy_drift / (initial_energy.abs() + EPS),
            passed: energy_conserved && entropy_monotonic,
        }
    }
}
