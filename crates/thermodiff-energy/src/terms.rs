// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Domain Energy Terms
// ─────────────────────────────────────────────────────────────────────
//! Extension point for domain capsules. A term contributes an energy
//! and its gradient on top of the plain field energy Σ E.

use std::fmt;
use std::sync::Arc;

use ndarray::{ArrayD, ArrayViewD};

/// An additive energy contribution.
pub trait EnergyTerm: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Scalar energy of `field`.
    fn energy(&self, field: &ArrayViewD<'_, f64>) -> f64;

    /// ∂E/∂field, same shape as `field`.
    fn gradient(&self, field: &ArrayViewD<'_, f64>) -> ArrayD<f64>;
}

/// Harmonic confinement `E = ½·k·Σ x²`, gradient `k·x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicConfinement {
    pub stiffness: f64,
}

impl HarmonicConfinement {
    pub fn new(stiffness: f64) -> Self {
        Self { stiffness }
    }
}

impl EnergyTerm for HarmonicConfinement {
    fn name(&self) -> &str {
        "harmonic_confinement"
    }

    fn energy(&self, field: &ArrayViewD<'_, f64>) -> f64 {
        0.5 * self.stiffness * field.iter().map(|x| x * x).sum::<f64>()
    }

    fn gradient(&self, field: &ArrayViewD<'_, f64>) -> ArrayD<f64> {
        field.mapv(|x| self.stiffness * x)
    }
}

type EnergyFn = dyn Fn(&ArrayViewD<'_, f64>) -> f64 + Send + Sync;
type GradientFn = dyn Fn(&ArrayViewD<'_, f64>) -> ArrayD<f64> + Send + Sync;

/// Term backed by caller-supplied closures (e.g. a Python callback).
#[derive(Clone)]
pub struct ExternalTerm {
    name: String,
    energy_fn: Arc<EnergyFn>,
    gradient_fn: Arc<GradientFn>,
}

impl ExternalTerm {
    pub fn new<E, G>(name: impl Into<String>, energy_fn: E, gradient_fn: G) -> Self
    where
        E: Fn(&ArrayViewD<'_, f64>) -> f64 + Send + Sync + 'static,
        G: Fn(&ArrayViewD<'_, f64>) -> ArrayD<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            energy_fn: Arc::new(energy_fn),
            gradient_fn: Arc::new(gradient_fn),
        }
    }
}

impl fmt::Debug for ExternalTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalTerm")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl EnergyTerm for ExternalTerm {
    fn name(&self) -> &str {
        &self.name
    }

    fn energy(&self, field: &ArrayViewD<'_, f64>) -> f64 {
        (self.energy_fn)(field)
    }

    fn gradient(&self, field: &ArrayViewD<'_, f64>) -> ArrayD<f64> {
        (self.gradient_fn)(field)
    }
}
