// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodynamic Observers
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Read-only observers over energy states.
//!
//! - `EntropyValidator`: conservation, monotonicity and spectral audit
//! - `BoltzmannMetrics`: free energy, expected energy, ensemble entropy
//! - `spectral`: FFT power spectrum and dominant-frequency check

pub mod boltzmann;
pub mod entropy_validator;
pub mod spectral;

pub use boltzmann::{BoltzmannMetrics, BoltzmannSummary};
pub use entropy_validator::EntropyValidator;
pub use spectral::{analyze, power_spectrum, SpectrumSummary};
