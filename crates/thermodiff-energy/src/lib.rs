// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Energy Fields
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Energy states and the energy field that owns them.
//!
//! - `EnergyState`: immutable snapshot (map, entropy, temperature, provenance)
//! - `EnergyField`: gradient / entropy / Boltzmann operators + state updates
//! - `NoiseSource`: seeded ChaCha20 Gaussian and categorical draws
//! - `EnergyTerm`: additive domain energies attached by capsules
//! - `SharedEnergyField`: mutex-guarded handle for multi-threaded callers

pub mod backend;
pub mod field;
pub mod noise;
pub mod operators;
pub mod shared;
pub mod state;
pub mod terms;

pub use field::{EnergyField, StateTransition};
pub use noise::NoiseSource;
pub use operators::{boltzmann_distribution, shannon_entropy, ENTROPY_TOLERANCE, EPS};
pub use shared::SharedEnergyField;
pub use state::{EnergyState, StateMetadata};
pub use terms::{EnergyTerm, ExternalTerm, HarmonicConfinement};
