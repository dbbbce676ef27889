// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Diffusion Core
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Energy-constrained diffusion.
//!
//! Control flow: schedule → coefficient tables → forward / reverse
//! recurrences → `DiffusionModel` or a `Sampler` driving per-timestep
//! transitions, with the `EnergyField` supplying gradients and entropy.
//!
//! Architecture:
//!   - NoiseSchedule: linear, cosine, Boltzmann-shaped, adaptive
//!   - ScheduleCoefficients: cached ᾱ, posterior and reciprocal tables
//!   - ForwardDiffusion: closed-form and single-step noising
//!   - ReverseDiffusion: posterior reconstruction with optional guidance
//!   - NoisePredictor: injected ε̂(x_t, t) capability
//!   - DiffusionModel: diffuse / denoise / sample / training_loss
//!   - Sampler: ddpm, ddim, energy-guided multi-proposal, ancestral

pub mod coefficients;
pub mod forward;
pub mod model;
pub mod predictor;
pub mod reverse;
pub mod sampler;
pub mod schedule;

pub use coefficients::{per_batch_scalars, ScheduleCoefficients};
pub use forward::ForwardDiffusion;
pub use model::DiffusionModel;
pub use predictor::{ExternalPredictor, NoisePredictor, ZeroPredictor};
pub use reverse::ReverseDiffusion;
pub use sampler::{strided_timesteps, SampleTrace, Sampler};
pub use schedule::{AdaptationEvent, AdaptiveSchedule, BoltzmannSchedule, NoiseSchedule};
