// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Kernel Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! thermodiff kernel: energy-constrained diffusion with thermodynamic
//! auditing.

pub mod config;
pub mod error;
pub mod metrics;

pub use config::{
    Backend, BoltzmannKernel, DiffusionConfig, SamplerConfig, ScheduleType, ValidatorConfig,
};
pub use error::{ThermodiffError, ThermodiffResult};
pub use metrics::{
    clamp_finite, unix_timestamp, ConservationReport, SoftViolation, StepMetrics,
    ThermodynamicMetrics, TrajectoryMetrics, TrajectorySummary,
};
