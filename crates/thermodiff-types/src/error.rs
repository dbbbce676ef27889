// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Kernel Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all thermodiff kernel failures.
///
/// Only construction and contract violations land here. Soft invariant
/// violations (energy drift, small entropy decreases) are reported as
/// [`SoftViolation`](crate::metrics::SoftViolation) records instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThermodiffError {
    /// Malformed configuration (bounds, rates, timesteps).
    #[error("config error: {0}")]
    Config(String),

    /// Energy maps must be rank 2 (H, W) or rank 3 (B, H, W).
    #[error("invalid energy map rank {rank}: expected 2 or 3")]
    InvalidRank { rank: usize },

    /// Temperature must be strictly positive and finite.
    #[error("invalid temperature {0}: must be > 0")]
    InvalidTemperature(f64),

    /// Requested schedule type does not exist.
    #[error("unknown schedule type: {0}")]
    UnknownSchedule(String),

    /// Requested sampler type does not exist.
    #[error("unknown sampler type: {0}")]
    UnknownSampler(String),

    /// Unknown value for an enum-like option other than schedule/sampler.
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    /// Array shapes disagree.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Timestep index outside the schedule.
    #[error("timestep {t} out of range for schedule of length {timesteps}")]
    TimestepOutOfRange { t: usize, timesteps: usize },

    /// Numerical error (NaN/Inf in input or computation).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Invalid argument not covered by a more specific variant.
    #[error("validation error: {0}")]
    Validation(String),
}

pub type ThermodiffResult<T> = Result<T, ThermodiffError>;
