// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Spectral Plausibility Check
// ─────────────────────────────────────────────────────────────────────
//! N-dimensional power spectrum of an energy map.
//!
//! The FFT runs along every axis in turn (batch axis included). Bin
//! indices are mapped to signed frequencies, k > n/2 ↦ k − n, so the
//! dominant frequency is the L2 norm of the arg-max bin's signed index
//! vector. The bound it is compared against is ‖(n_0/2, n_1/2, …)‖.

use ndarray::{ArrayD, Axis, Dimension, IxDyn};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

/// Summary of one power spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumSummary {
    /// Σ |X_k|² / N, equal to Σ x² by Parseval.
    pub spectral_energy: f64,
    /// ‖signed index of the strongest bin‖₂.
    pub dominant_frequency: f64,
    /// ‖(n_i / 2)‖₂ over all axes.
    pub nyquist_bound: f64,
}

impl SpectrumSummary {
    /// `dominant_frequency ≤ threshold · nyquist_bound`.
    pub fn is_plausible(&self, threshold: f64) -> bool {
        self.dominant_frequency <= threshold * self.nyquist_bound
    }
}

/// |FFT(field)|² with the same shape as `field`.
pub fn power_spectrum(field: &ArrayD<f64>) -> ArrayD<f64> {
    let mut spectrum = field.mapv(|v| Complex::new(v, 0.0));
    if spectrum.is_empty() {
        return ArrayD::zeros(field.raw_dim());
    }
    let mut planner = FftPlanner::<f64>::new();
    for axis in 0..spectrum.ndim() {
        let n = spectrum.shape()[axis];
        if n < 2 {
            continue;
        }
        let fft = planner.plan_fft_forward(n);
        let mut buf = vec![Complex::new(0.0, 0.0); n];
        for mut lane in spectrum.lanes_mut(Axis(axis)) {
            for (b, v) in buf.iter_mut().zip(lane.iter()) {
                *b = *v;
            }
            fft.process(&mut buf);
            for (v, b) in lane.iter_mut().zip(buf.iter()) {
                *v = *b;
            }
        }
    }
    spectrum.mapv(|c| c.norm_sqr())
}

fn signed_frequency(k: usize, n: usize) -> f64 {
    if k <= n / 2 {
        k as f64
    } else {
        k as f64 - n as f64
    }
}

/// Power spectrum reduced to energy, dominant frequency and bound.
pub fn analyze(field: &ArrayD<f64>) -> SpectrumSummary {
    let shape = field.shape().to_vec();
    let nyquist_bound = shape
        .iter()
        .map(|&n| (n as f64 / 2.0).powi(2))
        .sum::<f64>()
        .sqrt();
    if field.is_empty() {
        return SpectrumSummary {
            spectral_energy: 0.0,
            dominant_frequency: 0.0,
            nyquist_bound,
        };
    }

    let power = power_spectrum(field);
    let n_total = power.len() as f64;
    let spectral_energy = power.sum() / n_total;

    let mut best: Option<(IxDyn, f64)> = None;
    for (idx, &p) in power.indexed_iter() {
        match &best {
            Some((_, bp)) if p <= *bp => {}
            _ => best = Some((idx, p)),
        }
    }
    let dominant_frequency = best
        .map(|(idx, _)| {
            idx.slice()
                .iter()
                .zip(shape.iter())
                .map(|(&k, &n)| signed_frequency(k, n).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .unwrap_or(0.0);

    SpectrumSummary {
        spectral_energy,
        dominant_frequency,
        nyquist_bound,
    }
}
