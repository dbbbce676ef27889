// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Field Operators
// ─────────────────────────────────────────────────────────────────────
//! Pure operators on energy maps:
//!
//!   |∇E|   = sqrt(gx² + gy² + ε)       (3×3 Sobel pair, zero padding)
//!   S(E)   = -Σ p log(p + ε),  p = (|E| + ε) / Σ(|E| + ε)
//!   w(E)   = exp(-E / k_B T) / Z,  k_B = 1
//!
//! The gradient runs over the last two axes; any leading axis is a batch.

use ndarray::{ArrayD, ArrayView2, ArrayViewD, ArrayViewMut2, Axis, Ix2, Zip};

use thermodiff_types::{Backend, ThermodiffError, ThermodiffResult};

use crate::backend;

/// Guard added before square roots and logarithms.
pub const EPS: f64 = 1e-8;

/// Entropy decrease tolerated before it counts as a violation.
pub const ENTROPY_TOLERANCE: f64 = 1e-6;

/// Horizontal Sobel kernel.
const SOBEL_X: [[f64; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
/// Vertical Sobel kernel.
const SOBEL_Y: [[f64; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Energy maps are rank 2 (H, W) or rank 3 (B, H, W).
pub fn check_rank(shape: &[usize]) -> ThermodiffResult<()> {
    match shape.len() {
        2 | 3 => Ok(()),
        rank => Err(ThermodiffError::InvalidRank { rank }),
    }
}

/// Reject NaN/Inf before they propagate through a trajectory.
pub fn check_finite(field: &ArrayViewD<'_, f64>, what: &str) -> ThermodiffResult<()> {
    if field.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ThermodiffError::Numerical(format!(
            "{what} contains NaN or Inf"
        )))
    }
}

/// Plain energy Σ E over every element.
pub fn field_energy(field: &ArrayViewD<'_, f64>) -> f64 {
    field.sum()
}

/// Cross-correlate one 2-D slice with a 3×3 kernel, zero padding.
fn correlate3x3(src: &ArrayView2<'_, f64>, kernel: &[[f64; 3]; 3], mut dst: ArrayViewMut2<'_, f64>) {
    let (h, w) = src.dim();
    for i in 0..h {
        for j in 0..w {
            let mut acc = 0.0;
            for (ki, row) in kernel.iter().enumerate() {
                let ii = i as isize + ki as isize - 1;
                if ii < 0 || ii >= h as isize {
                    continue;
                }
                for (kj, &k) in row.iter().enumerate() {
                    if k == 0.0 {
                        continue;
                    }
                    let jj = j as isize + kj as isize - 1;
                    if jj < 0 || jj >= w as isize {
                        continue;
                    }
                    acc += k * src[[ii as usize, jj as usize]];
                }
            }
            dst[[i, j]] = acc;
        }
    }
}

/// Gradient magnitude |∇E| via the Sobel pair, same shape as the input.
///
/// Deterministic; ε keeps the magnitude away from exactly zero.
pub fn energy_gradient(field: &ArrayViewD<'_, f64>, backend: Backend) -> ThermodiffResult<ArrayD<f64>> {
    check_rank(field.shape())?;

    let mut gx = ArrayD::<f64>::zeros(field.raw_dim());
    let mut gy = ArrayD::<f64>::zeros(field.raw_dim());

    if field.ndim() == 2 {
        let src = field.view().into_dimensionality::<Ix2>().map_err(shape_err)?;
        let gx2 = gx.view_mut().into_dimensionality::<Ix2>().map_err(shape_err)?;
        let gy2 = gy.view_mut().into_dimensionality::<Ix2>().map_err(shape_err)?;
        correlate3x3(&src, &SOBEL_X, gx2);
        correlate3x3(&src, &SOBEL_Y, gy2);
    } else {
        for ((src, gx_b), gy_b) in field
            .axis_iter(Axis(0))
            .zip(gx.axis_iter_mut(Axis(0)))
            .zip(gy.axis_iter_mut(Axis(0)))
        {
            let src = src.into_dimensionality::<Ix2>().map_err(shape_err)?;
            let gx_b = gx_b.into_dimensionality::<Ix2>().map_err(shape_err)?;
            let gy_b = gy_b.into_dimensionality::<Ix2>().map_err(shape_err)?;
            correlate3x3(&src, &SOBEL_X, gx_b);
            correlate3x3(&src, &SOBEL_Y, gy_b);
        }
    }

    // gx becomes gx² + gy², then the magnitude
    Zip::from(&mut gx).and(&gy).for_each(|a, &b| *a = *a * *a + b * b);
    backend::map_inplace(backend, &mut gx, |v| (v + EPS).sqrt());
    Ok(gx)
}

fn shape_err(e: ndarray::ShapeError) -> ThermodiffError {
    ThermodiffError::Validation(format!("slice reshape failed: {e}"))
}

/// Shannon entropy of the magnitude distribution of a field.
///
/// Always ≥ 0 for non-empty input; 0.0 for an empty field.
pub fn shannon_entropy(field: &ArrayViewD<'_, f64>) -> f64 {
    if field.is_empty() {
        return 0.0;
    }
    let total: f64 = field.iter().map(|v| v.abs() + EPS).sum();
    let mut h = 0.0;
    for v in field.iter() {
        let p = (v.abs() + EPS) / total;
        h -= p * (p + EPS).ln();
    }
    h.max(0.0)
}

/// Normalised Boltzmann weights `exp(-E/T) / Z` over a flat slice.
///
/// The minimum energy is subtracted first so the largest weight is
/// exp(0) = 1 and nothing overflows.
pub fn boltzmann_distribution(energies: &[f64], temperature: f64) -> ThermodiffResult<Vec<f64>> {
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(ThermodiffError::InvalidTemperature(temperature));
    }
    if energies.is_empty() {
        return Ok(Vec::new());
    }
    if energies.iter().any(|e| !e.is_finite()) {
        return Err(ThermodiffError::Numerical(
            "energies contain NaN or Inf".to_string(),
        ));
    }
    let e_min = energies.iter().copied().fold(f64::INFINITY, f64::min);
    let mut w: Vec<f64> = energies
        .iter()
        .map(|&e| (-(e - e_min) / temperature).exp())
        .collect();
    let z: f64 = w.iter().sum();
    for v in w.iter_mut() {
        *v /= z;
    }
    Ok(w)
}

/// Field-shaped Boltzmann weights summing to 1.
pub fn boltzmann_field(
    field: &ArrayViewD<'_, f64>,
    temperature: f64,
    backend: Backend,
) -> ThermodiffResult<ArrayD<f64>> {
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(ThermodiffError::InvalidTemperature(temperature));
    }
    check_finite(field, "energy map")?;
    let mut w = field.to_owned();
    if w.is_empty() {
        return Ok(w);
    }
    let e_min = w.iter().copied().fold(f64::INFINITY, f64::min);
    backend::map_inplace(backend, &mut w, move |e| (-(e - e_min) / temperature).exp());
    let z = w.sum();
    w.mapv_inplace(|v| v / z);
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3, IxDyn};

    fn ramp(h: usize, w: usize) -> ArrayD<f64> {
        Array2::from_shape_fn((h, w), |(_, j)| j as f64).into_dyn()
    }

    #[test]
    fn test_rank_check() {
        assert!(check_rank(&[4, 4]).is_ok());
        assert!(check_rank(&[2, 4, 4]).is_ok());
        assert_eq!(check_rank(&[16]), Err(ThermodiffError::InvalidRank { rank: 1 }));
        assert_eq!(
            check_rank(&[1, 2, 4, 4]),
            Err(ThermodiffError::InvalidRank { rank: 4 })
        );
    }

    #[test]
    fn test_gradient_constant_field_is_sqrt_eps_inside() {
        let f = ArrayD::from_elem(IxDyn(&[5, 5]), 3.0);
        let g = energy_gradient(&f.view(), Backend::Cpu).unwrap();
        // Interior pixels see no change in either direction
        assert!((g[[2, 2]] - EPS.sqrt()).abs() < 1e-12, "g = {}", g[[2, 2]]);
        // Zero padding creates an edge response on the border
        assert!(g[[0, 2]] > 1.0);
    }

    #[test]
    fn test_gradient_horizontal_ramp() {
        // Unit slope along columns: Sobel gx = 8 inside, gy = 0
        let f = ramp(6, 6);
        let g = energy_gradient(&f.view(), Backend::Cpu).unwrap();
        for i in 1..5 {
            for j in 1..5 {
                assert!((g[[i, j]] - 8.0).abs() < 1e-6, "g[{i},{j}] = {}", g[[i, j]]);
            }
        }
    }

    #[test]
    fn test_gradient_batched_matches_per_slice() {
        let a = ramp(4, 5);
        let b = a.mapv(|v| -2.0 * v);
        let mut batch = Array3::<f64>::zeros((2, 4, 5));
        batch.index_axis_mut(Axis(0), 0).assign(&a.view().into_dimensionality::<Ix2>().unwrap());
        batch.index_axis_mut(Axis(0), 1).assign(&b.view().into_dimensionality::<Ix2>().unwrap());
        let batch = batch.into_dyn();

        let g_batch = energy_gradient(&batch.view(), Backend::Cpu).unwrap();
        let g_a = energy_gradient(&a.view(), Backend::Cpu).unwrap();
        let g_b = energy_gradient(&b.view(), Backend::Cpu).unwrap();
        assert_eq!(g_batch.shape(), &[2, 4, 5]);
        for i in 0..4 {
            for j in 0..5 {
                assert!((g_batch[[0, i, j]] - g_a[[i, j]]).abs() < 1e-12);
                assert!((g_batch[[1, i, j]] - g_b[[i, j]]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_gradient_rejects_rank_one() {
        let f = ArrayD::<f64>::zeros(IxDyn(&[8]));
        assert!(energy_gradient(&f.view(), Backend::Cpu).is_err());
    }

    #[test]
    fn test_entropy_uniform_is_log_n() {
        let f = ArrayD::from_elem(IxDyn(&[4, 4]), 1.0);
        let h = shannon_entropy(&f.view());
        assert!((h - (16.0f64).ln()).abs() < 1e-6, "H = {h}");
    }

    #[test]
    fn test_entropy_non_negative() {
        let f = Array2::from_shape_fn((8, 8), |(i, j)| ((i * 8 + j) as f64 * 0.37).sin() * 5.0)
            .into_dyn();
        assert!(shannon_entropy(&f.view()) >= 0.0);
        // A single spike concentrates the mass: entropy near zero but not negative
        let mut spike = ArrayD::<f64>::zeros(IxDyn(&[8, 8]));
        spike[[3, 3]] = 1e6;
        let h = shannon_entropy(&spike.view());
        assert!(h >= 0.0 && h < 1e-3, "H = {h}");
    }

    #[test]
    fn test_entropy_empty_is_zero() {
        let f = ArrayD::<f64>::zeros(IxDyn(&[0, 4]));
        assert_eq!(shannon_entropy(&f.view()), 0.0);
    }

    #[test]
    fn test_boltzmann_distribution_normalised() {
        let w = boltzmann_distribution(&[1.0, 2.0, 3.0, -50.0, 700.0], 0.5).unwrap();
        let sum: f64 = w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "Σw = {sum}");
        // Lowest energy carries the highest weight
        assert!(w[3] > w[0] && w[0] > w[1] && w[1] > w[2]);
    }

    #[test]
    fn test_boltzmann_distribution_rejects_bad_input() {
        assert!(boltzmann_distribution(&[1.0], 0.0).is_err());
        assert!(boltzmann_distribution(&[f64::NAN, 1.0], 1.0).is_err());
        assert!(boltzmann_distribution(&[], 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_boltzmann_field_sums_to_one() {
        let f = Array2::from_shape_fn((6, 7), |(i, j)| (i as f64 - j as f64) * 40.0).into_dyn();
        let w = boltzmann_field(&f.view(), 1.0, Backend::Cpu).unwrap();
        assert_eq!(w.shape(), f.shape());
        assert!((w.sum() - 1.0).abs() < 1e-6);
        assert!(w.iter().all(|v| v.is_finite() && *v >= 0.0));
    }
}
