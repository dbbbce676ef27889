// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Element-wise Backend
// ─────────────────────────────────────────────────────────────────────
//! Dispatch for element-wise maps inside one step. Algorithms never
//! branch on the backend themselves; they call through here.

use ndarray::ArrayD;

use thermodiff_types::{Backend, ThermodiffResult};

/// Fail early if a backend was requested that this build cannot run.
pub fn ensure_available(backend: Backend) -> ThermodiffResult<()> {
    match backend {
        Backend::Cpu => Ok(()),
        #[cfg(feature = "rayon")]
        Backend::Rayon => Ok(()),
        #[cfg(not(feature = "rayon"))]
        Backend::Rayon => Err(thermodiff_types::ThermodiffError::Config(
            "backend 'rayon' requires the `rayon` cargo feature".to_string(),
        )),
    }
}

/// Apply `f` to every element in place.
#[cfg(feature = "rayon")]
pub fn map_inplace<F>(backend: Backend, arr: &mut ArrayD<f64>, f: F)
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    match backend {
        Backend::Rayon => arr.par_mapv_inplace(f),
        Backend::Cpu => arr.mapv_inplace(f),
    }
}

/// Apply `f` to every element in place.
#[cfg(not(feature = "rayon"))]
pub fn map_inplace<F>(_backend: Backend, arr: &mut ArrayD<f64>, f: F)
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    arr.mapv_inplace(f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_cpu_always_available() {
        assert!(ensure_available(Backend::Cpu).is_ok());
    }

    #[cfg(not(feature = "rayon"))]
    #[test]
    fn test_rayon_needs_feature() {
        assert!(ensure_available(Backend::Rayon).is_err());
    }

    #[test]
    fn test_map_inplace() {
        let mut a = ArrayD::from_elem(IxDyn(&[3, 3]), 2.0);
        map_inplace(Backend::Cpu, &mut a, |v| v * v + 1.0);
        assert!(a.iter().all(|&v| (v - 5.0).abs() < 1e-12));
    }
}
