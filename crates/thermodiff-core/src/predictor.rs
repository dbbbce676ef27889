// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Noise Prediction Interface
// ─────────────────────────────────────────────────────────────────────
//! Injected noise-prediction capability.
//!
//! The network that predicts ε from (x_t, t) lives outside this crate.
//! Anything implementing [`NoisePredictor`] can drive the reverse
//! process: a compiled model, a remote service, or a Python callable
//! through the FFI layer.

use std::fmt;

use ndarray::ArrayD;

use thermodiff_types::{ThermodiffError, ThermodiffResult};

/// Predicts the noise ε contained in `xt` at timestep `t`.
///
/// The returned array must have the same shape as `xt`.
pub trait NoisePredictor: Send + Sync {
    fn predict(&self, xt: &ArrayD<f64>, t: usize) -> ThermodiffResult<ArrayD<f64>>;
}

/// Always predicts zero noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroPredictor;

impl NoisePredictor for ZeroPredictor {
    fn predict(&self, xt: &ArrayD<f64>, _t: usize) -> ThermodiffResult<ArrayD<f64>> {
        Ok(ArrayD::zeros(xt.raw_dim()))
    }
}

type PredictFn = Box<dyn Fn(&ArrayD<f64>, usize) -> ThermodiffResult<ArrayD<f64>> + Send + Sync>;

/// Predictor backed by a caller-supplied closure.
pub struct ExternalPredictor {
    predict_fn: PredictFn,
}

impl ExternalPredictor {
    pub fn new(
        predict_fn: impl Fn(&ArrayD<f64>, usize) -> ThermodiffResult<ArrayD<f64>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            predict_fn: Box::new(predict_fn),
        }
    }
}

impl fmt::Debug for ExternalPredictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalPredictor").finish_non_exhaustive()
    }
}

impl NoisePredictor for ExternalPredictor {
    fn predict(&self, xt: &ArrayD<f64>, t: usize) -> ThermodiffResult<ArrayD<f64>> {
        let eps = (self.predict_fn)(xt, t)?;
        if eps.shape() != xt.shape() {
            return Err(ThermodiffError::ShapeMismatch {
                expected: xt.shape().to_vec(),
                got: eps.shape().to_vec(),
            });
        }
        Ok(eps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_zero_predictor() {
        let x = ArrayD::from_elem(IxDyn(&[2, 3, 3]), 4.0);
        let eps = ZeroPredictor.predict(&x, 10).unwrap();
        assert_eq!(eps.shape(), x.shape());
        assert!(eps.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_external_predictor_passes_timestep() {
        let p = ExternalPredictor::new(|x, t| Ok(x.mapv(|_| t as f64)));
        let x = ArrayD::<f64>::zeros(IxDyn(&[3, 3]));
        let eps = p.predict(&x, 7).unwrap();
        assert!(eps.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_external_predictor_shape_checked() {
        let p = ExternalPredictor::new(|_, _| Ok(ArrayD::zeros(IxDyn(&[2, 2]))));
        let x = ArrayD::<f64>::zeros(IxDyn(&[3, 3]));
        assert!(matches!(
            p.predict(&x, 0),
            Err(ThermodiffError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_external_predictor_error_propagates() {
        let p = ExternalPredictor::new(|_, _| Err(ThermodiffError::Numerical("boom".into())));
        let x = ArrayD::<f64>::zeros(IxDyn(&[3, 3]));
        assert_eq!(p.predict(&x, 0), Err(ThermodiffError::Numerical("boom".into())));
    }
}
