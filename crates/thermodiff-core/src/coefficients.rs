// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Schedule Coefficients
// ─────────────────────────────────────────────────────────────────────
//! Cached per-timestep coefficients derived from β, plus the one
//! broadcast primitive used to apply per-batch scalars to a field.

use ndarray::{Array1, ArrayD, IxDyn};

use thermodiff_types::{ThermodiffError, ThermodiffResult};

/// Floor applied to the posterior variance before taking its log.
pub const POSTERIOR_VARIANCE_FLOOR: f64 = 1e-20;

/// Read-only coefficient tables of length T.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleCoefficients {
    pub betas: Array1<f64>,
    pub alphas: Array1<f64>,
    /// ᾱ_t = Π_{s ≤ t} α_s
    pub alphas_cumprod: Array1<f64>,
    /// ᾱ_{t-1}, with a leading 1.0
    pub alphas_cumprod_prev: Array1<f64>,
    pub sqrt_alphas: Array1<f64>,
    pub sqrt_betas: Array1<f64>,
    pub sqrt_alphas_cumprod: Array1<f64>,
    pub sqrt_one_minus_alphas_cumprod: Array1<f64>,
    pub sqrt_recip_alphas_cumprod: Array1<f64>,
    pub sqrt_recipm1_alphas_cumprod: Array1<f64>,
    /// β_t (1 − ᾱ_{t-1}) / (1 − ᾱ_t)
    pub posterior_variance: Array1<f64>,
    /// ln(max(posterior_variance, 1e-20))
    pub posterior_log_variance_clipped: Array1<f64>,
    /// β_t √ᾱ_{t-1} / (1 − ᾱ_t)
    pub posterior_mean_coef1: Array1<f64>,
    /// (1 − ᾱ_{t-1}) √α_t / (1 − ᾱ_t)
    pub posterior_mean_coef2: Array1<f64>,
}

impl ScheduleCoefficients {
    pub fn from_betas(betas: &[f64]) -> ThermodiffResult<Self> {
        if betas.is_empty() {
            return Err(ThermodiffError::Config("schedule is empty".to_string()));
        }
        if let Some((t, b)) = betas
            .iter()
            .enumerate()
            .find(|(_, b)| !(b.is_finite() && **b > 0.0 && **b < 1.0))
        {
            return Err(ThermodiffError::Config(format!(
                "beta[{t}] = {b} is outside (0, 1)"
            )));
        }

        let betas = Array1::from_vec(betas.to_vec());
        let alphas = betas.mapv(|b| 1.0 - b);
        let mut acc = 1.0;
        let alphas_cumprod = alphas.mapv(|a| {
            acc *= a;
            acc
        });
        let n = betas.len();
        let mut alphas_cumprod_prev = Array1::<f64>::ones(n);
        alphas_cumprod_prev
            .slice_mut(ndarray::s![1..])
            .assign(&alphas_cumprod.slice(ndarray::s![..n - 1]));

        let one_minus = alphas_cumprod.mapv(|a| 1.0 - a);
        let posterior_variance = &betas * &alphas_cumprod_prev.mapv(|a| 1.0 - a) / &one_minus;
        let posterior_log_variance_clipped =
            posterior_variance.mapv(|v| v.max(POSTERIOR_VARIANCE_FLOOR).ln());
        let posterior_mean_coef1 = &betas * &alphas_cumprod_prev.mapv(f64::sqrt) / &one_minus;
        let posterior_mean_coef2 =
            &alphas_cumprod_prev.mapv(|a| 1.0 - a) * &alphas.mapv(f64::sqrt) / &one_minus;

        Ok(Self {
            sqrt_alphas: alphas.mapv(f64::sqrt),
            sqrt_betas: betas.mapv(f64::sqrt),
            sqrt_alphas_cumprod: alphas_cumprod.mapv(f64::sqrt),
            sqrt_one_minus_alphas_cumprod: one_minus.mapv(f64::sqrt),
            sqrt_recip_alphas_cumprod: alphas_cumprod.mapv(|a| (1.0 / a).sqrt()),
            sqrt_recipm1_alphas_cumprod: alphas_cumprod.mapv(|a| (1.0 / a - 1.0).sqrt()),
            posterior_variance,
            posterior_log_variance_clipped,
            posterior_mean_coef1,
            posterior_mean_coef2,
            betas,
            alphas,
            alphas_cumprod,
            alphas_cumprod_prev,
        })
    }

    pub fn len(&self) -> usize {
        self.betas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.betas.is_empty()
    }

    pub fn check_t(&self, t: usize) -> ThermodiffResult<()> {
        if t >= self.len() {
            return Err(ThermodiffError::TimestepOutOfRange {
                t,
                timesteps: self.len(),
            });
        }
        Ok(())
    }

    /// ᾱ_t, with ᾱ_{-1} = 1 for the step past the start of the chain.
    pub fn alpha_bar(&self, t: Option<usize>) -> f64 {
        match t {
            Some(t) => self.alphas_cumprod[t],
            None => 1.0,
        }
    }
}

/// Gather `table[t_b]` for every batch element and shape the result as
/// `[B, 1, …, 1]` with the rank of `shape`, so it broadcasts over the
/// trailing spatial axes of a `(B, …)` field.
pub fn per_batch_scalars(
    table: &Array1<f64>,
    ts: &[usize],
    shape: &[usize],
) -> ThermodiffResult<ArrayD<f64>> {
    if shape.len() < 2 {
        return Err(ThermodiffError::InvalidRank { rank: shape.len() });
    }
    if shape[0] != ts.len() {
        return Err(ThermodiffError::ShapeMismatch {
            expected: vec![shape[0]],
            got: vec![ts.len()],
        });
    }
    let mut values = Vec::with_capacity(ts.len());
    for &t in ts {
        if t >= table.len() {
            return Err(ThermodiffError::TimestepOutOfRange {
                t,
                timesteps: table.len(),
            });
        }
        values.push(table[t]);
    }
    let mut bshape = vec![1usize; shape.len()];
    bshape[0] = ts.len();
    ArrayD::from_shape_vec(IxDyn(&bshape), values)
        .map_err(|e| ThermodiffError::Validation(format!("broadcast reshape failed: {e}")))
}
