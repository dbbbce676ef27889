// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Kernel PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// PyO3 proc macros expand to unsafe blocks, so this crate cannot carry
// #![deny(unsafe_code)]. Hand-written code here is safe.
//! Python-callable wrappers around the thermodiff kernel.
//!
//! Arrays cross the boundary as a flat row-major `list[float]` plus a
//! `shape: list[int]`. Structured results come back as dicts.
//!
//! # FFI Safety
//!
//! - GIL acquired via `Python::with_gil` before every Python callback.
//! - A failing Python predictor surfaces as `ValueError`, never a panic.
//! - No borrowed references escape the GIL lock scope.
//! - All configs validated before storage.
//!
//! Usage from Python:
//! ```python
//! from thermodiff_kernel import DiffusionConfig, DiffusionModel, Sampler
//!
//! cfg = DiffusionConfig(timesteps=100, schedule_type="cosine", seed=7)
//! model = DiffusionModel(cfg, [8, 8])
//! trace = Sampler("ddim", num_steps=20).sample(model)
//! ```

use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use serde::Serialize;

use thermodiff_core::{DiffusionModel, ExternalPredictor, NoisePredictor, Sampler};
use thermodiff_energy::{EnergyField, EnergyState};
use thermodiff_observers::{BoltzmannMetrics, EntropyValidator};
use thermodiff_types::{
    DiffusionConfig, SamplerConfig, ThermodiffError, ThermodiffResult, ValidatorConfig,
};

// ─── Conversions ────────────────────────────────────────────────────

fn to_py_err(e: ThermodiffError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn array_from_flat(data: Vec<f64>, shape: &[usize]) -> PyResult<ArrayD<f64>> {
    let len = data.len();
    ArrayD::from_shape_vec(IxDyn(shape), data).map_err(|_| {
        PyValueError::new_err(format!(
            "{len} values do not fill an array of shape {shape:?}"
        ))
    })
}

fn flatten(array: &ArrayD<f64>) -> Vec<f64> {
    array.iter().copied().collect()
}

/// Any serialisable result as a plain Python object (dict / list / float).
fn to_py_object<'py, T: Serialize>(py: Python<'py>, value: &T) -> PyResult<Bound<'py, PyAny>> {
    let json = serde_json::to_string(value).map_err(|e| PyValueError::new_err(e.to_string()))?;
    py.import("json")?.call_method1("loads", (json,))
}

/// Wrap `Callable[[list[float], list[int], int], list[float]]` as a predictor.
fn python_predictor(callback: PyObject) -> ExternalPredictor {
    ExternalPredictor::new(move |xt: &ArrayD<f64>, t: usize| -> ThermodiffResult<ArrayD<f64>> {
        let data = flatten(xt);
        let shape = xt.shape().to_vec();
        let eps: Vec<f64> = Python::with_gil(|py| {
            callback
                .call1(py, (data, shape, t))
                .and_then(|out| out.extract::<Vec<f64>>(py))
        })
        .map_err(|e| ThermodiffError::Validation(format!("Python predictor failed: {e}")))?;
        let got = vec![eps.len()];
        ArrayD::from_shape_vec(xt.raw_dim(), eps).map_err(|_| ThermodiffError::ShapeMismatch {
            expected: xt.shape().to_vec(),
            got,
        })
    })
}

// ─── PyDiffusionConfig ──────────────────────────────────────────────

/// Python-visible diffusion configuration.
#[pyclass(name = "DiffusionConfig")]
#[derive(Clone)]
struct PyDiffusionConfig {
    inner: DiffusionConfig,
}

#[pymethods]
impl PyDiffusionConfig {
    #[new]
    #[pyo3(signature = (
        timesteps = 1000,
        beta_start = 1e-4,
        beta_end = 0.02,
        schedule_type = "linear",
        cosine_offset = 0.008,
        boltzmann_kernel = "exponential",
        schedule_temperature = 1.0,
        adaptation_rate = 0.1,
        energy_guidance_scale = 0.1,
        temperature = 1.0,
        energy_tolerance = 0.01,
        clip_denoised = true,
        seed = None,
        backend = "cpu",
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        timesteps: usize,
        beta_start: f64,
        beta_end: f64,
        schedule_type: &str,
        cosine_offset: f64,
        boltzmann_kernel: &str,
        schedule_temperature: f64,
        adaptation_rate: f64,
        energy_guidance_scale: f64,
        temperature: f64,
        energy_tolerance: f64,
        clip_denoised: bool,
        seed: Option<u64>,
        backend: &str,
    ) -> PyResult<Self> {
        let config = DiffusionConfig {
            timesteps,
            beta_start,
            beta_end,
            schedule_type: schedule_type.parse().map_err(to_py_err)?,
            cosine_offset,
            boltzmann_kernel: boltzmann_kernel.parse().map_err(to_py_err)?,
            schedule_temperature,
            adaptation_rate,
            energy_guidance_scale,
            temperature,
            energy_tolerance,
            clip_denoised,
            seed,
            backend: backend.parse().map_err(to_py_err)?,
        };
        config.validate().map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    /// Construct from JSON string.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = DiffusionConfig::from_json_validated(json).map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    fn to_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner).map_err(|e| PyValueError::new_err(e.to_string()))
    }

    #[getter]
    fn timesteps(&self) -> usize {
        self.inner.timesteps
    }

    #[getter]
    fn schedule_type(&self) -> String {
        self.inner.schedule_type.to_string()
    }

    #[getter]
    fn seed(&self) -> Option<u64> {
        self.inner.seed
    }

    fn __repr__(&self) -> String {
        format!(
            "DiffusionConfig(timesteps={}, schedule_type='{}', guidance={}, temperature={})",
            self.inner.timesteps,
            self.inner.schedule_type,
            self.inner.energy_guidance_scale,
            self.inner.temperature
        )
    }
}

// ─── PyEnergyField ──────────────────────────────────────────────────

/// Energy field over a fixed shape.
#[pyclass(name = "EnergyField")]
struct PyEnergyField {
    inner: EnergyField,
}

impl PyEnergyField {
    fn array(&self, data: Vec<f64>) -> PyResult<ArrayD<f64>> {
        array_from_flat(data, self.inner.shape())
    }

    fn state(&self, data: Vec<f64>) -> PyResult<EnergyState> {
        self.inner.make_state(self.array(data)?).map_err(to_py_err)
    }
}

#[pymethods]
impl PyEnergyField {
    #[new]
    #[pyo3(signature = (shape, temperature = 1.0, energy_tolerance = 0.01))]
    fn new(shape: Vec<usize>, temperature: f64, energy_tolerance: f64) -> PyResult<Self> {
        let inner = EnergyField::new(&shape, temperature, energy_tolerance).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn shape(&self) -> Vec<usize> {
        self.inner.shape().to_vec()
    }

    #[getter]
    fn temperature(&self) -> f64 {
        self.inner.temperature()
    }

    /// ∇E of a flat field, returned flat.
    fn compute_energy_gradient(&self, data: Vec<f64>) -> PyResult<Vec<f64>> {
        let field = self.array(data)?;
        let grad = self.inner.compute_energy_gradient(&field).map_err(to_py_err)?;
        Ok(flatten(&grad))
    }

    fn compute_entropy(&self, data: Vec<f64>) -> PyResult<f64> {
        Ok(self.inner.compute_entropy(&self.array(data)?))
    }

    fn boltzmann_weight(&self, data: Vec<f64>) -> PyResult<Vec<f64>> {
        let field = self.array(data)?;
        let weights = self.inner.boltzmann_weight(&field).map_err(to_py_err)?;
        Ok(flatten(&weights))
    }

    fn total_energy(&self, data: Vec<f64>) -> PyResult<f64> {
        Ok(self.inner.total_energy(&self.array(data)?))
    }

    fn reset_state(&mut self, data: Vec<f64>) -> PyResult<()> {
        let map = self.array(data)?;
        self.inner.reset_state(map).map_err(to_py_err)?;
        Ok(())
    }

    /// Replace the current state and report the transition.
    fn update_state<'py>(&mut self, py: Python<'py>, data: Vec<f64>) -> PyResult<Bound<'py, PyDict>> {
        let map = self.array(data)?;
        let transition = self.inner.update_state(map).map_err(to_py_err)?;
        let dict = PyDict::new(py);
        dict.set_item("step", transition.state.metadata().step)?;
        dict.set_item("energy", transition.state.energy())?;
        dict.set_item("entropy", transition.state.entropy())?;
        dict.set_item("drift", transition.drift)?;
        dict.set_item("entropy_change", transition.entropy_change)?;
        dict.set_item("violations", to_py_object(py, &transition.violations)?)?;
        Ok(dict)
    }

    fn validate_conservation<'py>(
        &self,
        py: Python<'py>,
        initial: Vec<f64>,
        final_: Vec<f64>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let report = self
            .inner
            .validate_conservation(&self.state(initial)?, &self.state(final_)?);
        to_py_object(py, &report)
    }

    /// Current state map, flat.
    fn current_state(&self) -> Vec<f64> {
        flatten(self.inner.current_state().energy_map())
    }
}

// ─── PyDiffusionModel ───────────────────────────────────────────────

/// Energy-constrained diffusion model.
///
/// Args:
///     config: DiffusionConfig.
///     shape: Field shape (rank 2 or 3).
///     predictor: Optional Callable[[list[float], list[int], int], list[float]]
///                returning ε̂ for (x_t, shape, t).
#[pyclass(name = "DiffusionModel")]
struct PyDiffusionModel {
    inner: DiffusionModel,
}

#[pymethods]
impl PyDiffusionModel {
    #[new]
    #[pyo3(signature = (config, shape, predictor = None))]
    fn new(config: PyDiffusionConfig, shape: Vec<usize>, predictor: Option<PyObject>) -> PyResult<Self> {
        let mut inner = DiffusionModel::new(config.inner, &shape).map_err(to_py_err)?;
        if let Some(cb) = predictor {
            let predictor: Arc<dyn NoisePredictor> = Arc::new(python_predictor(cb));
            inner = inner.with_predictor(predictor);
        }
        Ok(Self { inner })
    }

    #[getter]
    fn shape(&self) -> Vec<usize> {
        self.inner.energy_field().shape().to_vec()
    }

    #[getter]
    fn timesteps(&self) -> usize {
        self.inner.timesteps()
    }

    fn betas(&self) -> Vec<f64> {
        self.inner.schedule().betas().to_vec()
    }

    /// Returns: tuple(x_t: list[float], metrics: dict)
    #[pyo3(signature = (x0, steps = None))]
    fn diffuse<'py>(
        &mut self,
        py: Python<'py>,
        x0: Vec<f64>,
        steps: Option<usize>,
    ) -> PyResult<(Vec<f64>, Bound<'py, PyAny>)> {
        let x0 = array_from_flat(x0, &self.shape())?;
        let (xt, metrics) = self.inner.diffuse(&x0, steps).map_err(to_py_err)?;
        Ok((flatten(&xt), to_py_object(py, &metrics)?))
    }

    /// Returns: tuple(x_0: list[float], metrics: dict)
    #[pyo3(signature = (xt, steps = None, use_guidance = true))]
    fn denoise<'py>(
        &mut self,
        py: Python<'py>,
        xt: Vec<f64>,
        steps: Option<usize>,
        use_guidance: bool,
    ) -> PyResult<(Vec<f64>, Bound<'py, PyAny>)> {
        let xt = array_from_flat(xt, &self.shape())?;
        let (x0, metrics) = self.inner.denoise(&xt, steps, use_guidance).map_err(to_py_err)?;
        Ok((flatten(&x0), to_py_object(py, &metrics)?))
    }

    #[pyo3(signature = (steps = None))]
    fn sample(&mut self, steps: Option<usize>) -> PyResult<Vec<f64>> {
        let shape = self.shape();
        let x = self.inner.sample(&shape, steps).map_err(to_py_err)?;
        Ok(flatten(&x))
    }

    fn training_loss(&mut self, x0: Vec<f64>, t: usize) -> PyResult<f64> {
        let x0 = array_from_flat(x0, &self.shape())?;
        self.inner.training_loss(&x0, t).map_err(to_py_err)
    }

    fn adapt_schedule<'py>(
        &mut self,
        py: Python<'py>,
        variance: f64,
        step: usize,
    ) -> PyResult<Bound<'py, PyDict>> {
        let event = self.inner.adapt_schedule(variance, step).map_err(to_py_err)?;
        let dict = PyDict::new(py);
        dict.set_item("step", event.step)?;
        dict.set_item("variance", event.variance)?;
        dict.set_item("old_beta", event.old_beta)?;
        dict.set_item("target", event.target)?;
        dict.set_item("new_beta", event.new_beta)?;
        Ok(dict)
    }

    fn __repr__(&self) -> String {
        format!(
            "DiffusionModel(schedule='{}', timesteps={}, shape={:?})",
            self.inner.config().schedule_type,
            self.inner.timesteps(),
            self.inner.energy_field().shape()
        )
    }
}

// ─── PySampler ──────────────────────────────────────────────────────

/// Reverse-chain sampler: "ddpm", "ddim", "energy_guided" or "ancestral".
#[pyclass(name = "Sampler")]
struct PySampler {
    inner: Sampler,
}

#[pymethods]
impl PySampler {
    /// Parameters left as `None` keep the named sampler's defaults.
    #[new]
    #[pyo3(signature = (
        kind = "ddim",
        num_steps = None,
        eta = None,
        num_proposals = None,
        exploration_scale = None,
        seed = None,
        record_states = false,
    ))]
    fn new(
        kind: &str,
        num_steps: Option<usize>,
        eta: Option<f64>,
        num_proposals: Option<usize>,
        exploration_scale: Option<f64>,
        seed: Option<u64>,
        record_states: bool,
    ) -> PyResult<Self> {
        let config = kind
            .parse::<SamplerConfig>()
            .map_err(to_py_err)?
            .with_overrides(num_steps, eta, num_proposals, exploration_scale);
        Ok(Self {
            inner: Sampler::new(config, seed).recording_states(record_states),
        })
    }

    #[staticmethod]
    #[pyo3(signature = (json, seed = None, record_states = false))]
    fn from_json(json: &str, seed: Option<u64>, record_states: bool) -> PyResult<Self> {
        let config = SamplerConfig::from_json(json).map_err(to_py_err)?;
        Ok(Self {
            inner: Sampler::new(config, seed).recording_states(record_states),
        })
    }

    #[getter]
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Run the chain on `model`, from `x_t` or fresh noise.
    ///
    /// Returns: dict(sample, shape, timesteps, selections, states)
    #[pyo3(signature = (model, x_t = None, use_guidance = true))]
    fn sample<'py>(
        &mut self,
        py: Python<'py>,
        model: PyRef<'_, PyDiffusionModel>,
        x_t: Option<Vec<f64>>,
        use_guidance: bool,
    ) -> PyResult<Bound<'py, PyDict>> {
        let shape = model.shape();
        let reverse = model.inner.reverse();
        let field = use_guidance.then(|| model.inner.energy_field());
        let trace = match x_t {
            Some(data) => {
                let x_t = array_from_flat(data, &shape)?;
                self.inner.sample(reverse, field, x_t)
            }
            None => self.inner.sample_from_noise(reverse, field, &shape),
        }
        .map_err(to_py_err)?;

        let states: Vec<Vec<f64>> = trace.states.iter().map(|s| flatten(s.energy_map())).collect();
        let dict = PyDict::new(py);
        dict.set_item("sample", flatten(&trace.sample))?;
        dict.set_item("shape", shape)?;
        dict.set_item("timesteps", trace.timesteps)?;
        dict.set_item("selections", trace.selections)?;
        dict.set_item("states", states)?;
        Ok(dict)
    }

    fn __repr__(&self) -> String {
        format!("Sampler(kind='{}')", self.inner.name())
    }
}

// ─── PyEntropyValidator ─────────────────────────────────────────────

/// Thermodynamic audit of state transitions.
#[pyclass(name = "EntropyValidator")]
struct PyEntropyValidator {
    inner: EntropyValidator,
}

#[pymethods]
impl PyEntropyValidator {
    #[new]
    #[pyo3(signature = (
        energy_tolerance = 0.01,
        entropy_tolerance = 1e-6,
        spectral_threshold = 0.8,
        w_fidelity = 0.4,
        w_entropy = 0.3,
        w_spectral = 0.3,
    ))]
    fn new(
        energy_tolerance: f64,
        entropy_tolerance: f64,
        spectral_threshold: f64,
        w_fidelity: f64,
        w_entropy: f64,
        w_spectral: f64,
    ) -> PyResult<Self> {
        let config = ValidatorConfig {
            energy_tolerance,
            entropy_tolerance,
            spectral_threshold,
            w_fidelity,
            w_entropy,
            w_spectral,
        };
        let inner = EntropyValidator::new(config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[pyo3(signature = (initial, final_, shape, temperature = 1.0))]
    fn validate_transition<'py>(
        &self,
        py: Python<'py>,
        initial: Vec<f64>,
        final_: Vec<f64>,
        shape: Vec<usize>,
        temperature: f64,
    ) -> PyResult<Bound<'py, PyAny>> {
        let a = EnergyState::from_raw_array(array_from_flat(initial, &shape)?, temperature)
            .map_err(to_py_err)?;
        let b = EnergyState::from_raw_array(array_from_flat(final_, &shape)?, temperature)
            .map_err(to_py_err)?;
        to_py_object(py, &self.inner.validate_transition(&a, &b))
    }

    #[pyo3(signature = (states, shape, temperature = 1.0))]
    fn validate_trajectory<'py>(
        &self,
        py: Python<'py>,
        states: Vec<Vec<f64>>,
        shape: Vec<usize>,
        temperature: f64,
    ) -> PyResult<Bound<'py, PyAny>> {
        let states = states
            .into_iter()
            .map(|data| {
                EnergyState::from_raw_array(array_from_flat(data, &shape)?, temperature)
                    .map_err(to_py_err)
            })
            .collect::<PyResult<Vec<_>>>()?;
        to_py_object(py, &self.inner.validate_trajectory(&states))
    }
}

// ─── PyBoltzmannMetrics ─────────────────────────────────────────────

/// Canonical-ensemble metrics at a fixed temperature.
#[pyclass(name = "BoltzmannMetrics")]
struct PyBoltzmannMetrics {
    inner: BoltzmannMetrics,
}

#[pymethods]
impl PyBoltzmannMetrics {
    #[new]
    #[pyo3(signature = (temperature = 1.0))]
    fn new(temperature: f64) -> PyResult<Self> {
        let inner = BoltzmannMetrics::new(temperature).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn boltzmann_weight(&self, energies: Vec<f64>) -> PyResult<Vec<f64>> {
        self.inner.boltzmann_weight(&energies).map_err(to_py_err)
    }

    fn free_energy(&self, energies: Vec<f64>) -> PyResult<f64> {
        self.inner.free_energy(&energies).map_err(to_py_err)
    }

    fn expected_energy(&self, energies: Vec<f64>) -> PyResult<f64> {
        self.inner.expected_energy(&energies).map_err(to_py_err)
    }

    #[staticmethod]
    fn entropy_from_distribution(p: Vec<f64>) -> f64 {
        BoltzmannMetrics::entropy_from_distribution(&p)
    }

    fn summarize<'py>(&self, py: Python<'py>, energies: Vec<f64>) -> PyResult<Bound<'py, PyAny>> {
        let summary = self.inner.summarize(&energies).map_err(to_py_err)?;
        to_py_object(py, &summary)
    }
}

// ─── Module Registration ────────────────────────────────────────────

/// Thermodiff Kernel: energy-constrained diffusion for Director-Class AI.
///
/// - `DiffusionConfig`: configuration
/// - `EnergyField`: gradients, entropy, Boltzmann weights, state updates
/// - `DiffusionModel`: diffuse / denoise / sample / training_loss
/// - `Sampler`: ddpm, ddim, energy_guided, ancestral chains
/// - `EntropyValidator`, `BoltzmannMetrics`: thermodynamic observers
#[pymodule]
fn thermodiff_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyDiffusionConfig>()?;
    m.add_class::<PyEnergyField>()?;
    m.add_class::<PyDiffusionModel>()?;
    m.add_class::<PySampler>()?;
    // Observers
    m.add_class::<PyEntropyValidator>()?;
    m.add_class::<PyBoltzmannMetrics>()?;
    Ok(())
}
