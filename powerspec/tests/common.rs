//! Common fixtures for powerspec integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use powerspec::{
    BoltzmannSolver, CosmologicalParameters, Cosmology, Emulator, MatterPowerMethod, ParameterSet, PowerConfig,
    ReferenceSolver, SolverError, SolverParameters, SolverStage, TransferFunctionMethod,
};

/// Flat ΛCDM used throughout: Ω_c = 0.25, Ω_b = 0.05, h = 0.7, n_s = 0.96, σ8 = 0.8
pub fn standard_parameters() -> ParameterSet {
    ParameterSet::lcdm(0.25, 0.05, 0.7, 0.96, 0.8)
}

pub fn cosmology_from(raw: ParameterSet, config: PowerConfig) -> Cosmology {
    let params = CosmologicalParameters::try_from(raw).expect("valid parameters");
    Cosmology::new(params, config).expect("valid configuration")
}

pub fn standard_cosmology(transfer: TransferFunctionMethod, matter_power: MatterPowerMethod) -> Cosmology {
    cosmology_from(standard_parameters(), PowerConfig::new(transfer, matter_power))
}

/// Shared call log of a [`RecordingSolver`].
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Delegates to the reference solver, recording every call and failing on request.
pub struct RecordingSolver {
    inner: ReferenceSolver,
    pub log: CallLog,
    pub fail_init: Option<SolverStage>,
    pub fail_free: Option<SolverStage>,
    /// P_k_max_1/Mpc of every run, in order
    pub k_max_seen: Rc<RefCell<Vec<f64>>>,
}

impl RecordingSolver {
    pub fn new() -> Self {
        Self {
            inner: ReferenceSolver::new(),
            log: Rc::new(RefCell::new(Vec::new())),
            fail_init: None,
            fail_free: None,
            k_max_seen: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn failing_init(stage: SolverStage) -> Self {
        Self {
            fail_init: Some(stage),
            ..Self::new()
        }
    }

    pub fn failing_free(stage: SolverStage) -> Self {
        Self {
            fail_free: Some(stage),
            ..Self::new()
        }
    }
}

impl BoltzmannSolver for RecordingSolver {
    fn read_input(&mut self, parameters: &SolverParameters) -> Result<(), SolverError> {
        self.log.borrow_mut().push("input".into());
        if let Some(k_max) = parameters.get("P_k_max_1/Mpc").and_then(|v| v.parse().ok()) {
            self.k_max_seen.borrow_mut().push(k_max);
        }
        self.inner.read_input(parameters)
    }

    fn init_stage(&mut self, stage: SolverStage) -> Result<(), SolverError> {
        self.log.borrow_mut().push(format!("init {stage}"));
        if self.fail_init == Some(stage) {
            return Err(SolverError(format!("{stage} exploded")));
        }
        self.inner.init_stage(stage)
    }

    fn free_stage(&mut self, stage: SolverStage) -> Result<(), SolverError> {
        self.log.borrow_mut().push(format!("free {stage}"));
        let result = self.inner.free_stage(stage);
        if self.fail_free == Some(stage) {
            return Err(SolverError(format!("{stage} leaked")));
        }
        result
    }

    fn ln_k(&self) -> &[f64] {
        self.inner.ln_k()
    }

    fn pk_linear(&self, k: f64, z: f64) -> Result<f64, SolverError> {
        self.inner.pk_linear(k, z)
    }

    fn pk_nonlinear(&self, k: f64, z: f64) -> Result<f64, SolverError> {
        self.inner.pk_nonlinear(k, z)
    }

    fn sigma8(&self) -> Result<f64, SolverError> {
        self.inner.sigma8()
    }
}

/// Emulator returning a closed-form spectrum on 60 fixed k modes.
pub struct ToyEmulator {
    k_modes: Vec<f64>,
    /// Truncate predictions to this many values
    pub truncate: Option<usize>,
}

impl ToyEmulator {
    pub fn new() -> Self {
        let k_modes = (0..60).map(|i| 10f64.powf(-2.0 + 3.0 * i as f64 / 59.0)).collect();
        Self {
            k_modes,
            truncate: None,
        }
    }

    /// Power the emulator predicts at `k` for inputs `x`.
    pub fn expected(k: f64, inputs: &[f64; 9]) -> f64 {
        let sigma8 = inputs[2];
        let z = inputs[8];
        1e4 * sigma8 * sigma8 / (1.0 + z).powi(2) * k / (1.0 + (k / 0.02).powi(2))
    }
}

impl Emulator for ToyEmulator {
    fn k_modes(&self) -> &[f64] {
        &self.k_modes
    }

    fn predict(&self, inputs: &[f64; 9]) -> Result<Vec<f64>, String> {
        let n = self.truncate.unwrap_or(self.k_modes.len());
        Ok(self.k_modes[..n].iter().map(|&k| Self::expected(k, inputs)).collect())
    }
}
