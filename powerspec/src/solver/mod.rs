//! Staged Boltzmann solver contract.
//!
//! A solver is driven through seven ordered stages, each of which allocates
//! state that a matching free call releases. [`SolverRun`] owns one complete
//! pass: it initializes the stages in order and, whichever way it is left,
//! frees the initialized ones in reverse order.

pub mod halofit;
pub mod reference;

use log::{debug, error};
use thiserror::Error;

use crate::error::PowerError;

pub use reference::ReferenceSolver;

/// Number of entries in a solver parameter dictionary
pub const PARSER_LENGTH: usize = 20;

/// Failure reported by a solver, carrying its own message.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct SolverError(pub String);

impl From<String> for SolverError {
    fn from(message: String) -> Self {
        SolverError(message)
    }
}

impl From<&str> for SolverError {
    fn from(message: &str) -> Self {
        SolverError(message.to_string())
    }
}

/// Pipeline stages in initialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverStage {
    Background,
    Thermodynamics,
    Perturbations,
    Primordial,
    Nonlinear,
    Transfer,
    Spectra,
}

impl SolverStage {
    /// All stages in initialization order
    pub const ALL: [SolverStage; 7] = [
        SolverStage::Background,
        SolverStage::Thermodynamics,
        SolverStage::Perturbations,
        SolverStage::Primordial,
        SolverStage::Nonlinear,
        SolverStage::Transfer,
        SolverStage::Spectra,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SolverStage::Background => "background",
            SolverStage::Thermodynamics => "thermodynamics",
            SolverStage::Perturbations => "perturbations",
            SolverStage::Primordial => "primordial",
            SolverStage::Nonlinear => "nonlinear",
            SolverStage::Transfer => "transfer",
            SolverStage::Spectra => "spectra",
        }
    }
}

impl std::fmt::Display for SolverStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A Boltzmann code driven stage by stage.
///
/// Wavenumbers are in 1/Mpc and powers in Mpc³. The query methods are only
/// meaningful while every stage is initialized.
pub trait BoltzmannSolver {
    /// Parse the parameter dictionary for the next run.
    fn read_input(&mut self, parameters: &SolverParameters) -> Result<(), SolverError>;

    fn init_stage(&mut self, stage: SolverStage) -> Result<(), SolverError>;

    fn free_stage(&mut self, stage: SolverStage) -> Result<(), SolverError>;

    /// ln k of the solver's own output grid
    fn ln_k(&self) -> &[f64];

    /// Linear matter power at wavenumber `k` and redshift `z`.
    fn pk_linear(&self, k: f64, z: f64) -> Result<f64, SolverError>;

    /// Non-linear matter power at wavenumber `k` and redshift `z`.
    fn pk_nonlinear(&self, k: f64, z: f64) -> Result<f64, SolverError>;

    /// sigma8 of the computed linear spectrum
    fn sigma8(&self) -> Result<f64, SolverError>;
}

/// Fixed-capacity name/value dictionary handed to a solver.
///
/// Every slot starts as a blank `(" ", " ")` pair so unused entries are
/// always well defined.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverParameters {
    entries: Vec<(String, String)>,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            entries: vec![(" ".to_string(), " ".to_string()); PARSER_LENGTH],
        }
    }
}

impl SolverParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `name = value` in `slot`.
    pub fn set(&mut self, slot: usize, name: &str, value: impl Into<String>) -> Result<(), PowerError> {
        let entry = self.entries.get_mut(slot).ok_or_else(|| {
            PowerError::Configuration(format!(
                "solver parameter slot {slot} out of range (capacity {PARSER_LENGTH})"
            ))
        })?;
        *entry = (name.to_string(), value.into());
        Ok(())
    }

    /// Name and value stored in `slot`.
    pub fn entry(&self, slot: usize) -> Option<(&str, &str)> {
        self.entries
            .get(slot)
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Value of the first entry called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.as_str())
    }

    /// Entries that are not blank.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(name, _)| !name.trim().is_empty())
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

fn backend_error(stage: impl Into<String>, err: SolverError) -> PowerError {
    PowerError::Backend {
        stage: stage.into(),
        message: err.0,
    }
}

/// One complete solver pass.
///
/// Stages are freed in reverse initialization order when the run is
/// finished or dropped. A free that fails does not stop the remaining
/// frees; the first failure is what [`SolverRun::finish`] reports.
pub struct SolverRun<'a> {
    solver: &'a mut dyn BoltzmannSolver,
    initialized: Vec<SolverStage>,
}

impl<'a> SolverRun<'a> {
    /// Read the parameters and initialize every stage in order.
    ///
    /// # Errors
    /// `PowerError::Backend` naming the first stage that failed ("input"
    /// for the dictionary itself). Stages already initialized have been
    /// freed by the time the error is returned.
    pub fn start(solver: &'a mut dyn BoltzmannSolver, parameters: &SolverParameters) -> Result<Self, PowerError> {
        solver
            .read_input(parameters)
            .map_err(|e| backend_error("input", e))?;

        let mut run = Self {
            solver,
            initialized: Vec::with_capacity(SolverStage::ALL.len()),
        };
        for stage in SolverStage::ALL {
            debug!("Initializing solver stage {stage}");
            run.solver
                .init_stage(stage)
                .map_err(|e| backend_error(stage.name(), e))?;
            run.initialized.push(stage);
        }
        Ok(run)
    }

    /// The solver with every stage initialized.
    pub fn solver(&self) -> &dyn BoltzmannSolver {
        &*self.solver
    }

    /// Free every stage and report the first failure.
    pub fn finish(mut self) -> Result<(), PowerError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), PowerError> {
        let mut first_failure = None;
        while let Some(stage) = self.initialized.pop() {
            debug!("Freeing solver stage {stage}");
            if let Err(e) = self.solver.free_stage(stage) {
                error!("Error freeing solver {stage} stage: {e}");
                first_failure.get_or_insert_with(|| backend_error(format!("free {stage}"), e));
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

impl Drop for SolverRun<'_> {
    fn drop(&mut self) {
        // Failures were logged by teardown; nothing is left to report them to
        let _ = self.teardown();
    }
}
